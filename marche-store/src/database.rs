use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::{info, warn};
use serde_json::Value;

use crate::app_config::BusinessRules;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

#[derive(sqlx::FromRow)]
struct RuleRow {
    rule_key: String,
    rule_value: Value,
}

impl DbClient {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&self.pool)
            .await?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    /// Overlay fee rules stored in the `business_rules` table on top of the
    /// configured ones. Rows look like `{"value": <number|string>}`.
    pub async fn fetch_business_rules(&self, defaults: BusinessRules) -> Result<BusinessRules, sqlx::Error> {
        let rows: Vec<RuleRow> = sqlx::query_as("SELECT rule_key, rule_value FROM business_rules")
            .fetch_all(&self.pool)
            .await?;

        Ok(apply_rule_overrides(defaults, rows.into_iter().map(|r| (r.rule_key, r.rule_value))))
    }
}

fn apply_rule_overrides(defaults: BusinessRules, rows: impl IntoIterator<Item = (String, Value)>) -> BusinessRules {
    let mut rules = defaults;

    for (key, val) in rows {
        let Some(v) = val.get("value") else {
            warn!("Ignoring business rule {} without a value", key);
            continue;
        };

        match key.as_str() {
            "platform_fee" => {
                if let Some(n) = v.as_i64() {
                    rules.platform_fee = n;
                }
            }
            "delivery_fee" => {
                if let Some(n) = v.as_i64() {
                    rules.delivery_fee = n;
                }
            }
            "admin_fee" => {
                if let Some(n) = v.as_i64() {
                    rules.admin_fee = n;
                }
            }
            "fee_mode" => {
                match v.as_str().map(str::parse) {
                    Some(Ok(mode)) => rules.fee_mode = mode,
                    _ => warn!("Ignoring unknown fee_mode rule {}", v),
                }
            }
            "rate_limit_per_minute" => {
                if let Some(n) = v.as_i64() {
                    rules.rate_limit_per_minute = n;
                }
            }
            _ => {}
        }
    }

    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use marche_order::FeeMode;
    use serde_json::json;

    #[test]
    fn test_rule_overrides() {
        let rows = vec![
            ("platform_fee".to_string(), json!({"value": 1500})),
            ("fee_mode".to_string(), json!({"value": "additive"})),
            ("admin_fee".to_string(), json!({"value": "not a number"})),
            ("unrelated".to_string(), json!({"value": 1})),
        ];
        let rules = apply_rule_overrides(BusinessRules::default(), rows);

        assert_eq!(rules.platform_fee, 1500);
        assert_eq!(rules.fee_mode, FeeMode::Additive);
        assert_eq!(rules.admin_fee, 200);
        assert_eq!(rules.delivery_fee, 1000);
    }
}
