use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use marche_core::repository::SubscriptionRepository;
use marche_core::CoreResult;
use marche_subscription::{PaymentRecord, RenewalRecord, Subscription, SubscriptionStatus};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{db_error, parse_column};

pub struct StoreSubscriptionRepository {
    pool: PgPool,
}

impl StoreSubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SubscriptionRow {
    id: Uuid,
    seller_id: Uuid,
    plan: String,
    price: i64,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    status: String,
    auto_renew: bool,
    last_payment: Option<Json<PaymentRecord>>,
    history: Json<Vec<RenewalRecord>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SubscriptionRow {
    fn into_domain(self) -> CoreResult<Subscription> {
        Ok(Subscription {
            id: self.id,
            seller_id: self.seller_id,
            plan: parse_column("plan", &self.plan)?,
            price: self.price,
            start_date: self.start_date,
            end_date: self.end_date,
            status: parse_column("status", &self.status)?,
            auto_renew: self.auto_renew,
            last_payment: self.last_payment.map(|p| p.0),
            history: self.history.0,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SUBSCRIPTION_COLUMNS: &str = "id, seller_id, plan, price, start_date, end_date, status, auto_renew, \
    last_payment, history, created_at, updated_at";

#[async_trait]
impl SubscriptionRepository for StoreSubscriptionRepository {
    async fn find_by_seller(&self, seller_id: Uuid) -> CoreResult<Option<Subscription>> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM subscriptions WHERE seller_id = $1",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(seller_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(SubscriptionRow::into_domain).transpose()
    }

    async fn save(&self, subscription: &Subscription) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions (id, seller_id, plan, price, start_date, end_date, status, auto_renew,
                last_payment, history, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (seller_id) DO UPDATE SET
                plan = EXCLUDED.plan,
                price = EXCLUDED.price,
                start_date = EXCLUDED.start_date,
                end_date = EXCLUDED.end_date,
                status = EXCLUDED.status,
                auto_renew = EXCLUDED.auto_renew,
                last_payment = EXCLUDED.last_payment,
                history = EXCLUDED.history,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(subscription.id)
        .bind(subscription.seller_id)
        .bind(subscription.plan.as_str())
        .bind(subscription.price)
        .bind(subscription.start_date)
        .bind(subscription.end_date)
        .bind(subscription.status.as_str())
        .bind(subscription.auto_renew)
        .bind(subscription.last_payment.as_ref().map(Json))
        .bind(Json(&subscription.history))
        .bind(subscription.created_at)
        .bind(subscription.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }

    async fn find_expiring(&self, now: DateTime<Utc>, window: Duration) -> CoreResult<Vec<Subscription>> {
        let rows: Vec<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM subscriptions WHERE status = $1 AND end_date >= $2 AND end_date <= $3 \
             ORDER BY end_date ASC",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(SubscriptionStatus::Active.as_str())
        .bind(now)
        .bind(now + window)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(SubscriptionRow::into_domain).collect()
    }

    async fn find_expired(&self, now: DateTime<Utc>) -> CoreResult<Vec<Subscription>> {
        let rows: Vec<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM subscriptions WHERE status = $1 AND end_date < $2",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(SubscriptionStatus::Active.as_str())
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(SubscriptionRow::into_domain).collect()
    }
}
