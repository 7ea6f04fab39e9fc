use marche_order::{FeeMode, FeeSchedule};
use marche_subscription::PlanPricing;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub kafka: KafkaConfig,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
    #[serde(default)]
    pub subscription_pricing: PlanPricing,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    pub platform_fee: i64,
    pub delivery_fee: i64,
    pub admin_fee: i64,
    #[serde(default)]
    pub fee_mode: FeeMode,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: i64,
}

fn default_rate_limit() -> i64 { 100 }

impl BusinessRules {
    pub fn fee_schedule(&self) -> FeeSchedule {
        FeeSchedule {
            platform_fee: self.platform_fee,
            delivery_fee: self.delivery_fee,
            admin_fee: self.admin_fee,
            mode: self.fee_mode,
        }
    }
}

impl Default for BusinessRules {
    fn default() -> Self {
        let fees = FeeSchedule::default();
        Self {
            platform_fee: fees.platform_fee,
            delivery_fee: fees.delivery_fee,
            admin_fee: fees.admin_fee,
            fee_mode: fees.mode,
            rate_limit_per_minute: default_rate_limit(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

/// Without a URL the API keeps everything in memory.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RedisConfig {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct KafkaConfig {
    pub brokers: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `MARCHE__BUSINESS_RULES__PLATFORM_FEE=1500`
            .add_source(config::Environment::with_prefix("MARCHE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
