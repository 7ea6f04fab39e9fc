pub mod app_config;
pub mod database;
pub mod redis_repo;
pub mod events;
pub mod wallet_repo;
pub mod order_repo;
pub mod catalog_repo;
pub mod subscription_repo;
pub mod user_repo;

pub use database::DbClient;
pub use redis_repo::RedisClient;
pub use events::EventProducer;

use std::fmt::Display;
use std::str::FromStr;

use marche_core::CoreError;

pub(crate) fn db_error(err: sqlx::Error) -> CoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            CoreError::Conflict(db.message().to_string())
        }
        _ => CoreError::Storage(err.to_string()),
    }
}

/// Parse a text column into one of the domain enums.
pub(crate) fn parse_column<T>(column: &str, raw: &str) -> Result<T, CoreError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse::<T>()
        .map_err(|e| CoreError::Storage(format!("bad {} column value '{}': {}", column, raw, e)))
}
