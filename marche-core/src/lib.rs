pub mod identity;
pub mod repository;
pub mod events;
pub mod memory;
pub mod services;

use marche_catalog::InventoryError;
use marche_order::{OrderError, SettlementStep};
use marche_subscription::SubscriptionError;
use marche_wallet::WalletError;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        fields: Vec<String>,
    },
    #[error("{entity} not found: {id}")]
    NotFound {
        entity: &'static str,
        id: String,
    },
    #[error("Authentication required")]
    Unauthorized,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        required: i64,
        available: i64,
    },
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition {
        from: String,
        to: String,
    },
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Settlement(#[from] SettlementFailure),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn validation(message: impl Into<String>, fields: &[&str]) -> Self {
        CoreError::Validation {
            message: message.into(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CoreError::NotFound { entity, id: id.to_string() }
    }
}

/// Raised when money already moved for an order but the order itself could
/// not be brought up to date. The credits carry deterministic references, so
/// running the settlement again completes it without paying anyone twice.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Settlement of order {order_id} incomplete after {} applied step(s): {reason}", .applied.len())]
pub struct SettlementFailure {
    pub order_id: Uuid,
    pub applied: Vec<SettlementStep>,
    pub reason: String,
}

impl From<WalletError> for CoreError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::InvalidAmount(_) | WalletError::BalanceOverflow => {
                CoreError::validation(err.to_string(), &["amount"])
            }
            WalletError::InsufficientBalance { required, available } => {
                CoreError::InsufficientBalance { required, available }
            }
            WalletError::DuplicateReference(_) => CoreError::Conflict(err.to_string()),
        }
    }
}

impl From<InventoryError> for CoreError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::InvalidPrice(_) => CoreError::validation(err.to_string(), &["priceXof"]),
            InventoryError::InvalidQuantity(_) => CoreError::validation(err.to_string(), &["quantity"]),
            InventoryError::NotAvailable(_) | InventoryError::InsufficientStock { .. } => {
                CoreError::validation(err.to_string(), &["items"])
            }
        }
    }
}

impl From<OrderError> for CoreError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::InvalidTransition { from, to } => CoreError::InvalidTransition { from, to },
            OrderError::NotSettleable(status) => CoreError::InvalidTransition {
                from: format!("payment {}", status),
                to: "settled".to_string(),
            },
            OrderError::AwaitingPayment { payment, to } => CoreError::InvalidTransition {
                from: format!("payment {}", payment),
                to: to.to_string(),
            },
            OrderError::EmptyOrder | OrderError::AmountOverflow => {
                CoreError::validation(err.to_string(), &["items"])
            }
            OrderError::NoDeliveryAgent => CoreError::validation(err.to_string(), &["deliveryAgentId"]),
            OrderError::AgentAlreadyAssigned => CoreError::Conflict(err.to_string()),
            OrderError::InvalidFees(msg) => CoreError::InternalError(format!("fee schedule: {}", msg)),
            OrderError::Inventory(inner) => inner.into(),
        }
    }
}

impl From<SubscriptionError> for CoreError {
    fn from(err: SubscriptionError) -> Self {
        match err {
            SubscriptionError::FreeTrialNotSelectable | SubscriptionError::FreeTrialNotRenewable => {
                CoreError::validation(err.to_string(), &["plan"])
            }
            SubscriptionError::AlreadyCancelled(_) => CoreError::Conflict(err.to_string()),
        }
    }
}
