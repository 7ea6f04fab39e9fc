use chrono::{DateTime, Utc};
use marche_shared::{PaymentMethod, Role, CURRENCY};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// What a transaction does to the balance is fixed by its kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    Payment,
    Refund,
    Commission,
    Fee,
}

impl TransactionKind {
    /// Deposits, refunds and commissions add to the balance; everything else
    /// takes away from it.
    pub fn is_credit(&self) -> bool {
        matches!(
            self,
            TransactionKind::Deposit | TransactionKind::Refund | TransactionKind::Commission
        )
    }

    pub fn signed(&self, amount: i64) -> i64 {
        if self.is_credit() {
            amount
        } else {
            -amount
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdrawal => "withdrawal",
            TransactionKind::Payment => "payment",
            TransactionKind::Refund => "refund",
            TransactionKind::Commission => "commission",
            TransactionKind::Fee => "fee",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(TransactionKind::Deposit),
            "withdrawal" => Ok(TransactionKind::Withdrawal),
            "payment" => Ok(TransactionKind::Payment),
            "refund" => Ok(TransactionKind::Refund),
            "commission" => Ok(TransactionKind::Commission),
            "fee" => Ok(TransactionKind::Fee),
            other => Err(format!("unknown transaction kind: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            "failed" => Ok(TransactionStatus::Failed),
            "cancelled" => Ok(TransactionStatus::Cancelled),
            other => Err(format!("unknown transaction status: {}", other)),
        }
    }
}

/// A single ledger line. Never edited after it is appended to a wallet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    pub kind: TransactionKind,
    pub amount: i64,
    pub status: TransactionStatus,
    pub reference: String,
    pub order_id: Option<Uuid>,
    pub counterparty_id: Option<Uuid>,
    pub payment_method: PaymentMethod,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(kind: TransactionKind, amount: i64, reference: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            amount,
            status: TransactionStatus::Completed,
            reference: reference.into(),
            order_id: None,
            counterparty_id: None,
            payment_method: PaymentMethod::Internal,
            description: String::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_order(mut self, order_id: Uuid) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_counterparty(mut self, user_id: Uuid) -> Self {
        self.counterparty_id = Some(user_id);
        self
    }

    pub fn with_method(mut self, method: PaymentMethod) -> Self {
        self.payment_method = method;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_status(mut self, status: TransactionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn affects_balance(&self) -> bool {
        self.status == TransactionStatus::Completed
    }

    /// Balance delta this transaction contributes (zero unless completed).
    pub fn balance_delta(&self) -> i64 {
        if self.affects_balance() {
            self.kind.signed(self.amount)
        } else {
            0
        }
    }
}

/// Balance held by one owner under one role.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub role: Role,
    pub balance: i64,
    pub currency: String,
    pub transactions: Vec<Transaction>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(owner_id: Uuid, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            role,
            balance: 0,
            currency: CURRENCY.to_string(),
            transactions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_sufficient_balance(&self, amount: i64) -> bool {
        self.balance >= amount
    }
}
