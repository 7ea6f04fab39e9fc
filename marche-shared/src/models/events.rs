use uuid::Uuid;

pub const WALLET_TRANSACTIONS_TOPIC: &str = "wallet.transactions";
pub const ORDERS_SETTLED_TOPIC: &str = "orders.settled";
pub const ORDERS_REFUNDED_TOPIC: &str = "orders.refunded";
pub const SUBSCRIPTIONS_TOPIC: &str = "subscriptions.changed";

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct WalletTransactionEvent {
    pub wallet_id: Uuid,
    pub owner_id: Uuid,
    pub role: String,
    pub kind: String,
    pub amount: i64,
    pub balance_after: i64,
    pub reference: String,
    pub order_id: Option<Uuid>,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct PayoutLine {
    pub beneficiary_id: Uuid,
    pub role: String,
    pub amount: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct OrderSettledEvent {
    pub order_id: Uuid,
    pub total_amount: i64,
    pub payouts: Vec<PayoutLine>,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct OrderRefundedEvent {
    pub order_id: Uuid,
    pub buyer_id: Uuid,
    pub amount: i64,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct SubscriptionChangedEvent {
    pub subscription_id: Uuid,
    pub seller_id: Uuid,
    pub plan: String,
    pub status: String,
    pub ends_at: i64,
    pub timestamp: i64,
}
