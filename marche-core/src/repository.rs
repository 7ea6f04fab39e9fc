use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use marche_catalog::Product;
use marche_order::Order;
use marche_shared::Role;
use marche_subscription::Subscription;
use marche_wallet::{Transaction, Wallet};
use uuid::Uuid;

use crate::identity::User;
use crate::CoreResult;

/// A transaction destined for a specific wallet.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub wallet_id: Uuid,
    pub transaction: Transaction,
}

impl LedgerEntry {
    pub fn new(wallet_id: Uuid, transaction: Transaction) -> Self {
        Self { wallet_id, transaction }
    }
}

/// Repository trait for wallet balances and their transaction logs
#[async_trait]
pub trait WalletRepository: Send + Sync {
    /// Fails with `Conflict` if the owner already holds a wallet for the role.
    async fn create(&self, wallet: &Wallet) -> CoreResult<()>;

    /// Lookups need only return the wallet and its balance; history is read
    /// through `recent_transactions`.
    async fn find_by_owner_and_role(&self, owner_id: Uuid, role: Role) -> CoreResult<Option<Wallet>>;

    async fn list_by_owner(&self, owner_id: Uuid) -> CoreResult<Vec<Wallet>>;

    /// Newest first.
    async fn recent_transactions(&self, wallet_id: Uuid, limit: usize) -> CoreResult<Vec<Transaction>>;

    /// Append every entry or none. Debits are checked against the balance at
    /// the moment they are applied, and references must be unused. Returns
    /// the updated wallets in entry order.
    async fn apply(&self, entries: Vec<LedgerEntry>) -> CoreResult<Vec<Wallet>>;

    /// Like [`apply`](Self::apply), but a batch whose references are all
    /// already recorded is skipped and reported with `Ok(None)`. A batch
    /// with only some references recorded is a `Conflict`.
    async fn apply_once(&self, entries: Vec<LedgerEntry>) -> CoreResult<Option<Vec<Wallet>>>;
}

/// Repository trait for order data access
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn create(&self, order: &Order) -> CoreResult<()>;

    async fn get(&self, id: Uuid) -> CoreResult<Option<Order>>;

    async fn update(&self, order: &Order) -> CoreResult<()>;

    async fn list_by_buyer(&self, buyer_id: Uuid) -> CoreResult<Vec<Order>>;

    async fn list_by_seller(&self, seller_id: Uuid) -> CoreResult<Vec<Order>>;

    async fn list_by_agent(&self, agent_id: Uuid) -> CoreResult<Vec<Order>>;
}

/// Repository trait for the slice of the catalog checkout needs
#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn create(&self, product: &Product) -> CoreResult<()>;

    async fn get(&self, id: Uuid) -> CoreResult<Option<Product>>;

    /// Atomically take `quantity` units out of stock, failing if fewer remain.
    async fn decrement_stock(&self, id: Uuid, quantity: i32) -> CoreResult<Product>;
}

#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    async fn find_by_seller(&self, seller_id: Uuid) -> CoreResult<Option<Subscription>>;

    /// Insert or replace the seller's subscription.
    async fn save(&self, subscription: &Subscription) -> CoreResult<()>;

    /// Active subscriptions ending within `window` of `now`.
    async fn find_expiring(&self, now: DateTime<Utc>, window: Duration) -> CoreResult<Vec<Subscription>>;

    /// Subscriptions still marked active whose window has passed.
    async fn find_expired(&self, now: DateTime<Utc>) -> CoreResult<Vec<Subscription>>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: &User) -> CoreResult<()>;

    async fn get(&self, id: Uuid) -> CoreResult<Option<User>>;

    async fn save(&self, user: &User) -> CoreResult<()>;

    /// Earliest-created user holding `role`.
    async fn first_with_role(&self, role: Role) -> CoreResult<Option<User>>;
}
