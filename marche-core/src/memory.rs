//! In-process adapters for every port. Used by the test suites and by the
//! API when it runs without a database.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use marche_catalog::Product;
use marche_order::Order;
use marche_shared::Role;
use marche_subscription::Subscription;
use marche_wallet::{Transaction, Wallet};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::events::EventPublisher;
use crate::identity::User;
use crate::repository::{
    LedgerEntry, OrderRepository, ProductRepository, SubscriptionRepository, UserRepository,
    WalletRepository,
};
use crate::{CoreError, CoreResult};

#[derive(Default)]
struct Ledger {
    wallets: HashMap<Uuid, Wallet>,
    references: HashSet<String>,
}

impl Ledger {
    fn apply(&mut self, entries: Vec<LedgerEntry>) -> CoreResult<Vec<Wallet>> {
        let mut batch_refs = HashSet::new();
        for entry in &entries {
            let reference = &entry.transaction.reference;
            if self.references.contains(reference) || !batch_refs.insert(reference.clone()) {
                return Err(CoreError::Conflict(format!("Duplicate transaction reference: {}", reference)));
            }
        }

        // Work on copies so a rejected entry leaves every wallet untouched.
        let mut staged: HashMap<Uuid, Wallet> = HashMap::new();
        let mut touched = Vec::with_capacity(entries.len());
        for entry in entries {
            let wallet = match staged.entry(entry.wallet_id) {
                Entry::Occupied(slot) => slot.into_mut(),
                Entry::Vacant(slot) => {
                    let original = self
                        .wallets
                        .get(&entry.wallet_id)
                        .cloned()
                        .ok_or_else(|| CoreError::not_found("wallet", entry.wallet_id))?;
                    slot.insert(original)
                }
            };
            wallet.add_transaction(entry.transaction)?;
            touched.push(entry.wallet_id);
        }

        for (id, wallet) in staged {
            for tx in &wallet.transactions {
                self.references.insert(tx.reference.clone());
            }
            self.wallets.insert(id, wallet);
        }

        touched
            .into_iter()
            .map(|id| {
                self.wallets
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| CoreError::not_found("wallet", id))
            })
            .collect()
    }
}

#[derive(Default)]
pub struct InMemoryWalletRepository {
    ledger: Mutex<Ledger>,
}

impl InMemoryWalletRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WalletRepository for InMemoryWalletRepository {
    async fn create(&self, wallet: &Wallet) -> CoreResult<()> {
        let mut ledger = self.ledger.lock().await;
        let exists = ledger
            .wallets
            .values()
            .any(|w| w.owner_id == wallet.owner_id && w.role == wallet.role);
        if exists {
            return Err(CoreError::Conflict(format!(
                "Wallet already exists for {} as {}",
                wallet.owner_id, wallet.role
            )));
        }
        ledger.wallets.insert(wallet.id, wallet.clone());
        Ok(())
    }

    async fn find_by_owner_and_role(&self, owner_id: Uuid, role: Role) -> CoreResult<Option<Wallet>> {
        let ledger = self.ledger.lock().await;
        Ok(ledger
            .wallets
            .values()
            .find(|w| w.owner_id == owner_id && w.role == role)
            .cloned())
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> CoreResult<Vec<Wallet>> {
        let ledger = self.ledger.lock().await;
        let mut wallets: Vec<Wallet> = ledger
            .wallets
            .values()
            .filter(|w| w.owner_id == owner_id)
            .cloned()
            .collect();
        wallets.sort_by_key(|w| w.role);
        Ok(wallets)
    }

    async fn recent_transactions(&self, wallet_id: Uuid, limit: usize) -> CoreResult<Vec<Transaction>> {
        let ledger = self.ledger.lock().await;
        let wallet = ledger
            .wallets
            .get(&wallet_id)
            .ok_or_else(|| CoreError::not_found("wallet", wallet_id))?;
        Ok(wallet.transactions.iter().rev().take(limit).cloned().collect())
    }

    async fn apply(&self, entries: Vec<LedgerEntry>) -> CoreResult<Vec<Wallet>> {
        self.ledger.lock().await.apply(entries)
    }

    async fn apply_once(&self, entries: Vec<LedgerEntry>) -> CoreResult<Option<Vec<Wallet>>> {
        let mut ledger = self.ledger.lock().await;
        let recorded = entries
            .iter()
            .filter(|e| ledger.references.contains(&e.transaction.reference))
            .count();

        if recorded == 0 {
            ledger.apply(entries).map(Some)
        } else if recorded == entries.len() {
            Ok(None)
        } else {
            Err(CoreError::Conflict(format!(
                "{} of {} references already recorded",
                recorded,
                entries.len()
            )))
        }
    }
}

#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: Mutex<HashMap<Uuid, Order>>,
    fail_updates: AtomicBool,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `update` fail with a storage error.
    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    async fn filtered(&self, keep: impl Fn(&Order) -> bool) -> Vec<Order> {
        let orders = self.orders.lock().await;
        let mut found: Vec<Order> = orders.values().filter(|o| keep(o)).cloned().collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        found
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn create(&self, order: &Order) -> CoreResult<()> {
        self.orders.lock().await.insert(order.id, order.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<Order>> {
        Ok(self.orders.lock().await.get(&id).cloned())
    }

    async fn update(&self, order: &Order) -> CoreResult<()> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(CoreError::Storage("order store unavailable".to_string()));
        }
        let mut orders = self.orders.lock().await;
        match orders.get_mut(&order.id) {
            Some(existing) => {
                *existing = order.clone();
                Ok(())
            }
            None => Err(CoreError::not_found("order", order.id)),
        }
    }

    async fn list_by_buyer(&self, buyer_id: Uuid) -> CoreResult<Vec<Order>> {
        Ok(self.filtered(|o| o.buyer_id == buyer_id).await)
    }

    async fn list_by_seller(&self, seller_id: Uuid) -> CoreResult<Vec<Order>> {
        Ok(self
            .filtered(|o| o.items.iter().any(|i| i.seller_id == seller_id))
            .await)
    }

    async fn list_by_agent(&self, agent_id: Uuid) -> CoreResult<Vec<Order>> {
        Ok(self.filtered(|o| o.delivery_agent_id == Some(agent_id)).await)
    }
}

#[derive(Default)]
pub struct InMemoryProductRepository {
    products: Mutex<HashMap<Uuid, Product>>,
}

impl InMemoryProductRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn create(&self, product: &Product) -> CoreResult<()> {
        self.products.lock().await.insert(product.id, product.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<Product>> {
        Ok(self.products.lock().await.get(&id).cloned())
    }

    async fn decrement_stock(&self, id: Uuid, quantity: i32) -> CoreResult<Product> {
        let mut products = self.products.lock().await;
        let product = products
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found("product", id))?;
        product.decrement_stock(quantity)?;
        Ok(product.clone())
    }
}

#[derive(Default)]
pub struct InMemorySubscriptionRepository {
    subscriptions: Mutex<HashMap<Uuid, Subscription>>,
}

impl InMemorySubscriptionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptionRepository {
    async fn find_by_seller(&self, seller_id: Uuid) -> CoreResult<Option<Subscription>> {
        Ok(self.subscriptions.lock().await.get(&seller_id).cloned())
    }

    async fn save(&self, subscription: &Subscription) -> CoreResult<()> {
        self.subscriptions
            .lock()
            .await
            .insert(subscription.seller_id, subscription.clone());
        Ok(())
    }

    async fn find_expiring(&self, now: DateTime<Utc>, window: Duration) -> CoreResult<Vec<Subscription>> {
        let subs = self.subscriptions.lock().await;
        let mut found: Vec<Subscription> = subs
            .values()
            .filter(|s| s.expires_within(window, now))
            .cloned()
            .collect();
        found.sort_by_key(|s| s.end_date);
        Ok(found)
    }

    async fn find_expired(&self, now: DateTime<Utc>) -> CoreResult<Vec<Subscription>> {
        let subs = self.subscriptions.lock().await;
        Ok(subs.values().filter(|s| s.is_lapsed(now)).cloned().collect())
    }
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: Mutex<HashMap<Uuid, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: &User) -> CoreResult<()> {
        self.users.lock().await.insert(user.id, user.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<User>> {
        Ok(self.users.lock().await.get(&id).cloned())
    }

    async fn save(&self, user: &User) -> CoreResult<()> {
        let mut users = self.users.lock().await;
        match users.get_mut(&user.id) {
            Some(existing) => {
                *existing = user.clone();
                Ok(())
            }
            None => Err(CoreError::not_found("user", user.id)),
        }
    }

    async fn first_with_role(&self, role: Role) -> CoreResult<Option<User>> {
        let users = self.users.lock().await;
        Ok(users
            .values()
            .filter(|u| u.has_role(role))
            .min_by_key(|u| u.created_at)
            .cloned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedEvent {
    pub topic: String,
    pub key: String,
    pub payload: String,
}

/// Keeps every published event in memory.
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<PublishedEvent>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn published(&self) -> Vec<PublishedEvent> {
        self.events.lock().await.clone()
    }

    pub async fn on_topic(&self, topic: &str) -> Vec<PublishedEvent> {
        self.events
            .lock()
            .await
            .iter()
            .filter(|e| e.topic == topic)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, topic: &str, key: &str, payload: &str) -> CoreResult<()> {
        self.events.lock().await.push(PublishedEvent {
            topic: topic.to_string(),
            key: key.to_string(),
            payload: payload.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marche_wallet::TransactionKind;

    async fn funded(repo: &InMemoryWalletRepository, role: Role, amount: i64) -> Wallet {
        let wallet = Wallet::new(Uuid::new_v4(), role);
        repo.create(&wallet).await.unwrap();
        if amount > 0 {
            let tx = Transaction::new(TransactionKind::Deposit, amount, format!("SEED-{}", wallet.id));
            repo.apply(vec![LedgerEntry::new(wallet.id, tx)]).await.unwrap();
        }
        repo.find_by_owner_and_role(wallet.owner_id, role).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_batch_is_all_or_nothing() {
        let repo = InMemoryWalletRepository::new();
        let a = funded(&repo, Role::Buyer, 1000).await;
        let b = funded(&repo, Role::Seller, 0).await;

        let entries = vec![
            LedgerEntry::new(b.id, Transaction::new(TransactionKind::Deposit, 500, "T-1")),
            LedgerEntry::new(a.id, Transaction::new(TransactionKind::Withdrawal, 5000, "T-2")),
        ];
        let err = repo.apply(entries).await.unwrap_err();
        assert!(matches!(err, CoreError::InsufficientBalance { required: 5000, available: 1000 }));

        let b_after = repo.find_by_owner_and_role(b.owner_id, Role::Seller).await.unwrap().unwrap();
        assert_eq!(b_after.balance, 0);
        assert!(b_after.transactions.is_empty());
    }

    #[tokio::test]
    async fn test_references_are_unique_across_wallets() {
        let repo = InMemoryWalletRepository::new();
        let a = funded(&repo, Role::Buyer, 0).await;
        let b = funded(&repo, Role::Seller, 0).await;

        repo.apply(vec![LedgerEntry::new(a.id, Transaction::new(TransactionKind::Deposit, 10, "R-1"))])
            .await
            .unwrap();
        let err = repo
            .apply(vec![LedgerEntry::new(b.id, Transaction::new(TransactionKind::Deposit, 10, "R-1"))])
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_apply_once_skips_a_recorded_batch() {
        let repo = InMemoryWalletRepository::new();
        let a = funded(&repo, Role::Seller, 0).await;
        let batch = || vec![LedgerEntry::new(a.id, Transaction::new(TransactionKind::Deposit, 700, "STL-X-1"))];

        assert!(repo.apply_once(batch()).await.unwrap().is_some());
        assert!(repo.apply_once(batch()).await.unwrap().is_none());

        let wallet = repo.find_by_owner_and_role(a.owner_id, Role::Seller).await.unwrap().unwrap();
        assert_eq!(wallet.balance, 700);
        assert_eq!(wallet.transactions.len(), 1);
    }

    #[tokio::test]
    async fn test_one_wallet_per_owner_and_role() {
        let repo = InMemoryWalletRepository::new();
        let wallet = funded(&repo, Role::Buyer, 0).await;
        let twin = Wallet::new(wallet.owner_id, Role::Buyer);
        assert!(matches!(repo.create(&twin).await, Err(CoreError::Conflict(_))));
        repo.create(&Wallet::new(wallet.owner_id, Role::Seller)).await.unwrap();
        assert_eq!(repo.list_by_owner(wallet.owner_id).await.unwrap().len(), 2);
    }
}
