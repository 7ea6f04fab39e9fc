use std::sync::Arc;

use chrono::Utc;
use marche_shared::models::events::{WalletTransactionEvent, WALLET_TRANSACTIONS_TOPIC};
use marche_shared::{PaymentMethod, Role};
use marche_wallet::{reference, Transaction, TransactionKind, Wallet};
use uuid::Uuid;

use crate::events::{emit, EventPublisher};
use crate::repository::{LedgerEntry, WalletRepository};
use crate::{CoreError, CoreResult};

pub const DEFAULT_HISTORY_LIMIT: usize = 50;
pub const MAX_HISTORY_LIMIT: usize = 500;

pub struct WalletService {
    wallets: Arc<dyn WalletRepository>,
    events: Arc<dyn EventPublisher>,
}

impl WalletService {
    pub fn new(wallets: Arc<dyn WalletRepository>, events: Arc<dyn EventPublisher>) -> Self {
        Self { wallets, events }
    }

    pub async fn wallets_of(&self, owner_id: Uuid) -> CoreResult<Vec<Wallet>> {
        self.wallets.list_by_owner(owner_id).await
    }

    pub async fn wallet(&self, owner_id: Uuid, role: Role) -> CoreResult<Wallet> {
        self.wallets
            .find_by_owner_and_role(owner_id, role)
            .await?
            .ok_or_else(|| CoreError::not_found("wallet", format!("{}/{}", owner_id, role)))
    }

    pub async fn transactions(
        &self,
        owner_id: Uuid,
        role: Role,
        limit: Option<usize>,
    ) -> CoreResult<Vec<Transaction>> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, MAX_HISTORY_LIMIT);
        let wallet = self.wallet(owner_id, role).await?;
        self.wallets.recent_transactions(wallet.id, limit).await
    }

    /// Fund a wallet from an external payment channel.
    pub async fn deposit(
        &self,
        owner_id: Uuid,
        role: Role,
        amount: i64,
        method: PaymentMethod,
        description: Option<String>,
    ) -> CoreResult<Wallet> {
        ensure_positive(amount)?;
        ensure_external(method)?;
        let wallet = self.wallet(owner_id, role).await?;

        let tx = Transaction::new(TransactionKind::Deposit, amount, reference::generate())
            .with_method(method)
            .with_description(description.unwrap_or_else(|| format!("Deposit via {}", method)));
        self.post(&wallet, tx).await
    }

    /// Pay out of a wallet to an external channel.
    pub async fn withdraw(
        &self,
        owner_id: Uuid,
        role: Role,
        amount: i64,
        method: PaymentMethod,
        description: Option<String>,
    ) -> CoreResult<Wallet> {
        ensure_positive(amount)?;
        ensure_external(method)?;
        let wallet = self.wallet(owner_id, role).await?;
        if !wallet.has_sufficient_balance(amount) {
            return Err(CoreError::InsufficientBalance {
                required: amount,
                available: wallet.balance,
            });
        }

        let tx = Transaction::new(TransactionKind::Withdrawal, amount, reference::generate())
            .with_method(method)
            .with_description(description.unwrap_or_else(|| format!("Withdrawal via {}", method)));
        self.post(&wallet, tx).await
    }

    /// Move money between two wallets of the same owner. Both legs are
    /// applied together or not at all.
    pub async fn transfer(
        &self,
        owner_id: Uuid,
        from: Role,
        to: Role,
        amount: i64,
    ) -> CoreResult<(Wallet, Wallet)> {
        ensure_positive(amount)?;
        if from == to {
            return Err(CoreError::validation(
                "Source and destination wallets must differ",
                &["fromWalletType", "toWalletType"],
            ));
        }

        let source = self.wallet(owner_id, from).await?;
        let target = self.wallet(owner_id, to).await?;
        if !source.has_sufficient_balance(amount) {
            return Err(CoreError::InsufficientBalance {
                required: amount,
                available: source.balance,
            });
        }

        let debit = Transaction::new(TransactionKind::Withdrawal, amount, reference::generate())
            .with_method(PaymentMethod::Internal)
            .with_counterparty(owner_id)
            .with_description(format!("Transfer to {} wallet", to));
        let credit = Transaction::new(TransactionKind::Deposit, amount, reference::generate())
            .with_method(PaymentMethod::Internal)
            .with_counterparty(owner_id)
            .with_description(format!("Transfer from {} wallet", from));

        let entries = vec![
            LedgerEntry::new(source.id, debit.clone()),
            LedgerEntry::new(target.id, credit.clone()),
        ];
        let mut updated = self.wallets.apply(entries).await?.into_iter();
        let (Some(source), Some(target)) = (updated.next(), updated.next()) else {
            return Err(CoreError::InternalError("transfer did not return both wallets".to_string()));
        };

        tracing::info!("Transferred {} XOF for {} from {} to {}", amount, owner_id, from, to);
        self.announce(&source, &debit).await;
        self.announce(&target, &credit).await;
        Ok((source, target))
    }

    /// Append one transaction to a wallet and announce it.
    pub async fn post(&self, wallet: &Wallet, tx: Transaction) -> CoreResult<Wallet> {
        let updated = self
            .wallets
            .apply(vec![LedgerEntry::new(wallet.id, tx.clone())])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::not_found("wallet", wallet.id))?;

        tracing::debug!(
            "{} {} XOF on wallet {} ({}), balance {}",
            tx.kind,
            tx.amount,
            updated.id,
            tx.reference,
            updated.balance
        );
        self.announce(&updated, &tx).await;
        Ok(updated)
    }

    pub(crate) async fn announce(&self, wallet: &Wallet, tx: &Transaction) {
        announce(self.events.as_ref(), wallet, tx).await;
    }
}

pub(crate) async fn announce(events: &dyn EventPublisher, wallet: &Wallet, tx: &Transaction) {
    let event = WalletTransactionEvent {
        wallet_id: wallet.id,
        owner_id: wallet.owner_id,
        role: wallet.role.to_string(),
        kind: tx.kind.to_string(),
        amount: tx.amount,
        balance_after: wallet.balance,
        reference: tx.reference.clone(),
        order_id: tx.order_id,
        timestamp: Utc::now().timestamp(),
    };
    emit(events, WALLET_TRANSACTIONS_TOPIC, &wallet.id.to_string(), &event).await;
}

fn ensure_positive(amount: i64) -> CoreResult<()> {
    if amount <= 0 {
        return Err(CoreError::validation("Amount must be greater than zero", &["amount"]));
    }
    Ok(())
}

fn ensure_external(method: PaymentMethod) -> CoreResult<()> {
    match method {
        PaymentMethod::Wallet | PaymentMethod::Internal => Err(CoreError::validation(
            format!("{} cannot fund or drain a wallet", method),
            &["paymentMethod"],
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fixtures::harness;

    #[tokio::test]
    async fn test_deposit_and_withdraw_move_the_balance() {
        let h = harness().await;
        let buyer = h.user("Awa", vec![Role::Buyer]).await;
        let wallets = &h.services.wallets;

        let wallet = wallets
            .deposit(buyer.id, Role::Buyer, 10_000, PaymentMethod::MobileMoney, None)
            .await
            .unwrap();
        assert_eq!(wallet.balance, 10_000);

        let wallet = wallets
            .withdraw(buyer.id, Role::Buyer, 4_000, PaymentMethod::BankTransfer, None)
            .await
            .unwrap();
        assert_eq!(wallet.balance, 6_000);
        assert_eq!(wallet.replayed_balance(), 6_000);

        let history = wallets.transactions(buyer.id, Role::Buyer, None).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind, TransactionKind::Withdrawal);
        assert!(history[0].reference.starts_with("TXN-"));
    }

    #[tokio::test]
    async fn test_overdraft_is_rejected() {
        let h = harness().await;
        let buyer = h.user("Awa", vec![Role::Buyer]).await;
        h.fund(&buyer, Role::Buyer, 1_000).await;

        let err = h
            .services
            .wallets
            .withdraw(buyer.id, Role::Buyer, 1_001, PaymentMethod::MobileMoney, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InsufficientBalance { required: 1_001, available: 1_000 }));
        assert_eq!(h.services.wallets.wallet(buyer.id, Role::Buyer).await.unwrap().balance, 1_000);
    }

    #[tokio::test]
    async fn test_transfer_between_own_wallets() {
        let h = harness().await;
        let user = h.user("Moussa", vec![Role::Buyer, Role::Seller]).await;
        h.fund(&user, Role::Seller, 5_000).await;

        let (source, target) = h
            .services
            .wallets
            .transfer(user.id, Role::Seller, Role::Buyer, 2_000)
            .await
            .unwrap();
        assert_eq!(source.balance, 3_000);
        assert_eq!(target.balance, 2_000);

        let err = h
            .services
            .wallets
            .transfer(user.id, Role::Seller, Role::Buyer, 3_001)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InsufficientBalance { .. }));
        assert_eq!(h.services.wallets.wallet(user.id, Role::Buyer).await.unwrap().balance, 2_000);
    }

    #[tokio::test]
    async fn test_transfer_needs_both_wallets() {
        let h = harness().await;
        let buyer = h.user("Awa", vec![Role::Buyer]).await;
        h.fund(&buyer, Role::Buyer, 500).await;

        let err = h
            .services
            .wallets
            .transfer(buyer.id, Role::Buyer, Role::Seller, 100)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound { entity: "wallet", .. }));
        assert_eq!(h.services.wallets.wallet(buyer.id, Role::Buyer).await.unwrap().balance, 500);
    }

    #[tokio::test]
    async fn test_non_positive_amounts_and_internal_channels() {
        let h = harness().await;
        let buyer = h.user("Awa", vec![Role::Buyer]).await;
        let wallets = &h.services.wallets;

        let zero = wallets
            .deposit(buyer.id, Role::Buyer, 0, PaymentMethod::Card, None)
            .await
            .unwrap_err();
        assert!(matches!(zero, CoreError::Validation { ref fields, .. } if fields == &["amount"]));

        let internal = wallets
            .deposit(buyer.id, Role::Buyer, 100, PaymentMethod::Wallet, None)
            .await
            .unwrap_err();
        assert!(matches!(internal, CoreError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_movements_are_announced() {
        let h = harness().await;
        let buyer = h.user("Awa", vec![Role::Buyer]).await;
        h.fund(&buyer, Role::Buyer, 2_500).await;

        let events = h.events.on_topic(WALLET_TRANSACTIONS_TOPIC).await;
        assert_eq!(events.len(), 1);
        let event: WalletTransactionEvent = serde_json::from_str(&events[0].payload).unwrap();
        assert_eq!(event.amount, 2_500);
        assert_eq!(event.balance_after, 2_500);
        assert_eq!(event.kind, "deposit");
    }
}
