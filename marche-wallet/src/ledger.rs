use crate::models::{Transaction, Wallet};
use chrono::Utc;

impl Wallet {
    /// Validate a transaction against the current state without applying it.
    pub fn check(&self, tx: &Transaction) -> Result<i64, WalletError> {
        if tx.amount <= 0 {
            return Err(WalletError::InvalidAmount(tx.amount));
        }

        if self.transactions.iter().any(|t| t.reference == tx.reference) {
            return Err(WalletError::DuplicateReference(tx.reference.clone()));
        }

        let delta = tx.balance_delta();
        if delta < 0 && !self.has_sufficient_balance(tx.amount) {
            return Err(WalletError::InsufficientBalance {
                required: tx.amount,
                available: self.balance,
            });
        }

        self.balance
            .checked_add(delta)
            .ok_or(WalletError::BalanceOverflow)
    }

    /// Append a transaction and move the balance by its signed amount.
    /// Nothing changes when the transaction is rejected. Returns the new balance.
    pub fn add_transaction(&mut self, tx: Transaction) -> Result<i64, WalletError> {
        let new_balance = self.check(&tx)?;

        self.balance = new_balance;
        self.updated_at = Utc::now();
        self.transactions.push(tx);

        Ok(new_balance)
    }

    /// Recompute the balance from the transaction log.
    pub fn replayed_balance(&self) -> i64 {
        self.transactions.iter().map(Transaction::balance_delta).sum()
    }

    pub fn find_transaction(&self, reference: &str) -> Option<&Transaction> {
        self.transactions.iter().find(|t| t.reference == reference)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    #[error("Transaction amount must be positive, got {0}")]
    InvalidAmount(i64),

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        required: i64,
        available: i64,
    },

    #[error("Duplicate transaction reference: {0}")]
    DuplicateReference(String),

    #[error("Balance overflow")]
    BalanceOverflow,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TransactionKind, TransactionStatus};
    use marche_shared::Role;
    use uuid::Uuid;

    fn wallet() -> Wallet {
        Wallet::new(Uuid::new_v4(), Role::Buyer)
    }

    #[test]
    fn test_balance_matches_replayed_log() {
        let mut w = wallet();
        w.add_transaction(Transaction::new(TransactionKind::Deposit, 10_000, "r1")).unwrap();
        w.add_transaction(Transaction::new(TransactionKind::Payment, 3_200, "r2")).unwrap();
        w.add_transaction(Transaction::new(TransactionKind::Refund, 3_200, "r3")).unwrap();
        w.add_transaction(Transaction::new(TransactionKind::Commission, 1_000, "r4")).unwrap();
        w.add_transaction(Transaction::new(TransactionKind::Fee, 200, "r5")).unwrap();
        w.add_transaction(Transaction::new(TransactionKind::Withdrawal, 800, "r6")).unwrap();

        assert_eq!(w.balance, 10_000 - 3_200 + 3_200 + 1_000 - 200 - 800);
        assert_eq!(w.balance, w.replayed_balance());
        assert_eq!(w.transactions.len(), 6);
    }

    #[test]
    fn test_debit_cannot_overdraw() {
        let mut w = wallet();
        w.add_transaction(Transaction::new(TransactionKind::Deposit, 500, "r1")).unwrap();

        let err = w
            .add_transaction(Transaction::new(TransactionKind::Withdrawal, 501, "r2"))
            .unwrap_err();

        assert_eq!(err, WalletError::InsufficientBalance { required: 501, available: 500 });
        assert_eq!(w.balance, 500);
        assert_eq!(w.transactions.len(), 1);

        // Draining to exactly zero is fine
        w.add_transaction(Transaction::new(TransactionKind::Payment, 500, "r3")).unwrap();
        assert_eq!(w.balance, 0);
    }

    #[test]
    fn test_non_completed_transactions_do_not_move_balance() {
        let mut w = wallet();
        w.add_transaction(
            Transaction::new(TransactionKind::Deposit, 7_000, "r1").with_status(TransactionStatus::Pending),
        )
        .unwrap();
        w.add_transaction(
            Transaction::new(TransactionKind::Withdrawal, 7_000, "r2").with_status(TransactionStatus::Failed),
        )
        .unwrap();

        assert_eq!(w.balance, 0);
        assert_eq!(w.replayed_balance(), 0);
        assert_eq!(w.transactions.len(), 2);
    }

    #[test]
    fn test_rejects_non_positive_amounts_and_duplicate_references() {
        let mut w = wallet();
        assert_eq!(
            w.add_transaction(Transaction::new(TransactionKind::Deposit, 0, "r1")).unwrap_err(),
            WalletError::InvalidAmount(0)
        );

        w.add_transaction(Transaction::new(TransactionKind::Deposit, 100, "r1")).unwrap();
        assert_eq!(
            w.add_transaction(Transaction::new(TransactionKind::Deposit, 100, "r1")).unwrap_err(),
            WalletError::DuplicateReference("r1".to_string())
        );
        assert_eq!(w.balance, 100);
    }

    #[test]
    fn test_wallet_serializes_camel_case() {
        let w = wallet();
        let json = serde_json::to_value(&w).unwrap();
        assert_eq!(json["currency"], "XOF");
        assert_eq!(json["role"], "buyer");
        assert!(json.get("ownerId").is_some());
    }
}
