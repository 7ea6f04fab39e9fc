pub mod models;
pub mod ledger;
pub mod reference;

pub use models::{Transaction, TransactionKind, TransactionStatus, Wallet};
pub use ledger::WalletError;
