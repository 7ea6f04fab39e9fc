pub mod models;
pub mod pii;
pub mod roles;
pub mod payment;

pub use roles::Role;
pub use payment::PaymentMethod;

/// Settlement currency for every wallet and order. XOF has no minor unit,
/// so all amounts are whole francs held in an `i64`.
pub const CURRENCY: &str = "XOF";
