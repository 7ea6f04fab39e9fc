pub mod models;
pub mod finance;
pub mod checkout;
pub mod lifecycle;
pub mod fulfillment;
pub mod settlement;

pub use models::{
    DeliveryProof, DeliveryStatus, Order, OrderItem, OrderStatus, PaymentStatus, ShippingAddress,
};
pub use finance::{FeeMode, FeeSchedule};
pub use checkout::OrderLine;
pub use lifecycle::OrderError;
pub use settlement::{SettlementCredit, SettlementPlan, SettlementStep};
