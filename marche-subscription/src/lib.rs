pub mod models;
pub mod lifecycle;
pub mod gate;

pub use models::{Plan, PlanPricing, PaymentRecord, RenewalRecord, Subscription, SubscriptionStatus};
pub use lifecycle::SubscriptionError;
pub use gate::{SellerInfo, SellerSubscriptionStatus};
