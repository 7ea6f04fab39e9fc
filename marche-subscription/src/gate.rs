use crate::models::{Plan, Subscription, SubscriptionStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SellerSubscriptionStatus {
    None,
    Trial,
    Active,
    Expired,
    Cancelled,
    Pending,
}

/// Seller-facing view of a subscription. Always derived from the
/// [`Subscription`] document at read time, never stored on its own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SellerInfo {
    pub subscription_status: SellerSubscriptionStatus,
    pub plan: Option<Plan>,
    pub ends_at: Option<DateTime<Utc>>,
}

impl SellerInfo {
    pub fn project(subscription: Option<&Subscription>, now: DateTime<Utc>) -> Self {
        let Some(sub) = subscription else {
            return Self {
                subscription_status: SellerSubscriptionStatus::None,
                plan: None,
                ends_at: None,
            };
        };

        let subscription_status = match sub.status {
            SubscriptionStatus::Active if now > sub.end_date => SellerSubscriptionStatus::Expired,
            SubscriptionStatus::Active if sub.plan == Plan::FreeTrial => SellerSubscriptionStatus::Trial,
            SubscriptionStatus::Active => SellerSubscriptionStatus::Active,
            SubscriptionStatus::Expired => SellerSubscriptionStatus::Expired,
            SubscriptionStatus::Cancelled => SellerSubscriptionStatus::Cancelled,
            SubscriptionStatus::Pending => SellerSubscriptionStatus::Pending,
        };

        Self {
            subscription_status,
            plan: Some(sub.plan),
            ends_at: Some(sub.end_date),
        }
    }

    /// Product creation is open to active subscribers and sellers still
    /// inside their free trial.
    pub fn can_create_products(&self, now: DateTime<Utc>) -> bool {
        let within_window = self.ends_at.is_some_and(|end| now <= end);
        matches!(
            self.subscription_status,
            SellerSubscriptionStatus::Active | SellerSubscriptionStatus::Trial
        ) && within_window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaymentRecord, PlanPricing};
    use chrono::Duration;
    use marche_shared::PaymentMethod;
    use uuid::Uuid;

    #[test]
    fn test_trial_projection_and_gate() {
        let now = Utc::now();
        let trial = Subscription::free_trial(Uuid::new_v4(), now);

        let info = SellerInfo::project(Some(&trial), now);
        assert_eq!(info.subscription_status, SellerSubscriptionStatus::Trial);
        assert!(info.can_create_products(now));

        let after = trial.end_date + Duration::seconds(1);
        let lapsed = SellerInfo::project(Some(&trial), after);
        assert_eq!(lapsed.subscription_status, SellerSubscriptionStatus::Expired);
        assert!(!lapsed.can_create_products(after));
    }

    #[test]
    fn test_cancelled_and_missing_subscriptions_are_gated() {
        let now = Utc::now();
        assert!(!SellerInfo::project(None, now).can_create_products(now));

        let payment = PaymentRecord {
            method: PaymentMethod::Card,
            reference: "TXN-1".to_string(),
            amount: 8_000,
            paid_at: now,
        };
        let mut sub =
            Subscription::paid(Uuid::new_v4(), Plan::Monthly, &PlanPricing::default(), payment, false, now).unwrap();
        assert!(SellerInfo::project(Some(&sub), now).can_create_products(now));

        sub.cancel(now).unwrap();
        let info = SellerInfo::project(Some(&sub), now);
        assert_eq!(info.subscription_status, SellerSubscriptionStatus::Cancelled);
        assert!(!info.can_create_products(now));
    }
}
