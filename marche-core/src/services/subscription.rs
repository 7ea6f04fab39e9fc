use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use marche_shared::models::events::{SubscriptionChangedEvent, SUBSCRIPTIONS_TOPIC};
use marche_shared::{PaymentMethod, Role};
use marche_subscription::{PaymentRecord, Plan, PlanPricing, SellerInfo, Subscription, SubscriptionError};
use marche_wallet::{reference, Transaction, TransactionKind};
use uuid::Uuid;

use crate::events::{emit, EventPublisher};
use crate::repository::SubscriptionRepository;
use crate::services::wallet::WalletService;
use crate::{CoreError, CoreResult};

pub const MAX_EXPIRY_WINDOW_DAYS: i64 = 365;

/// Seller plans and their billing. Payments by wallet are debited from the
/// seller wallet before the subscription changes; other channels are
/// recorded as already collected.
pub struct SubscriptionService {
    subscriptions: Arc<dyn SubscriptionRepository>,
    wallets: Arc<WalletService>,
    events: Arc<dyn EventPublisher>,
    pricing: PlanPricing,
}

impl SubscriptionService {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        wallets: Arc<WalletService>,
        events: Arc<dyn EventPublisher>,
        pricing: PlanPricing,
    ) -> Self {
        Self { subscriptions, wallets, events, pricing }
    }

    pub fn pricing(&self) -> &PlanPricing {
        &self.pricing
    }

    pub async fn current(&self, seller_id: Uuid) -> CoreResult<Subscription> {
        self.subscriptions
            .find_by_seller(seller_id)
            .await?
            .ok_or_else(|| CoreError::not_found("subscription", seller_id))
    }

    pub async fn seller_info(&self, seller_id: Uuid) -> CoreResult<SellerInfo> {
        let subscription = self.subscriptions.find_by_seller(seller_id).await?;
        Ok(SellerInfo::project(subscription.as_ref(), Utc::now()))
    }

    pub async fn ensure_can_create_products(&self, seller_id: Uuid) -> CoreResult<()> {
        let now = Utc::now();
        let subscription = self.subscriptions.find_by_seller(seller_id).await?;
        if SellerInfo::project(subscription.as_ref(), now).can_create_products(now) {
            Ok(())
        } else {
            Err(CoreError::Forbidden(
                "An active subscription is required to list products".to_string(),
            ))
        }
    }

    /// Start a paid plan. A seller who already has a subscription switches
    /// to the new plan instead.
    pub async fn subscribe(
        &self,
        seller_id: Uuid,
        plan: Plan,
        method: PaymentMethod,
        auto_renew: bool,
    ) -> CoreResult<Subscription> {
        if self.subscriptions.find_by_seller(seller_id).await?.is_some() {
            let mut changed = self.change_plan(seller_id, plan, method).await?;
            if changed.auto_renew != auto_renew {
                changed.auto_renew = auto_renew;
                self.subscriptions.save(&changed).await?;
            }
            return Ok(changed);
        }

        if !plan.is_paid() {
            return Err(SubscriptionError::FreeTrialNotSelectable.into());
        }
        let now = Utc::now();
        let payment = self.collect(seller_id, plan, method, now).await?;
        let subscription = Subscription::paid(seller_id, plan, &self.pricing, payment, auto_renew, now)?;
        self.store(&subscription).await?;

        tracing::info!("Seller {} subscribed to {} until {}", seller_id, plan, subscription.end_date);
        Ok(subscription)
    }

    /// Start a fresh cycle of the current plan, from today.
    pub async fn renew(&self, seller_id: Uuid, method: PaymentMethod) -> CoreResult<Subscription> {
        let mut subscription = self.current(seller_id).await?;
        if !subscription.plan.is_paid() {
            return Err(SubscriptionError::FreeTrialNotRenewable.into());
        }

        let now = Utc::now();
        let payment = self.collect(seller_id, subscription.plan, method, now).await?;
        subscription.renew(payment, &self.pricing, now)?;
        self.store(&subscription).await?;

        tracing::info!("Seller {} renewed {} until {}", seller_id, subscription.plan, subscription.end_date);
        Ok(subscription)
    }

    pub async fn change_plan(
        &self,
        seller_id: Uuid,
        plan: Plan,
        method: PaymentMethod,
    ) -> CoreResult<Subscription> {
        let mut subscription = self.current(seller_id).await?;
        if !plan.is_paid() {
            return Err(SubscriptionError::FreeTrialNotSelectable.into());
        }

        let now = Utc::now();
        let payment = self.collect(seller_id, plan, method, now).await?;
        subscription.change_plan(plan, payment, &self.pricing, now)?;
        self.store(&subscription).await?;

        tracing::info!("Seller {} moved to {} until {}", seller_id, plan, subscription.end_date);
        Ok(subscription)
    }

    pub async fn cancel(&self, seller_id: Uuid) -> CoreResult<Subscription> {
        let mut subscription = self.current(seller_id).await?;
        subscription.cancel(Utc::now())?;
        self.store(&subscription).await?;
        tracing::info!("Seller {} cancelled subscription {}", seller_id, subscription.id);
        Ok(subscription)
    }

    pub async fn find_expiring(&self, within_days: i64) -> CoreResult<Vec<Subscription>> {
        if !(0..=MAX_EXPIRY_WINDOW_DAYS).contains(&within_days) {
            return Err(CoreError::validation(
                format!("Window must be between 0 and {} days", MAX_EXPIRY_WINDOW_DAYS),
                &["days"],
            ));
        }
        self.subscriptions
            .find_expiring(Utc::now(), Duration::days(within_days))
            .await
    }

    /// Flip every lapsed subscription to expired. Returns the ones changed.
    pub async fn expire_lapsed(&self) -> CoreResult<Vec<Subscription>> {
        self.expire_lapsed_at(Utc::now()).await
    }

    pub async fn expire_lapsed_at(&self, now: DateTime<Utc>) -> CoreResult<Vec<Subscription>> {
        let mut expired = self.subscriptions.find_expired(now).await?;
        for subscription in &mut expired {
            subscription.mark_expired(now);
            self.store(subscription).await?;
        }
        if !expired.is_empty() {
            tracing::info!("Marked {} subscription(s) expired", expired.len());
        }
        Ok(expired)
    }

    async fn collect(
        &self,
        seller_id: Uuid,
        plan: Plan,
        method: PaymentMethod,
        now: DateTime<Utc>,
    ) -> CoreResult<PaymentRecord> {
        let amount = self.pricing.price_of(plan);

        let reference = match method {
            PaymentMethod::Wallet => {
                let wallet = self.wallets.wallet(seller_id, Role::Seller).await?;
                if !wallet.has_sufficient_balance(amount) {
                    return Err(CoreError::InsufficientBalance {
                        required: amount,
                        available: wallet.balance,
                    });
                }
                let reference = reference::generate();
                let tx = Transaction::new(TransactionKind::Payment, amount, reference.clone())
                    .with_method(PaymentMethod::Wallet)
                    .with_description(format!("{} subscription", plan));
                self.wallets.post(&wallet, tx).await?;
                reference
            }
            PaymentMethod::Internal | PaymentMethod::CashOnDelivery => {
                return Err(CoreError::validation(
                    format!("{} cannot pay for a subscription", method),
                    &["paymentMethod"],
                ));
            }
            _ => reference::generate(),
        };

        Ok(PaymentRecord { method, reference, amount, paid_at: now })
    }

    async fn store(&self, subscription: &Subscription) -> CoreResult<()> {
        self.subscriptions.save(subscription).await?;
        let event = SubscriptionChangedEvent {
            subscription_id: subscription.id,
            seller_id: subscription.seller_id,
            plan: subscription.plan.to_string(),
            status: subscription.status.as_str().to_string(),
            ends_at: subscription.end_date.timestamp(),
            timestamp: Utc::now().timestamp(),
        };
        emit(
            self.events.as_ref(),
            SUBSCRIPTIONS_TOPIC,
            &subscription.seller_id.to_string(),
            &event,
        )
        .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fixtures::harness;
    use marche_subscription::{SellerSubscriptionStatus, SubscriptionStatus};

    #[tokio::test]
    async fn test_wallet_paid_plan_debits_the_seller() {
        let h = harness().await;
        let seller = h.user("Khady", vec![Role::Seller]).await;
        h.fund(&seller, Role::Seller, 10_000).await;

        let sub = h
            .services
            .subscriptions
            .change_plan(seller.id, Plan::Monthly, PaymentMethod::Wallet)
            .await
            .unwrap();
        assert_eq!(sub.plan, Plan::Monthly);
        assert_eq!(sub.price, 8_000);
        assert_eq!(sub.history.len(), 1);
        assert_eq!(sub.history[0].plan, Plan::FreeTrial);

        let wallet = h.services.wallets.wallet(seller.id, Role::Seller).await.unwrap();
        assert_eq!(wallet.balance, 2_000);
        let payment = sub.last_payment.unwrap();
        assert!(wallet.find_transaction(&payment.reference).is_some());
    }

    #[tokio::test]
    async fn test_unfunded_wallet_payment_changes_nothing() {
        let h = harness().await;
        let seller = h.user("Khady", vec![Role::Seller]).await;
        h.fund(&seller, Role::Seller, 1_000).await;

        let err = h
            .services
            .subscriptions
            .change_plan(seller.id, Plan::Yearly, PaymentMethod::Wallet)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InsufficientBalance { required: 80_000, available: 1_000 }));

        let sub = h.services.subscriptions.current(seller.id).await.unwrap();
        assert_eq!(sub.plan, Plan::FreeTrial);
        assert_eq!(h.services.wallets.wallet(seller.id, Role::Seller).await.unwrap().balance, 1_000);
    }

    #[tokio::test]
    async fn test_free_trial_cannot_be_bought_or_renewed() {
        let h = harness().await;
        let seller = h.user("Khady", vec![Role::Seller]).await;

        let renew = h
            .services
            .subscriptions
            .renew(seller.id, PaymentMethod::MobileMoney)
            .await
            .unwrap_err();
        assert!(matches!(renew, CoreError::Validation { .. }));

        let pick = h
            .services
            .subscriptions
            .change_plan(seller.id, Plan::FreeTrial, PaymentMethod::MobileMoney)
            .await
            .unwrap_err();
        assert!(matches!(pick, CoreError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_subscribe_without_trial_then_renew() {
        let h = harness().await;
        let seller = h.user("Omar", vec![]).await;

        let sub = h
            .services
            .subscriptions
            .subscribe(seller.id, Plan::Weekly, PaymentMethod::MobileMoney, true)
            .await
            .unwrap();
        assert_eq!(sub.price, 2_500);
        assert!(sub.auto_renew);
        assert_eq!(sub.end_date, sub.start_date + Duration::days(7));

        let renewed = h
            .services
            .subscriptions
            .renew(seller.id, PaymentMethod::Card)
            .await
            .unwrap();
        assert_eq!(renewed.id, sub.id);
        assert_eq!(renewed.history.len(), 1);
        assert!(renewed.start_date >= sub.start_date);
    }

    #[tokio::test]
    async fn test_cancel_is_reflected_in_seller_info() {
        let h = harness().await;
        let seller = h.user("Khady", vec![Role::Seller]).await;
        assert_eq!(
            h.services.subscriptions.seller_info(seller.id).await.unwrap().subscription_status,
            SellerSubscriptionStatus::Trial
        );

        h.services.subscriptions.cancel(seller.id).await.unwrap();
        let info = h.services.subscriptions.seller_info(seller.id).await.unwrap();
        assert_eq!(info.subscription_status, SellerSubscriptionStatus::Cancelled);

        let again = h.services.subscriptions.cancel(seller.id).await.unwrap_err();
        assert!(matches!(again, CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_lapsed_subscriptions_are_expired_in_bulk() {
        let h = harness().await;
        let seller = h.user("Khady", vec![Role::Seller]).await;

        let soon = h.services.subscriptions.find_expiring(90).await.unwrap();
        assert_eq!(soon.len(), 1);
        assert!(h.services.subscriptions.find_expiring(7).await.unwrap().is_empty());

        let later = Utc::now() + Duration::days(100);
        let expired = h.services.subscriptions.expire_lapsed_at(later).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].seller_id, seller.id);

        let stored = h.services.subscriptions.current(seller.id).await.unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Expired);
        assert!(h.services.subscriptions.expire_lapsed_at(later).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expiry_window_is_bounded() {
        let h = harness().await;
        let err = h.services.subscriptions.find_expiring(-1).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
    }
}
