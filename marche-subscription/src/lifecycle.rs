use crate::models::{PaymentRecord, Plan, PlanPricing, RenewalRecord, Subscription, SubscriptionStatus};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

impl Subscription {
    /// Zero-cost two-month window granted with the seller role.
    pub fn free_trial(seller_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            seller_id,
            plan: Plan::FreeTrial,
            price: 0,
            start_date: now,
            end_date: Plan::FreeTrial.end_from(now),
            status: SubscriptionStatus::Active,
            auto_renew: false,
            last_payment: None,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn paid(
        seller_id: Uuid,
        plan: Plan,
        pricing: &PlanPricing,
        payment: PaymentRecord,
        auto_renew: bool,
        now: DateTime<Utc>,
    ) -> Result<Self, SubscriptionError> {
        if !plan.is_paid() {
            return Err(SubscriptionError::FreeTrialNotSelectable);
        }

        Ok(Self {
            id: Uuid::new_v4(),
            seller_id,
            plan,
            price: pricing.price_of(plan),
            start_date: now,
            end_date: plan.end_from(now),
            status: SubscriptionStatus::Active,
            auto_renew,
            last_payment: Some(payment),
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active && now <= self.end_date
    }

    /// Window has lapsed but the status has not been flipped yet.
    pub fn is_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active && now > self.end_date
    }

    pub fn expires_within(&self, window: Duration, now: DateTime<Utc>) -> bool {
        self.is_active(now) && self.end_date <= now + window
    }

    /// Start a fresh cycle of the current plan, anchored to `now`.
    pub fn renew(
        &mut self,
        payment: PaymentRecord,
        pricing: &PlanPricing,
        now: DateTime<Utc>,
    ) -> Result<(), SubscriptionError> {
        if !self.plan.is_paid() {
            return Err(SubscriptionError::FreeTrialNotRenewable);
        }
        self.start_cycle(self.plan, payment, pricing, now);
        Ok(())
    }

    /// Switch to `plan` and start a fresh cycle anchored to `now`.
    pub fn change_plan(
        &mut self,
        plan: Plan,
        payment: PaymentRecord,
        pricing: &PlanPricing,
        now: DateTime<Utc>,
    ) -> Result<(), SubscriptionError> {
        if !plan.is_paid() {
            return Err(SubscriptionError::FreeTrialNotSelectable);
        }
        self.start_cycle(plan, payment, pricing, now);
        Ok(())
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), SubscriptionError> {
        if self.status == SubscriptionStatus::Cancelled {
            return Err(SubscriptionError::AlreadyCancelled(self.id));
        }
        self.status = SubscriptionStatus::Cancelled;
        self.auto_renew = false;
        self.updated_at = now;
        Ok(())
    }

    pub fn mark_expired(&mut self, now: DateTime<Utc>) {
        self.status = SubscriptionStatus::Expired;
        self.updated_at = now;
    }

    fn start_cycle(&mut self, plan: Plan, payment: PaymentRecord, pricing: &PlanPricing, now: DateTime<Utc>) {
        self.history.push(RenewalRecord {
            plan: self.plan,
            price: self.price,
            start_date: self.start_date,
            end_date: self.end_date,
            payment_reference: self.last_payment.as_ref().map(|p| p.reference.clone()),
            archived_at: now,
        });

        self.plan = plan;
        self.price = pricing.price_of(plan);
        self.start_date = now;
        self.end_date = plan.end_from(now);
        self.status = SubscriptionStatus::Active;
        self.last_payment = Some(payment);
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscriptionError {
    #[error("The free trial is granted automatically and cannot be selected")]
    FreeTrialNotSelectable,

    #[error("A free trial cannot be renewed; choose a paid plan")]
    FreeTrialNotRenewable,

    #[error("Subscription already cancelled: {0}")]
    AlreadyCancelled(Uuid),
}
