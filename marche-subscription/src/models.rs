use chrono::{DateTime, Duration, Months, Utc};
use marche_shared::PaymentMethod;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Seller verification plans
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    FreeTrial,
    Weekly,
    Monthly,
    Yearly,
}

impl Plan {
    /// End of a cycle that starts at `start`. Month arithmetic is calendar
    /// based and clamps to the last day of shorter months.
    pub fn end_from(&self, start: DateTime<Utc>) -> DateTime<Utc> {
        let end = match self {
            Plan::FreeTrial => start.checked_add_months(Months::new(2)),
            Plan::Weekly => start.checked_add_signed(Duration::days(7)),
            Plan::Monthly => start.checked_add_months(Months::new(1)),
            Plan::Yearly => start.checked_add_months(Months::new(12)),
        };
        end.unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn is_paid(&self) -> bool {
        !matches!(self, Plan::FreeTrial)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::FreeTrial => "free_trial",
            Plan::Weekly => "weekly",
            Plan::Monthly => "monthly",
            Plan::Yearly => "yearly",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free_trial" => Ok(Plan::FreeTrial),
            "weekly" => Ok(Plan::Weekly),
            "monthly" => Ok(Plan::Monthly),
            "yearly" => Ok(Plan::Yearly),
            other => Err(format!("unknown plan: {}", other)),
        }
    }
}

/// Price list for paid plans, in XOF. Loaded from configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanPricing {
    pub weekly: i64,
    pub monthly: i64,
    pub yearly: i64,
}

impl Default for PlanPricing {
    fn default() -> Self {
        Self {
            weekly: 2_500,
            monthly: 8_000,
            yearly: 80_000,
        }
    }
}

impl PlanPricing {
    pub fn price_of(&self, plan: Plan) -> i64 {
        match plan {
            Plan::FreeTrial => 0,
            Plan::Weekly => self.weekly,
            Plan::Monthly => self.monthly,
            Plan::Yearly => self.yearly,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Expired,
    Cancelled,
    Pending,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Pending => "pending",
        }
    }
}

impl FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SubscriptionStatus::Active),
            "expired" => Ok(SubscriptionStatus::Expired),
            "cancelled" => Ok(SubscriptionStatus::Cancelled),
            "pending" => Ok(SubscriptionStatus::Pending),
            other => Err(format!("unknown subscription status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub method: PaymentMethod,
    pub reference: String,
    pub amount: i64,
    pub paid_at: DateTime<Utc>,
}

/// A finished (or superseded) billing cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RenewalRecord {
    pub plan: Plan,
    pub price: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub payment_reference: Option<String>,
    pub archived_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub plan: Plan,
    pub price: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: SubscriptionStatus,
    pub auto_renew: bool,
    pub last_payment: Option<PaymentRecord>,
    pub history: Vec<RenewalRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
