use serde::{Deserialize, Serialize};

use crate::lifecycle::OrderError;

/// How the courier and platform fees relate to the fee charged to the buyer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FeeMode {
    /// The buyer pays `platform_fee`; the courier's and the platform's shares
    /// are carved out of it.
    #[default]
    CarvedOut,
    /// The buyer pays `platform_fee + delivery_fee + admin_fee`.
    Additive,
}

impl FeeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeeMode::CarvedOut => "carved_out",
            FeeMode::Additive => "additive",
        }
    }
}

impl std::str::FromStr for FeeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "carved_out" => Ok(FeeMode::CarvedOut),
            "additive" => Ok(FeeMode::Additive),
            other => Err(format!("unknown fee mode: {}", other)),
        }
    }
}

/// Fixed per-order fees, in XOF.
///
/// Whatever part of the charged fee is not paid to the courier goes to the
/// platform admin wallet at settlement, so the credits of a settled order
/// always add up to its total. `admin_fee` is the platform's share when a
/// courier is paid in carved-out mode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeeSchedule {
    pub platform_fee: i64,
    pub delivery_fee: i64,
    pub admin_fee: i64,
    #[serde(default)]
    pub mode: FeeMode,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            platform_fee: 1_200,
            delivery_fee: 1_000,
            admin_fee: 200,
            mode: FeeMode::CarvedOut,
        }
    }
}

impl FeeSchedule {
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.platform_fee < 0 || self.delivery_fee < 0 || self.admin_fee < 0 {
            return Err(OrderError::InvalidFees("fees cannot be negative".to_string()));
        }

        if self.mode == FeeMode::CarvedOut && self.delivery_fee + self.admin_fee > self.platform_fee {
            return Err(OrderError::InvalidFees(format!(
                "delivery fee {} plus admin fee {} exceed platform fee {}",
                self.delivery_fee, self.admin_fee, self.platform_fee
            )));
        }

        Ok(())
    }

    /// Fee added to the items subtotal at checkout.
    pub fn buyer_fee(&self) -> i64 {
        match self.mode {
            FeeMode::CarvedOut => self.platform_fee,
            FeeMode::Additive => self.platform_fee + self.delivery_fee + self.admin_fee,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule() {
        let fees = FeeSchedule::default();
        fees.validate().unwrap();
        assert_eq!(fees.buyer_fee(), 1_200);
    }

    #[test]
    fn test_additive_mode_charges_every_fee() {
        let fees = FeeSchedule { mode: FeeMode::Additive, ..FeeSchedule::default() };
        fees.validate().unwrap();
        assert_eq!(fees.buyer_fee(), 2_400);
    }

    #[test]
    fn test_carved_out_fees_must_fit() {
        let fees = FeeSchedule { platform_fee: 1_000, ..FeeSchedule::default() };
        assert!(matches!(fees.validate(), Err(OrderError::InvalidFees(_))));

        let negative = FeeSchedule { admin_fee: -1, ..FeeSchedule::default() };
        assert!(negative.validate().is_err());
    }
}
