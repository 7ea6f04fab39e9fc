use marche_shared::{PaymentMethod, Role};
use marche_wallet::{reference, Transaction, TransactionKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::lifecycle::OrderError;
use crate::models::{Order, OrderStatus, PaymentStatus};

/// One leg of a settlement or refund.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum SettlementStep {
    SellerPayout { seller_id: Uuid },
    DeliveryCommission { agent_id: Uuid },
    AdminFee { admin_id: Uuid },
    /// Whatever the buyer paid in fees beyond the courier's and admin's
    /// shares.
    PlatformMargin { admin_id: Uuid },
    BuyerRefund { buyer_id: Uuid },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementCredit {
    pub step: SettlementStep,
    pub beneficiary_id: Uuid,
    pub role: Role,
    pub kind: TransactionKind,
    pub amount: i64,
    pub reference: String,
    pub description: String,
}

impl SettlementCredit {
    pub fn to_transaction(&self, order_id: Uuid, payer_id: Uuid) -> Transaction {
        Transaction::new(self.kind, self.amount, self.reference.clone())
            .with_order(order_id)
            .with_counterparty(payer_id)
            .with_method(PaymentMethod::Internal)
            .with_description(self.description.clone())
    }
}

/// Every credit an order's money flow produces, computed up front so it can
/// be applied as one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementPlan {
    pub order_id: Uuid,
    pub credits: Vec<SettlementCredit>,
}

impl SettlementPlan {
    /// Split a delivered, paid order between its sellers, the courier and the
    /// platform. The admin wallet gets the order's `admin_fee` plus, as a
    /// separate credit, any margin left of the charged fee. Credits always add
    /// up to the order total.
    pub fn for_delivery(order: &Order, admin_id: Uuid) -> Result<Self, OrderError> {
        if order.payment_status != PaymentStatus::Paid {
            return Err(OrderError::NotSettleable(order.payment_status));
        }
        if order.status != OrderStatus::Delivered {
            return Err(OrderError::InvalidTransition {
                from: order.status.to_string(),
                to: "settled".to_string(),
            });
        }

        let mut credits = Vec::new();
        let mut push = |step, beneficiary_id, role, kind, amount: i64, description: String| {
            if amount > 0 {
                let reference = reference::settlement(order.id, credits.len() + 1);
                credits.push(SettlementCredit { step, beneficiary_id, role, kind, amount, reference, description });
            }
        };

        for seller_id in order.seller_ids() {
            let amount: i64 = order
                .items
                .iter()
                .filter(|i| i.seller_id == seller_id)
                .map(|i| i.subtotal)
                .sum();
            push(
                SettlementStep::SellerPayout { seller_id },
                seller_id,
                Role::Seller,
                TransactionKind::Deposit,
                amount,
                format!("Sale proceeds for order {}", order.id),
            );
        }

        let delivery_credit = match order.delivery_agent_id {
            Some(agent_id) => {
                push(
                    SettlementStep::DeliveryCommission { agent_id },
                    agent_id,
                    Role::Delivery,
                    TransactionKind::Commission,
                    order.delivery_fee,
                    format!("Delivery fee for order {}", order.id),
                );
                order.delivery_fee
            }
            None => 0,
        };

        // Fee is a debit kind, so the platform's income is booked as commission.
        push(
            SettlementStep::AdminFee { admin_id },
            admin_id,
            Role::Admin,
            TransactionKind::Commission,
            order.admin_fee,
            format!("Admin fee for order {}", order.id),
        );
        push(
            SettlementStep::PlatformMargin { admin_id },
            admin_id,
            Role::Admin,
            TransactionKind::Commission,
            order.platform_fee - delivery_credit - order.admin_fee,
            format!("Platform margin for order {}", order.id),
        );

        Ok(Self { order_id: order.id, credits })
    }

    /// Return the full amount a cancelled, paid order took from the buyer.
    pub fn for_refund(order: &Order) -> Result<Self, OrderError> {
        if order.payment_status != PaymentStatus::Paid {
            return Err(OrderError::NotSettleable(order.payment_status));
        }
        if !matches!(order.status, OrderStatus::Cancelled | OrderStatus::Refunded) {
            return Err(OrderError::InvalidTransition {
                from: order.status.to_string(),
                to: "refunded".to_string(),
            });
        }

        Ok(Self {
            order_id: order.id,
            credits: vec![SettlementCredit {
                step: SettlementStep::BuyerRefund { buyer_id: order.buyer_id },
                beneficiary_id: order.buyer_id,
                role: Role::Buyer,
                kind: TransactionKind::Refund,
                amount: order.total_amount,
                reference: reference::refund(order.id),
                description: format!("Refund for cancelled order {}", order.id),
            }],
        })
    }

    pub fn total(&self) -> i64 {
        self.credits.iter().map(|c| c.amount).sum()
    }

    pub fn steps(&self) -> Vec<SettlementStep> {
        self.credits.iter().map(|c| c.step).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkout::tests::{address, product};
    use crate::checkout::OrderLine;
    use crate::finance::{FeeMode, FeeSchedule};
    use chrono::Utc;

    fn delivered_order(fees: &FeeSchedule, with_agent: bool) -> (Order, Uuid, Uuid) {
        let seller_a = Uuid::new_v4();
        let seller_b = Uuid::new_v4();
        let lines = vec![
            OrderLine { product: product(seller_a, 2_500, 5), quantity: 2 },
            OrderLine { product: product(seller_b, 3_000, 5), quantity: 1 },
        ];
        let now = Utc::now();
        let mut order = Order::checkout(Uuid::new_v4(), lines, address(), PaymentMethod::Wallet, fees, now).unwrap();
        order.mark_paid(now).unwrap();
        if with_agent {
            order.assign_agent(Uuid::new_v4(), now).unwrap();
        }
        order.transition_to(OrderStatus::Delivered, now).unwrap();
        (order, seller_a, seller_b)
    }

    #[test]
    fn test_two_seller_split() {
        let (order, seller_a, seller_b) = delivered_order(&FeeSchedule::default(), true);
        let admin = Uuid::new_v4();

        let plan = SettlementPlan::for_delivery(&order, admin).unwrap();
        let amounts: Vec<(Uuid, Role, i64)> =
            plan.credits.iter().map(|c| (c.beneficiary_id, c.role, c.amount)).collect();

        assert_eq!(
            amounts,
            vec![
                (seller_a, Role::Seller, 5_000),
                (seller_b, Role::Seller, 3_000),
                (order.delivery_agent_id.unwrap(), Role::Delivery, 1_000),
                (admin, Role::Admin, 200),
            ]
        );
        assert_eq!(plan.total(), order.total_amount);
        assert_eq!(plan.credits[0].kind, TransactionKind::Deposit);
        assert_eq!(plan.credits[2].kind, TransactionKind::Commission);
    }

    #[test]
    fn test_credits_conserve_total_in_every_mode() {
        let additive = FeeSchedule { mode: FeeMode::Additive, ..FeeSchedule::default() };
        for fees in [FeeSchedule::default(), additive] {
            for with_agent in [true, false] {
                let (order, _, _) = delivered_order(&fees, with_agent);
                let plan = SettlementPlan::for_delivery(&order, Uuid::new_v4()).unwrap();
                assert_eq!(plan.total(), order.total_amount);
            }
        }
    }

    fn admin_credits(plan: &SettlementPlan) -> Vec<(SettlementStep, i64)> {
        plan.credits
            .iter()
            .filter(|c| c.role == Role::Admin)
            .map(|c| (c.step, c.amount))
            .collect()
    }

    #[test]
    fn test_admin_is_credited_its_fee_without_a_courier() {
        let (order, _, _) = delivered_order(&FeeSchedule::default(), false);
        let admin = Uuid::new_v4();

        let plan = SettlementPlan::for_delivery(&order, admin).unwrap();

        assert_eq!(
            admin_credits(&plan),
            vec![
                (SettlementStep::AdminFee { admin_id: admin }, 200),
                (SettlementStep::PlatformMargin { admin_id: admin }, 1_000),
            ]
        );
        assert_eq!(plan.total(), order.total_amount);
    }

    #[test]
    fn test_additive_mode_keeps_the_platform_fee_as_margin() {
        let fees = FeeSchedule { mode: FeeMode::Additive, ..FeeSchedule::default() };
        let (order, _, _) = delivered_order(&fees, true);
        let admin = Uuid::new_v4();

        let plan = SettlementPlan::for_delivery(&order, admin).unwrap();

        assert_eq!(plan.credits[2].amount, 1_000);
        assert_eq!(
            admin_credits(&plan),
            vec![
                (SettlementStep::AdminFee { admin_id: admin }, 200),
                (SettlementStep::PlatformMargin { admin_id: admin }, 1_200),
            ]
        );
        assert_eq!(plan.total(), order.total_amount);
    }

    #[test]
    fn test_configured_admin_fee_is_used() {
        let fees = FeeSchedule { admin_fee: 100, ..FeeSchedule::default() };
        let (order, _, _) = delivered_order(&fees, true);
        let admin = Uuid::new_v4();

        let plan = SettlementPlan::for_delivery(&order, admin).unwrap();

        assert_eq!(
            admin_credits(&plan),
            vec![
                (SettlementStep::AdminFee { admin_id: admin }, 100),
                (SettlementStep::PlatformMargin { admin_id: admin }, 100),
            ]
        );
        assert_eq!(plan.credits.last().unwrap().reference, reference::settlement(order.id, 5));
    }

    #[test]
    fn test_references_are_stable_across_replans() {
        let (order, _, _) = delivered_order(&FeeSchedule::default(), true);
        let admin = Uuid::new_v4();
        let first = SettlementPlan::for_delivery(&order, admin).unwrap();
        let second = SettlementPlan::for_delivery(&order, admin).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unpaid_orders_are_not_settled() {
        let (mut order, _, _) = delivered_order(&FeeSchedule::default(), false);
        order.release_payment(Utc::now()).unwrap();
        assert_eq!(
            SettlementPlan::for_delivery(&order, Uuid::new_v4()).unwrap_err(),
            OrderError::NotSettleable(PaymentStatus::Released)
        );
    }

    #[test]
    fn test_refund_returns_total_to_buyer_only() {
        let lines = vec![OrderLine { product: product(Uuid::new_v4(), 4_000, 2), quantity: 2 }];
        let now = Utc::now();
        let mut order =
            Order::checkout(Uuid::new_v4(), lines, address(), PaymentMethod::Wallet, &FeeSchedule::default(), now)
                .unwrap();
        order.mark_paid(now).unwrap();
        assert!(SettlementPlan::for_refund(&order).is_err());

        order.transition_to(OrderStatus::Cancelled, now).unwrap();
        let plan = SettlementPlan::for_refund(&order).unwrap();

        assert_eq!(plan.credits.len(), 1);
        assert_eq!(plan.credits[0].beneficiary_id, order.buyer_id);
        assert_eq!(plan.credits[0].amount, 9_200);
        assert_eq!(plan.credits[0].kind, TransactionKind::Refund);
    }
}
