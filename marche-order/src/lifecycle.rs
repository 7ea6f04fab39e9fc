use chrono::{DateTime, Utc};
use marche_catalog::InventoryError;

use crate::models::{DeliveryStatus, Order, OrderStatus, PaymentStatus};

impl OrderStatus {
    /// Delivered, cancelled and refunded orders accept no further status change.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Refunded)
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Cancelled)
                | (Processing, Shipped)
                | (Processing, Delivered)
                | (Processing, Cancelled)
                | (Processing, Refunded)
                | (Shipped, Delivered)
                | (Shipped, Cancelled)
                | (Shipped, Refunded)
        )
    }
}

impl Order {
    /// Move the order to `next`, enforcing the status graph. Only a paid
    /// order moves forward; an unpaid one can still be cancelled.
    pub fn transition_to(&mut self, next: OrderStatus, now: DateTime<Utc>) -> Result<(), OrderError> {
        if !self.status.can_transition_to(next) {
            return Err(OrderError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        if matches!(next, OrderStatus::Processing | OrderStatus::Shipped | OrderStatus::Delivered)
            && self.payment_status != PaymentStatus::Paid
        {
            return Err(OrderError::AwaitingPayment { payment: self.payment_status, to: next });
        }

        self.status = next;
        match next {
            OrderStatus::Delivered => {
                self.delivered_at = Some(now);
                if self.delivery_agent_id.is_some() {
                    self.delivery_status = DeliveryStatus::Delivered;
                }
            }
            OrderStatus::Cancelled | OrderStatus::Refunded => {
                self.cancelled_at = Some(now);
            }
            _ => {}
        }
        self.updated_at = now;
        Ok(())
    }

    /// Transition: pending payment → paid, and the order starts processing.
    pub fn mark_paid(&mut self, now: DateTime<Utc>) -> Result<(), OrderError> {
        self.move_payment(PaymentStatus::Pending, PaymentStatus::Paid, now)?;
        if self.status == OrderStatus::Pending {
            self.transition_to(OrderStatus::Processing, now)?;
        }
        Ok(())
    }

    pub fn mark_payment_failed(&mut self, now: DateTime<Utc>) -> Result<(), OrderError> {
        self.move_payment(PaymentStatus::Pending, PaymentStatus::Failed, now)
    }

    /// Transition: paid → released (funds handed to sellers, courier, platform)
    pub fn release_payment(&mut self, now: DateTime<Utc>) -> Result<(), OrderError> {
        self.move_payment(PaymentStatus::Paid, PaymentStatus::Released, now)
    }

    /// Transition: paid → refunded (funds returned to the buyer)
    pub fn refund_payment(&mut self, now: DateTime<Utc>) -> Result<(), OrderError> {
        self.move_payment(PaymentStatus::Paid, PaymentStatus::Refunded, now)
    }

    fn move_payment(
        &mut self,
        expected: PaymentStatus,
        next: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        if self.payment_status != expected {
            return Err(OrderError::InvalidTransition {
                from: format!("payment {}", self.payment_status),
                to: format!("payment {}", next),
            });
        }
        self.payment_status = next;
        self.updated_at = now;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition {
        from: String,
        to: String,
    },

    #[error("Order has no items")]
    EmptyOrder,

    #[error("Order amount overflow")]
    AmountOverflow,

    #[error("Invalid fee schedule: {0}")]
    InvalidFees(String),

    #[error("A delivery agent is already assigned to this order")]
    AgentAlreadyAssigned,

    #[error("No delivery agent assigned to this order")]
    NoDeliveryAgent,

    #[error("Order cannot be settled while payment is {0}")]
    NotSettleable(PaymentStatus),

    #[error("Order cannot move to {to} while payment is {payment}")]
    AwaitingPayment {
        payment: PaymentStatus,
        to: OrderStatus,
    },

    #[error(transparent)]
    Inventory(#[from] InventoryError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkout::tests::{address, product};
    use crate::checkout::OrderLine;
    use crate::finance::FeeSchedule;
    use marche_shared::PaymentMethod;
    use uuid::Uuid;

    fn order() -> Order {
        let lines = vec![OrderLine { product: product(Uuid::new_v4(), 5_000, 5), quantity: 1 }];
        Order::checkout(Uuid::new_v4(), lines, address(), PaymentMethod::Wallet, &FeeSchedule::default(), Utc::now())
            .unwrap()
    }

    #[test]
    fn test_order_lifecycle() {
        let mut order = order();
        let now = Utc::now();

        // Pending → Processing (via payment)
        order.mark_paid(now).unwrap();
        assert_eq!(order.status, OrderStatus::Processing);
        assert_eq!(order.payment_status, PaymentStatus::Paid);

        // Processing → Shipped → Delivered
        order.transition_to(OrderStatus::Shipped, now).unwrap();
        order.transition_to(OrderStatus::Delivered, now).unwrap();
        assert!(order.delivered_at.is_some());

        // Paid → Released
        order.release_payment(now).unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Released);
    }

    #[test]
    fn test_invalid_transition() {
        let mut order = order();
        let now = Utc::now();

        // Cannot ship an unpaid, unprocessed order
        assert!(order.transition_to(OrderStatus::Shipped, now).is_err());

        order.transition_to(OrderStatus::Cancelled, now).unwrap();
        // Terminal
        let err = order.transition_to(OrderStatus::Processing, now).unwrap_err();
        assert_eq!(
            err,
            OrderError::InvalidTransition { from: "cancelled".to_string(), to: "processing".to_string() }
        );
    }

    #[test]
    fn test_unpaid_orders_only_move_to_cancelled() {
        let mut order = order();
        let now = Utc::now();

        assert_eq!(
            order.transition_to(OrderStatus::Processing, now).unwrap_err(),
            OrderError::AwaitingPayment { payment: PaymentStatus::Pending, to: OrderStatus::Processing }
        );
        assert_eq!(order.status, OrderStatus::Pending);

        order.mark_payment_failed(now).unwrap();
        assert!(order.transition_to(OrderStatus::Processing, now).is_err());
        order.transition_to(OrderStatus::Cancelled, now).unwrap();
    }

    #[test]
    fn test_payment_never_moves_backwards() {
        let mut order = order();
        let now = Utc::now();

        assert!(order.release_payment(now).is_err());
        order.mark_paid(now).unwrap();
        order.refund_payment(now).unwrap();

        assert!(order.mark_paid(now).is_err());
        assert!(order.release_payment(now).is_err());
        assert_eq!(order.payment_status, PaymentStatus::Refunded);
    }
}
