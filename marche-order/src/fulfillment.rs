use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::lifecycle::OrderError;
use crate::models::{DeliveryProof, DeliveryStatus, Order, OrderStatus};

impl DeliveryStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryStatus::Delivered | DeliveryStatus::Failed)
    }

    /// Courier-driven moves. `Assigned` is only reached through assignment.
    pub fn can_advance_to(&self, next: DeliveryStatus) -> bool {
        use DeliveryStatus::*;
        matches!(
            (self, next),
            (Assigned, PickedUp)
                | (Assigned, Failed)
                | (PickedUp, InTransit)
                | (PickedUp, Delivered)
                | (PickedUp, Failed)
                | (InTransit, Delivered)
                | (InTransit, Failed)
        )
    }
}

impl Order {
    /// Hand the order to a courier. An order gets one courier for its whole
    /// life; reassignment is rejected.
    pub fn assign_agent(&mut self, agent_id: Uuid, now: DateTime<Utc>) -> Result<(), OrderError> {
        if self.delivery_agent_id.is_some() {
            return Err(OrderError::AgentAlreadyAssigned);
        }

        if !matches!(self.status, OrderStatus::Processing | OrderStatus::Shipped) {
            return Err(OrderError::InvalidTransition {
                from: self.status.to_string(),
                to: DeliveryStatus::Assigned.to_string(),
            });
        }

        self.delivery_agent_id = Some(agent_id);
        self.delivery_status = DeliveryStatus::Assigned;
        self.updated_at = now;
        Ok(())
    }

    /// Record courier progress. Returns the order status when the delivery
    /// step also moved the order (picked up → shipped, delivered → delivered).
    pub fn advance_delivery(
        &mut self,
        next: DeliveryStatus,
        proof: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Option<OrderStatus>, OrderError> {
        if self.delivery_agent_id.is_none() {
            return Err(OrderError::NoDeliveryAgent);
        }

        if self.status.is_terminal() || !self.delivery_status.can_advance_to(next) {
            return Err(OrderError::InvalidTransition {
                from: format!("delivery {}", self.delivery_status),
                to: format!("delivery {}", next),
            });
        }

        let order_status = match next {
            DeliveryStatus::PickedUp if self.status == OrderStatus::Processing => {
                self.transition_to(OrderStatus::Shipped, now)?;
                Some(OrderStatus::Shipped)
            }
            DeliveryStatus::Delivered => {
                self.transition_to(OrderStatus::Delivered, now)?;
                Some(OrderStatus::Delivered)
            }
            _ => None,
        };

        self.delivery_status = next;
        if let Some(data) = proof {
            self.attach_proof(data, now);
        }
        self.updated_at = now;

        Ok(order_status)
    }

    /// Proof can be attached at any time, terminal states included.
    pub fn attach_proof(&mut self, data: String, now: DateTime<Utc>) {
        self.delivery_proof = Some(DeliveryProof { data, recorded_at: now });
        self.updated_at = now;
    }
}
