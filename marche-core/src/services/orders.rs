use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use marche_order::{DeliveryStatus, Order, OrderStatus, PaymentStatus};
use marche_shared::Role;
use uuid::Uuid;

use crate::identity::Actor;
use crate::repository::{OrderRepository, UserRepository};
use crate::services::settlement::SettlementService;
use crate::{CoreError, CoreResult};

/// Order reads and the status, courier and delivery updates that follow
/// checkout. Reaching a terminal state triggers the matching money flow.
pub struct OrderService {
    orders: Arc<dyn OrderRepository>,
    users: Arc<dyn UserRepository>,
    settlement: Arc<SettlementService>,
}

impl OrderService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        users: Arc<dyn UserRepository>,
        settlement: Arc<SettlementService>,
    ) -> Self {
        Self { orders, users, settlement }
    }

    async fn load(&self, id: Uuid) -> CoreResult<Order> {
        self.orders
            .get(id)
            .await?
            .ok_or_else(|| CoreError::not_found("order", id))
    }

    pub async fn get(&self, actor: &Actor, id: Uuid) -> CoreResult<Order> {
        let order = self.load(id).await?;
        if actor.is_admin() || order.involves(actor.user_id) {
            Ok(order)
        } else {
            Err(CoreError::Forbidden("Not a participant in this order".to_string()))
        }
    }

    /// Orders the actor takes part in under any of their roles, newest first.
    pub async fn list(&self, actor: &Actor) -> CoreResult<Vec<Order>> {
        let mut orders = Vec::new();
        if actor.has_role(Role::Buyer) {
            orders.extend(self.orders.list_by_buyer(actor.user_id).await?);
        }
        if actor.has_role(Role::Seller) {
            orders.extend(self.orders.list_by_seller(actor.user_id).await?);
        }
        if actor.has_role(Role::Delivery) {
            orders.extend(self.orders.list_by_agent(actor.user_id).await?);
        }

        let mut seen = HashSet::new();
        orders.retain(|o| seen.insert(o.id));
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    /// Administrative status change. Delivered pays out a paid order;
    /// cancelled or refunded gives the buyer their money back.
    pub async fn update_status(&self, actor: &Actor, id: Uuid, status: OrderStatus) -> CoreResult<Order> {
        actor.require(Role::Admin)?;
        let mut order = self.load(id).await?;
        order.transition_to(status, Utc::now())?;
        self.orders.update(&order).await?;
        tracing::info!("Order {} moved to {} by {}", order.id, status, actor.user_id);

        self.settle_if_final(&mut order).await?;
        Ok(order)
    }

    /// Admins assign any courier; a courier may only take an order for
    /// themselves.
    pub async fn assign_agent(&self, actor: &Actor, id: Uuid, agent_id: Option<Uuid>) -> CoreResult<Order> {
        let agent_id = if actor.is_admin() {
            agent_id.ok_or_else(|| CoreError::validation("A delivery agent is required", &["deliveryAgentId"]))?
        } else {
            actor.require(Role::Delivery)?;
            match agent_id {
                Some(other) if other != actor.user_id => {
                    return Err(CoreError::Forbidden("Couriers can only assign themselves".to_string()));
                }
                _ => actor.user_id,
            }
        };

        let agent = self
            .users
            .get(agent_id)
            .await?
            .ok_or_else(|| CoreError::not_found("user", agent_id))?;
        if !agent.has_role(Role::Delivery) {
            return Err(CoreError::validation(
                "Assigned user is not a delivery agent",
                &["deliveryAgentId"],
            ));
        }

        let mut order = self.load(id).await?;
        order.assign_agent(agent_id, Utc::now())?;
        self.orders.update(&order).await?;
        tracing::info!("Order {} assigned to courier {}", order.id, agent_id);
        Ok(order)
    }

    /// Courier progress report, with optional proof of delivery.
    pub async fn update_delivery(
        &self,
        actor: &Actor,
        id: Uuid,
        status: DeliveryStatus,
        proof: Option<String>,
    ) -> CoreResult<Order> {
        let mut order = self.load(id).await?;
        self.ensure_courier(actor, &order)?;

        let moved = order.advance_delivery(status, proof, Utc::now())?;
        self.orders.update(&order).await?;
        tracing::info!("Order {} delivery is now {}", order.id, status);

        if moved == Some(OrderStatus::Delivered) {
            self.settle_if_final(&mut order).await?;
        }
        Ok(order)
    }

    /// Attach or replace proof of delivery, whatever state the order is in.
    pub async fn attach_proof(&self, actor: &Actor, id: Uuid, proof: String) -> CoreResult<Order> {
        if proof.trim().is_empty() {
            return Err(CoreError::validation("Proof cannot be empty", &["proof"]));
        }
        let mut order = self.load(id).await?;
        self.ensure_courier(actor, &order)?;

        order.attach_proof(proof, Utc::now());
        self.orders.update(&order).await?;
        Ok(order)
    }

    /// Re-run the money flow of a terminal order whose settlement was
    /// interrupted. Orders already released or refunded are left alone.
    pub async fn retry_settlement(&self, actor: &Actor, id: Uuid) -> CoreResult<Order> {
        actor.require(Role::Admin)?;
        let mut order = self.load(id).await?;
        self.settle_if_final(&mut order).await?;
        Ok(order)
    }

    fn ensure_courier(&self, actor: &Actor, order: &Order) -> CoreResult<()> {
        if actor.is_admin() || order.delivery_agent_id == Some(actor.user_id) {
            Ok(())
        } else {
            Err(CoreError::Forbidden("Only the assigned courier can update delivery".to_string()))
        }
    }

    async fn settle_if_final(&self, order: &mut Order) -> CoreResult<()> {
        if order.payment_status != PaymentStatus::Paid {
            return Ok(());
        }
        match order.status {
            OrderStatus::Delivered => self.settlement.settle(order).await,
            OrderStatus::Cancelled | OrderStatus::Refunded => self.settlement.refund(order).await,
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::User;
    use crate::services::checkout::{CartItem, PlaceOrder};
    use crate::services::fixtures::{actor, address, harness, Harness};
    use marche_shared::PaymentMethod;

    async fn paid_order(h: &Harness, buyer: &User, seller: &User) -> Order {
        let product = h.listed(seller, 5_000, 5).await;
        h.fund(buyer, Role::Buyer, 50_000).await;
        h.services
            .checkout
            .place_order(
                buyer.id,
                PlaceOrder {
                    items: vec![CartItem { product_id: product, quantity: 1 }],
                    shipping_address: address(),
                    payment_method: PaymentMethod::Wallet,
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_courier_flow_settles_on_delivery() {
        let h = harness().await;
        let seller = h.user("Khady", vec![Role::Seller]).await;
        let buyer = h.user("Awa", vec![Role::Buyer]).await;
        let agent = h.user("Cheikh", vec![Role::Delivery]).await;
        let order = paid_order(&h, &buyer, &seller).await;
        let courier = actor(&agent);
        let orders = &h.services.orders;

        orders.assign_agent(&courier, order.id, None).await.unwrap();
        let picked = orders
            .update_delivery(&courier, order.id, DeliveryStatus::PickedUp, None)
            .await
            .unwrap();
        assert_eq!(picked.status, OrderStatus::Shipped);

        let done = orders
            .update_delivery(&courier, order.id, DeliveryStatus::Delivered, Some("photo://door".to_string()))
            .await
            .unwrap();
        assert_eq!(done.status, OrderStatus::Delivered);
        assert_eq!(done.payment_status, PaymentStatus::Released);
        assert!(done.delivery_proof.is_some());

        let seller_wallet = h.services.wallets.wallet(seller.id, Role::Seller).await.unwrap();
        assert_eq!(seller_wallet.balance, 5_000);
        let agent_wallet = h.services.wallets.wallet(agent.id, Role::Delivery).await.unwrap();
        assert_eq!(agent_wallet.balance, 1_000);
    }

    #[tokio::test]
    async fn test_admin_cancel_refunds_buyer() {
        let h = harness().await;
        let seller = h.user("Khady", vec![Role::Seller]).await;
        let buyer = h.user("Awa", vec![Role::Buyer]).await;
        let order = paid_order(&h, &buyer, &seller).await;

        let cancelled = h
            .services
            .orders
            .update_status(&h.admin_actor(), order.id, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(cancelled.payment_status, PaymentStatus::Refunded);
        assert!(cancelled.cancelled_at.is_some());
        assert_eq!(h.services.wallets.wallet(buyer.id, Role::Buyer).await.unwrap().balance, 50_000);

        let again = h
            .services
            .orders
            .update_status(&h.admin_actor(), order.id, OrderStatus::Processing)
            .await
            .unwrap_err();
        assert!(matches!(again, CoreError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_only_admins_change_status() {
        let h = harness().await;
        let seller = h.user("Khady", vec![Role::Seller]).await;
        let buyer = h.user("Awa", vec![Role::Buyer]).await;
        let order = paid_order(&h, &buyer, &seller).await;

        let err = h
            .services
            .orders
            .update_status(&actor(&seller), order.id, OrderStatus::Shipped)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_second_courier_is_rejected() {
        let h = harness().await;
        let seller = h.user("Khady", vec![Role::Seller]).await;
        let buyer = h.user("Awa", vec![Role::Buyer]).await;
        let first = h.user("Cheikh", vec![Role::Delivery]).await;
        let second = h.user("Pape", vec![Role::Delivery]).await;
        let order = paid_order(&h, &buyer, &seller).await;

        h.services.orders.assign_agent(&actor(&first), order.id, None).await.unwrap();
        let err = h
            .services
            .orders
            .assign_agent(&h.admin_actor(), order.id, Some(second.id))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));

        let stranger = h
            .services
            .orders
            .update_delivery(&actor(&second), order.id, DeliveryStatus::PickedUp, None)
            .await
            .unwrap_err();
        assert!(matches!(stranger, CoreError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_participants_only() {
        let h = harness().await;
        let seller = h.user("Khady", vec![Role::Seller]).await;
        let buyer = h.user("Awa", vec![Role::Buyer]).await;
        let other = h.user("Binta", vec![Role::Buyer]).await;
        let order = paid_order(&h, &buyer, &seller).await;

        assert!(h.services.orders.get(&actor(&seller), order.id).await.is_ok());
        assert!(h.services.orders.get(&h.admin_actor(), order.id).await.is_ok());
        let err = h.services.orders.get(&actor(&other), order.id).await.unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));

        assert_eq!(h.services.orders.list(&actor(&buyer)).await.unwrap().len(), 1);
        assert_eq!(h.services.orders.list(&actor(&seller)).await.unwrap().len(), 1);
        assert!(h.services.orders.list(&actor(&other)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retry_completes_an_interrupted_settlement() {
        let h = harness().await;
        let seller = h.user("Khady", vec![Role::Seller]).await;
        let buyer = h.user("Awa", vec![Role::Buyer]).await;
        let order = paid_order(&h, &buyer, &seller).await;

        let mut delivered = order.clone();
        delivered.transition_to(OrderStatus::Delivered, Utc::now()).unwrap();
        h.orders.update(&delivered).await.unwrap();

        let first = h.services.orders.retry_settlement(&h.admin_actor(), order.id).await.unwrap();
        assert_eq!(first.payment_status, PaymentStatus::Released);
        let second = h.services.orders.retry_settlement(&h.admin_actor(), order.id).await.unwrap();
        assert_eq!(second.payment_status, PaymentStatus::Released);

        assert_eq!(h.services.wallets.wallet(seller.id, Role::Seller).await.unwrap().balance, 5_000);

        // No courier: the admin fee plus the unspent delivery share as margin.
        let mut admin_credits: Vec<i64> = h
            .services
            .wallets
            .transactions(h.admin.id, Role::Admin, None)
            .await
            .unwrap()
            .iter()
            .map(|t| t.amount)
            .collect();
        admin_credits.sort();
        assert_eq!(admin_credits, vec![200, 1_000]);
    }
}
