use std::sync::Arc;

use chrono::Utc;
use marche_order::{Order, SettlementPlan};
use marche_shared::models::events::{
    OrderRefundedEvent, OrderSettledEvent, PayoutLine, ORDERS_REFUNDED_TOPIC, ORDERS_SETTLED_TOPIC,
};
use marche_shared::Role;

use crate::events::{emit, EventPublisher};
use crate::repository::{LedgerEntry, OrderRepository, UserRepository, WalletRepository};
use crate::services::wallet::announce;
use crate::{CoreError, CoreResult, SettlementFailure};

/// Moves an order's money once it reaches the end of its life: payouts on
/// delivery, a full refund on cancellation.
///
/// The credits of a plan are applied as one batch under deterministic
/// references, so repeating a settlement that already went through is a
/// no-op and a crashed one can simply be run again.
pub struct SettlementService {
    wallets: Arc<dyn WalletRepository>,
    orders: Arc<dyn OrderRepository>,
    users: Arc<dyn UserRepository>,
    events: Arc<dyn EventPublisher>,
}

impl SettlementService {
    pub fn new(
        wallets: Arc<dyn WalletRepository>,
        orders: Arc<dyn OrderRepository>,
        users: Arc<dyn UserRepository>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self { wallets, orders, users, events }
    }

    /// Pay the sellers, the courier and the platform for a delivered order
    /// and mark its payment released.
    pub async fn settle(&self, order: &mut Order) -> CoreResult<()> {
        let admin = self
            .users
            .first_with_role(Role::Admin)
            .await?
            .ok_or_else(|| CoreError::not_found("user", "platform admin"))?;
        let plan = SettlementPlan::for_delivery(order, admin.id)?;

        self.execute(order, &plan).await?;
        order.release_payment(Utc::now())?;
        self.persist(order, &plan).await?;

        let event = OrderSettledEvent {
            order_id: order.id,
            total_amount: order.total_amount,
            payouts: plan
                .credits
                .iter()
                .map(|c| PayoutLine {
                    beneficiary_id: c.beneficiary_id,
                    role: c.role.to_string(),
                    amount: c.amount,
                })
                .collect(),
            timestamp: Utc::now().timestamp(),
        };
        emit(self.events.as_ref(), ORDERS_SETTLED_TOPIC, &order.id.to_string(), &event).await;

        tracing::info!(
            "Settled order {}: {} XOF across {} credit(s)",
            order.id,
            plan.total(),
            plan.credits.len()
        );
        Ok(())
    }

    /// Return the full amount to the buyer of a cancelled or refunded order.
    pub async fn refund(&self, order: &mut Order) -> CoreResult<()> {
        let plan = SettlementPlan::for_refund(order)?;

        self.execute(order, &plan).await?;
        order.refund_payment(Utc::now())?;
        self.persist(order, &plan).await?;

        let event = OrderRefundedEvent {
            order_id: order.id,
            buyer_id: order.buyer_id,
            amount: plan.total(),
            timestamp: Utc::now().timestamp(),
        };
        emit(self.events.as_ref(), ORDERS_REFUNDED_TOPIC, &order.id.to_string(), &event).await;

        tracing::info!("Refunded {} XOF to buyer {} for order {}", plan.total(), order.buyer_id, order.id);
        Ok(())
    }

    async fn execute(&self, order: &Order, plan: &SettlementPlan) -> CoreResult<()> {
        let mut entries = Vec::with_capacity(plan.credits.len());
        for credit in &plan.credits {
            let wallet = self
                .wallets
                .find_by_owner_and_role(credit.beneficiary_id, credit.role)
                .await?
                .ok_or_else(|| {
                    CoreError::not_found("wallet", format!("{}/{}", credit.beneficiary_id, credit.role))
                })?;
            entries.push(LedgerEntry::new(wallet.id, credit.to_transaction(order.id, order.buyer_id)));
        }

        let transactions: Vec<_> = entries.iter().map(|e| e.transaction.clone()).collect();
        match self.wallets.apply_once(entries).await? {
            Some(wallets) => {
                for (wallet, tx) in wallets.iter().zip(&transactions) {
                    announce(self.events.as_ref(), wallet, tx).await;
                }
            }
            None => tracing::info!("Credits for order {} were already applied", order.id),
        }
        Ok(())
    }

    async fn persist(&self, order: &Order, plan: &SettlementPlan) -> CoreResult<()> {
        if let Err(e) = self.orders.update(order).await {
            tracing::error!("Order {} credits applied but the order was not updated: {}", order.id, e);
            return Err(SettlementFailure {
                order_id: order.id,
                applied: plan.steps(),
                reason: e.to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::User;
    use crate::services::checkout::{CartItem, PlaceOrder};
    use crate::services::fixtures::{address, harness, Harness};
    use marche_order::{OrderStatus, PaymentStatus};
    use marche_shared::PaymentMethod;
    use marche_wallet::{Transaction, TransactionKind};

    struct Scene {
        h: Harness,
        buyer: User,
        sellers: (User, User),
        agent: User,
        order: Order,
    }

    /// A paid wallet order with one 5000 item from one seller and one 3000
    /// item from another, handed to a courier.
    async fn scene() -> Scene {
        let h = harness().await;
        let first = h.user("Khady", vec![Role::Seller]).await;
        let second = h.user("Mamadou", vec![Role::Seller]).await;
        let buyer = h.user("Awa", vec![Role::Buyer]).await;
        let agent = h.user("Cheikh", vec![Role::Delivery]).await;
        let a = h.listed(&first, 5_000, 10).await;
        let b = h.listed(&second, 3_000, 10).await;
        h.fund(&buyer, Role::Buyer, 20_000).await;

        let mut order = h
            .services
            .checkout
            .place_order(
                buyer.id,
                PlaceOrder {
                    items: vec![
                        CartItem { product_id: a, quantity: 1 },
                        CartItem { product_id: b, quantity: 1 },
                    ],
                    shipping_address: address(),
                    payment_method: PaymentMethod::Wallet,
                },
            )
            .await
            .unwrap();
        order.assign_agent(agent.id, Utc::now()).unwrap();
        h.orders.update(&order).await.unwrap();

        Scene { h, buyer, sellers: (first, second), agent, order }
    }

    async fn balance(h: &Harness, user: &User, role: Role) -> i64 {
        h.services.wallets.wallet(user.id, role).await.unwrap().balance
    }

    #[tokio::test]
    async fn test_delivery_pays_everyone() {
        let Scene { h, sellers, agent, mut order, .. } = scene().await;
        assert_eq!(order.total_amount, 9_200);
        order.transition_to(OrderStatus::Delivered, Utc::now()).unwrap();

        h.services.settlement.settle(&mut order).await.unwrap();

        assert_eq!(order.payment_status, PaymentStatus::Released);
        assert_eq!(balance(&h, &sellers.0, Role::Seller).await, 5_000);
        assert_eq!(balance(&h, &sellers.1, Role::Seller).await, 3_000);
        assert_eq!(balance(&h, &agent, Role::Delivery).await, 1_000);
        assert_eq!(balance(&h, &h.admin, Role::Admin).await, 200);

        let stored = h.orders.get(order.id).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Released);
        assert_eq!(h.events.on_topic(ORDERS_SETTLED_TOPIC).await.len(), 1);
    }

    async fn history(h: &Harness, user: &User, role: Role) -> Vec<Transaction> {
        h.services.wallets.transactions(user.id, role, None).await.unwrap()
    }

    #[tokio::test]
    async fn test_cancellation_refunds_the_total() {
        let Scene { h, buyer, sellers, agent, mut order } = scene().await;
        assert_eq!(balance(&h, &buyer, Role::Buyer).await, 10_800);
        let before = history(&h, &buyer, Role::Buyer).await.len();
        order.transition_to(OrderStatus::Cancelled, Utc::now()).unwrap();

        h.services.settlement.refund(&mut order).await.unwrap();

        assert_eq!(order.payment_status, PaymentStatus::Refunded);
        assert_eq!(balance(&h, &buyer, Role::Buyer).await, 20_000);

        let after = history(&h, &buyer, Role::Buyer).await;
        assert_eq!(after.len(), before + 1);
        let refund = &after[0];
        assert_eq!(refund.kind, TransactionKind::Refund);
        assert_eq!(refund.amount, order.total_amount);
        assert_eq!(refund.order_id, Some(order.id));

        let admin = h.admin.clone();
        for (user, role) in [
            (&sellers.0, Role::Seller),
            (&sellers.1, Role::Seller),
            (&agent, Role::Delivery),
            (&admin, Role::Admin),
        ] {
            assert_eq!(balance(&h, user, role).await, 0);
            assert!(history(&h, user, role).await.is_empty());
        }
        assert!(h.events.on_topic(ORDERS_SETTLED_TOPIC).await.is_empty());
        assert_eq!(h.events.on_topic(ORDERS_REFUNDED_TOPIC).await.len(), 1);
    }

    #[tokio::test]
    async fn test_interrupted_settlement_resumes_without_double_pay() {
        let Scene { h, sellers, agent, mut order, .. } = scene().await;
        order.transition_to(OrderStatus::Delivered, Utc::now()).unwrap();
        h.orders.update(&order).await.unwrap();

        h.orders.fail_updates(true);
        let err = h.services.settlement.settle(&mut order).await.unwrap_err();
        let CoreError::Settlement(failure) = err else {
            panic!("expected a settlement failure, got {err:?}");
        };
        assert_eq!(failure.order_id, order.id);
        assert_eq!(failure.applied.len(), 4);
        assert_eq!(balance(&h, &sellers.0, Role::Seller).await, 5_000);

        h.orders.fail_updates(false);
        let mut stored = h.orders.get(order.id).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Paid);
        h.services.settlement.settle(&mut stored).await.unwrap();

        assert_eq!(stored.payment_status, PaymentStatus::Released);
        assert_eq!(balance(&h, &sellers.0, Role::Seller).await, 5_000);
        assert_eq!(balance(&h, &sellers.1, Role::Seller).await, 3_000);
        assert_eq!(balance(&h, &agent, Role::Delivery).await, 1_000);
        assert_eq!(balance(&h, &h.admin, Role::Admin).await, 200);
    }

    #[tokio::test]
    async fn test_released_orders_cannot_settle_again() {
        let Scene { h, mut order, .. } = scene().await;
        order.transition_to(OrderStatus::Delivered, Utc::now()).unwrap();
        h.services.settlement.settle(&mut order).await.unwrap();

        let err = h.services.settlement.settle(&mut order).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
    }
}
