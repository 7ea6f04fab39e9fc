use std::sync::Arc;

use chrono::Utc;
use marche_order::{FeeSchedule, Order, OrderLine, ShippingAddress};
use marche_shared::{PaymentMethod, Role};
use marche_wallet::{reference, Transaction, TransactionKind};
use uuid::Uuid;

use crate::identity::Actor;
use crate::repository::{OrderRepository, ProductRepository};
use crate::services::wallet::WalletService;
use crate::{CoreError, CoreResult};

#[derive(Debug, Clone)]
pub struct CartItem {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub items: Vec<CartItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
}

pub struct CheckoutService {
    orders: Arc<dyn OrderRepository>,
    products: Arc<dyn ProductRepository>,
    wallets: Arc<WalletService>,
    fees: FeeSchedule,
}

impl CheckoutService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        products: Arc<dyn ProductRepository>,
        wallets: Arc<WalletService>,
        fees: FeeSchedule,
    ) -> Self {
        Self { orders, products, wallets, fees }
    }

    pub fn fees(&self) -> &FeeSchedule {
        &self.fees
    }

    /// Price and place an order.
    ///
    /// Wallet orders are paid on the spot: the buyer wallet is debited, the
    /// order moves to processing and stock is taken. Any other payment
    /// method leaves the order pending until the payment is confirmed.
    pub async fn place_order(&self, buyer_id: Uuid, request: PlaceOrder) -> CoreResult<Order> {
        let mut lines = Vec::with_capacity(request.items.len());
        for item in &request.items {
            let product = self
                .products
                .get(item.product_id)
                .await?
                .ok_or_else(|| CoreError::not_found("product", item.product_id))?;
            lines.push(OrderLine { product, quantity: item.quantity });
        }

        let now = Utc::now();
        let mut order = Order::checkout(
            buyer_id,
            lines,
            request.shipping_address,
            request.payment_method,
            &self.fees,
            now,
        )?;

        if !order.payment_method.is_wallet() {
            self.orders.create(&order).await?;
            tracing::info!("Order {} placed by {} awaiting {} payment", order.id, buyer_id, order.payment_method);
            return Ok(order);
        }

        let wallet = self.wallets.wallet(buyer_id, Role::Buyer).await?;
        if !wallet.has_sufficient_balance(order.total_amount) {
            return Err(CoreError::InsufficientBalance {
                required: order.total_amount,
                available: wallet.balance,
            });
        }

        self.orders.create(&order).await?;

        let payment = Transaction::new(
            TransactionKind::Payment,
            order.total_amount,
            reference::order_payment(order.id),
        )
        .with_order(order.id)
        .with_method(PaymentMethod::Wallet)
        .with_description(format!("Payment for order {}", order.id));

        if let Err(e) = self.wallets.post(&wallet, payment).await {
            tracing::warn!("Wallet payment for order {} failed: {}", order.id, e);
            order.mark_payment_failed(Utc::now())?;
            if let Err(update_err) = self.orders.update(&order).await {
                tracing::error!("Failed to record payment failure on order {}: {}", order.id, update_err);
            }
            return Err(e);
        }

        order.mark_paid(Utc::now())?;
        self.orders.update(&order).await?;
        self.take_stock(&order).await;

        tracing::info!("Order {} paid from wallet: {} XOF", order.id, order.total_amount);
        Ok(order)
    }

    /// Admin confirmation that an order paid outside the wallets has been
    /// received. The order starts processing and its stock is taken.
    pub async fn confirm_payment(&self, actor: &Actor, order_id: Uuid) -> CoreResult<Order> {
        actor.require(Role::Admin)?;
        let mut order = self
            .orders
            .get(order_id)
            .await?
            .ok_or_else(|| CoreError::not_found("order", order_id))?;
        if order.payment_method.is_wallet() {
            return Err(CoreError::validation(
                "Wallet orders are paid at checkout",
                &["paymentMethod"],
            ));
        }

        order.mark_paid(Utc::now())?;
        self.orders.update(&order).await?;
        self.take_stock(&order).await;

        tracing::info!(
            "Payment of {} XOF by {} confirmed for order {} by {}",
            order.total_amount,
            order.payment_method,
            order.id,
            actor.user_id
        );
        Ok(order)
    }

    async fn take_stock(&self, order: &Order) {
        for item in &order.items {
            if let Err(e) = self.products.decrement_stock(item.product_id, item.quantity).await {
                tracing::error!(
                    "Order {} is paid but stock for product {} was not taken: {}",
                    order.id,
                    item.product_id,
                    e
                );
            }
        }
    }
}
