use chrono::{DateTime, Utc};
use marche_catalog::Product;
use marche_shared::{PaymentMethod, CURRENCY};
use uuid::Uuid;

use crate::finance::FeeSchedule;
use crate::lifecycle::OrderError;
use crate::models::{DeliveryStatus, Order, OrderItem, OrderStatus, PaymentStatus, ShippingAddress};

/// A requested quantity of a product, resolved from the catalog.
#[derive(Debug, Clone)]
pub struct OrderLine {
    pub product: Product,
    pub quantity: i32,
}

impl Order {
    /// Price a cart. Lines for the same product are merged before stock is
    /// checked, so a product can never be oversold within one order.
    pub fn checkout(
        buyer_id: Uuid,
        lines: Vec<OrderLine>,
        shipping_address: ShippingAddress,
        payment_method: PaymentMethod,
        fees: &FeeSchedule,
        now: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        if lines.is_empty() {
            return Err(OrderError::EmptyOrder);
        }
        fees.validate()?;

        let mut merged: Vec<OrderLine> = Vec::with_capacity(lines.len());
        for line in lines {
            match merged.iter_mut().find(|l| l.product.id == line.product.id) {
                Some(existing) => {
                    existing.quantity = existing
                        .quantity
                        .checked_add(line.quantity)
                        .ok_or(OrderError::AmountOverflow)?;
                }
                None => merged.push(line),
            }
        }

        let mut items = Vec::with_capacity(merged.len());
        for line in merged {
            line.product.ensure_can_fulfil(line.quantity)?;
            let subtotal = line
                .product
                .subtotal(line.quantity)
                .ok_or(OrderError::AmountOverflow)?;

            items.push(OrderItem {
                product_id: line.product.id,
                seller_id: line.product.seller_id,
                product_name: line.product.name,
                quantity: line.quantity,
                unit_price: line.product.price_xof,
                subtotal,
            });
        }

        let buyer_fee = fees.buyer_fee();
        let total_amount = items
            .iter()
            .try_fold(buyer_fee, |acc, item| acc.checked_add(item.subtotal))
            .ok_or(OrderError::AmountOverflow)?;

        Ok(Self {
            id: Uuid::new_v4(),
            buyer_id,
            items,
            platform_fee: buyer_fee,
            delivery_fee: fees.delivery_fee,
            admin_fee: fees.admin_fee,
            fee_mode: fees.mode,
            total_amount,
            currency: CURRENCY.to_string(),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method,
            delivery_agent_id: None,
            delivery_status: DeliveryStatus::Pending,
            shipping_address,
            delivery_proof: None,
            created_at: now,
            updated_at: now,
            delivered_at: None,
            cancelled_at: None,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::finance::FeeMode;
    use marche_catalog::InventoryError;

    pub(crate) fn address() -> ShippingAddress {
        ShippingAddress {
            street: "Rue 10, Médina".to_string(),
            city: "Dakar".to_string(),
            country: "SN".to_string(),
            phone: None,
            instructions: None,
        }
    }

    pub(crate) fn product(seller: Uuid, price: i64, stock: i32) -> Product {
        Product::new(seller, format!("item-{}", price), price, stock).unwrap()
    }

    #[test]
    fn test_total_is_subtotals_plus_platform_fee() {
        let a = product(Uuid::new_v4(), 2_500, 10);
        let b = product(Uuid::new_v4(), 3_000, 10);
        let lines = vec![
            OrderLine { product: a, quantity: 2 },
            OrderLine { product: b, quantity: 1 },
        ];

        let order = Order::checkout(
            Uuid::new_v4(), lines, address(), PaymentMethod::Wallet, &FeeSchedule::default(), Utc::now(),
        )
        .unwrap();

        assert_eq!(order.items_subtotal(), 8_000);
        assert_eq!(order.total_amount, order.items_subtotal() + order.platform_fee);
        assert_eq!(order.total_amount, 9_200);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.currency, "XOF");
    }

    #[test]
    fn test_additive_fees_are_charged_to_buyer() {
        let fees = FeeSchedule { mode: FeeMode::Additive, ..FeeSchedule::default() };
        let lines = vec![OrderLine { product: product(Uuid::new_v4(), 1_000, 1), quantity: 1 }];

        let order =
            Order::checkout(Uuid::new_v4(), lines, address(), PaymentMethod::Card, &fees, Utc::now()).unwrap();

        assert_eq!(order.platform_fee, 2_400);
        assert_eq!(order.total_amount, 3_400);
    }

    #[test]
    fn test_rejects_empty_and_oversold_carts() {
        let fees = FeeSchedule::default();
        let err = Order::checkout(Uuid::new_v4(), vec![], address(), PaymentMethod::Wallet, &fees, Utc::now())
            .unwrap_err();
        assert_eq!(err, OrderError::EmptyOrder);

        let p = product(Uuid::new_v4(), 1_000, 3);
        let lines = vec![
            OrderLine { product: p.clone(), quantity: 2 },
            OrderLine { product: p.clone(), quantity: 2 },
        ];
        let err = Order::checkout(Uuid::new_v4(), lines, address(), PaymentMethod::Wallet, &fees, Utc::now())
            .unwrap_err();
        assert_eq!(
            err,
            OrderError::Inventory(InventoryError::InsufficientStock { product_id: p.id, requested: 4, available: 3 })
        );
    }
}
