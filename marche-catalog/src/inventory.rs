use crate::product::Product;
use chrono::Utc;
use uuid::Uuid;

impl Product {
    /// Check that `quantity` units can be sold right now.
    pub fn ensure_can_fulfil(&self, quantity: i32) -> Result<(), InventoryError> {
        if quantity <= 0 {
            return Err(InventoryError::InvalidQuantity(quantity));
        }

        if !self.is_available {
            return Err(InventoryError::NotAvailable(self.id));
        }

        if quantity > self.stock {
            return Err(InventoryError::InsufficientStock {
                product_id: self.id,
                requested: quantity,
                available: self.stock,
            });
        }

        Ok(())
    }

    /// Take `quantity` units out of stock. Availability is cleared once the
    /// stock reaches zero.
    pub fn decrement_stock(&mut self, quantity: i32) -> Result<(), InventoryError> {
        self.ensure_can_fulfil(quantity)?;

        self.stock -= quantity;
        if self.stock == 0 {
            self.is_available = false;
        }
        self.updated_at = Utc::now();

        Ok(())
    }

    /// Subtotal for `quantity` units, or `None` on overflow.
    pub fn subtotal(&self, quantity: i32) -> Option<i64> {
        self.price_xof.checked_mul(i64::from(quantity))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InventoryError {
    #[error("Product not available: {0}")]
    NotAvailable(Uuid),

    #[error("Insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: Uuid,
        requested: i32,
        available: i32,
    },

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(i32),

    #[error("Invalid price: {0}")]
    InvalidPrice(i64),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(stock: i32) -> Product {
        Product::new(Uuid::new_v4(), "Bissap 1L".to_string(), 1_500, stock).unwrap()
    }

    #[test]
    fn test_stock_lifecycle() {
        let mut p = product(3);

        p.decrement_stock(2).unwrap();
        assert_eq!(p.stock, 1);
        assert!(p.is_available);

        p.decrement_stock(1).unwrap();
        assert_eq!(p.stock, 0);
        assert!(!p.is_available);

        assert_eq!(p.decrement_stock(1).unwrap_err(), InventoryError::NotAvailable(p.id));
    }

    #[test]
    fn test_rejects_quantity_above_stock() {
        let p = product(2);
        let err = p.ensure_can_fulfil(3).unwrap_err();
        assert_eq!(
            err,
            InventoryError::InsufficientStock { product_id: p.id, requested: 3, available: 2 }
        );
        assert_eq!(p.ensure_can_fulfil(0).unwrap_err(), InventoryError::InvalidQuantity(0));
    }

    #[test]
    fn test_new_product_validation() {
        assert!(Product::new(Uuid::new_v4(), "Free".to_string(), 0, 1).is_err());
        let empty = Product::new(Uuid::new_v4(), "Sold out".to_string(), 100, 0).unwrap();
        assert!(!empty.is_available);
        assert_eq!(product(5).subtotal(4), Some(6_000));
    }
}
