use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::inventory::InventoryError;

/// A seller's listing. Only the fields checkout and settlement rely on are
/// modelled here; the rest of the catalog lives elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price_xof: i64,
    pub stock: i32,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(seller_id: Uuid, name: String, price_xof: i64, stock: i32) -> Result<Self, InventoryError> {
        if price_xof <= 0 {
            return Err(InventoryError::InvalidPrice(price_xof));
        }
        if stock < 0 {
            return Err(InventoryError::InvalidQuantity(stock));
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            seller_id,
            name,
            description: None,
            price_xof,
            stock,
            is_available: stock > 0,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
