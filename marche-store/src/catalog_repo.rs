use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marche_catalog::{InventoryError, Product};
use marche_core::repository::ProductRepository;
use marche_core::{CoreError, CoreResult};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db_error;

pub struct StoreProductRepository {
    pool: PgPool,
}

impl StoreProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    seller_id: Uuid,
    name: String,
    description: Option<String>,
    price_xof: i64,
    stock: i32,
    is_available: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            seller_id: row.seller_id,
            name: row.name,
            description: row.description,
            price_xof: row.price_xof,
            stock: row.stock,
            is_available: row.is_available,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const PRODUCT_COLUMNS: &str =
    "id, seller_id, name, description, price_xof, stock, is_available, created_at, updated_at";

#[async_trait]
impl ProductRepository for StoreProductRepository {
    async fn create(&self, product: &Product) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, seller_id, name, description, price_xof, stock, is_available, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(product.id)
        .bind(product.seller_id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price_xof)
        .bind(product.stock)
        .bind(product.is_available)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<Product>> {
        let row: Option<ProductRow> =
            sqlx::query_as(&format!("SELECT {} FROM products WHERE id = $1", PRODUCT_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;

        Ok(row.map(Product::from))
    }

    async fn decrement_stock(&self, id: Uuid, quantity: i32) -> CoreResult<Product> {
        if quantity <= 0 {
            return Err(InventoryError::InvalidQuantity(quantity).into());
        }

        // Single conditional update: concurrent buyers can never take the
        // stock below zero.
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "UPDATE products SET stock = stock - $2, is_available = (stock - $2) > 0, updated_at = NOW() \
             WHERE id = $1 AND is_available AND stock >= $2 RETURNING {}",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        if let Some(row) = row {
            return Ok(row.into());
        }

        match self.get(id).await? {
            None => Err(CoreError::not_found("product", id)),
            Some(product) => {
                product.ensure_can_fulfil(quantity)?;
                Err(CoreError::Conflict(format!("Stock for product {} changed concurrently", id)))
            }
        }
    }
}
