use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marche_core::repository::OrderRepository;
use marche_core::{CoreError, CoreResult};
use marche_order::{DeliveryProof, Order, OrderItem, ShippingAddress};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use crate::{db_error, parse_column};

pub struct StoreOrderRepository {
    pool: PgPool,
}

impl StoreOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Items, address and proof are small documents owned by the order, so they
// live in JSONB columns next to it.
#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    buyer_id: Uuid,
    items: Json<Vec<OrderItem>>,
    platform_fee: i64,
    delivery_fee: i64,
    admin_fee: i64,
    fee_mode: String,
    total_amount: i64,
    currency: String,
    status: String,
    payment_status: String,
    payment_method: String,
    delivery_agent_id: Option<Uuid>,
    delivery_status: String,
    shipping_address: Json<ShippingAddress>,
    delivery_proof: Option<Json<DeliveryProof>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    delivered_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
}

impl OrderRow {
    fn into_domain(self) -> CoreResult<Order> {
        Ok(Order {
            id: self.id,
            buyer_id: self.buyer_id,
            items: self.items.0,
            platform_fee: self.platform_fee,
            delivery_fee: self.delivery_fee,
            admin_fee: self.admin_fee,
            fee_mode: parse_column("fee_mode", &self.fee_mode)?,
            total_amount: self.total_amount,
            currency: self.currency,
            status: parse_column("status", &self.status)?,
            payment_status: parse_column("payment_status", &self.payment_status)?,
            payment_method: parse_column("payment_method", &self.payment_method)?,
            delivery_agent_id: self.delivery_agent_id,
            delivery_status: parse_column("delivery_status", &self.delivery_status)?,
            shipping_address: self.shipping_address.0,
            delivery_proof: self.delivery_proof.map(|p| p.0),
            created_at: self.created_at,
            updated_at: self.updated_at,
            delivered_at: self.delivered_at,
            cancelled_at: self.cancelled_at,
        })
    }
}

const ORDER_COLUMNS: &str = "id, buyer_id, items, platform_fee, delivery_fee, admin_fee, fee_mode, \
    total_amount, currency, status, payment_status, payment_method, delivery_agent_id, delivery_status, \
    shipping_address, delivery_proof, created_at, updated_at, delivered_at, cancelled_at";

impl StoreOrderRepository {
    async fn list_where<T>(&self, predicate: &str, value: T) -> CoreResult<Vec<Order>>
    where
        T: for<'q> sqlx::Encode<'q, Postgres> + sqlx::Type<Postgres> + Send + 'static,
    {
        let sql = format!(
            "SELECT {} FROM orders WHERE {} ORDER BY created_at DESC",
            ORDER_COLUMNS, predicate
        );
        let rows: Vec<OrderRow> = sqlx::query_as(&sql)
            .bind(value)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        rows.into_iter().map(OrderRow::into_domain).collect()
    }
}

#[async_trait]
impl OrderRepository for StoreOrderRepository {
    async fn create(&self, order: &Order) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, buyer_id, items, platform_fee, delivery_fee, admin_fee, fee_mode,
                total_amount, currency, status, payment_status, payment_method, delivery_agent_id,
                delivery_status, shipping_address, delivery_proof, created_at, updated_at, delivered_at, cancelled_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
            "#,
        )
        .bind(order.id)
        .bind(order.buyer_id)
        .bind(Json(&order.items))
        .bind(order.platform_fee)
        .bind(order.delivery_fee)
        .bind(order.admin_fee)
        .bind(order.fee_mode.as_str())
        .bind(order.total_amount)
        .bind(&order.currency)
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.payment_method.as_str())
        .bind(order.delivery_agent_id)
        .bind(order.delivery_status.as_str())
        .bind(Json(&order.shipping_address))
        .bind(order.delivery_proof.as_ref().map(Json))
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.delivered_at)
        .bind(order.cancelled_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<Order>> {
        let row: Option<OrderRow> = sqlx::query_as(&format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        row.map(OrderRow::into_domain).transpose()
    }

    async fn update(&self, order: &Order) -> CoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders SET status = $2, payment_status = $3, delivery_agent_id = $4, delivery_status = $5,
                delivery_proof = $6, updated_at = $7, delivered_at = $8, cancelled_at = $9
            WHERE id = $1
            "#,
        )
        .bind(order.id)
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.delivery_agent_id)
        .bind(order.delivery_status.as_str())
        .bind(order.delivery_proof.as_ref().map(Json))
        .bind(order.updated_at)
        .bind(order.delivered_at)
        .bind(order.cancelled_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("order", order.id));
        }
        Ok(())
    }

    async fn list_by_buyer(&self, buyer_id: Uuid) -> CoreResult<Vec<Order>> {
        self.list_where("buyer_id = $1", buyer_id).await
    }

    async fn list_by_seller(&self, seller_id: Uuid) -> CoreResult<Vec<Order>> {
        let probe = serde_json::json!([{ "sellerId": seller_id }]);
        self.list_where("items @> $1", Json(probe)).await
    }

    async fn list_by_agent(&self, agent_id: Uuid) -> CoreResult<Vec<Order>> {
        self.list_where("delivery_agent_id = $1", agent_id).await
    }
}
