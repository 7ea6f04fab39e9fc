use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use marche_core::identity::Actor;
use marche_core::services::{CartItem, PlaceOrder};
use marche_order::{DeliveryStatus, Order, OrderStatus, ShippingAddress};
use marche_shared::pii::Masked;
use marche_shared::{PaymentMethod, Role};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::extract::AppJson;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/{id}", get(get_order))
        .route("/orders/{id}/status", put(update_status))
        .route("/orders/{id}/confirm-payment", post(confirm_payment))
        .route("/orders/{id}/assign", put(assign_agent))
        .route("/orders/{id}/delivery-status", put(update_delivery_status))
        .route("/orders/{id}/proof", put(attach_proof))
        .route("/orders/{id}/settle", post(retry_settlement))
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "At least one item is required"), nested)]
    pub items: Vec<OrderItemRequest>,
    #[validate(nested)]
    pub shipping_address: AddressRequest,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddressRequest {
    #[validate(length(min = 1, max = 200))]
    pub street: String,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(min = 2, max = 100))]
    pub country: String,
    pub phone: Option<String>,
    #[validate(length(max = 500))]
    pub instructions: Option<String>,
}

impl From<AddressRequest> for ShippingAddress {
    fn from(address: AddressRequest) -> Self {
        ShippingAddress {
            street: address.street,
            city: address.city,
            country: address.country,
            phone: address.phone.map(Masked::new),
            instructions: address.instructions,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub delivery_agent_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct DeliveryStatusRequest {
    pub status: DeliveryStatus,
    pub proof: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProofRequest {
    #[validate(length(min = 1, max = 2000))]
    pub proof: String,
}

// ============================================================================
// Handlers
// ============================================================================

async fn create_order(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    AppJson(request): AppJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    actor.require(Role::Buyer)?;
    request.validate()?;

    let order = state
        .services
        .checkout
        .place_order(
            actor.user_id,
            PlaceOrder {
                items: request
                    .items
                    .into_iter()
                    .map(|i| CartItem { product_id: i.product_id, quantity: i.quantity })
                    .collect(),
                shipping_address: request.shipping_address.into(),
                payment_method: request.payment_method,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(order)))
}

async fn list_orders(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(state.services.orders.list(&actor).await?))
}

async fn get_order(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.services.orders.get(&actor, id).await?))
}

async fn update_status(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    AppJson(request): AppJson<StatusRequest>,
) -> Result<Json<Order>, AppError> {
    let order = state.services.orders.update_status(&actor, id, request.status).await?;
    Ok(Json(order))
}

async fn confirm_payment(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    let order = state.services.checkout.confirm_payment(&actor, id).await?;
    Ok(Json(order))
}

async fn assign_agent(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    AppJson(request): AppJson<AssignRequest>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .services
        .orders
        .assign_agent(&actor, id, request.delivery_agent_id)
        .await?;
    Ok(Json(order))
}

async fn update_delivery_status(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    AppJson(request): AppJson<DeliveryStatusRequest>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .services
        .orders
        .update_delivery(&actor, id, request.status, request.proof)
        .await?;
    Ok(Json(order))
}

async fn attach_proof(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    AppJson(request): AppJson<ProofRequest>,
) -> Result<Json<Order>, AppError> {
    request.validate()?;
    let order = state.services.orders.attach_proof(&actor, id, request.proof).await?;
    Ok(Json(order))
}

async fn retry_settlement(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    let order = state.services.orders.retry_settlement(&actor, id).await?;
    Ok(Json(order))
}
