use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use marche_catalog::Product;
use marche_core::identity::Actor;
use marche_core::services::NewProduct;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::extract::AppJson;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/products", post(create_product))
        .route("/products/{id}", get(get_product))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(range(min = 1, message = "Price must be greater than zero"))]
    pub price_xof: i64,
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: i32,
}

async fn create_product(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    AppJson(request): AppJson<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    request.validate()?;
    let product = state
        .services
        .catalog
        .create_product(
            &actor,
            NewProduct {
                name: request.name,
                description: request.description,
                price_xof: request.price_xof,
                stock: request.stock,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Product>, AppError> {
    Ok(Json(state.services.catalog.get_product(id).await?))
}
