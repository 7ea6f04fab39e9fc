use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, put},
    Extension, Json, Router,
};
use marche_core::identity::Actor;
use marche_shared::{PaymentMethod, Role};
use marche_subscription::{Plan, SellerInfo, Subscription};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::extract::AppJson;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/subscription", get(get_subscription).post(subscribe))
        .route("/subscription/renew", put(renew))
        .route("/subscription/change-plan", put(change_plan))
        .route("/subscription/cancel", put(cancel))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResponse {
    pub subscription: Option<Subscription>,
    pub seller_info: SellerInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    pub plan: Plan,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub auto_renew: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewRequest {
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePlanRequest {
    pub plan: Plan,
    pub payment_method: PaymentMethod,
}

async fn get_subscription(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<SubscriptionResponse>, AppError> {
    actor.require(Role::Seller)?;
    let subscriptions = &state.services.subscriptions;
    let subscription = match subscriptions.current(actor.user_id).await {
        Ok(s) => Some(s),
        Err(marche_core::CoreError::NotFound { .. }) => None,
        Err(e) => return Err(e.into()),
    };
    let seller_info = subscriptions.seller_info(actor.user_id).await?;
    Ok(Json(SubscriptionResponse { subscription, seller_info }))
}

async fn subscribe(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    AppJson(request): AppJson<SubscribeRequest>,
) -> Result<(StatusCode, Json<Subscription>), AppError> {
    actor.require(Role::Seller)?;
    let subscription = state
        .services
        .subscriptions
        .subscribe(actor.user_id, request.plan, request.payment_method, request.auto_renew)
        .await?;
    Ok((StatusCode::CREATED, Json(subscription)))
}

async fn renew(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    AppJson(request): AppJson<RenewRequest>,
) -> Result<Json<Subscription>, AppError> {
    actor.require(Role::Seller)?;
    let subscription = state
        .services
        .subscriptions
        .renew(actor.user_id, request.payment_method)
        .await?;
    Ok(Json(subscription))
}

async fn change_plan(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    AppJson(request): AppJson<ChangePlanRequest>,
) -> Result<Json<Subscription>, AppError> {
    actor.require(Role::Seller)?;
    let subscription = state
        .services
        .subscriptions
        .change_plan(actor.user_id, request.plan, request.payment_method)
        .await?;
    Ok(Json(subscription))
}

async fn cancel(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Subscription>, AppError> {
    actor.require(Role::Seller)?;
    Ok(Json(state.services.subscriptions.cancel(actor.user_id).await?))
}
