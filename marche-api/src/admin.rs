use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use marche_core::identity::{Actor, User};
use marche_shared::Role;
use marche_subscription::Subscription;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::issue_token;
use crate::error::AppError;
use crate::extract::AppJson;
use crate::state::AppState;

const DEFAULT_EXPIRY_WINDOW_DAYS: i64 = 7;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/users", post(create_user))
        .route("/admin/users/{id}/roles", post(grant_role))
        .route("/admin/subscriptions/expiring", get(expiring_subscriptions))
        .route("/admin/subscriptions/expire", post(expire_subscriptions))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 100, message = "Display name is required"))]
    pub display_name: String,
    #[serde(default)]
    pub roles: Vec<Role>,
}

#[derive(Debug, Serialize)]
pub struct CreateUserResponse {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct GrantRoleRequest {
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct GrantRoleResponse {
    pub user: User,
    /// Fresh token carrying the new role.
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ExpiringQuery {
    pub days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ExpireResponse {
    pub expired: usize,
    pub subscriptions: Vec<Subscription>,
}

async fn create_user(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    AppJson(request): AppJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<CreateUserResponse>), AppError> {
    actor.require(Role::Admin)?;
    request.validate()?;

    let user = state.services.users.register(request.display_name, request.roles).await?;
    let token = issue_token(&state.auth, &user)?;
    tracing::info!("Admin {} registered user {}", actor.user_id, user.id);
    Ok((StatusCode::CREATED, Json(CreateUserResponse { user, token })))
}

async fn grant_role(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    AppJson(request): AppJson<GrantRoleRequest>,
) -> Result<Json<GrantRoleResponse>, AppError> {
    actor.require(Role::Admin)?;
    let user = state.services.users.grant_role(id, request.role).await?;
    let token = issue_token(&state.auth, &user)?;
    Ok(Json(GrantRoleResponse { user, token }))
}

async fn expiring_subscriptions(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<ExpiringQuery>,
) -> Result<Json<Vec<Subscription>>, AppError> {
    actor.require(Role::Admin)?;
    let days = query.days.unwrap_or(DEFAULT_EXPIRY_WINDOW_DAYS);
    Ok(Json(state.services.subscriptions.find_expiring(days).await?))
}

async fn expire_subscriptions(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<ExpireResponse>, AppError> {
    actor.require(Role::Admin)?;
    let subscriptions = state.services.subscriptions.expire_lapsed().await?;
    Ok(Json(ExpireResponse {
        expired: subscriptions.len(),
        subscriptions,
    }))
}
