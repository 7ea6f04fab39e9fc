use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use marche_core::identity::Actor;
use marche_shared::{PaymentMethod, Role};
use marche_wallet::{Transaction, Wallet};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::extract::AppJson;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/wallet", get(list_wallets))
        .route("/wallet/deposit", post(deposit))
        .route("/wallet/withdraw", post(withdraw))
        .route("/wallet/transfer", post(transfer))
        .route("/wallet/{wallet_type}", get(get_wallet))
        .route("/wallet/{wallet_type}/transactions", get(list_transactions))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletResponse {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub wallet_type: Role,
    pub balance: i64,
    pub currency: String,
    pub updated_at: DateTime<Utc>,
}

impl From<Wallet> for WalletResponse {
    fn from(wallet: Wallet) -> Self {
        Self {
            id: wallet.id,
            owner_id: wallet.owner_id,
            wallet_type: wallet.role,
            balance: wallet.balance,
            currency: wallet.currency,
            updated_at: wallet.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MoneyRequest {
    #[validate(range(min = 1, message = "Amount must be greater than zero"))]
    pub amount: i64,
    pub wallet_type: Role,
    pub payment_method: PaymentMethod,
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    #[validate(range(min = 1, message = "Amount must be greater than zero"))]
    pub amount: i64,
    pub from_wallet_type: Role,
    pub to_wallet_type: Role,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResponse {
    pub from_wallet: WalletResponse,
    pub to_wallet: WalletResponse,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

async fn list_wallets(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<WalletResponse>>, AppError> {
    let wallets = state.services.wallets.wallets_of(actor.user_id).await?;
    Ok(Json(wallets.into_iter().map(WalletResponse::from).collect()))
}

async fn get_wallet(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(wallet_type): Path<Role>,
) -> Result<Json<WalletResponse>, AppError> {
    let wallet = state.services.wallets.wallet(actor.user_id, wallet_type).await?;
    Ok(Json(wallet.into()))
}

async fn list_transactions(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(wallet_type): Path<Role>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    let transactions = state
        .services
        .wallets
        .transactions(actor.user_id, wallet_type, query.limit)
        .await?;
    Ok(Json(transactions))
}

async fn deposit(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    AppJson(request): AppJson<MoneyRequest>,
) -> Result<Json<WalletResponse>, AppError> {
    request.validate()?;
    let wallet = state
        .services
        .wallets
        .deposit(
            actor.user_id,
            request.wallet_type,
            request.amount,
            request.payment_method,
            request.description,
        )
        .await?;
    Ok(Json(wallet.into()))
}

async fn withdraw(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    AppJson(request): AppJson<MoneyRequest>,
) -> Result<Json<WalletResponse>, AppError> {
    request.validate()?;
    let wallet = state
        .services
        .wallets
        .withdraw(
            actor.user_id,
            request.wallet_type,
            request.amount,
            request.payment_method,
            request.description,
        )
        .await?;
    Ok(Json(wallet.into()))
}

async fn transfer(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    AppJson(request): AppJson<TransferRequest>,
) -> Result<Json<TransferResponse>, AppError> {
    request.validate()?;
    let (from, to) = state
        .services
        .wallets
        .transfer(actor.user_id, request.from_wallet_type, request.to_wallet_type, request.amount)
        .await?;
    Ok(Json(TransferResponse {
        from_wallet: from.into(),
        to_wallet: to.into(),
    }))
}
