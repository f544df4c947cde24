// handler/wallet.rs
use std::sync::Arc;

use axum::{extract::Path, response::IntoResponse, routing::get, Extension, Json, Router};
use uuid::Uuid;

use crate::{dtos::commondtos::ApiResponse, error::HttpError, middleware::JWTAuthMiddeware, AppState};

pub fn wallet_handler() -> Router {
    Router::new()
        .route("/:technician_id", get(get_wallet_balance))
        .route("/:technician_id/transactions", get(get_wallet_transactions))
        .route("/:technician_id/integrity", get(verify_wallet_integrity))
}

pub async fn get_wallet_balance(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(technician_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let balance = app_state
        .wallet_service
        .get_balance(&auth.actor, technician_id)
        .await?;

    Ok(Json(ApiResponse::success("Wallet balance retrieved successfully", balance)))
}

pub async fn get_wallet_transactions(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(technician_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let transactions = app_state
        .wallet_service
        .list_transactions(&auth.actor, technician_id)
        .await?;

    Ok(Json(ApiResponse::success("Wallet transactions retrieved successfully", transactions)))
}

pub async fn verify_wallet_integrity(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(technician_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let report = app_state
        .wallet_service
        .verify_integrity(&auth.actor, technician_id)
        .await?;

    Ok(Json(ApiResponse::success("Wallet ledger is consistent", report)))
}
