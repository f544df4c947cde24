// handler/payout.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{
        commondtos::{ApiResponse, PaginatedResponse},
        payoutdtos::*,
    },
    error::HttpError,
    middleware::{role_check, JWTAuthMiddeware},
    models::{paymentmodel::ReviewDecision, usermodel::UserRole},
    AppState,
};

pub fn payout_handler() -> Router {
    let admin_routes = Router::new()
        .route("/weekly-batch", post(run_weekly_batch))
        .route("/:payout_id/process", put(process_payout_batch))
        .route("/requests/:request_id/review", put(review_early_payout))
        .layer(middleware::from_fn(|req, next| {
            role_check(req, next, vec![UserRole::Admin])
        }));

    Router::new()
        .route("/requests", post(request_early_payout).get(list_payout_requests))
        .route("/:payout_id", get(get_payout))
        .merge(admin_routes)
}

pub fn commission_handler() -> Router {
    Router::new().route("/", get(list_commissions))
}

pub async fn request_early_payout(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<EarlyPayoutRequestDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let request = app_state
        .payout_service
        .request_early_payout(&auth.actor, body.amount, body.reason)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Early payout requested", request)),
    ))
}

pub async fn list_payout_requests(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Query(params): Query<PayoutRequestQueryDto>,
) -> Result<impl IntoResponse, HttpError> {
    let requests = app_state
        .payout_service
        .list_payout_requests(&auth.actor, params.technician_id)
        .await?;

    Ok(Json(ApiResponse::success("Payout requests retrieved successfully", requests)))
}

pub async fn review_early_payout(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(request_id): Path<Uuid>,
    Json(body): Json<ReviewPayoutRequestDto>,
) -> Result<impl IntoResponse, HttpError> {
    let review = app_state
        .payout_service
        .review_early_payout(&auth.actor, request_id, body.decision)
        .await?;

    let message = match body.decision {
        ReviewDecision::Approve => "Early payout approved",
        ReviewDecision::Reject => "Early payout rejected",
    };

    Ok(Json(ApiResponse::success(message, review)))
}

pub async fn run_weekly_batch(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let report = app_state.payout_service.run_weekly_batch(&auth.actor).await?;

    Ok(Json(ApiResponse::success("Weekly payout batch completed", report)))
}

pub async fn process_payout_batch(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(payout_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let detail = app_state
        .payout_service
        .process_batch(&auth.actor, payout_id)
        .await?;

    Ok(Json(ApiResponse::success("Payout completed", detail)))
}

pub async fn get_payout(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(payout_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let detail = app_state.payout_service.get_payout(&auth.actor, payout_id).await?;

    Ok(Json(ApiResponse::success("Payout retrieved successfully", detail)))
}

pub async fn list_commissions(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Query(params): Query<CommissionQueryDto>,
) -> Result<impl IntoResponse, HttpError> {
    params.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let page = app_state
        .payout_service
        .list_commissions(
            &auth.actor,
            params.technician_id,
            params.status,
            i64::from(params.limit()),
            params.offset(),
        )
        .await?;

    Ok(Json(PaginatedResponse::new(
        page.commissions,
        page.total,
        params.page(),
        params.limit(),
    )))
}
