// handler/work_order.rs
use std::sync::Arc;

use axum::{
    extract::Path,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{commondtos::ApiResponse, paymentdtos::SubmitPaymentProofDto, workorderdtos::*},
    error::HttpError,
    middleware::JWTAuthMiddeware,
    models::workordermodel::{GeoPoint, RespondAction},
    service::{payment_service::PaymentProof, work_order_service::CompletionReport},
    AppState,
};

pub fn work_order_handler() -> Router {
    Router::new()
        .route("/", post(create_work_order))
        .route("/:work_order_id", get(get_work_order))
        .route("/:work_order_id/assign", put(assign_work_order))
        .route("/:work_order_id/respond", put(respond_to_work_order))
        .route("/:work_order_id/start", put(start_work_order))
        .route("/:work_order_id/complete", put(complete_work_order))
        .route("/:work_order_id/cancel", put(cancel_work_order))
        .route("/:work_order_id/payments", post(submit_payment_proof))
}

pub async fn create_work_order(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<CreateWorkOrderDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let work_order = app_state
        .work_order_service
        .create(&auth.actor, body.customer_id, body.summary, body.scheduled_at)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Work order created successfully", work_order)),
    ))
}

pub async fn get_work_order(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(work_order_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let work_order = app_state
        .work_order_service
        .get(&auth.actor, work_order_id)
        .await?;

    Ok(Json(ApiResponse::success("Work order retrieved successfully", work_order)))
}

pub async fn assign_work_order(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(work_order_id): Path<Uuid>,
    Json(body): Json<AssignWorkOrderDto>,
) -> Result<impl IntoResponse, HttpError> {
    let work_order = app_state
        .work_order_service
        .assign(&auth.actor, work_order_id, body.technician_id)
        .await?;

    Ok(Json(ApiResponse::success("Work order assigned successfully", work_order)))
}

pub async fn respond_to_work_order(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(work_order_id): Path<Uuid>,
    Json(body): Json<RespondWorkOrderDto>,
) -> Result<impl IntoResponse, HttpError> {
    let work_order = app_state
        .work_order_service
        .respond(&auth.actor, work_order_id, body.action)
        .await?;

    let message = match body.action {
        RespondAction::Accept => "Work order accepted",
        RespondAction::Decline => "Work order declined",
    };

    Ok(Json(ApiResponse::success(message, work_order)))
}

pub async fn start_work_order(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(work_order_id): Path<Uuid>,
    Json(body): Json<StartWorkOrderDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let location = GeoPoint {
        latitude: body.latitude,
        longitude: body.longitude,
    };

    let work_order = app_state
        .work_order_service
        .start(&auth.actor, work_order_id, location)
        .await?;

    Ok(Json(ApiResponse::success("Work order started", work_order)))
}

pub async fn complete_work_order(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(work_order_id): Path<Uuid>,
    Json(body): Json<CompleteWorkOrderDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let report = CompletionReport {
        notes: body.notes,
        photos: body.photos,
        materials: body.materials,
    };

    let work_order = app_state
        .work_order_service
        .complete(&auth.actor, work_order_id, report)
        .await?;

    Ok(Json(ApiResponse::success("Work order completed, awaiting payment", work_order)))
}

pub async fn cancel_work_order(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(work_order_id): Path<Uuid>,
    Json(body): Json<CancelWorkOrderDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let work_order = app_state
        .work_order_service
        .cancel(&auth.actor, work_order_id, body.reason)
        .await?;

    Ok(Json(ApiResponse::success("Work order cancelled", work_order)))
}

pub async fn submit_payment_proof(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(work_order_id): Path<Uuid>,
    Json(body): Json<SubmitPaymentProofDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let proof = PaymentProof {
        amount: body.amount,
        method: body.method,
        proof_ref: body.proof_ref,
    };

    let payment = app_state
        .payment_service
        .submit_proof(&auth.actor, work_order_id, proof)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Payment proof submitted for verification", payment)),
    ))
}
