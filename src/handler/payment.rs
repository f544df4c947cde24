// handler/payment.rs
use std::sync::Arc;

use axum::{extract::Path, response::IntoResponse, routing::put, Extension, Json, Router};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{commondtos::ApiResponse, paymentdtos::VerifyPaymentDto},
    error::HttpError,
    middleware::JWTAuthMiddeware,
    models::paymentmodel::ReviewDecision,
    AppState,
};

pub fn payment_handler() -> Router {
    Router::new().route("/:payment_id/verify", put(verify_payment))
}

pub async fn verify_payment(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(payment_id): Path<Uuid>,
    Json(body): Json<VerifyPaymentDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let outcome = app_state
        .payment_service
        .verify(&auth.actor, payment_id, body.decision, body.reason)
        .await?;

    let message = match body.decision {
        ReviewDecision::Approve => "Payment verified successfully",
        ReviewDecision::Reject => "Payment rejected",
    };

    Ok(Json(ApiResponse::success(message, outcome)))
}
