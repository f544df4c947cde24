// handler/technician.rs
use std::sync::Arc;

use axum::{extract::Path, response::IntoResponse, routing::put, Extension, Json, Router};
use uuid::Uuid;

use crate::{
    dtos::{commondtos::ApiResponse, workorderdtos::UpsertTechnicianDto},
    error::HttpError,
    middleware::JWTAuthMiddeware,
    AppState,
};

pub fn technician_handler() -> Router {
    Router::new().route("/:technician_id", put(upsert_technician))
}

pub async fn upsert_technician(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(technician_id): Path<Uuid>,
    Json(body): Json<UpsertTechnicianDto>,
) -> Result<impl IntoResponse, HttpError> {
    let technician = app_state
        .work_order_service
        .upsert_technician(&auth.actor, technician_id, body.profile, body.is_blocked)
        .await?;

    Ok(Json(ApiResponse::success("Technician saved successfully", technician)))
}
