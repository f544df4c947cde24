// dtos/workorderdtos.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    technicianmodel::RateProfile,
    workordermodel::{MaterialLine, RespondAction},
};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateWorkOrderDto {
    pub customer_id: Uuid,

    #[validate(length(min = 3, max = 500, message = "Summary must be between 3 and 500 characters"))]
    pub summary: String,

    pub scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AssignWorkOrderDto {
    pub technician_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RespondWorkOrderDto {
    pub action: RespondAction,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct StartWorkOrderDto {
    #[validate(range(min = -90.0, max = 90.0, message = "Latitude must be between -90 and 90"))]
    pub latitude: f64,

    #[validate(range(min = -180.0, max = 180.0, message = "Longitude must be between -180 and 180"))]
    pub longitude: f64,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CompleteWorkOrderDto {
    #[validate(length(max = 2000, message = "Notes cannot exceed 2000 characters"))]
    pub notes: Option<String>,

    #[validate(length(max = 20, message = "At most 20 photos can be attached"))]
    #[serde(default)]
    pub photos: Vec<String>,

    #[serde(default)]
    pub materials: Vec<MaterialLine>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CancelWorkOrderDto {
    #[validate(length(min = 3, max = 500, message = "Reason must be between 3 and 500 characters"))]
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpsertTechnicianDto {
    pub profile: RateProfile,
    #[serde(default)]
    pub is_blocked: bool,
}
