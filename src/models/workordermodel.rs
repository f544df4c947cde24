// models/workordermodel.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "work_order_status", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkOrderStatus {
    Unassigned,
    Assigned,
    Accepted,
    InProgress,
    CompletedPendingPayment,
    PaidVerified,
    Cancelled,
}

impl WorkOrderStatus {
    pub fn to_str(&self) -> &str {
        match self {
            WorkOrderStatus::Unassigned => "unassigned",
            WorkOrderStatus::Assigned => "assigned",
            WorkOrderStatus::Accepted => "accepted",
            WorkOrderStatus::InProgress => "in_progress",
            WorkOrderStatus::CompletedPendingPayment => "completed_pending_payment",
            WorkOrderStatus::PaidVerified => "paid_verified",
            WorkOrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkOrderStatus::PaidVerified | WorkOrderStatus::Cancelled)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RespondAction {
    Accept,
    Decline,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MaterialLine {
    pub name: String,
    pub quantity: f64,
    pub unit: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct WorkOrder {
    pub id: Uuid,
    pub number: String,
    pub status: WorkOrderStatus,
    pub customer_id: Uuid,
    pub technician_id: Option<Uuid>,
    pub dispatcher_id: Uuid,
    pub summary: String,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub response_deadline: Option<DateTime<Utc>>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub check_in_latitude: Option<f64>,
    pub check_in_longitude: Option<f64>,
    pub completion_notes: Option<String>,
    pub completion_photos: Vec<String>,
    pub materials: Json<Vec<MaterialLine>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkOrder {
    pub fn new(
        customer_id: Uuid,
        dispatcher_id: Uuid,
        summary: String,
        scheduled_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        let id = Uuid::new_v4();
        let short = id.simple().to_string()[..6].to_uppercase();

        Self {
            id,
            number: format!("WO-{}-{}", now.format("%Y%m%d"), short),
            status: WorkOrderStatus::Unassigned,
            customer_id,
            technician_id: None,
            dispatcher_id,
            summary,
            scheduled_at,
            assigned_at: None,
            response_deadline: None,
            accepted_at: None,
            started_at: None,
            completed_at: None,
            cancelled_at: None,
            cancel_reason: None,
            check_in_latitude: None,
            check_in_longitude: None,
            completion_notes: None,
            completion_photos: Vec::new(),
            materials: Json(Vec::new()),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_owned_by(&self, technician_id: Uuid) -> bool {
        self.technician_id == Some(technician_id)
    }
}
