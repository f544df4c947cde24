// models/payoutmodel.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "payout_kind", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayoutKind {
    Weekly,
    Early,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "payout_status", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayoutStatus {
    Scheduled,
    Completed,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "payout_request_status", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayoutRequestStatus {
    Pending,
    Approved,
    Rejected,
}

/// A settlement batch. `total_amount` is the sum of the linked commissions;
/// `disbursed_amount` is what left the wallet.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct Payout {
    pub id: Uuid,
    pub technician_id: Uuid,
    pub kind: PayoutKind,
    pub total_amount: i64,
    pub disbursed_amount: i64,
    pub status: PayoutStatus,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct PayoutRequest {
    pub id: Uuid,
    pub technician_id: Uuid,
    pub amount: i64,
    pub reason: String,
    pub status: PayoutRequestStatus,
    pub reviewed_by: Option<Uuid>,
    pub payout_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}
