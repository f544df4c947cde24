// models/commissionmodel.rs
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "commission_kind", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommissionKind {
    Commission,
    Bonus,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "commission_status", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommissionStatus {
    Earned,
    PendingPayout,
    Paid,
}

impl CommissionStatus {
    /// Position in the EARNED -> PENDING_PAYOUT -> PAID lifecycle.
    pub fn rank(&self) -> u8 {
        match self {
            CommissionStatus::Earned => 0,
            CommissionStatus::PendingPayout => 1,
            CommissionStatus::Paid => 2,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct Commission {
    pub id: Uuid,
    pub work_order_id: Uuid,
    pub technician_id: Uuid,
    pub payment_id: Uuid,
    pub kind: CommissionKind,
    pub rate: BigDecimal,
    pub amount: i64,
    pub status: CommissionStatus,
    /// Set when the amount was credited to the technician's wallet.
    pub walleted: bool,
    pub payout_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommissionFilter {
    pub technician_id: Option<Uuid>,
    pub status: Option<CommissionStatus>,
    pub limit: i64,
    pub offset: i64,
}
