// dtos/payoutdtos.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{commissionmodel::CommissionStatus, paymentmodel::ReviewDecision};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct EarlyPayoutRequestDto {
    #[validate(range(min = 1, message = "Amount must be positive"))]
    pub amount: i64,

    #[validate(length(min = 3, max = 500, message = "Reason must be between 3 and 500 characters"))]
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReviewPayoutRequestDto {
    pub decision: ReviewDecision,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CommissionQueryDto {
    pub technician_id: Option<Uuid>,
    pub status: Option<CommissionStatus>,

    #[validate(range(min = 1, message = "Page starts at 1"))]
    pub page: Option<u32>,

    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<u32>,
}

impl CommissionQueryDto {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1)
    }

    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(20)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page().saturating_sub(1)) * i64::from(self.limit())
    }
}

#[derive(Debug, Deserialize)]
pub struct PayoutRequestQueryDto {
    pub technician_id: Option<Uuid>,
}
