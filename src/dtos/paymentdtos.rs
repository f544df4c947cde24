// dtos/paymentdtos.rs
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::paymentmodel::{PaymentMethod, ReviewDecision};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct SubmitPaymentProofDto {
    #[validate(range(min = 1, message = "Amount must be positive"))]
    pub amount: i64,

    pub method: PaymentMethod,

    #[validate(length(min = 1, max = 500, message = "Proof reference is required"))]
    pub proof_ref: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct VerifyPaymentDto {
    pub decision: ReviewDecision,

    #[validate(length(max = 500, message = "Reason cannot exceed 500 characters"))]
    pub reason: Option<String>,
}
