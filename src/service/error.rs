// service/error.rs
use axum::http::StatusCode;
use thiserror::Error;
use uuid::Uuid;

use crate::{db::ledgerdb::StoreError, error::HttpError, models::usermodel::UserRole};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Work order {0} not found")]
    WorkOrderNotFound(Uuid),

    #[error("Technician {0} not found")]
    TechnicianNotFound(Uuid),

    #[error("Payment {0} not found")]
    PaymentNotFound(Uuid),

    #[error("Wallet not found for {0}")]
    WalletNotFound(Uuid),

    #[error("Payout request {0} not found")]
    PayoutRequestNotFound(Uuid),

    #[error("Payout {0} not found")]
    PayoutNotFound(Uuid),

    #[error("User {0} does not own {1}")]
    Ownership(Uuid, Uuid),

    #[error("Role {0:?} may not {1}")]
    PermissionDenied(UserRole, &'static str),

    #[error("State conflict: {0}")]
    StateConflict(String),

    #[error("Response deadline for work order {0} has expired")]
    DeadlineExpired(Uuid),

    #[error("Technician {0} is blocked")]
    TechnicianBlocked(Uuid),

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: i64, available: i64 },

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Ledger corruption: {0}")]
    LedgerCorruption(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Audit error: {0}")]
    Audit(String),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,

            ServiceError::WorkOrderNotFound(_)
            | ServiceError::TechnicianNotFound(_)
            | ServiceError::PaymentNotFound(_)
            | ServiceError::WalletNotFound(_)
            | ServiceError::PayoutRequestNotFound(_)
            | ServiceError::PayoutNotFound(_) => StatusCode::NOT_FOUND,

            ServiceError::Ownership(_, _) | ServiceError::PermissionDenied(_, _) => {
                StatusCode::FORBIDDEN
            }

            ServiceError::StateConflict(_)
            | ServiceError::DeadlineExpired(_)
            | ServiceError::TechnicianBlocked(_)
            | ServiceError::Duplicate(_) => StatusCode::CONFLICT,

            ServiceError::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,

            ServiceError::LedgerCorruption(_)
            | ServiceError::Store(_)
            | ServiceError::Notification(_)
            | ServiceError::Audit(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Expected, typed failures that the caller should not retry.
    pub fn is_expected(&self) -> bool {
        self.status_code() != StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl From<ServiceError> for HttpError {
    fn from(error: ServiceError) -> Self {
        let status = error.status_code();

        if error.is_expected() {
            return HttpError::new(error.to_string(), status);
        }

        // Internal details stay in the logs.
        tracing::error!("Internal error: {}", error);
        HttpError::server_error("Internal server error, please try again".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_are_opaque_over_http() {
        let error = ServiceError::LedgerCorruption("wallet x is negative".to_string());
        let http: HttpError = error.into();

        assert_eq!(http.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!http.message.contains("negative"));
    }

    #[test]
    fn insufficient_funds_maps_to_payment_required() {
        let error = ServiceError::InsufficientFunds { required: 100, available: 50 };
        assert_eq!(error.status_code(), StatusCode::PAYMENT_REQUIRED);
        assert!(error.is_expected());
    }
}
