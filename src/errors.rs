use sea_orm::error::{DbErr, SqlErr};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::stock_transfer::TransferStatus;

/// Serializable error payload for callers that expose the inventory core over
/// a transport. The core itself never picks a status code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code (e.g., "insufficient_stock")
    pub code: String,
    /// Human-readable error description
    pub message: String,
    /// Structured details for errors that carry data (quantities, states)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        DbErr,
    ),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid state: transfer {transfer_id} is {current}, expected {expected}")]
    InvalidState {
        transfer_id: Uuid,
        current: TransferStatus,
        expected: TransferStatus,
    },

    #[error(
        "Insufficient stock for variant {variant_id} at branch {branch_id}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        variant_id: Uuid,
        branch_id: Uuid,
        available: i32,
        requested: i32,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

pub trait IntoDbErr {
    fn into_db_err(self) -> DbErr;
}

impl IntoDbErr for DbErr {
    fn into_db_err(self) -> DbErr {
        self
    }
}

impl IntoDbErr for String {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self)
    }
}

impl IntoDbErr for &str {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self.to_string())
    }
}

impl ServiceError {
    /// Generic constructor that normalizes any supported database error input.
    pub fn db_error<E: IntoDbErr>(error: E) -> Self {
        ServiceError::DatabaseError(error.into_db_err())
    }

    pub fn insufficient_stock(variant_id: Uuid, branch_id: Uuid, available: i32, requested: i32) -> Self {
        ServiceError::InsufficientStock {
            variant_id,
            branch_id,
            available,
            requested,
        }
    }

    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ValidationError(_) => "validation_error",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::InvalidState { .. } => "invalid_state",
            Self::InsufficientStock { .. } => "insufficient_stock",
            Self::Conflict(_) => "conflict",
            Self::DatabaseError(_) | Self::InternalError(_) => "internal_error",
        }
    }

    /// True when the caller can fix the request; false for datastore or
    /// internal failures.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::DatabaseError(_) | Self::InternalError(_))
    }

    /// Returns the error message suitable for external callers.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::InternalError(_) => "Internal error".to_string(),
            _ => self.to_string(),
        }
    }
}

pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

impl From<&ServiceError> for ErrorResponse {
    fn from(error: &ServiceError) -> Self {
        let details = match error {
            ServiceError::InsufficientStock {
                variant_id,
                branch_id,
                available,
                requested,
            } => Some(serde_json::json!({
                "variant_id": variant_id,
                "branch_id": branch_id,
                "available": available,
                "requested": requested,
            })),
            ServiceError::InvalidState {
                transfer_id,
                current,
                expected,
            } => Some(serde_json::json!({
                "transfer_id": transfer_id,
                "current": current,
                "expected": expected,
            })),
            _ => None,
        };

        ErrorResponse {
            code: error.code().to_string(),
            message: error.response_message(),
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_error_code_mapping() {
        assert_eq!(ServiceError::NotFound("x".into()).code(), "not_found");
        assert_eq!(
            ServiceError::ValidationError("x".into()).code(),
            "validation_error"
        );
        assert_eq!(ServiceError::Forbidden("x".into()).code(), "forbidden");
        assert_eq!(ServiceError::Conflict("x".into()).code(), "conflict");
        assert_eq!(
            ServiceError::insufficient_stock(Uuid::nil(), Uuid::nil(), 1, 2).code(),
            "insufficient_stock"
        );
        assert_eq!(
            ServiceError::db_error("connection reset").code(),
            "internal_error"
        );
    }

    #[test]
    fn response_message_hides_internal_details() {
        assert_eq!(
            ServiceError::db_error("password=hunter2").response_message(),
            "Database error"
        );
        assert_eq!(
            ServiceError::InternalError("stack".into()).response_message(),
            "Internal error"
        );
        assert_eq!(
            ServiceError::NotFound("Transfer not found".into()).response_message(),
            "Not found: Transfer not found"
        );
    }

    #[test]
    fn client_errors_are_distinguished_from_internal() {
        assert!(ServiceError::Forbidden("x".into()).is_client_error());
        assert!(ServiceError::insufficient_stock(Uuid::nil(), Uuid::nil(), 0, 1).is_client_error());
        assert!(!ServiceError::InternalError("x".into()).is_client_error());
        assert!(!ServiceError::db_error("x").is_client_error());
    }

    #[test]
    fn insufficient_stock_carries_quantities() {
        let variant = Uuid::new_v4();
        let branch = Uuid::new_v4();
        let err = ServiceError::insufficient_stock(variant, branch, 10, 15);

        let message = err.to_string();
        assert!(message.contains("available 10"));
        assert!(message.contains("requested 15"));

        let body = ErrorResponse::from(&err);
        let details = body.details.expect("details");
        assert_eq!(details["available"], 10);
        assert_eq!(details["requested"], 15);
    }

    #[test]
    fn invalid_state_reports_current_and_expected() {
        let err = ServiceError::InvalidState {
            transfer_id: Uuid::nil(),
            current: TransferStatus::Completed,
            expected: TransferStatus::Pending,
        };
        let body = ErrorResponse::from(&err);
        assert_eq!(body.code, "invalid_state");
        let details = body.details.expect("details");
        assert_eq!(details["current"], "COMPLETED");
        assert_eq!(details["expected"], "PENDING");
    }
}
