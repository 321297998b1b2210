//! Engine error type
//!
//! Every lifecycle operation returns [`ApiError`]. Each variant belongs to one
//! [`ErrorKind`], and the HTTP layer derives status codes and stable error
//! codes from it.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::gateway::GatewayError;
use crate::store::StoreError;

/// Error taxonomy surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Conflict,
    Unauthorized,
    Gateway,
    TransactionFailure,
}

/// Lifecycle engine error
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Tenant already has an active booking")]
    ActiveBookingExists,

    #[error("Booking already has an open bill")]
    OpenBillExists,

    #[error("Booking is already cancelled")]
    AlreadyCancelled,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Payment gateway error: {0}")]
    Gateway(GatewayError),

    #[error("Transaction failed: {0}")]
    Transaction(StoreError),
}

/// JSON error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

/// Error details in the response
#[derive(Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        ApiError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::NotFound { .. } => ErrorKind::NotFound,
            ApiError::Validation(_) | ApiError::InvalidDate(_) => ErrorKind::Validation,
            ApiError::ActiveBookingExists
            | ApiError::OpenBillExists
            | ApiError::AlreadyCancelled
            | ApiError::Conflict(_) => ErrorKind::Conflict,
            ApiError::Unauthorized(_) => ErrorKind::Unauthorized,
            ApiError::Gateway(_) => ErrorKind::Gateway,
            ApiError::Transaction(_) => ErrorKind::TransactionFailure,
        }
    }

    /// Get the error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::NotFound { .. } => "NOT_FOUND",
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::InvalidDate(_) => "INVALID_DATE",
            ApiError::ActiveBookingExists => "ACTIVE_BOOKING_EXISTS",
            ApiError::OpenBillExists => "OPEN_BILL_EXISTS",
            ApiError::AlreadyCancelled => "ALREADY_CANCELLED",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Gateway(_) => "GATEWAY_ERROR",
            ApiError::Transaction(_) => "TRANSACTION_FAILURE",
        }
    }

    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Unauthorized => StatusCode::FORBIDDEN,
            ErrorKind::Gateway => StatusCode::BAD_GATEWAY,
            ErrorKind::TransactionFailure => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();

        match self.kind() {
            ErrorKind::TransactionFailure | ErrorKind::Gateway => {
                tracing::error!(error = %message, code = %error_code, "Server error occurred");
            }
            _ => {
                tracing::debug!(error = %message, code = %error_code, "Client error occurred");
            }
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code: error_code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(constraint) => ApiError::Conflict(constraint),
            other => ApiError::Transaction(other),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::InvalidSignature => {
                ApiError::Unauthorized("notification signature mismatch".to_string())
            }
            GatewayError::MalformedPayload(msg) => ApiError::Validation(msg),
            other => ApiError::Gateway(other),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::Validation(err.to_string())
    }
}

/// Result type alias using ApiError
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(ApiError::not_found("booking", "x").kind(), ErrorKind::NotFound);
        assert_eq!(
            ApiError::InvalidDate("01/02/2026".to_string()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(ApiError::ActiveBookingExists.kind(), ErrorKind::Conflict);
        assert_eq!(ApiError::OpenBillExists.kind(), ErrorKind::Conflict);
        assert_eq!(ApiError::AlreadyCancelled.kind(), ErrorKind::Conflict);
        assert_eq!(
            ApiError::Gateway(GatewayError::NotConfigured).kind(),
            ErrorKind::Gateway
        );
    }

    #[test]
    fn test_store_conflict_maps_to_conflict() {
        let err: ApiError = StoreError::Conflict("payments_one_open_per_booking".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err: ApiError = StoreError::Unavailable("down".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::TransactionFailure);
    }

    #[test]
    fn test_gateway_auth_failures_are_not_gateway_errors() {
        let err: ApiError = GatewayError::InvalidSignature.into();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        let err: ApiError = GatewayError::MalformedPayload("missing order_id".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::not_found("room", "r1").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Unauthorized("not yours".to_string()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(ApiError::ActiveBookingExists.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::Transaction(StoreError::Unavailable("x".to_string())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ApiError::ActiveBookingExists.error_code(), "ACTIVE_BOOKING_EXISTS");
    }
}
