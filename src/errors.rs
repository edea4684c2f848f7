use crate::money::MoneyError;
use http::StatusCode;
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};

/// Serializable error envelope handed to callers.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Status category (e.g., "Not Found", "Bad Request", "Conflict")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// RFC 3339 timestamp when the error was produced
    pub timestamp: String,
}

impl From<&ServiceError> for ErrorResponse {
    fn from(error: &ServiceError) -> Self {
        let status = error.status_code();
        Self {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: error.response_message(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
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

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl From<MoneyError> for ServiceError {
    fn from(err: MoneyError) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Returns the outward status for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidState(_) => StatusCode::CONFLICT,
            Self::DatabaseError(_) | Self::InternalError(_) | Self::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the error message suitable for callers.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::InternalError(_) | Self::Other(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }

    /// Persistence failures may succeed on a later attempt; caller mistakes never will.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::DatabaseError(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn db_failure(message: &str) -> ServiceError {
        ServiceError::DatabaseError(DbErr::Custom(message.to_string()))
    }

    #[rstest]
    #[case(ServiceError::ValidationError("x".into()), StatusCode::BAD_REQUEST)]
    #[case(ServiceError::NotFound("x".into()), StatusCode::NOT_FOUND)]
    #[case(ServiceError::InvalidState("x".into()), StatusCode::CONFLICT)]
    #[case(db_failure("connection reset"), StatusCode::INTERNAL_SERVER_ERROR)]
    #[case(ServiceError::InternalError("x".into()), StatusCode::INTERNAL_SERVER_ERROR)]
    fn service_error_status_code_mapping(#[case] error: ServiceError, #[case] status: StatusCode) {
        assert_eq!(error.status_code(), status);
    }

    #[test]
    fn service_error_response_message_hides_internal_details() {
        assert_eq!(
            db_failure("password=secret host=db").response_message(),
            "Database error"
        );
        assert_eq!(
            ServiceError::InternalError("corrupt row".into()).response_message(),
            "Internal server error"
        );

        // User-facing errors SHOULD include the actual message
        assert_eq!(
            ServiceError::NotFound("Order not found".into()).response_message(),
            "Not found: Order not found"
        );
        assert_eq!(
            ServiceError::InvalidState("already removed".into()).response_message(),
            "Invalid state: already removed"
        );
    }

    #[test]
    fn only_persistence_failures_are_retryable() {
        assert!(db_failure("timeout").is_retryable());
        assert!(!ServiceError::ValidationError("bad".into()).is_retryable());
        assert!(!ServiceError::NotFound("gone".into()).is_retryable());
        assert!(!ServiceError::InvalidState("de-active".into()).is_retryable());
    }

    #[test]
    fn money_errors_are_validation_errors() {
        let err: ServiceError = MoneyError::InvalidQuantity(0).into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn error_response_uses_canonical_reason() {
        let response = ErrorResponse::from(&ServiceError::InvalidState("nope".into()));
        assert_eq!(response.error, "Conflict");
        assert_eq!(response.message, "Invalid state: nope");
    }
}
