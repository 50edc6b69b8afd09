//! Error types for the record cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;
use crate::store::StoreError;

// == Record Error Enum ==
/// Unified error type for the cache, gate and HTTP layers.
#[derive(Error, Debug)]
pub enum RecordError {
    /// No record exists for the key and auto-creation was not requested
    #[error("Record not found: {0}")]
    NotFound(String),

    /// The record store failed or timed out
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Malformed configuration or gate policy
    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    /// The stored revision moved under a write
    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    /// Action name has no registered definition
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<StoreError> for RecordError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { .. } | StoreError::Missing(_) => {
                RecordError::ConcurrentModification(err.to_string())
            }
            other => RecordError::StoreUnavailable(other.to_string()),
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for RecordError {
    fn into_response(self) -> Response {
        let status = match &self {
            RecordError::NotFound(_) | RecordError::UnknownAction(_) => StatusCode::NOT_FOUND,
            RecordError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            RecordError::ConcurrentModification(_) => StatusCode::CONFLICT,
            RecordError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            RecordError::InvalidPolicy(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the record cache.
pub type Result<T> = std::result::Result<T, RecordError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_maps_to_concurrent_modification() {
        let err: RecordError = StoreError::Conflict {
            key: "u1".to_string(),
            expected: 2,
            found: 3,
        }
        .into();
        assert!(matches!(err, RecordError::ConcurrentModification(_)));
    }

    #[test]
    fn test_unavailable_maps_to_store_unavailable() {
        let err: RecordError = StoreError::Unavailable("down".to_string()).into();
        assert!(matches!(err, RecordError::StoreUnavailable(_)));
        assert!(err.to_string().contains("down"));
    }

    #[test]
    fn test_status_codes() {
        let resp = RecordError::NotFound("k".into()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = RecordError::StoreUnavailable("x".into()).into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        let resp = RecordError::InvalidRequest("x".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
