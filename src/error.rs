//! Error types for the tiered cache
//!
//! Provides unified error handling using thiserror. Inside the engine these
//! errors never reach a caller of `get`; they surface only at configuration
//! time, as skipped tier writes, and at the HTTP boundary.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for the cache engine and server.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key or group not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration rejected before the engine was built
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Filesystem failure in the disk tier
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Value or index could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Blob could not be compressed or decompressed
    #[error("Compression error: {0}")]
    Compression(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::Config(_)
            | CacheError::Io(_)
            | CacheError::Serialization(_)
            | CacheError::Compression(_)
            | CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let response = CacheError::NotFound("k".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_invalid_request_maps_to_400() {
        let response = CacheError::InvalidRequest("empty key".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_io_error_converts() {
        let err: CacheError = std::io::Error::new(std::io::ErrorKind::Other, "disk gone").into();
        assert!(matches!(err, CacheError::Io(_)));
        assert!(err.to_string().contains("disk gone"));
    }
}
