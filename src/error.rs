//! Error types for the table cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Remote Error Enum ==
/// Failures reported by the underlying table store.
///
/// The cache never rewrites these; they reach the caller exactly as the
/// store produced them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The table (or index) does not exist in the store
    #[error("Requested resource not found: {0}")]
    ResourceNotFound(String),

    /// The store rejected the request shape
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A conditional write did not apply
    #[error("Conditional check failed: {0}")]
    ConditionalCheckFailed(String),

    /// Transport or availability failure
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

// == Cache Error Enum ==
/// Unified error type for the table cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Table metadata could not be fetched
    #[error("Schema error: {0}")]
    Schema(String),

    /// The table has no index with the requested name
    #[error("Index {index} not found on table {table}")]
    IndexNotFound { table: String, index: String },

    /// The underlying store call failed
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// An attribute value violated the key encoder's contract
    #[error("Encoding fault: {0}")]
    Encoding(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::Schema(_) => StatusCode::BAD_GATEWAY,
            CacheError::IndexNotFound { .. } => StatusCode::NOT_FOUND,
            CacheError::Remote(RemoteError::ResourceNotFound(_)) => StatusCode::NOT_FOUND,
            CacheError::Remote(RemoteError::Validation(_)) => StatusCode::BAD_REQUEST,
            CacheError::Remote(RemoteError::ConditionalCheckFailed(_)) => StatusCode::CONFLICT,
            CacheError::Remote(RemoteError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Encoding(_) => StatusCode::BAD_REQUEST,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the table cache.
pub type Result<T> = std::result::Result<T, CacheError>;
