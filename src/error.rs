//! Error types for the cache server
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::backend::BackendError;
use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for the cache server.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Command called with the wrong number of arguments
    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArity(String),

    /// Unparsable or out-of-range definition parameter (TTL, port)
    #[error("ERR {0}")]
    InvalidConfig(String),

    /// Malformed request or unknown command
    #[error("ERR invalid request: {0}")]
    InvalidRequest(String),

    /// A cache definition with this name already exists
    #[error("ERR cache '{0}' already exists")]
    DuplicateName(String),

    /// Worker pool or blocking thread failure
    #[error("ERR unable to allocate resources: {0}")]
    Resource(String),

    /// Backing store unreachable
    #[error("ERR unable to connect to backing store: {0}")]
    Connect(String),

    /// Unknown cache name
    #[error("ERR cache '{0}' does not exist")]
    NotFound(String),

    /// Query rejected by the backing store; the store's text is kept verbatim
    #[error("{0}")]
    Query(String),

    /// Caller waited longer than the fetch timeout
    #[error("ERR timed out waiting for '{0}' to be populated")]
    Timeout(String),

    /// Internal server error
    #[error("ERR internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Short machine-readable tag used in error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            CacheError::WrongArity(_) => "wrong_arity",
            CacheError::InvalidConfig(_) => "invalid_config",
            CacheError::InvalidRequest(_) => "invalid_request",
            CacheError::DuplicateName(_) => "duplicate_name",
            CacheError::Resource(_) => "resource",
            CacheError::Connect(_) => "connect",
            CacheError::NotFound(_) => "not_found",
            CacheError::Query(_) => "query",
            CacheError::Timeout(_) => "timeout",
            CacheError::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            CacheError::WrongArity(_)
            | CacheError::InvalidConfig(_)
            | CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::DuplicateName(_) => StatusCode::CONFLICT,
            CacheError::Resource(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Connect(_) => StatusCode::BAD_GATEWAY,
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::Query(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CacheError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<BackendError> for CacheError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Unreachable(msg) | BackendError::ConnectionLost(msg) => {
                CacheError::Connect(msg)
            }
            BackendError::Query(msg) => CacheError::Query(msg),
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse::new(self.to_string(), self.kind()));

        (self.status(), body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache server.
pub type Result<T> = std::result::Result<T, CacheError>;
