//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bimgate_storage::StorageError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("missing update key header")]
    MissingCredential,

    #[error("invalid update key")]
    InvalidCredential,

    #[error("no updates found")]
    NoMatchingFiles,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ApiError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            // Wire contract inherited from deployed updater clients: an
            // absent key header answers 500, only a wrong key answers 401.
            Self::MissingCredential => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidCredential => StatusCode::UNAUTHORIZED,
            Self::NoMatchingFiles => StatusCode::NOT_FOUND,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Storage(e) => match e {
                StorageError::NotFound(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 401 carries no body; everything else answers a plain message.
        match self {
            Self::InvalidCredential => status.into_response(),
            _ => (status, self.to_string()).into_response(),
        }
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
