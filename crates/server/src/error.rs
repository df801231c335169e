//! Unified error handling for the server.
//!
//! Every handler error becomes a JSON body `{error, status}` with the
//! matching HTTP status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use engine::{BidRejection, EngineError};
use serde_json::json;
use tracing::error;

/// Application error type with HTTP response mapping.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Resource not found (404).
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request data (400).
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid credentials (401).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A bid failed validation (400) or lost a race (409).
    #[error("{0}")]
    Rejected(BidRejection),

    /// The request does not fit the current auction state (409).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error (500).
    #[error("Internal error: {0}")]
    Internal(String),

    /// Service unavailable (503).
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Rejected(r) if r.is_retryable() => StatusCode::CONFLICT,
            AppError::Rejected(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Bid(rejection) => AppError::Rejected(rejection),
            EngineError::UnknownBidder(_) | EngineError::UnknownLot(_) => {
                AppError::NotFound(err.to_string())
            }
            EngineError::InvalidForceEnd(_) => AppError::BadRequest(err.to_string()),
            EngineError::InvalidTransition { .. }
            | EngineError::Conflict
            | EngineError::LotNotUnsold { .. } => AppError::Conflict(err.to_string()),
            EngineError::Integrity(_) | EngineError::Store(_) | EngineError::Join(_) => {
                error!(error = %err, "request failed");
                AppError::Internal(err.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::NotFound(msg)
            | AppError::BadRequest(msg)
            | AppError::Unauthorized(msg)
            | AppError::Conflict(msg)
            | AppError::Internal(msg)
            | AppError::Unavailable(msg) => msg.clone(),
            AppError::Rejected(rejection) => rejection.to_string(),
        };

        let body = axum::Json(json!({
            "error": message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

/// Result type alias for handlers.
pub type AppResult<T> = Result<T, AppError>;
