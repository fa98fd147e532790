//! Error types for inkf-audiobook
//!
//! Client errors carry a message in `error`. Unexpected failures return 500
//! with a generic `error` and the cause in `details`, and are logged here at
//! the handler boundary.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Quota exhausted or action not allowed (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Queue full or shutting down (503)
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// inkf-common error
    #[error("Common error: {0}")]
    Common(#[from] inkf_common::Error),
}

/// Cause of a 500 response, attached to the response so middleware can
/// record it without re-parsing the body
#[derive(Debug, Clone)]
pub struct ServerErrorDetail(pub String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg, None),
            ApiError::Common(inkf_common::Error::NotFound(msg)) => {
                (StatusCode::NOT_FOUND, msg, None)
            }
            ApiError::Common(inkf_common::Error::InvalidInput(msg)) => {
                (StatusCode::BAD_REQUEST, msg, None)
            }
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                Some(msg),
            ),
            ApiError::Common(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                Some(err.to_string()),
            ),
        };

        let body = match &details {
            Some(details) => {
                tracing::error!(status = status.as_u16(), details = %details, "Request failed");
                json!({ "error": message, "details": details })
            }
            None => json!({ "error": message }),
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(details) = details {
            response.extensions_mut().insert(ServerErrorDetail(details));
        }
        response
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
