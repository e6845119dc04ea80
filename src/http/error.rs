//! API error type and its JSON response form.

use crate::controller::ControlError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced to HTTP clients.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A query parameter that is present but unusable (400)
    #[error("Invalid query parameter '{name}': {reason}")]
    InvalidQueryParameter { name: &'static str, reason: String },

    /// Start/stop requested in the wrong state (409)
    #[error(transparent)]
    Control(#[from] ControlError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidQueryParameter { .. } => StatusCode::BAD_REQUEST,
            Self::Control(_) => StatusCode::CONFLICT,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidQueryParameter { .. } => "INVALID_QUERY_PARAMETER",
            Self::Control(ControlError::AlreadyScanning) => "ALREADY_SCANNING",
            Self::Control(ControlError::AlreadyStopped) => "ALREADY_STOPPED",
        }
    }
}

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub code: &'static str,
    /// Human-readable error message
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::warn!(error = %self, "API error");

        let body = ErrorResponse {
            code: self.error_code(),
            message: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;
