use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tinyurl_allocator::AllocatorError;
use tracing::{error, warn};

use crate::model::{ErrorBody, ErrorInfo};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug)]
pub enum AppError {
    /// Malformed short code, URL, or request.
    BadRequest(String),
    NotFound(String),
    /// The allocator ran out of candidate codes.
    Exhausted(String),
    /// The store failed or timed out.
    Unavailable(String),
}

impl From<AllocatorError> for AppError {
    fn from(value: AllocatorError) -> Self {
        match value {
            AllocatorError::NotFound(code) => {
                Self::NotFound(format!("short code not found: {code}"))
            }
            AllocatorError::InvalidShortCode(_) | AllocatorError::InvalidUrl(_) => {
                Self::BadRequest(value.to_string())
            }
            AllocatorError::Exhausted { .. } => Self::Exhausted(value.to_string()),
            AllocatorError::Storage(_) => Self::Unavailable(value.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, "bad_request", message),
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, "not_found", message),
            AppError::Exhausted(message) => {
                error!(error = %message, "Short code allocation exhausted");
                (StatusCode::INTERNAL_SERVER_ERROR, "exhausted", message)
            }
            AppError::Unavailable(message) => {
                warn!(error = %message, "Store unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, "unavailable", message)
            }
        };

        let body = ErrorBody {
            error: ErrorInfo {
                code: code.to_string(),
                message,
            },
        };
        (status, Json(body)).into_response()
    }
}
