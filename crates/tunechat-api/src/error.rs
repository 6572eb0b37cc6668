//! JSON error responses for the page endpoints.
//!
//! Chat endpoints never return these: chat failures are reply text.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "internal_error").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    /// 500 Internal Server Error - unexpected server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<minijinja::Error> for ApiError {
    fn from(err: minijinja::Error) -> Self {
        error!(error = %err, "Page render failed");
        ApiError::Internal("page could not be rendered".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_status_code() {
        assert_eq!(
            ApiError::Internal("x".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_render_error_is_internal() {
        let err: ApiError =
            minijinja::Error::new(minijinja::ErrorKind::UndefinedError, "missing").into();
        let ApiError::Internal(message) = err;
        assert_eq!(message, "page could not be rendered");
    }
}
