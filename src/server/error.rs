//! HTTP error mapping.
//!
//! Wraps the common error type so every handler can use `?` and get a
//! consistent JSON body: `{"error": CODE, "message": ...}`. Security,
//! database, and I/O failures are logged with detail and surface to
//! clients as a generic 500 body, never a path or internal message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use stillbox_common::Error;

/// Error wrapper carrying the HTTP mapping for [`stillbox_common::Error`].
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl ApiError {
    /// 500 with a generic body; detail goes to the log via the variant's
    /// Display at response time.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self(Error::database(msg.into()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self.0 {
            Error::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_FAILED", msg.clone()),
            Error::SizeLimit { .. } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "SIZE_LIMIT",
                self.0.to_string(),
            ),
            Error::Session(msg) => (StatusCode::BAD_REQUEST, "SESSION_ERROR", msg.clone()),
            Error::Processing(msg) => (StatusCode::BAD_REQUEST, "PROCESSING_FAILED", msg.clone()),
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            Error::Forbidden => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "You do not own this resource".to_string(),
            ),
            Error::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            Error::Security(detail) => {
                tracing::error!(detail = %detail, "Security check failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                )
            }
            Error::Database(detail) => {
                tracing::error!(detail = %detail, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                )
            }
            Error::Io(detail) => {
                tracing::error!(detail = %detail, "IO error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                )
            }
        };

        (
            status,
            Json(serde_json::json!({
                "error": code,
                "message": message,
            })),
        )
            .into_response()
    }
}

/// Result alias for handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
