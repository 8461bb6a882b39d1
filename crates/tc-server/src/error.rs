//! Error-to-HTTP response conversion.
//!
//! Implements `IntoResponse` for [`tc_core::Error`] via the [`AppError`]
//! wrapper so that route handlers can return `Result<T, AppError>` directly.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Wrapper so we can implement `IntoResponse` for an external type.
pub struct AppError(pub tc_core::Error);

impl From<tc_core::Error> for AppError {
    fn from(e: tc_core::Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(status = %status, error = %self.0, "Server error in handler");
        }

        let code = match &self.0 {
            tc_core::Error::NotFound { .. } => "not_found",
            tc_core::Error::Unready(_) => "unready",
            tc_core::Error::Encoder { .. } => "encoder_error",
            tc_core::Error::Aborted(_) => "aborted",
            tc_core::Error::Resolver(_) => "resolver_error",
            tc_core::Error::Probe(_) => "probe_error",
            tc_core::Error::Tool { .. } => "tool_error",
            tc_core::Error::Validation(_) => "validation_error",
            tc_core::Error::Database { .. } => "database_error",
            tc_core::Error::Io { .. } => "io_error",
            tc_core::Error::Internal(_) => "internal_error",
        };

        let body = json!({
            "error": self.0.to_string(),
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
