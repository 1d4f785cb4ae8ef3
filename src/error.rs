use std::time::Duration;

use axum::http::header::{HeaderName, HeaderValue, RETRY_AFTER};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::services::{StoreError, UpstreamError};

/// Header carrying the configured per-minute limit on 429 responses.
pub const RATE_LIMIT_LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");

/// Application-wide error types with appropriate HTTP status codes.
///
/// Every variant renders as `{"error": <message>}`; a few add a machine
/// readable `code` or `details`. Messages of server-side failures are fixed
/// strings, the variant payload is only logged.
#[derive(Error, Debug)]
pub enum AppError {
    /// Request failed validation. The message is shown to the client.
    #[error("{message}")]
    BadRequest {
        message: String,
        details: Option<String>,
    },

    #[error("Rate limit exceeded (retry after {retry_after:?})")]
    RateLimited { retry_after: Duration, limit: u32 },

    #[error("Recipe generation failed: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Service not ready: {0}")]
    NotReady(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AppError {
    /// Validation failure with a client-facing message.
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest {
            message: message.into(),
            details: None,
        }
    }

    /// Validation failure with extra detail (e.g. the JSON parse error).
    pub fn bad_request_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        AppError::BadRequest {
            message: message.into(),
            details: Some(details.into()),
        }
    }

    /// HTTP status this error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::NotReady(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Upstream(_)
            | AppError::Persistence(_)
            | AppError::Internal(_)
            | AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body for API endpoints.
#[derive(Serialize)]
struct ErrorResponse<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<&'static str>,
}

impl ErrorResponse<'_> {
    fn message(error: &str) -> ErrorResponse<'_> {
        ErrorResponse {
            error,
            code: None,
            details: None,
            retry_after: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Full detail stays in the logs, clients get sanitized messages
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        match &self {
            AppError::BadRequest { message, details } => {
                let body = ErrorResponse {
                    details: details.as_deref(),
                    ..ErrorResponse::message(message)
                };
                (status, axum::Json(body)).into_response()
            }
            AppError::RateLimited { retry_after, limit } => {
                let body = ErrorResponse {
                    code: Some("rate_limit_exceeded"),
                    retry_after: Some("Please try again later"),
                    ..ErrorResponse::message("Rate limit exceeded")
                };
                let mut response = (status, axum::Json(body)).into_response();
                let retry_secs = retry_after_secs(*retry_after);
                let headers = response.headers_mut();
                headers.insert(RETRY_AFTER, HeaderValue::from(retry_secs));
                headers.insert(RATE_LIMIT_LIMIT_HEADER, HeaderValue::from(*limit));
                response
            }
            AppError::NotFound(msg) => {
                (status, axum::Json(ErrorResponse::message(msg))).into_response()
            }
            AppError::MethodNotAllowed => (
                status,
                axum::Json(ErrorResponse::message("Method not allowed")),
            )
                .into_response(),
            AppError::Upstream(_) => (
                status,
                axum::Json(ErrorResponse::message("Failed to generate recipe")),
            )
                .into_response(),
            AppError::Persistence(_) => (
                status,
                axum::Json(ErrorResponse::message("Database operation failed")),
            )
                .into_response(),
            AppError::NotReady(_) => (
                status,
                axum::Json(ErrorResponse::message("Service not ready")),
            )
                .into_response(),
            AppError::Internal(_) | AppError::ConfigError(_) => (
                status,
                axum::Json(ErrorResponse::message("Internal server error")),
            )
                .into_response(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Persistence(err.to_string())
    }
}

/// Whole seconds for a `Retry-After` header, never less than 1.
fn retry_after_secs(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
