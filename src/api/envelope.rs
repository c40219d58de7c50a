//! JSON bodies returned by the upload service.
//!
//! Every handler answers with `{ "data": ..., "meta": ... }` or
//! `{ "error": { "code": ..., "message": ... }, "meta": ... }`. Rejected
//! uploads carry the [`ParseError::code`] of the failure, so clients can
//! tell a missing column from an unreadable file without reading messages.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Serialize;

use crate::ingest::ParseError;
use crate::pipeline::PipelineError;

/// Stamp identifying when and by which build a body was produced.
#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub timestamp: String,
    pub service: &'static str,
    pub version: &'static str,
}

impl ResponseMeta {
    fn now() -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            service: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Response {
        let body = Self {
            data,
            meta: ResponseMeta::now(),
        };
        (StatusCode::OK, axum::Json(body)).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Stable machine-readable tag
    pub code: &'static str,
    pub message: String,
}

/// Failed request. The status code travels with the body and is applied by
/// [`IntoResponse`].
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    status: StatusCode,
    pub error: ErrorDetail,
    pub meta: ResponseMeta,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            error: ErrorDetail {
                code,
                message: message.into(),
            },
            meta: ResponseMeta::now(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Missing or malformed multipart form.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    /// Upload decoded but could not be turned into readings.
    pub fn rejected(err: &ParseError) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, err.code(), err.to_string())
    }

    /// Baseline or report storage failed; retrying the upload is safe.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", message)
    }

    /// A blocking task panicked or was aborted.
    pub fn task_failed(what: &str, err: &tokio::task::JoinError) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            format!("{what} task failed: {err}"),
        )
    }
}

impl From<&PipelineError> for ApiError {
    fn from(err: &PipelineError) -> Self {
        match err {
            PipelineError::Cancelled => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "RUN_CANCELLED", err.to_string())
            }
            PipelineError::Baseline(_) | PipelineError::Report(_) => Self::storage(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, axum::Json(self)).into_response()
    }
}
