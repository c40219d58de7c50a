//! Spreadsheet upload

use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::AppState;
use crate::api::envelope::{ApiError, ApiResponse};
use crate::ingest::ParseError;
use crate::pipeline::RunOutcome;
use crate::report;
use crate::types::{ClassifiedRow, SeededRow, StatusCounts};

/// Multipart field carrying the spreadsheet.
pub const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    /// `first_run` or `comparison`
    pub outcome: &'static str,
    /// First run only: the seeded readings, deviation flag `0` on each
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readings: Option<Vec<SeededRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<ClassifiedRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts: Option<StatusCounts>,
    pub report_filename: Option<String>,
    pub baseline_updated: bool,
}

impl UploadResponse {
    /// Parse failures are handed back, they are answered as errors.
    pub fn from_outcome(outcome: RunOutcome) -> Result<Self, ParseError> {
        let kind = outcome.kind();
        match outcome {
            RunOutcome::ParseFailure(e) => Err(e),
            RunOutcome::FirstRun { rows } => Ok(Self {
                outcome: kind,
                readings: Some(rows),
                rows: None,
                counts: None,
                report_filename: None,
                baseline_updated: true,
            }),
            RunOutcome::Comparison {
                rows,
                report_path,
                baseline_updated,
            } => Ok(Self {
                outcome: kind,
                readings: None,
                counts: Some(StatusCounts::tally(&rows)),
                rows: Some(rows),
                report_filename: report_path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned()),
                baseline_updated,
            }),
        }
    }
}

/// Pull the `file` field out of the form: `(filename, bytes)`.
async fn read_file_field(multipart: &mut Multipart) -> Result<Option<(String, Vec<u8>)>, ApiError> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Ok(None),
            Err(e) => return Err(ApiError::bad_request(format!("Malformed upload: {e}"))),
        };
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        return match field.bytes().await {
            Ok(bytes) => Ok(Some((filename, bytes.to_vec()))),
            Err(e) => Err(ApiError::bad_request(format!("Malformed upload: {e}"))),
        };
    }
}

/// POST /upload - Run one spreadsheet through the deviation pipeline
///
/// The run executes on the blocking pool. If this handler is dropped (the
/// request timed out or the client went away) the run is cancelled and
/// stops before its first write.
pub async fn upload(State(state): State<AppState>, multipart: Result<Multipart, MultipartRejection>) -> Response {
    let Ok(mut multipart) = multipart else {
        return ApiError::bad_request("No file uploaded").into_response();
    };

    let (filename, bytes) = match read_file_field(&mut multipart).await {
        Ok(Some(upload)) => upload,
        Ok(None) => return ApiError::bad_request("No file uploaded").into_response(),
        Err(e) => return e.into_response(),
    };
    if filename.trim().is_empty() {
        return ApiError::bad_request("No file selected").into_response();
    }

    tracing::info!(filename = %filename, bytes = bytes.len(), "Upload received");

    let date = report::today();
    let pipeline = Arc::clone(&state.pipeline);
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();
    let result = tokio::task::spawn_blocking(move || {
        pipeline.process_upload_cancellable(&filename, &bytes, date, &cancel)
    })
    .await;

    match result {
        Ok(Ok(outcome)) => match UploadResponse::from_outcome(outcome) {
            Ok(body) => ApiResponse::ok(body),
            Err(e) => ApiError::rejected(&e).into_response(),
        },
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Deviation run failed");
            ApiError::from(&e).into_response()
        }
        Err(e) => ApiError::task_failed("upload", &e).into_response(),
    }
}
