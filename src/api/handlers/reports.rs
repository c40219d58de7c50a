//! Deviation report download

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use super::AppState;
use crate::api::envelope::ApiError;
use crate::report::{self, ReportError};

/// GET /download_report - Today's deviation report as a CSV attachment
///
/// Only the current date is served; there is no historical lookup.
pub async fn download_report(State(state): State<AppState>) -> Response {
    let date = report::today();
    let pipeline = Arc::clone(&state.pipeline);
    let result = tokio::task::spawn_blocking(move || pipeline.reports().read(date)).await;

    match result {
        Ok(Ok(bytes)) => {
            let disposition = format!("attachment; filename=\"{}\"", report::report_file_name(date));
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                bytes,
            )
                .into_response()
        }
        Ok(Err(ReportError::NotFound(path))) => {
            tracing::debug!(path = %path.display(), "Report requested before one was written today");
            ApiError::not_found("Deviation report not found").into_response()
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Failed to read deviation report");
            ApiError::storage(e.to_string()).into_response()
        }
        Err(e) => ApiError::task_failed("report", &e).into_response(),
    }
}
