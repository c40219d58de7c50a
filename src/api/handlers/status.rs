//! Baseline, threshold and liveness endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use super::AppState;
use crate::api::envelope::{ApiError, ApiResponse};
use crate::types::ThresholdTable;

// ============================================================================
// Baseline
// ============================================================================

#[derive(Debug, Serialize)]
pub struct BaselineStatusResponse {
    /// Whether a baseline file has been written yet
    pub exists: bool,
    /// Vehicles in the current baseline
    pub vehicles: usize,
    pub path: String,
}

/// GET /api/v1/baseline - Current baseline size and location
pub async fn get_baseline_status(State(state): State<AppState>) -> Response {
    let pipeline = Arc::clone(&state.pipeline);
    let result = tokio::task::spawn_blocking(move || {
        let exists = pipeline.baseline_path().exists();
        pipeline.store().snapshot().map(|snapshot| BaselineStatusResponse {
            exists,
            vehicles: snapshot.len(),
            path: pipeline.baseline_path().display().to_string(),
        })
    })
    .await;

    match result {
        Ok(Ok(status)) => ApiResponse::ok(status),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Failed to read baseline");
            ApiError::storage(e.to_string()).into_response()
        }
        Err(e) => ApiError::task_failed("baseline", &e).into_response(),
    }
}

// ============================================================================
// Thresholds
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ThresholdsResponse<'a> {
    pub count: usize,
    pub thresholds: &'a ThresholdTable,
}

/// GET /api/v1/thresholds - Active category limits
pub async fn get_thresholds(State(state): State<AppState>) -> Response {
    let thresholds = state.pipeline.thresholds();
    ApiResponse::ok(ThresholdsResponse {
        count: thresholds.len(),
        thresholds,
    })
}

// ============================================================================
// Liveness
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
