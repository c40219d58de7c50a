//! API route definitions
//!
//! - POST /upload - spreadsheet ingestion
//! - GET /download_report - today's deviation report
//! - /api/v1/baseline, /api/v1/thresholds - read-only status
//! - GET /health - liveness

use axum::{routing::{get, post}, Router};

use super::handlers::{self, AppState};

/// Upload and download endpoints at the root
pub fn ingest_routes(state: AppState) -> Router {
    Router::new()
        .route("/upload", post(handlers::upload))
        .route("/download_report", get(handlers::download_report))
        .with_state(state)
}

/// Read-only status endpoints, nested under /api/v1
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/baseline", get(handlers::get_baseline_status))
        .route("/thresholds", get(handlers::get_thresholds))
        .with_state(state)
}

pub fn health_routes() -> Router {
    Router::new().route("/health", get(handlers::health_check))
}
