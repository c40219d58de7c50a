//! REST API module using Axum
//!
//! Thin HTTP surface over the deviation pipeline: multipart upload, report
//! download, read-only baseline and threshold status, liveness. Responses use
//! the envelope in [`envelope`].

pub mod envelope;
pub mod handlers;
mod routes;

pub use handlers::AppState;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Environment variable listing allowed cross-origin callers.
pub const CORS_ORIGINS_ENV_VAR: &str = "MILEAGE_WATCH_CORS_ORIGINS";

/// Build a CORS layer that is restrictive by default (same-origin only).
///
/// Set `MILEAGE_WATCH_CORS_ORIGINS` to a comma-separated list of allowed
/// origins when the upload form is served from elsewhere.
fn build_cors_layer() -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    match std::env::var(CORS_ORIGINS_ENV_VAR) {
        Ok(origins) => {
            let allowed: Vec<_> = origins
                .split(',')
                .filter_map(|o| o.trim().parse().ok())
                .collect();
            tracing::info!(origins = %origins, "CORS: allowing configured origins");
            base.allow_origin(allowed)
        }
        Err(_) => base,
    }
}

/// Create the complete application router.
pub fn create_app(state: AppState) -> Router {
    let cors = build_cors_layer();
    let timeout = state.request_timeout;
    let body_limit = state.max_upload_bytes;

    Router::new()
        .merge(routes::ingest_routes(state.clone()))
        .nest("/api/v1", routes::api_routes(state))
        .merge(routes::health_routes())
        // Middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
