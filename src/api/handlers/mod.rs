//! API route handlers
//!
//! - Spreadsheet upload and deviation run
//! - Download of today's deviation report
//! - Baseline and threshold status, liveness

mod reports;
mod status;
mod upload;

pub use reports::*;
pub use status::*;
pub use upload::*;

use std::sync::Arc;
use std::time::Duration;

use crate::config::{defaults, ServiceConfig};
use crate::pipeline::DeviationPipeline;

// ============================================================================
// API State
// ============================================================================

/// Shared state for API handlers
#[derive(Debug, Clone)]
pub struct AppState {
    /// Pipeline owning the baseline store and report directory
    pub pipeline: Arc<DeviationPipeline>,
    /// Upper bound on one request, upload processing included
    pub request_timeout: Duration,
    /// Largest accepted request body
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(pipeline: DeviationPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            request_timeout: Duration::from_secs(defaults::REQUEST_TIMEOUT_SECS),
            max_upload_bytes: defaults::MAX_UPLOAD_BYTES,
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            pipeline: Arc::new(DeviationPipeline::from_config(config)),
            request_timeout: Duration::from_secs(config.server.request_timeout_secs),
            max_upload_bytes: config.server.max_upload_bytes,
        }
    }
}
