//! Mileage Watch: fleet odometer deviation detection
//!
//! Ingests periodic odometer spreadsheets, compares each vehicle against the
//! last accepted baseline, flags daily increases above the category limit and
//! advances the baseline only when a deviation is found.
//!
//! ## Architecture
//!
//! - **Ingest**: worksheet / CSV reading and column extraction into a `ReadingSet`
//! - **Baseline**: persisted snapshot with a per-store critical section, plus the ratchet policy
//! - **Engine**: left join of new readings onto the baseline, threshold classification
//! - **Report**: dated CSV artifacts
//! - **Pipeline**: `load -> classify -> decide -> persist` as one run
//! - **API**: axum upload / download surface

pub mod api;
pub mod baseline;
pub mod config;
pub mod engine;
pub mod ingest;
pub mod pipeline;
pub mod report;
pub mod storage;
pub mod types;

// Re-export configuration
pub use config::ServiceConfig;

// Re-export commonly used types
pub use types::{
    BaselineSnapshot, ClassifiedRow, DeviationStatus, Reading, ReadingSet, SeededRow, StatusCounts,
    ThresholdTable, VehicleKey,
};

pub use baseline::{BaselineDecision, BaselineError, BaselineStore, RatchetPolicy};
pub use engine::classify;
pub use ingest::{parse_readings, ParseError, RawTable};
pub use pipeline::{DeviationPipeline, PipelineError, RunOutcome};
pub use report::{ReportError, ReportWriter};
