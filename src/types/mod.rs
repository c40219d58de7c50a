//! Shared data structures for mileage deviation detection
//!
//! - `Reading` / `ReadingSet`: normalized rows from one upload
//! - `ThresholdTable`: category -> max allowed increase
//! - `ClassifiedRow` / `DeviationStatus`: output of the deviation engine

mod reading;
mod classification;
pub mod thresholds;

pub use reading::*;
pub use classification::*;
pub use thresholds::ThresholdTable;
