//! Baseline Updater - the ratchet
//!
//! After the first run the baseline only advances when the current run
//! contains a deviation. Quiet runs leave it untouched, so small daily
//! increases keep accumulating against the same comparison point.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::PolicyConfig;
use crate::types::{ClassifiedRow, DeviationStatus, ReadingSet};

/// Which statuses make the baseline advance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatchetPolicy {
    /// Count `NEW` rows as a trigger alongside `DEVIATION`.
    pub new_vehicles_advance_baseline: bool,
}

impl From<&PolicyConfig> for RatchetPolicy {
    fn from(cfg: &PolicyConfig) -> Self {
        Self {
            new_vehicles_advance_baseline: cfg.new_vehicles_advance_baseline,
        }
    }
}

/// Outcome of [`RatchetPolicy::decide`].
#[derive(Debug, Clone, PartialEq)]
pub enum BaselineDecision {
    /// Replace the persisted baseline with this set, wholesale.
    Persist(ReadingSet),
    /// Leave the persisted baseline exactly as it is.
    Keep,
}

impl BaselineDecision {
    pub fn persists(&self) -> bool {
        matches!(self, BaselineDecision::Persist(_))
    }
}

impl RatchetPolicy {
    fn triggers(&self, row: &ClassifiedRow) -> bool {
        match row.status {
            DeviationStatus::Deviation => true,
            DeviationStatus::New => self.new_vehicles_advance_baseline,
            DeviationStatus::Ok => false,
        }
    }

    pub fn decide(
        &self,
        classification: &[ClassifiedRow],
        baseline_was_empty: bool,
        current: &ReadingSet,
    ) -> BaselineDecision {
        if baseline_was_empty {
            info!(vehicles = current.len(), "First run for this store, seeding baseline");
            return BaselineDecision::Persist(current.clone());
        }

        let triggers = classification.iter().filter(|row| self.triggers(row)).count();
        if triggers > 0 {
            info!(triggers, vehicles = current.len(), "Ratchet advanced, baseline will be replaced");
            BaselineDecision::Persist(current.clone())
        } else {
            info!("No deviation, baseline unchanged");
            BaselineDecision::Keep
        }
    }
}

/// [`RatchetPolicy::decide`] under the default policy.
pub fn decide(classification: &[ClassifiedRow], baseline_was_empty: bool, current: &ReadingSet) -> BaselineDecision {
    RatchetPolicy::default().decide(classification, baseline_was_empty, current)
}
