//! Deviation Engine
//!
//! Left outer join of a new reading set onto the baseline, keyed by
//! `(category, vehicle_id)`. Every new reading yields exactly one
//! [`ClassifiedRow`], in input order:
//!
//! - no baseline entry: `NEW`, no delta
//! - `delta > limit(category)`: `DEVIATION`
//! - otherwise, including categories with no limit: `OK`

use std::collections::HashMap;
use tracing::{debug, warn};

use crate::types::{ClassifiedRow, DeviationStatus, Reading, ReadingSet, StatusCounts, ThresholdTable, VehicleKey};

/// Baseline mileage by vehicle. Duplicate keys resolve to the last row.
fn index_baseline(baseline: &ReadingSet) -> HashMap<VehicleKey, f64> {
    let mut index = HashMap::with_capacity(baseline.len());
    let mut duplicates = 0usize;
    for reading in baseline {
        if index.insert(reading.key(), reading.mileage).is_some() {
            duplicates += 1;
        }
    }
    if duplicates > 0 {
        warn!(duplicates, "Baseline contains duplicate vehicles, using the last entry for each");
    }
    index
}

fn classify_one(reading: &Reading, previous: Option<f64>, thresholds: &ThresholdTable) -> ClassifiedRow {
    let Some(previous) = previous else {
        return ClassifiedRow::new_vehicle(reading);
    };

    let delta = reading.mileage - previous;
    let status = if thresholds.exceeds(&reading.category, delta) {
        DeviationStatus::Deviation
    } else {
        DeviationStatus::Ok
    };

    if status == DeviationStatus::Deviation {
        debug!(
            vehicle = %reading.key(),
            delta,
            limit = thresholds.limit_for(&reading.category),
            "Deviation"
        );
    }

    ClassifiedRow {
        category: reading.category.clone(),
        vehicle_id: reading.vehicle_id.clone(),
        new_mileage: reading.mileage,
        previous_mileage: Some(previous),
        delta: Some(delta),
        status,
    }
}

/// Classify every new reading against the baseline.
pub fn classify(new: &ReadingSet, baseline: &ReadingSet, thresholds: &ThresholdTable) -> Vec<ClassifiedRow> {
    let index = index_baseline(baseline);

    let rows: Vec<ClassifiedRow> = new
        .iter()
        .map(|reading| {
            let previous = index.get(&reading.key()).copied();
            classify_one(reading, previous, thresholds)
        })
        .collect();

    let counts = StatusCounts::tally(&rows);
    debug!(
        rows = rows.len(),
        ok = counts.ok,
        deviation = counts.deviation,
        new = counts.new,
        "Classification complete"
    );

    rows
}
