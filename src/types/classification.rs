//! Classification output of the deviation engine

use serde::{Deserialize, Serialize};

use super::Reading;

/// Per-row verdict of comparing a new reading against the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviationStatus {
    /// Delta within the category threshold (or category unbounded)
    Ok,
    /// Delta strictly above the category threshold
    Deviation,
    /// Vehicle has no baseline entry, no delta can be computed
    New,
}

impl DeviationStatus {
    /// Label written into report artifacts
    pub fn label(self) -> &'static str {
        match self {
            DeviationStatus::Ok => "OK",
            DeviationStatus::Deviation => "DEVIATION",
            DeviationStatus::New => "NEW",
        }
    }
}

impl std::fmt::Display for DeviationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One row of the left join of a new reading onto the baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedRow {
    pub category: String,
    pub vehicle_id: String,
    pub new_mileage: f64,
    /// Baseline mileage, absent for `New` rows
    pub previous_mileage: Option<f64>,
    /// `new_mileage - previous_mileage`, absent for `New` rows
    pub delta: Option<f64>,
    pub status: DeviationStatus,
}

impl ClassifiedRow {
    /// Row for a vehicle missing from the baseline.
    pub fn new_vehicle(reading: &Reading) -> Self {
        Self {
            category: reading.category.clone(),
            vehicle_id: reading.vehicle_id.clone(),
            new_mileage: reading.mileage,
            previous_mileage: None,
            delta: None,
            status: DeviationStatus::New,
        }
    }

    pub fn is_deviation(&self) -> bool {
        self.status == DeviationStatus::Deviation
    }
}

/// A reading accepted as the first baseline.
///
/// There is nothing to compare against yet, so every row carries the neutral
/// deviation flag `0`, the same value stored in the baseline file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeededRow {
    pub category: String,
    pub vehicle_id: String,
    pub mileage: f64,
    pub deviation: u8,
}

impl SeededRow {
    pub const NEUTRAL_DEVIATION: u8 = 0;

    pub fn neutral(reading: &Reading) -> Self {
        Self {
            category: reading.category.clone(),
            vehicle_id: reading.vehicle_id.clone(),
            mileage: reading.mileage,
            deviation: Self::NEUTRAL_DEVIATION,
        }
    }

    pub fn reading(&self) -> Reading {
        Reading::new(self.category.as_str(), self.vehicle_id.as_str(), self.mileage)
    }
}

/// Tally of statuses over a classification, used for logging and responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub ok: usize,
    pub deviation: usize,
    pub new: usize,
}

impl StatusCounts {
    pub fn tally(rows: &[ClassifiedRow]) -> Self {
        rows.iter().fold(Self::default(), |mut acc, row| {
            match row.status {
                DeviationStatus::Ok => acc.ok += 1,
                DeviationStatus::Deviation => acc.deviation += 1,
                DeviationStatus::New => acc.new += 1,
            }
            acc
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        assert_eq!(serde_json::to_value(DeviationStatus::Ok).unwrap(), "OK");
        assert_eq!(
            serde_json::to_value(DeviationStatus::Deviation).unwrap(),
            "DEVIATION"
        );
        assert_eq!(serde_json::to_value(DeviationStatus::New).unwrap(), "NEW");
        assert_eq!(DeviationStatus::Deviation.to_string(), "DEVIATION");
    }

    #[test]
    fn test_tally() {
        let reading = Reading::new("A", "1", 5.0);
        let mut ok = ClassifiedRow::new_vehicle(&reading);
        ok.status = DeviationStatus::Ok;
        let rows = vec![ok, ClassifiedRow::new_vehicle(&reading)];
        let counts = StatusCounts::tally(&rows);
        assert_eq!(counts, StatusCounts { ok: 1, deviation: 0, new: 1 });
    }

    #[test]
    fn test_seeded_row_is_neutral() {
        let reading = Reading::new("4 נוסעים", "12-345-67", 1000.0);
        let row = SeededRow::neutral(&reading);
        assert_eq!(row.deviation, 0);
        assert_eq!(row.reading(), reading);

        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["deviation"], 0);
        assert_eq!(json["mileage"], 1000.0);
    }
}
