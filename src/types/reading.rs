//! Odometer readings and reading sets

use serde::{Deserialize, Serialize};

/// Natural key of a vehicle: `(category, vehicle_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VehicleKey {
    pub category: String,
    pub vehicle_id: String,
}

impl VehicleKey {
    pub fn new(category: impl Into<String>, vehicle_id: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            vehicle_id: vehicle_id.into(),
        }
    }
}

impl std::fmt::Display for VehicleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.category, self.vehicle_id)
    }
}

/// A single odometer reading for one vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Vehicle class token, selects the applicable threshold
    pub category: String,
    /// License plate or other per-vehicle identifier
    pub vehicle_id: String,
    /// Odometer value (km)
    pub mileage: f64,
}

impl Reading {
    pub fn new(category: impl Into<String>, vehicle_id: impl Into<String>, mileage: f64) -> Self {
        Self {
            category: category.into(),
            vehicle_id: vehicle_id.into(),
            mileage,
        }
    }

    pub fn key(&self) -> VehicleKey {
        VehicleKey::new(self.category.as_str(), self.vehicle_id.as_str())
    }
}

/// Ordered readings from one ingestion, in upload row order.
///
/// Duplicated keys are kept as uploaded; consumers decide how to resolve them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReadingSet {
    readings: Vec<Reading>,
}

impl ReadingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, reading: Reading) {
        self.readings.push(reading);
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Reading> {
        self.readings.iter()
    }

    pub fn as_slice(&self) -> &[Reading] {
        &self.readings
    }

    pub fn into_inner(self) -> Vec<Reading> {
        self.readings
    }
}

impl From<Vec<Reading>> for ReadingSet {
    fn from(readings: Vec<Reading>) -> Self {
        Self { readings }
    }
}

impl FromIterator<Reading> for ReadingSet {
    fn from_iter<I: IntoIterator<Item = Reading>>(iter: I) -> Self {
        Self {
            readings: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ReadingSet {
    type Item = &'a Reading;
    type IntoIter = std::slice::Iter<'a, Reading>;

    fn into_iter(self) -> Self::IntoIter {
        self.readings.iter()
    }
}

/// Persisted "last accepted" readings used as the comparison point.
pub type BaselineSnapshot = ReadingSet;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_identity() {
        let a = Reading::new("4 נוסעים", "12-345-67", 1000.0);
        let b = Reading::new("4 נוסעים", "12-345-67", 2000.0);
        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), Reading::new("6 נוסעים", "12-345-67", 1000.0).key());
    }

    #[test]
    fn test_reading_set_preserves_order() {
        let set: ReadingSet = vec![
            Reading::new("A", "3", 3.0),
            Reading::new("A", "1", 1.0),
            Reading::new("A", "2", 2.0),
        ]
        .into();
        let ids: Vec<&str> = set.iter().map(|r| r.vehicle_id.as_str()).collect();
        assert_eq!(ids, ["3", "1", "2"]);
    }

    #[test]
    fn test_serializes_as_plain_array() {
        let set: ReadingSet = vec![Reading::new("A", "1", 10.0)].into();
        let json = serde_json::to_value(&set).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["vehicle_id"], "1");
    }
}
