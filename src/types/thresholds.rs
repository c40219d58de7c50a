//! Per-category daily mileage limits

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Built-in category limits (km per reading interval).
pub mod category_limits {
    /// `(category, max allowed increase)` pairs shipped as defaults
    pub const DEFAULTS: &[(&str, u64)] = &[
        ("4 נוסעים", 20_000),
        ("6 נוסעים", 25_000),
        ("7 נוסעים", 25_000),
        ("8 נוסעים", 15_000),
        ("10 נוסעים", 40_000),
        ("13 נוסעים", 40_000),
        ("14 נוסעים", 40_000),
        ("16 נוסעים", 40_000),
        ("19 נוסעים", 40_000),
        ("20 נוסעים", 40_000),
        ("מונית 4 נוסעים", 15_000),
        ("תא כפול סגור טנדר", 10_000),
        ("תא כפול פתוח טנדר", 10_000),
        ("תא כפול משאית", 40_000),
    ];
}

/// Mapping `category -> max allowed increase`.
///
/// Categories not present are unbounded and never produce a deviation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThresholdTable {
    limits: BTreeMap<String, u64>,
}

impl Default for ThresholdTable {
    fn default() -> Self {
        category_limits::DEFAULTS
            .iter()
            .map(|(category, limit)| ((*category).to_string(), *limit))
            .collect()
    }
}

impl ThresholdTable {
    /// Table with no limits at all (every category unbounded).
    pub fn empty() -> Self {
        Self {
            limits: BTreeMap::new(),
        }
    }

    pub fn with_limit(mut self, category: impl Into<String>, limit: u64) -> Self {
        self.limits.insert(category.into(), limit);
        self
    }

    /// Limit for a category, `None` when unbounded.
    pub fn limit_for(&self, category: &str) -> Option<u64> {
        self.limits.get(category).copied()
    }

    /// Whether `delta` is strictly above the category limit.
    pub fn exceeds(&self, category: &str, delta: f64) -> bool {
        match self.limit_for(category) {
            #[allow(clippy::cast_precision_loss)]
            Some(limit) => delta > limit as f64,
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.limits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limits.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.limits.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl FromIterator<(String, u64)> for ThresholdTable {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        Self {
            limits: iter.into_iter().collect(),
        }
    }
}
