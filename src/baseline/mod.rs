//! Baseline Store - persisted snapshot of the last accepted readings
//!
//! The baseline is a single flat CSV table, one row per vehicle. It is only
//! ever replaced wholesale; there is no incremental update.
//!
//! ## Critical Section
//!
//! `load -> classify -> decide -> replace` must not interleave between two
//! runs against the same store, otherwise one run's deviation signal can be
//! lost. [`BaselineStore::lock`] returns a [`BaselineGuard`], and the
//! mutating operations only exist on the guard, so the whole sequence runs
//! under one lock acquisition.
//!
//! ## File Format
//!
//! UTF-8 with BOM, header `category,vehicle_id,mileage,deviation`. The
//! deviation column is always written as `0`. Files using the legacy Hebrew
//! headers load unchanged.

pub mod updater;

pub use updater::{decide, BaselineDecision, RatchetPolicy};

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ingest::table::format_number;
use crate::storage::{write_atomic, UTF8_BOM};
use crate::types::{Reading, ReadingSet};

// ============================================================================
// Column names
// ============================================================================

const CATEGORY_HEADER: &str = "category";
const VEHICLE_HEADER: &str = "vehicle_id";
const MILEAGE_HEADER: &str = "mileage";
const DEVIATION_HEADER: &str = "deviation";

/// Headers written by the earlier service, still accepted on load.
const LEGACY_CATEGORY_HEADER: &str = "קבוצה";
const LEGACY_VEHICLE_HEADER: &str = "רישוי";
const LEGACY_MILEAGE_TOKEN: &str = "קילומטרז";

/// Neutral deviation marker stored with every baseline row.
const NEUTRAL_DEVIATION: &str = "0";

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum BaselineError {
    #[error("baseline I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("baseline CSV error at {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("malformed baseline {path:?}: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

// ============================================================================
// Store
// ============================================================================

/// File-backed baseline with a per-store critical-section lock.
#[derive(Debug)]
pub struct BaselineStore {
    path: PathBuf,
    lock: Mutex<()>,
}

/// Exclusive access to a [`BaselineStore`] for the duration of one run.
#[derive(Debug)]
pub struct BaselineGuard<'a> {
    store: &'a BaselineStore,
    _held: MutexGuard<'a, ()>,
}

impl BaselineStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Enter the critical section.
    pub fn lock(&self) -> BaselineGuard<'_> {
        let held = self.lock.lock().unwrap_or_else(|poisoned| {
            // The mutex guards the file, not in-memory state; a panicked run
            // left the file either untouched or fully replaced.
            warn!(path = %self.path.display(), "Baseline lock poisoned by a panicked run, recovering");
            poisoned.into_inner()
        });
        BaselineGuard {
            store: self,
            _held: held,
        }
    }

    /// Read-only snapshot, taken under the lock so it never observes a run
    /// mid-flight.
    pub fn snapshot(&self) -> Result<ReadingSet, BaselineError> {
        self.lock().load()
    }

    /// Delete the persisted baseline. Returns `true` if a file was removed.
    pub fn reset(&self) -> Result<bool, BaselineError> {
        let _guard = self.lock();
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "Baseline removed");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(BaselineError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

impl BaselineGuard<'_> {
    pub fn path(&self) -> &Path {
        &self.store.path
    }

    /// Load the persisted snapshot; a missing file is an empty baseline.
    pub fn load(&self) -> Result<ReadingSet, BaselineError> {
        let path = self.path();
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No baseline file, starting from empty baseline");
                return Ok(ReadingSet::new());
            }
            Err(source) => {
                return Err(BaselineError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let readings = decode(path, &bytes)?;
        debug!(path = %path.display(), vehicles = readings.len(), "Baseline loaded");
        Ok(readings)
    }

    /// Replace the persisted snapshot wholesale and atomically.
    pub fn replace(&self, snapshot: &ReadingSet) -> Result<(), BaselineError> {
        let path = self.path();
        let bytes = encode(snapshot).map_err(|source| BaselineError::Csv {
            path: path.to_path_buf(),
            source,
        })?;

        write_atomic(path, &bytes).map_err(|source| BaselineError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        info!(path = %path.display(), vehicles = snapshot.len(), "Baseline replaced");
        Ok(())
    }
}

// ============================================================================
// CSV encoding
// ============================================================================

fn encode(snapshot: &ReadingSet) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(UTF8_BOM.to_vec());
    writer.write_record([CATEGORY_HEADER, VEHICLE_HEADER, MILEAGE_HEADER, DEVIATION_HEADER])?;
    for reading in snapshot {
        writer.write_record([
            reading.category.as_str(),
            reading.vehicle_id.as_str(),
            format_number(reading.mileage).as_str(),
            NEUTRAL_DEVIATION,
        ])?;
    }
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

struct BaselineColumns {
    category: usize,
    vehicle: usize,
    mileage: usize,
}

fn locate_columns(path: &Path, headers: &csv::StringRecord) -> Result<BaselineColumns, BaselineError> {
    let find = |pred: &dyn Fn(&str) -> bool, what: &str| {
        headers
            .iter()
            .position(|h| pred(h.trim()))
            .ok_or_else(|| BaselineError::Malformed {
                path: path.to_path_buf(),
                reason: format!("missing {what} column"),
            })
    };

    Ok(BaselineColumns {
        category: find(&|h| h == CATEGORY_HEADER || h == LEGACY_CATEGORY_HEADER, CATEGORY_HEADER)?,
        vehicle: find(&|h| h == VEHICLE_HEADER || h == LEGACY_VEHICLE_HEADER, VEHICLE_HEADER)?,
        mileage: find(&|h| h == MILEAGE_HEADER || h.contains(LEGACY_MILEAGE_TOKEN), MILEAGE_HEADER)?,
    })
}

fn decode(path: &Path, bytes: &[u8]) -> Result<ReadingSet, BaselineError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let csv_err = |source| BaselineError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers = reader.headers().map_err(csv_err)?.clone();
    if headers.is_empty() {
        // Zero-byte file: treat like a baseline that was never written
        return Ok(ReadingSet::new());
    }
    let cols = locate_columns(path, &headers)?;

    let mut readings = ReadingSet::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(csv_err)?;
        // Header is line 1
        let line = idx + 2;
        let field = |i: usize| record.get(i).map(str::trim).unwrap_or("");

        let mileage_text = field(cols.mileage);
        let mileage = mileage_text
            .parse::<f64>()
            .ok()
            .filter(|m| m.is_finite())
            .ok_or_else(|| BaselineError::Malformed {
                path: path.to_path_buf(),
                reason: format!("line {line}: mileage {mileage_text:?} is not a number"),
            })?;

        readings.push(Reading::new(field(cols.category), field(cols.vehicle), mileage));
    }

    Ok(readings)
}
