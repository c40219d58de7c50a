//! Report Writer - dated deviation report artifacts
//!
//! One CSV per calendar date, `km_deviation_report_<YYYY-MM-DD>.csv`. A
//! second write on the same date replaces the first. Output is a pure
//! function of the rows, so identical input gives byte-identical files.

use chrono::{Local, NaiveDate};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::defaults::REPORT_FILE_PREFIX;
use crate::ingest::table::format_number;
use crate::storage::{StagedFile, UTF8_BOM};
use crate::types::ClassifiedRow;

const REPORT_HEADERS: [&str; 6] = [
    "category",
    "vehicle_id",
    "new_mileage",
    "previous_mileage",
    "delta",
    "status",
];

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("deviation report not found: {0:?}")]
    NotFound(PathBuf),

    #[error("report I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("report encoding error: {0}")]
    Csv(#[from] csv::Error),
}

/// Today's date on the local calendar, as used for report names.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// File name of the report for `date`.
pub fn report_file_name(date: NaiveDate) -> String {
    format!("{REPORT_FILE_PREFIX}{}.csv", date.format("%Y-%m-%d"))
}

/// Serialize rows into report bytes.
pub fn render(rows: &[ClassifiedRow]) -> Result<Vec<u8>, csv::Error> {
    let optional = |value: Option<f64>| value.map(format_number).unwrap_or_default();

    let mut writer = csv::Writer::from_writer(UTF8_BOM.to_vec());
    writer.write_record(REPORT_HEADERS)?;
    for row in rows {
        writer.write_record([
            row.category.clone(),
            row.vehicle_id.clone(),
            format_number(row.new_mileage),
            optional(row.previous_mileage),
            optional(row.delta),
            row.status.label().to_string(),
        ])?;
    }
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

/// A report written to a temp file, not yet visible under its final name.
#[derive(Debug)]
pub struct StagedReport {
    file: StagedFile,
}

impl StagedReport {
    pub fn path(&self) -> &Path {
        self.file.target()
    }

    /// Move the report into place.
    pub fn commit(self) -> Result<PathBuf, ReportError> {
        let target = self.file.target().to_path_buf();
        let path = self
            .file
            .commit()
            .map_err(|source| ReportError::Io { path: target, source })?;
        info!(path = %path.display(), "Deviation report written");
        Ok(path)
    }
}

#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(report_file_name(date))
    }

    /// Write the report for `date` to a temp file beside its final path.
    pub fn stage(&self, rows: &[ClassifiedRow], date: NaiveDate) -> Result<StagedReport, ReportError> {
        let path = self.path_for(date);
        let bytes = render(rows)?;
        let file = StagedFile::write(&path, &bytes).map_err(|source| ReportError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), rows = rows.len(), "Report staged");
        Ok(StagedReport { file })
    }

    /// Stage and commit in one step.
    pub fn write(&self, rows: &[ClassifiedRow], date: NaiveDate) -> Result<PathBuf, ReportError> {
        self.stage(rows, date)?.commit()
    }

    /// Bytes of the report for `date`.
    pub fn read(&self, date: NaiveDate) -> Result<Vec<u8>, ReportError> {
        let path = self.path_for(date);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(ReportError::NotFound(path)),
            Err(source) => Err(ReportError::Io { path, source }),
        }
    }

    /// Remove reports for every date other than `keep`. Returns how many
    /// files were deleted. A missing report directory is not an error.
    pub fn prune_except(&self, keep: NaiveDate) -> Result<usize, ReportError> {
        let keep_name = report_file_name(keep);
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(source) => {
                return Err(ReportError::Io {
                    path: self.dir.clone(),
                    source,
                })
            }
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.starts_with(REPORT_FILE_PREFIX) || !name.ends_with(".csv") || name == keep_name {
                continue;
            }
            match std::fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) => warn!(file = name, error = %e, "Failed to remove old report"),
            }
        }

        if removed > 0 {
            info!(removed, dir = %self.dir.display(), "Pruned old deviation reports");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DeviationStatus, Reading};
    use tempfile::tempdir;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn rows() -> Vec<ClassifiedRow> {
        vec![
            ClassifiedRow {
                category: "CategoryX".into(),
                vehicle_id: "V1".into(),
                new_mileage: 25000.0,
                previous_mileage: Some(1000.0),
                delta: Some(24000.0),
                status: DeviationStatus::Deviation,
            },
            ClassifiedRow::new_vehicle(&Reading::new("מונית 4 נוסעים", "77", 12.5)),
        ]
    }

    #[test]
    fn test_file_name_format() {
        assert_eq!(
            report_file_name(date("2024-03-07")),
            "km_deviation_report_2024-03-07.csv"
        );
    }

    #[test]
    fn test_render_layout() {
        let bytes = render(&rows()).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let text = std::str::from_utf8(&bytes[UTF8_BOM.len()..]).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "category,vehicle_id,new_mileage,previous_mileage,delta,status");
        assert_eq!(lines[1], "CategoryX,V1,25000,1000,24000,DEVIATION");
        assert_eq!(lines[2], "מונית 4 נוסעים,77,12.5,,,NEW");
    }

    #[test]
    fn test_same_day_overwrite_is_byte_identical() {
        let dir = tempdir().unwrap();
        let writer = ReportWriter::new(dir.path());
        let day = date("2024-03-07");

        let path = writer.write(&rows(), day).unwrap();
        let first = std::fs::read(&path).unwrap();
        writer.write(&rows(), day).unwrap();
        let second = std::fs::read(&path).unwrap();

        assert_eq!(first, second);
        assert_eq!(writer.read(day).unwrap(), first);
    }

    #[test]
    fn test_same_day_rewrite_replaces_content() {
        let dir = tempdir().unwrap();
        let writer = ReportWriter::new(dir.path());
        let day = date("2024-03-07");

        writer.write(&rows(), day).unwrap();
        writer.write(&rows()[..1], day).unwrap();

        let text = String::from_utf8(writer.read(day).unwrap()).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn test_read_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let writer = ReportWriter::new(dir.path().join("reports"));
        assert!(matches!(
            writer.read(date("2024-03-07")),
            Err(ReportError::NotFound(_))
        ));
    }

    #[test]
    fn test_dropped_stage_writes_nothing() {
        let dir = tempdir().unwrap();
        let writer = ReportWriter::new(dir.path());
        let day = date("2024-03-07");

        let staged = writer.stage(&rows(), day).unwrap();
        assert_eq!(staged.path(), writer.path_for(day));
        drop(staged);

        assert!(matches!(writer.read(day), Err(ReportError::NotFound(_))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_prune_keeps_only_given_date() {
        let dir = tempdir().unwrap();
        let writer = ReportWriter::new(dir.path());
        writer.write(&rows(), date("2024-03-05")).unwrap();
        writer.write(&rows(), date("2024-03-06")).unwrap();
        writer.write(&rows(), date("2024-03-07")).unwrap();
        std::fs::write(dir.path().join("unrelated.csv"), b"x").unwrap();

        assert_eq!(writer.prune_except(date("2024-03-07")).unwrap(), 2);
        assert!(writer.read(date("2024-03-07")).is_ok());
        assert!(dir.path().join("unrelated.csv").exists());
    }

    #[test]
    fn test_prune_missing_dir() {
        let dir = tempdir().unwrap();
        let writer = ReportWriter::new(dir.path().join("absent"));
        assert_eq!(writer.prune_except(date("2024-03-07")).unwrap(), 0);
    }
}
