//! Deviation Pipeline
//!
//! One ingestion, end to end:
//!
//! ```text
//! upload bytes -> parse -> [lock] load baseline -> classify -> decide
//!                               -> stage report -> replace baseline -> commit report [unlock]
//! ```
//!
//! Parse failures happen before the lock is taken and touch nothing. Once
//! the lock is held, any storage failure aborts the run with the baseline
//! either untouched or fully replaced, and no report committed.
//!
//! A run started with a [`CancellationToken`] checks it after taking the
//! lock and again right before the first durable write. A run cancelled at
//! either point returns [`PipelineError::Cancelled`] having written nothing.

use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::baseline::{BaselineDecision, BaselineError, BaselineStore, RatchetPolicy};
use crate::config::{IngestConfig, ServiceConfig};
use crate::engine::classify;
use crate::ingest::{self, parse_readings, ParseError, RawTable};
use crate::report::{ReportError, ReportWriter};
use crate::types::{ClassifiedRow, ReadingSet, SeededRow, StatusCounts, ThresholdTable};

/// Storage failures. Bad input is a [`RunOutcome::ParseFailure`], not an error.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Baseline(#[from] BaselineError),

    #[error(transparent)]
    Report(#[from] ReportError),

    /// The caller gave up before anything was written.
    #[error("deviation run cancelled before any write")]
    Cancelled,
}

/// Result of one ingestion.
#[derive(Debug)]
pub enum RunOutcome {
    /// Upload rejected, nothing was read or written.
    ParseFailure(ParseError),
    /// Baseline was empty; it now holds these readings, each with the
    /// neutral deviation flag. No report.
    FirstRun { rows: Vec<SeededRow> },
    /// Readings compared against the baseline and a report written.
    Comparison {
        rows: Vec<ClassifiedRow>,
        report_path: PathBuf,
        baseline_updated: bool,
    },
}

impl RunOutcome {
    /// Stable tag used in API responses and CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            RunOutcome::ParseFailure(_) => "parse_failure",
            RunOutcome::FirstRun { .. } => "first_run",
            RunOutcome::Comparison { .. } => "comparison",
        }
    }
}

#[derive(Debug)]
pub struct DeviationPipeline {
    store: BaselineStore,
    reports: ReportWriter,
    thresholds: ThresholdTable,
    ingest: IngestConfig,
    policy: RatchetPolicy,
    prune_reports: bool,
}

impl DeviationPipeline {
    pub fn new(store: BaselineStore, reports: ReportWriter, thresholds: ThresholdTable) -> Self {
        Self {
            store,
            reports,
            thresholds,
            ingest: IngestConfig::default(),
            policy: RatchetPolicy::default(),
            prune_reports: false,
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            store: BaselineStore::new(config.storage.baseline_path()),
            reports: ReportWriter::new(&config.storage.report_dir),
            thresholds: config.thresholds.clone(),
            ingest: config.ingest.clone(),
            policy: RatchetPolicy::from(&config.policy),
            prune_reports: config.storage.prune_previous_reports,
        }
    }

    pub fn with_policy(mut self, policy: RatchetPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_ingest(mut self, ingest: IngestConfig) -> Self {
        self.ingest = ingest;
        self
    }

    pub fn with_report_pruning(mut self, enabled: bool) -> Self {
        self.prune_reports = enabled;
        self
    }

    pub fn store(&self) -> &BaselineStore {
        &self.store
    }

    pub fn reports(&self) -> &ReportWriter {
        &self.reports
    }

    pub fn thresholds(&self) -> &ThresholdTable {
        &self.thresholds
    }

    pub fn baseline_path(&self) -> &Path {
        self.store.path()
    }

    /// Parse an uploaded spreadsheet and run it.
    pub fn process_upload(&self, filename: &str, bytes: &[u8], date: NaiveDate) -> Result<RunOutcome, PipelineError> {
        self.process_upload_cancellable(filename, bytes, date, &CancellationToken::new())
    }

    /// [`process_upload`](Self::process_upload) that stops without writing
    /// once `cancel` fires.
    pub fn process_upload_cancellable(
        &self,
        filename: &str,
        bytes: &[u8],
        date: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, PipelineError> {
        match ingest::ingest_upload(filename, bytes, &self.ingest) {
            Ok(readings) => self.run_cancellable(readings, date, cancel),
            Err(e) => Ok(self.reject(filename, e)),
        }
    }

    /// Parse an already-read table and run it.
    pub fn process_table(&self, table: &RawTable, date: NaiveDate) -> Result<RunOutcome, PipelineError> {
        match parse_readings(table, &self.ingest) {
            Ok(readings) => self.run(readings, date),
            Err(e) => Ok(self.reject("<table>", e)),
        }
    }

    fn reject(&self, source: &str, e: ParseError) -> RunOutcome {
        warn!(source, code = e.code(), error = %e, "Upload rejected");
        RunOutcome::ParseFailure(e)
    }

    /// Compare `readings` against the baseline and apply the ratchet.
    pub fn run(&self, readings: ReadingSet, date: NaiveDate) -> Result<RunOutcome, PipelineError> {
        self.run_cancellable(readings, date, &CancellationToken::new())
    }

    /// [`run`](Self::run) that stops without writing once `cancel` fires.
    ///
    /// After the last check the run completes, so the baseline and report
    /// are never left half applied.
    pub fn run_cancellable(
        &self,
        readings: ReadingSet,
        date: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, PipelineError> {
        let guard = self.store.lock();
        ensure_live(cancel, "after acquiring the baseline lock")?;
        let baseline = guard.load()?;

        if baseline.is_empty() {
            if let BaselineDecision::Persist(next) = self.policy.decide(&[], true, &readings) {
                ensure_live(cancel, "before seeding the baseline")?;
                guard.replace(&next)?;
            }
            let rows = readings.iter().map(SeededRow::neutral).collect();
            return Ok(RunOutcome::FirstRun { rows });
        }

        let rows = classify(&readings, &baseline, &self.thresholds);
        let counts = StatusCounts::tally(&rows);
        let decision = self.policy.decide(&rows, false, &readings);

        let staged = self.reports.stage(&rows, date)?;
        ensure_live(cancel, "before the first durable write")?;

        let baseline_updated = match decision {
            BaselineDecision::Persist(next) => {
                guard.replace(&next)?;
                true
            }
            BaselineDecision::Keep => false,
        };

        let report_path = match staged.commit() {
            Ok(path) => path,
            Err(e) => {
                if baseline_updated {
                    error!(error = %e, "Baseline was replaced but the report could not be committed");
                }
                return Err(e.into());
            }
        };

        if self.prune_reports {
            if let Err(e) = self.reports.prune_except(date) {
                warn!(error = %e, "Report pruning failed");
            }
        }

        info!(
            rows = rows.len(),
            ok = counts.ok,
            deviation = counts.deviation,
            new = counts.new,
            baseline_updated,
            "Comparison run complete"
        );

        Ok(RunOutcome::Comparison {
            rows,
            report_path,
            baseline_updated,
        })
    }
}

fn ensure_live(cancel: &CancellationToken, stage: &'static str) -> Result<(), PipelineError> {
    if cancel.is_cancelled() {
        warn!(stage, "Deviation run cancelled, nothing written");
        return Err(PipelineError::Cancelled);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::Cell;
    use crate::types::Reading;
    use tempfile::tempdir;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 7).unwrap()
    }

    fn pipeline(root: &Path) -> DeviationPipeline {
        DeviationPipeline::new(
            BaselineStore::new(root.join("baseline.csv")),
            ReportWriter::new(root.join("reports")),
            ThresholdTable::empty().with_limit("CategoryX", 20000),
        )
    }

    fn one(mileage: f64) -> ReadingSet {
        vec![Reading::new("CategoryX", "V1", mileage)].into()
    }

    #[test]
    fn test_first_run_seeds_baseline_without_report() {
        let dir = tempdir().unwrap();
        let p = pipeline(dir.path());

        let outcome = p.run(one(1000.0), day()).unwrap();
        match outcome {
            RunOutcome::FirstRun { rows } => {
                assert_eq!(rows, vec![SeededRow::neutral(&Reading::new("CategoryX", "V1", 1000.0))]);
            }
            other => panic!("expected first run, got {other:?}"),
        }
        assert_eq!(p.store().snapshot().unwrap(), one(1000.0));
        assert!(p.reports().read(day()).is_err());
    }

    #[test]
    fn test_cancelled_first_run_writes_nothing() {
        let dir = tempdir().unwrap();
        let p = pipeline(dir.path());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = p.run_cancellable(one(1000.0), day(), &cancel).unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
        assert!(!p.baseline_path().exists());
    }

    #[test]
    fn test_cancelled_deviation_run_keeps_baseline_and_report_dir_clean() {
        let dir = tempdir().unwrap();
        let p = pipeline(dir.path());
        p.run(one(1000.0), day()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = p.run_cancellable(one(25000.0), day(), &cancel).unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
        assert_eq!(p.store().snapshot().unwrap(), one(1000.0));
        assert!(p.reports().read(day()).is_err());
        let leftovers = std::fs::read_dir(p.reports().dir()).map_or(0, Iterator::count);
        assert_eq!(leftovers, 0, "staged report must be cleaned up");
    }

    #[test]
    fn test_report_failure_leaves_baseline_untouched() {
        let dir = tempdir().unwrap();
        // Report directory path is occupied by a regular file
        std::fs::write(dir.path().join("reports"), b"").unwrap();
        let p = pipeline(dir.path());
        p.run(one(1000.0), day()).unwrap();

        let err = p.run(one(25000.0), day()).unwrap_err();
        assert!(matches!(err, PipelineError::Report(_)));
        assert_eq!(p.store().snapshot().unwrap(), one(1000.0));
    }

    #[test]
    fn test_unreadable_baseline_writes_no_report() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("baseline.csv"), "category,mileage\nCategoryX,1\n").unwrap();
        let p = pipeline(dir.path());

        let err = p.run(one(25000.0), day()).unwrap_err();
        assert!(matches!(err, PipelineError::Baseline(_)));
        assert!(!p.reports().dir().exists());
    }

    #[test]
    fn test_parse_failure_touches_nothing() {
        let dir = tempdir().unwrap();
        let p = pipeline(dir.path());
        let table = RawTable::new(
            vec!["קבוצה".into(), "רישוי".into(), "notes".into()],
            vec![vec![Cell::from_text("CategoryX"), Cell::from_text("V1"), Cell::from_text("x")]],
        );

        let outcome = p.process_table(&table, day()).unwrap();
        assert!(matches!(outcome, RunOutcome::ParseFailure(ParseError::MileageColumnNotFound)));
        assert!(!p.baseline_path().exists());
        assert_eq!(outcome.kind(), "parse_failure");
    }

    #[test]
    fn test_prunes_previous_reports_when_enabled() {
        let dir = tempdir().unwrap();
        let p = pipeline(dir.path()).with_report_pruning(true);
        let yesterday = day().pred_opt().unwrap();

        p.run(one(1000.0), yesterday).unwrap();
        p.run(one(1500.0), yesterday).unwrap();
        assert!(p.reports().read(yesterday).is_ok());

        p.run(one(1600.0), day()).unwrap();
        assert!(p.reports().read(yesterday).is_err());
        assert!(p.reports().read(day()).is_ok());
    }
}
