//! Ingestion parser: raw sheet -> normalized `ReadingSet`
//!
//! Source spreadsheets are not schema-locked, so the mileage column is
//! located by substring match on trimmed headers (`קילומטרז' *`,
//! `קילומטרז (ק"מ)` and the like all match). Category and vehicle columns
//! must match exactly after trimming.

use thiserror::Error;
use tracing::{debug, info, warn};

use super::RawTable;
use crate::config::IngestConfig;
use crate::types::{Reading, ReadingSet};

/// Bad-input failures. None of them mutate any state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Mileage column not found")]
    MileageColumnNotFound,

    #[error("Required column not found: {0}")]
    MissingColumn(String),

    #[error("Worksheet not found: {0}")]
    SheetNotFound(String),

    #[error("Unsupported upload format: {0}")]
    UnsupportedFormat(String),

    #[error("Unreadable upload: {0}")]
    Unreadable(String),
}

impl ParseError {
    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            ParseError::MileageColumnNotFound => "MILEAGE_COLUMN_NOT_FOUND",
            ParseError::MissingColumn(_) => "MISSING_COLUMN",
            ParseError::SheetNotFound(_) => "SHEET_NOT_FOUND",
            ParseError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            ParseError::Unreadable(_) => "UNREADABLE_UPLOAD",
        }
    }
}

/// Column positions resolved from the header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnLayout {
    category: usize,
    vehicle: usize,
    mileage: usize,
}

fn resolve_columns(headers: &[String], cfg: &IngestConfig) -> Result<ColumnLayout, ParseError> {
    let normalized: Vec<&str> = headers.iter().map(|h| h.trim()).collect();

    let mileage = normalized
        .iter()
        .position(|h| h.contains(cfg.mileage_token.as_str()))
        .ok_or(ParseError::MileageColumnNotFound)?;

    let exact = |name: &str| {
        normalized
            .iter()
            .position(|h| *h == name.trim())
            .ok_or_else(|| ParseError::MissingColumn(name.to_string()))
    };

    Ok(ColumnLayout {
        category: exact(&cfg.category_column)?,
        vehicle: exact(&cfg.vehicle_column)?,
        mileage,
    })
}

/// Turn a raw sheet into readings.
///
/// Rows missing any of the three fields are dropped, then rows whose mileage
/// cannot be coerced to a finite number are dropped. Surviving rows keep
/// their upload order.
pub fn parse_readings(table: &RawTable, cfg: &IngestConfig) -> Result<ReadingSet, ParseError> {
    let layout = match resolve_columns(table.headers(), cfg) {
        Ok(layout) => layout,
        Err(e) => {
            debug!(headers = ?table.headers(), error = %e, "Column resolution failed");
            return Err(e);
        }
    };
    debug!(
        mileage_header = %table.headers()[layout.mileage].trim(),
        "Resolved mileage column"
    );

    let mut readings = ReadingSet::new();
    let mut dropped_missing = 0usize;
    let mut dropped_unparseable = 0usize;

    for (row_num, row) in table.rows().iter().enumerate() {
        let cell = |idx: usize| row.get(idx).filter(|c| !c.is_missing());

        let (Some(category), Some(vehicle), Some(mileage_cell)) = (
            cell(layout.category).and_then(|c| c.as_text()),
            cell(layout.vehicle).and_then(|c| c.as_text()),
            cell(layout.mileage),
        ) else {
            dropped_missing += 1;
            continue;
        };

        let Some(mileage) = mileage_cell.as_number() else {
            debug!(row = row_num, vehicle = %vehicle, value = ?mileage_cell, "Unparseable mileage, dropping row");
            dropped_unparseable += 1;
            continue;
        };

        readings.push(Reading {
            category,
            vehicle_id: vehicle,
            mileage,
        });
    }

    if dropped_unparseable > 0 {
        warn!(dropped = dropped_unparseable, "Rows with unparseable mileage dropped");
    }
    info!(
        rows = readings.len(),
        dropped_missing, dropped_unparseable, "Parsed readings from upload"
    );

    Ok(readings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::Cell;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    fn cfg() -> IngestConfig {
        IngestConfig::default()
    }

    #[test]
    fn test_mileage_header_variant_matches() {
        let table = RawTable::new(
            headers(&[" קבוצה", "רישוי ", "קילומטרז' *", "הערות"]),
            vec![vec![text("4 נוסעים"), text("11-222-33"), Cell::Number(1500.0), Cell::Empty]],
        );
        let readings = parse_readings(&table, &cfg()).unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings.as_slice()[0], Reading::new("4 נוסעים", "11-222-33", 1500.0));
    }

    #[test]
    fn test_missing_mileage_column() {
        let table = RawTable::new(
            headers(&["קבוצה", "רישוי", "odometer"]),
            vec![vec![text("A"), text("1"), Cell::Number(1.0)]],
        );
        assert_eq!(
            parse_readings(&table, &cfg()).unwrap_err(),
            ParseError::MileageColumnNotFound
        );
        assert_eq!(ParseError::MileageColumnNotFound.to_string(), "Mileage column not found");
    }

    #[test]
    fn test_missing_vehicle_column() {
        let table = RawTable::new(headers(&["קבוצה", "קילומטרז'"]), vec![]);
        assert_eq!(
            parse_readings(&table, &cfg()).unwrap_err(),
            ParseError::MissingColumn("רישוי".to_string())
        );
    }

    #[test]
    fn test_drops_missing_and_unparseable_rows_in_order() {
        let table = RawTable::new(
            headers(&["קבוצה", "רישוי", "קילומטרז'"]),
            vec![
                vec![text("A"), text("1"), Cell::Number(100.0)],
                vec![text("A"), Cell::Empty, Cell::Number(200.0)],
                vec![text("A"), text("3"), text("לא ידוע")],
                vec![text("B"), text("4")],
                vec![text("B"), Cell::Number(5.0), text(" 500 ")],
                vec![text("C"), text("6"), Cell::Number(f64::NAN)],
            ],
        );
        let readings = parse_readings(&table, &cfg()).unwrap();
        let ids: Vec<&str> = readings.iter().map(|r| r.vehicle_id.as_str()).collect();
        assert_eq!(ids, ["1", "5"]);
        assert_eq!(readings.as_slice()[1].mileage, 500.0);
    }

    #[test]
    fn test_custom_column_names() {
        let cfg = IngestConfig {
            category_column: "Group".to_string(),
            vehicle_column: "Plate".to_string(),
            mileage_token: "Odometer".to_string(),
            ..IngestConfig::default()
        };
        let table = RawTable::new(
            headers(&["Plate", "Group", "Odometer (km)"]),
            vec![vec![text("P1"), text("Van"), Cell::Number(42.0)]],
        );
        let readings = parse_readings(&table, &cfg).unwrap();
        assert_eq!(readings.as_slice()[0], Reading::new("Van", "P1", 42.0));
    }

    #[test]
    fn test_empty_table_reports_mileage_first() {
        assert_eq!(
            parse_readings(&RawTable::default(), &cfg()).unwrap_err(),
            ParseError::MileageColumnNotFound
        );
    }
}
