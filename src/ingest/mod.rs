//! Upload ingestion
//!
//! Decodes an uploaded spreadsheet into a [`RawTable`] and normalizes it
//! into a [`ReadingSet`](crate::types::ReadingSet):
//!
//! - `workbook`: xlsx / xlsm / xlsb / xls / ods via `calamine`
//! - `csv_sheet`: comma-separated uploads
//! - `parser`: column location, null filtering, mileage coercion

pub mod csv_sheet;
pub mod parser;
pub mod table;
pub mod workbook;

pub use parser::{parse_readings, ParseError};
pub use table::{Cell, RawTable};

use std::path::Path;

use crate::config::IngestConfig;
use crate::types::ReadingSet;

/// Upload container detected from the file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Workbook,
    Csv,
}

impl SheetFormat {
    pub fn from_filename(filename: &str) -> Option<Self> {
        let ext = Path::new(filename)
            .extension()?
            .to_str()?
            .to_ascii_lowercase();
        match ext.as_str() {
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Some(SheetFormat::Workbook),
            "csv" => Some(SheetFormat::Csv),
            _ => None,
        }
    }
}

/// Decode uploaded bytes into the configured worksheet's raw table.
pub fn read_upload(filename: &str, bytes: &[u8], cfg: &IngestConfig) -> Result<RawTable, ParseError> {
    match SheetFormat::from_filename(filename) {
        Some(SheetFormat::Workbook) => workbook::read_workbook(bytes, &cfg.sheet_name, cfg.header_rows),
        Some(SheetFormat::Csv) => csv_sheet::read_csv_sheet(bytes, cfg.header_rows),
        None => Err(ParseError::UnsupportedFormat(filename.to_string())),
    }
}

/// Full ingestion of one upload: decode, then parse.
pub fn ingest_upload(filename: &str, bytes: &[u8], cfg: &IngestConfig) -> Result<ReadingSet, ParseError> {
    let table = read_upload(filename, bytes, cfg)?;
    parse_readings(&table, cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(SheetFormat::from_filename("daily.XLSX"), Some(SheetFormat::Workbook));
        assert_eq!(SheetFormat::from_filename("daily.ods"), Some(SheetFormat::Workbook));
        assert_eq!(SheetFormat::from_filename("daily.csv"), Some(SheetFormat::Csv));
        assert_eq!(SheetFormat::from_filename("daily.pdf"), None);
        assert_eq!(SheetFormat::from_filename("daily"), None);
    }

    #[test]
    fn test_unsupported_upload() {
        let err = ingest_upload("notes.txt", b"hello", &IngestConfig::default()).unwrap_err();
        assert_eq!(err, ParseError::UnsupportedFormat("notes.txt".to_string()));
    }

    #[test]
    fn test_workbook_upload_end_to_end() {
        let bytes = workbook::fixtures::xlsx(&[
            ("Summary", vec![vec!["totals"]]),
            (
                "Grid",
                vec![
                    vec!["Fleet export"],
                    vec!["generated nightly"],
                    vec![" קבוצה ", "רישוי", "קילומטרז' נוכחי"],
                    vec!["4 נוסעים", "11-222-33", "20500"],
                    vec!["8 נוסעים", "44-555-66", ""],
                ],
            ),
        ]);

        let readings = ingest_upload("daily.xlsx", &bytes, &IngestConfig::default()).unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(
            readings.as_slice()[0],
            crate::types::Reading::new("4 נוסעים", "11-222-33", 20500.0)
        );
    }

    #[test]
    fn test_csv_upload_end_to_end() {
        let csv = "title\n\nקבוצה,רישוי,קילומטרז'\n4 נוסעים,1,10\n";
        // Blank line is not counted by the CSV reader, so skip only one row
        let cfg = IngestConfig {
            header_rows: 1,
            ..IngestConfig::default()
        };
        let readings = ingest_upload("upload.csv", csv.as_bytes(), &cfg).unwrap();
        assert_eq!(readings.len(), 1);
    }
}
