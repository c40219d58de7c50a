//! CSV upload reader

use super::{Cell, ParseError, RawTable};
use crate::storage::UTF8_BOM;

/// Read a CSV upload with the same leading-row skip rule as worksheets.
///
/// Blank lines are ignored by the CSV reader and therefore not counted
/// towards `skip_rows`.
pub fn read_csv_sheet(bytes: &[u8], skip_rows: usize) -> Result<RawTable, ParseError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for (line_num, result) in reader.records().enumerate() {
        let record = result.map_err(|e| {
            ParseError::Unreadable(format!("CSV parse error at line {}: {}", line_num + 1, e))
        })?;
        rows.push(record.iter().map(Cell::from_text).collect());
    }

    Ok(RawTable::from_rows(rows, 0, skip_rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Vehicle mileage export,,
generated 2026-10-17,,
קבוצה,רישוי,קילומטרז'
4 נוסעים,12-345-67,15000
6 נוסעים,98-765-43,
";

    #[test]
    fn test_reads_after_skipped_rows() {
        let table = read_csv_sheet(SAMPLE.as_bytes(), 2).unwrap();
        assert_eq!(table.headers(), ["קבוצה", "רישוי", "קילומטרז'"]);
        assert_eq!(table.row_count(), 2);
        assert!(table.rows()[1][2].is_missing());
    }

    #[test]
    fn test_strips_bom() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice("a,b\n1,2\n".as_bytes());
        let table = read_csv_sheet(&bytes, 0).unwrap();
        assert_eq!(table.headers(), ["a", "b"]);
    }

    #[test]
    fn test_invalid_utf8_is_unreadable() {
        let err = read_csv_sheet(b"a,b\n\xff\xfe,1\n", 0).unwrap_err();
        assert!(matches!(err, ParseError::Unreadable(_)));
    }
}
