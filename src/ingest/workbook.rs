//! Workbook reader (xlsx, xlsm, xlsb, xls, ods) backed by `calamine`

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use std::io::Cursor;
use tracing::debug;

use super::{Cell, ParseError, RawTable};

/// Read one named worksheet from an in-memory workbook.
pub fn read_workbook(bytes: &[u8], sheet: &str, skip_rows: usize) -> Result<RawTable, ParseError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| ParseError::Unreadable(e.to_string()))?;

    let sheet_names = workbook.sheet_names();
    if !sheet_names.iter().any(|name| name == sheet) {
        debug!(requested = sheet, available = ?sheet_names, "Worksheet missing from upload");
        return Err(ParseError::SheetNotFound(sheet.to_string()));
    }

    let range = workbook
        .worksheet_range(sheet)
        .map_err(|e| ParseError::Unreadable(e.to_string()))?;

    Ok(range_to_table(&range, skip_rows))
}

/// Convert a decoded worksheet range into a [`RawTable`].
///
/// calamine ranges start at the first used cell, so the range origin is
/// passed through to keep the header-skip count anchored to sheet row 0.
pub fn range_to_table(range: &Range<Data>, skip_rows: usize) -> RawTable {
    let first_row = range.start().map_or(0, |(row, _)| row as usize);
    let rows = range
        .rows()
        .map(|row| row.iter().map(cell_from_data).collect())
        .collect();
    RawTable::from_rows(rows, first_row, skip_rows)
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::from_text(s),
        Data::Float(f) => Cell::Number(*f),
        #[allow(clippy::cast_precision_loss)]
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
    }
}
