//! Raw tabular sheet model shared by the workbook and CSV readers

/// A single sheet cell after format-specific decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    /// Text cell, with blank text treated as missing.
    pub fn from_text(text: &str) -> Self {
        if text.trim().is_empty() {
            Cell::Empty
        } else {
            Cell::Text(text.to_string())
        }
    }

    pub fn is_missing(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(n) => n.is_nan(),
        }
    }

    /// Cell rendered as an identifier string.
    ///
    /// Integral numbers drop the fractional part so a plate stored as a
    /// number reads `1234567`, not `1234567.0`.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Cell::Number(n) if n.is_nan() => None,
            Cell::Number(n) => Some(format_number(*n)),
        }
    }

    /// Numeric coercion; `None` for missing or unparseable values.
    pub fn as_number(&self) -> Option<f64> {
        let value = match self {
            Cell::Empty => return None,
            Cell::Number(n) => *n,
            Cell::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

/// Render a number without a trailing `.0` when it is integral.
pub fn format_number(value: f64) -> String {
    // f64 Display already omits ".0" for integral values
    format!("{value}")
}

/// Header row plus data rows of one worksheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self { headers, rows }
    }

    /// Build a table from sheet rows, skipping leading non-data rows.
    ///
    /// `first_row` is the absolute sheet index of `rows[0]`; rows whose
    /// absolute index is below `skip` are discarded, the next row becomes the
    /// header and everything after it is data.
    pub fn from_rows(rows: Vec<Vec<Cell>>, first_row: usize, skip: usize) -> Self {
        let mut remaining = rows
            .into_iter()
            .enumerate()
            .filter(|(i, _)| first_row + i >= skip)
            .map(|(_, row)| row);

        let Some(header_row) = remaining.next() else {
            return Self::default();
        };

        let headers = header_row
            .iter()
            .map(|cell| cell.as_text().unwrap_or_default())
            .collect();

        Self {
            headers,
            rows: remaining.collect(),
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    #[test]
    fn test_integral_numbers_render_without_fraction() {
        assert_eq!(Cell::Number(1_234_567.0).as_text().as_deref(), Some("1234567"));
        assert_eq!(Cell::Number(12.5).as_text().as_deref(), Some("12.5"));
    }

    #[test]
    fn test_blank_text_is_missing() {
        assert!(Cell::from_text("   ").is_missing());
        assert!(Cell::Number(f64::NAN).is_missing());
        assert!(!text("x").is_missing());
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(text(" 1500 ").as_number(), Some(1500.0));
        assert_eq!(Cell::Number(42.0).as_number(), Some(42.0));
        assert_eq!(text("n/a").as_number(), None);
        assert_eq!(text("NaN").as_number(), None);
        assert_eq!(text("inf").as_number(), None);
        assert_eq!(Cell::Empty.as_number(), None);
    }

    #[test]
    fn test_from_rows_skips_leading_rows() {
        let rows = vec![
            vec![text("Fleet report")],
            vec![Cell::Empty],
            vec![text("a"), text("b")],
            vec![text("1"), text("2")],
        ];
        let table = RawTable::from_rows(rows, 0, 2);
        assert_eq!(table.headers(), ["a", "b"]);
        assert_eq!(table.row_count(), 1);
    }

    #[test]
    fn test_from_rows_counts_absolute_position() {
        // Range starts at sheet row 1, so only one more row is skipped
        let rows = vec![
            vec![text("title")],
            vec![text("a")],
            vec![text("1")],
        ];
        let table = RawTable::from_rows(rows, 1, 2);
        assert_eq!(table.headers(), ["a"]);
        assert_eq!(table.row_count(), 1);
    }

    #[test]
    fn test_from_rows_too_short() {
        let table = RawTable::from_rows(vec![vec![text("only")]], 0, 2);
        assert!(table.headers().is_empty());
        assert_eq!(table.row_count(), 0);
    }
}
