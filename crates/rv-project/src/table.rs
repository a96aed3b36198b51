//! Header-addressed CSV tables.
//!
//! Run lists and database files are spreadsheet exports whose column names
//! carry units and punctuation (`PV_COST_[$/W]`), so rows are kept as strings
//! and looked up by header name rather than deserialized into fixed structs.

use crate::{ProjectError, ProjectResult};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub struct CsvTable {
    path: PathBuf,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

fn is_blank(cell: &str) -> bool {
    let cell = cell.trim();
    cell.is_empty() || cell.eq_ignore_ascii_case("nan")
}

impl CsvTable {
    pub fn read(path: &Path) -> ProjectResult<Self> {
        let csv_err = |source| ProjectError::Csv {
            path: path.to_path_buf(),
            source,
        };
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(csv_err)?;

        let headers: Vec<String> = reader
            .headers()
            .map_err(csv_err)?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(csv_err)?;
            if record.iter().all(is_blank) {
                continue;
            }
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            row.resize(headers.len(), String::new());
            rows.push(row);
        }

        Ok(Self {
            path: path.to_path_buf(),
            headers,
            rows,
        })
    }

    /// Build a table in memory; short rows are padded with empty cells.
    pub fn from_parts(path: impl Into<PathBuf>, headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self {
            path: path.into(),
            headers,
            rows,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_index(column).is_some()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == column)
    }

    /// Raw cell content; `None` when the column does not exist.
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let col = self.column_index(column)?;
        self.rows.get(row).map(|r| r[col].as_str())
    }

    /// Cell content treating empty and `nan` cells as absent.
    pub fn text(&self, row: usize, column: &str) -> Option<&str> {
        self.cell(row, column).filter(|c| !is_blank(c)).map(str::trim)
    }

    /// Numeric cell; absent cells are `Ok(None)`, unparsable ones an error.
    pub fn number(&self, row: usize, column: &str) -> ProjectResult<Option<f64>> {
        match self.text(row, column) {
            None => Ok(None),
            Some(raw) => raw
                .parse::<f64>()
                .map(Some)
                .map_err(|_| ProjectError::InvalidValue {
                    context: format!("{} row {}", self.path.display(), row + 1),
                    column: column.to_string(),
                    value: raw.to_string(),
                    reason: "expected a number".to_string(),
                }),
        }
    }

    /// Non-blank values of one column, in row order.
    pub fn column_values<'a>(&'a self, column: &str) -> Vec<&'a str> {
        match self.column_index(column) {
            Some(col) => self
                .rows
                .iter()
                .map(|r| r[col].trim())
                .filter(|c| !is_blank(c))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Find the first row whose `column` equals `value`.
    pub fn find_row(&self, column: &str, value: &str) -> Option<usize> {
        let col = self.column_index(column)?;
        self.rows.iter().position(|r| r[col].trim() == value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CsvTable {
        CsvTable::from_parts(
            "sample.csv",
            vec!["Name".into(), "Cost".into(), "Note".into()],
            vec![
                vec!["WALL_A".into(), "12.5".into(), "nan".into()],
                vec!["WALL_B".into(), "abc".into()],
            ],
        )
    }

    #[test]
    fn lookups_by_header() {
        let table = sample();
        assert_eq!(table.len(), 2);
        assert_eq!(table.text(0, "Name"), Some("WALL_A"));
        assert_eq!(table.text(0, "Note"), None);
        assert_eq!(table.cell(1, "Note"), Some(""));
        assert_eq!(table.cell(0, "Missing"), None);
        assert_eq!(table.find_row("Name", "WALL_B"), Some(1));
        assert_eq!(table.column_values("Name"), vec!["WALL_A", "WALL_B"]);
    }

    #[test]
    fn numbers_parse_or_error() {
        let table = sample();
        assert_eq!(table.number(0, "Cost").unwrap(), Some(12.5));
        assert_eq!(table.number(0, "Note").unwrap(), None);
        assert!(table.number(1, "Cost").is_err());
    }
}
