//! Batch results table.
//!
//! Rows are persisted as they arrive: each one is appended to
//! `<study>/<batch>_ResultsTable.partial.csv` and flushed, and a single-row
//! `<study>/<batch>_<case>_ResultRow.csv` is written next to it. After the last case
//! the consolidated table is exported in case-list order.

use crate::types::ResultRow;
use crate::{ResultsError, ResultsResult};
use rv_core::naming::case_stem;
use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};

pub const RUN_NAME_COLUMN: &str = "Run Name";
pub const ERROR_SENTINEL: &str = "ERROR";
pub const METRIC_COUNT: usize = 35;

pub const METRIC_COLUMNS: [&str; METRIC_COUNT] = [
    "SET ≤ 12.2°C Hours (F)",
    "Hours < 2°C [hr]",
    "Total Deadly Days",
    "Min outdoor DB [°C]",
    "Min outdoor DP [°C]",
    "Max outdoor DB [°C]",
    "Max outdoor DP [°C]",
    "Caution (> 26.7, ≤ 32.2°C) [hr]",
    "Extreme Caution (> 32.2, ≤ 39.4°C) [hr]",
    "Danger (> 39.4, ≤ 51.7°C) [hr]",
    "Extreme Danger (> 51.7°C) [hr]",
    "EUI",
    "Peak Electric Demand [W]",
    "Heating Battery Size [kWh]",
    "Cooling Battery Size [kWh]",
    "Total ADORB Cost [$]",
    "First Year Electric Cost [$]",
    "First Year Gas Cost [$]",
    "First Cost [$]",
    "Wall Cost [$]",
    "Roof Cost [$]",
    "Floor Cost [$]",
    "Window Cost [$]",
    "Door Cost [$]",
    "Air Sealing Cost [$]",
    "Mechanical Cost [$]",
    "Water Heater Cost [$]",
    "Appliances Cost [$]",
    "PV Cost [$]",
    "Battery Cost [$]",
    "pv_dirEn_tot",
    "pv_dirMR_tot",
    "pv_opCO2_tot",
    "pv_emCO2_tot",
    "pv_eTrans_tot",
];

fn header() -> impl Iterator<Item = &'static str> {
    std::iter::once(RUN_NAME_COLUMN).chain(METRIC_COLUMNS)
}

pub struct ResultsTable {
    study_folder: PathBuf,
    batch: String,
    rows: Vec<ResultRow>,
    names: HashSet<String>,
    partial: csv::Writer<File>,
}

impl ResultsTable {
    /// Start a fresh table; an existing partial file of the same batch is
    /// replaced.
    pub fn create(study_folder: &Path, batch: &str) -> ResultsResult<Self> {
        let path = partial_path(study_folder, batch);
        let mut partial = csv::Writer::from_path(&path)?;
        partial.write_record(header())?;
        partial.flush()?;
        Ok(Self {
            study_folder: study_folder.to_path_buf(),
            batch: batch.to_string(),
            rows: Vec::new(),
            names: HashSet::new(),
            partial,
        })
    }

    pub fn partial_path(&self) -> PathBuf {
        partial_path(&self.study_folder, &self.batch)
    }

    pub fn csv_path(&self) -> PathBuf {
        self.study_folder
            .join(format!("{}_ResultsTable.csv", self.batch))
    }

    pub fn json_path(&self) -> PathBuf {
        self.study_folder
            .join(format!("{}_ResultsTable.json", self.batch))
    }

    pub fn case_row_path(&self, case: &str) -> PathBuf {
        self.study_folder
            .join(format!("{}_ResultRow.csv", case_stem(&self.batch, case)))
    }

    /// Record one row: appended and flushed to the partial table, and
    /// written to the case's own file. A second row for the same case is
    /// rejected.
    pub fn append(&mut self, row: ResultRow) -> ResultsResult<()> {
        if self.names.contains(&row.run_name) {
            return Err(ResultsError::DuplicateRow {
                case: row.run_name.clone(),
            });
        }

        let record = row.record();
        self.partial.write_record(&record)?;
        self.partial.flush()?;

        let mut single = csv::Writer::from_path(self.case_row_path(&row.run_name))?;
        single.write_record(header())?;
        single.write_record(&record)?;
        single.flush()?;

        tracing::debug!(
            case = %row.run_name,
            error = row.is_error(),
            "result row recorded"
        );
        self.names.insert(row.run_name.clone());
        self.rows.push(row);
        Ok(())
    }

    pub fn contains(&self, case: &str) -> bool {
        self.names.contains(case)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows in arrival order.
    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    /// Rows sorted by position in `order`; names not listed keep arrival
    /// order after the listed ones.
    pub fn ordered_rows(&self, order: &[&str]) -> Vec<ResultRow> {
        let position = |name: &str| order.iter().position(|n| *n == name).unwrap_or(order.len());
        let mut rows = self.rows.clone();
        rows.sort_by_key(|row| position(&row.run_name));
        rows
    }

    /// Write the consolidated CSV and JSON tables in `order`.
    pub fn export(&self, order: &[&str]) -> ResultsResult<Vec<ResultRow>> {
        let rows = self.ordered_rows(order);

        let mut writer = csv::Writer::from_path(self.csv_path())?;
        writer.write_record(header())?;
        for row in &rows {
            writer.write_record(row.record())?;
        }
        writer.flush()?;

        let json = serde_json::to_string_pretty(&rows)?;
        std::fs::write(self.json_path(), json)?;

        tracing::info!(
            batch = %self.batch,
            rows = rows.len(),
            path = %self.csv_path().display(),
            "results table exported"
        );
        Ok(rows)
    }
}

fn partial_path(study_folder: &Path, batch: &str) -> PathBuf {
    study_folder.join(format!("{batch}_ResultsTable.partial.csv"))
}

/// Read a results table CSV back into rows.
pub fn read_table(path: &Path) -> ResultsResult<Vec<ResultRow>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut cells = record.iter();
        let name = cells.next().unwrap_or_default().to_string();
        let values = cells
            .map(|cell| match cell {
                ERROR_SENTINEL => crate::MetricValue::Error,
                other => other
                    .parse()
                    .map(crate::MetricValue::Number)
                    .unwrap_or(crate::MetricValue::Error),
            })
            .collect();
        rows.push(ResultRow::from_values(name, values)?);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_has_run_name_then_metrics() {
        let cols: Vec<_> = header().collect();
        assert_eq!(cols.len(), 36);
        assert_eq!(cols[0], "Run Name");
        assert_eq!(cols[16], "Total ADORB Cost [$]");
        assert_eq!(cols[35], "pv_eTrans_tot");
    }

    #[test]
    fn metric_columns_are_unique() {
        let unique: HashSet<_> = METRIC_COLUMNS.iter().collect();
        assert_eq!(unique.len(), METRIC_COUNT);
    }
}
