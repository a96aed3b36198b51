//! Tabular report reader.
//!
//! The tabular report is written in long form: one `Table,Row,Column,Value`
//! record per cell. Cells are looked up by their three-part key; row order
//! within a table is preserved for line-item tables.

use crate::error::{SimError, SimResult};
use std::collections::HashMap;
use std::path::Path;

/// Table, row and column names the stages read.
pub mod keys {
    pub const SITE_SOURCE_ENERGY: &str = "Site and Source Energy";
    pub const TOTAL_SITE_ENERGY: &str = "Total Site Energy";
    pub const ENERGY_PER_AREA: &str = "Energy Per Conditioned Building Area [kBtu/ft2]";

    pub const TIME_BIN: &str = "Time Bin Results";
    pub const TIME_BIN_TOTAL: &str = "Total";
    pub const HOURS_BELOW_2C: &str = "Hours Below 2C";

    pub const HEATING_SET: &str = "Heating SET Hours";
    pub const HEAT_INDEX: &str = "Heat Index Hours";
    pub const FACILITY: &str = "Facility";
    pub const SET_BELOW_12_2C: &str = "SET <= 12.2C Hours";
    pub const CAUTION: &str = "Caution (> 26.7, <= 32.2C)";
    pub const EXTREME_CAUTION: &str = "Extreme Caution (> 32.2, <= 39.4C)";
    pub const DANGER: &str = "Danger (> 39.4, <= 51.7C)";
    pub const EXTREME_DANGER: &str = "Extreme Danger (> 51.7C)";

    pub const PEAK_ELECTRICITY: &str = "Annual and Peak Values - Electricity";
    pub const ELECTRICITY_FACILITY: &str = "Electricity:Facility";
    pub const MAXIMUM_VALUE: &str = "Electricity Maximum Value [W]";

    pub const COST_ESTIMATE: &str = "Construction Cost Estimate Summary";
    pub const COST_ESTIMATE_TOTAL: &str = "Cost Estimate Total";
    pub const CURRENT_MODEL: &str = "Current Bldg. Model";

    pub const COST_LINE_ITEMS: &str = "Cost Line Item Details";
    pub const ITEM_NAME: &str = "Item Name";
    pub const QUANTITY: &str = "Quantity";
    pub const SUBTOTAL: &str = "SubTotal $";
}

pub const HEADER: [&str; 4] = ["Table", "Row", "Column", "Value"];

/// One cost line item as summarised by the simulator.
#[derive(Debug, Clone, PartialEq)]
pub struct CostLineItem {
    pub name: String,
    pub quantity: f64,
    pub subtotal: f64,
}

#[derive(Debug, Clone, Default)]
pub struct TabularReport {
    cells: HashMap<(String, String, String), String>,
    row_order: HashMap<String, Vec<String>>,
    source: String,
}

impl TabularReport {
    pub fn read(path: &Path) -> SimResult<Self> {
        if !path.is_file() {
            return Err(SimError::OutputMissing {
                path: path.to_path_buf(),
            });
        }
        let csv_err = |source| SimError::Csv {
            path: path.to_path_buf(),
            source,
        };
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(csv_err)?;

        let mut report = TabularReport {
            source: path.display().to_string(),
            ..Default::default()
        };
        for record in reader.records() {
            let record = record.map_err(csv_err)?;
            if record.len() != HEADER.len() {
                return Err(SimError::MalformedOutput {
                    path: path.to_path_buf(),
                    message: format!("expected 4 cells, found {}", record.len()),
                });
            }
            report.insert(&record[0], &record[1], &record[2], &record[3]);
        }
        Ok(report)
    }

    pub fn insert(&mut self, table: &str, row: &str, column: &str, value: &str) {
        let rows = self.row_order.entry(table.to_string()).or_default();
        if !rows.iter().any(|r| r == row) {
            rows.push(row.to_string());
        }
        self.cells.insert(
            (table.to_string(), row.to_string(), column.to_string()),
            value.to_string(),
        );
    }

    pub fn text(&self, table: &str, row: &str, column: &str) -> Option<&str> {
        self.cells
            .get(&(table.to_string(), row.to_string(), column.to_string()))
            .map(String::as_str)
    }

    pub fn value(&self, table: &str, row: &str, column: &str) -> SimResult<f64> {
        let missing = || SimError::ReportValueMissing {
            table: table.to_string(),
            row: row.to_string(),
            column: column.to_string(),
        };
        let raw = self.text(table, row, column).ok_or_else(missing)?;
        raw.parse().map_err(|_| SimError::MalformedOutput {
            path: self.source.clone().into(),
            message: format!("{table} / {row} / {column}: \"{raw}\" is not a number"),
        })
    }

    /// Row names of a table in file order.
    pub fn rows(&self, table: &str) -> &[String] {
        self.row_order
            .get(table)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Cost line items with a positive quantity, in report order.
    pub fn cost_line_items(&self) -> SimResult<Vec<CostLineItem>> {
        use keys::*;
        let mut items = Vec::new();
        for row in self.rows(COST_LINE_ITEMS) {
            let Some(name) = self.text(COST_LINE_ITEMS, row, ITEM_NAME) else {
                continue;
            };
            let quantity = self.value(COST_LINE_ITEMS, row, QUANTITY)?;
            if quantity <= 0.0 {
                continue;
            }
            items.push(CostLineItem {
                name: name.to_string(),
                quantity,
                subtotal: self.value(COST_LINE_ITEMS, row, SUBTOTAL)?,
            });
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TabularReport {
        let mut report = TabularReport::default();
        report.insert(keys::SITE_SOURCE_ENERGY, keys::TOTAL_SITE_ENERGY, keys::ENERGY_PER_AREA, "21.5");
        report.insert(keys::COST_LINE_ITEMS, "1", keys::ITEM_NAME, "WALL_R20");
        report.insert(keys::COST_LINE_ITEMS, "1", keys::QUANTITY, "120");
        report.insert(keys::COST_LINE_ITEMS, "1", keys::SUBTOTAL, "6000");
        report.insert(keys::COST_LINE_ITEMS, "2", keys::ITEM_NAME, "BATTERY COST");
        report.insert(keys::COST_LINE_ITEMS, "2", keys::QUANTITY, "0");
        report.insert(keys::COST_LINE_ITEMS, "2", keys::SUBTOTAL, "0");
        report
    }

    #[test]
    fn looks_up_cells() {
        let report = sample();
        assert_eq!(
            report
                .value(keys::SITE_SOURCE_ENERGY, keys::TOTAL_SITE_ENERGY, keys::ENERGY_PER_AREA)
                .unwrap(),
            21.5
        );
        assert!(matches!(
            report.value(keys::HEAT_INDEX, keys::FACILITY, keys::DANGER),
            Err(SimError::ReportValueMissing { .. })
        ));
    }

    #[test]
    fn line_items_skip_zero_quantity() {
        let items = sample().cost_line_items().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "WALL_R20");
        assert_eq!(items[0].subtotal, 6000.0);
    }
}
