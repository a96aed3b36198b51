//! Result data types.

use crate::table::{ERROR_SENTINEL, METRIC_COLUMNS, METRIC_COUNT};
use crate::{ResultsError, ResultsResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// One metric cell: a number, or the ERROR sentinel of a failed case.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Number(f64),
    Error,
}

impl MetricValue {
    pub fn as_number(self) -> Option<f64> {
        match self {
            MetricValue::Number(v) => Some(v),
            MetricValue::Error => None,
        }
    }

    pub fn is_error(self) -> bool {
        matches!(self, MetricValue::Error)
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Number(v) => write!(f, "{v}"),
            MetricValue::Error => f.write_str(ERROR_SENTINEL),
        }
    }
}

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MetricValue::Number(v) => serializer.serialize_f64(*v),
            MetricValue::Error => serializer.serialize_str(ERROR_SENTINEL),
        }
    }
}

impl<'de> Deserialize<'de> for MetricValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Number(v) => Ok(MetricValue::Number(v)),
            Raw::Text(s) if s == ERROR_SENTINEL => Ok(MetricValue::Error),
            Raw::Text(s) => s
                .parse()
                .map(MetricValue::Number)
                .map_err(|_| serde::de::Error::custom(format!("invalid metric value \"{s}\""))),
        }
    }
}

/// Every metric a successful case reports, in table column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultMetrics {
    pub heating_set_hours: f64,
    pub hours_below_2c: f64,
    pub total_deadly_days: f64,
    pub min_outdoor_db_c: f64,
    pub min_outdoor_dp_c: f64,
    pub max_outdoor_db_c: f64,
    pub max_outdoor_dp_c: f64,
    pub caution_hours: f64,
    pub extreme_caution_hours: f64,
    pub danger_hours: f64,
    pub extreme_danger_hours: f64,
    pub eui: f64,
    pub peak_electric_demand_w: f64,
    pub heating_battery_kwh: f64,
    pub cooling_battery_kwh: f64,
    pub total_lifecycle_cost: f64,
    pub first_year_electric_cost: f64,
    pub first_year_gas_cost: f64,
    pub first_cost: f64,
    pub wall_cost: f64,
    pub roof_cost: f64,
    pub floor_cost: f64,
    pub window_cost: f64,
    pub door_cost: f64,
    pub air_sealing_cost: f64,
    pub mechanical_cost: f64,
    pub water_heater_cost: f64,
    pub appliances_cost: f64,
    pub pv_cost: f64,
    pub battery_cost: f64,
    pub pv_direct_energy: f64,
    pub pv_direct_maintenance: f64,
    pub pv_operational_co2: f64,
    pub pv_embodied_co2: f64,
    pub pv_energy_transition: f64,
}

impl ResultMetrics {
    /// Column of the first metric that is NaN or infinite.
    pub fn first_non_finite(&self) -> Option<&'static str> {
        METRIC_COLUMNS
            .iter()
            .zip(self.to_values())
            .find(|(_, v)| !v.is_finite())
            .map(|(column, _)| *column)
    }

    pub fn to_values(&self) -> [f64; METRIC_COUNT] {
        [
            self.heating_set_hours,
            self.hours_below_2c,
            self.total_deadly_days,
            self.min_outdoor_db_c,
            self.min_outdoor_dp_c,
            self.max_outdoor_db_c,
            self.max_outdoor_dp_c,
            self.caution_hours,
            self.extreme_caution_hours,
            self.danger_hours,
            self.extreme_danger_hours,
            self.eui,
            self.peak_electric_demand_w,
            self.heating_battery_kwh,
            self.cooling_battery_kwh,
            self.total_lifecycle_cost,
            self.first_year_electric_cost,
            self.first_year_gas_cost,
            self.first_cost,
            self.wall_cost,
            self.roof_cost,
            self.floor_cost,
            self.window_cost,
            self.door_cost,
            self.air_sealing_cost,
            self.mechanical_cost,
            self.water_heater_cost,
            self.appliances_cost,
            self.pv_cost,
            self.battery_cost,
            self.pv_direct_energy,
            self.pv_direct_maintenance,
            self.pv_operational_co2,
            self.pv_embodied_co2,
            self.pv_energy_transition,
        ]
    }
}

/// One row of the results table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub run_name: String,
    values: Vec<MetricValue>,
}

impl ResultRow {
    pub fn from_metrics(run_name: impl Into<String>, metrics: &ResultMetrics) -> Self {
        Self {
            run_name: run_name.into(),
            values: metrics.to_values().into_iter().map(MetricValue::Number).collect(),
        }
    }

    /// Row of a failed case: the name is kept, every metric is ERROR.
    pub fn error(run_name: impl Into<String>) -> Self {
        Self {
            run_name: run_name.into(),
            values: vec![MetricValue::Error; METRIC_COLUMNS.len()],
        }
    }

    pub fn from_values(run_name: impl Into<String>, values: Vec<MetricValue>) -> ResultsResult<Self> {
        let run_name = run_name.into();
        if values.len() != METRIC_COLUMNS.len() {
            return Err(ResultsError::RowWidth {
                case: run_name,
                found: values.len(),
                expected: METRIC_COLUMNS.len(),
            });
        }
        Ok(Self { run_name, values })
    }

    pub fn values(&self) -> &[MetricValue] {
        &self.values
    }

    pub fn get(&self, column: &str) -> Option<MetricValue> {
        let idx = METRIC_COLUMNS.iter().position(|c| *c == column)?;
        self.values.get(idx).copied()
    }

    pub fn is_error(&self) -> bool {
        self.values.iter().all(|v| v.is_error())
    }

    /// Cells as written to CSV: run name first.
    pub fn record(&self) -> Vec<String> {
        std::iter::once(self.run_name.clone())
            .chain(self.values.iter().map(|v| v.to_string()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_row_is_all_sentinel() {
        let row = ResultRow::error("RETROFIT_A");
        assert!(row.is_error());
        assert_eq!(row.values().len(), METRIC_COLUMNS.len());
        assert_eq!(row.record()[0], "RETROFIT_A");
        assert!(row.record()[1..].iter().all(|c| c == ERROR_SENTINEL));
    }

    #[test]
    fn metrics_land_in_named_columns() {
        let metrics = ResultMetrics {
            eui: 12.5,
            total_lifecycle_cost: 1000.0,
            pv_energy_transition: 7.0,
            ..Default::default()
        };
        let row = ResultRow::from_metrics("BASE", &metrics);
        assert!(!row.is_error());
        assert_eq!(row.get("EUI"), Some(MetricValue::Number(12.5)));
        assert_eq!(row.get("Total ADORB Cost [$]"), Some(MetricValue::Number(1000.0)));
        assert_eq!(row.get("pv_eTrans_tot"), Some(MetricValue::Number(7.0)));
        assert_eq!(row.get("Nope"), None);
    }

    #[test]
    fn non_finite_metrics_are_named() {
        assert_eq!(ResultMetrics::default().first_non_finite(), None);
        let metrics = ResultMetrics {
            eui: f64::NAN,
            first_cost: f64::INFINITY,
            ..Default::default()
        };
        assert_eq!(metrics.first_non_finite(), Some("EUI"));
        let metrics = ResultMetrics {
            first_cost: f64::INFINITY,
            ..Default::default()
        };
        assert_eq!(metrics.first_non_finite(), Some("First Cost [$]"));
    }

    #[test]
    fn json_uses_numbers_and_sentinel() {
        let json = serde_json::to_string(&vec![MetricValue::Number(1.5), MetricValue::Error]).unwrap();
        assert_eq!(json, r#"[1.5,"ERROR"]"#);
        let back: Vec<MetricValue> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, vec![MetricValue::Number(1.5), MetricValue::Error]);
    }

    #[test]
    fn width_is_checked() {
        assert!(ResultRow::from_values("X", vec![MetricValue::Error]).is_err());
    }
}
