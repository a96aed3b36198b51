//! Hourly time-series output.
//!
//! The simulator stamps each row with ` MM/DD  HH:MM:SS`, hours running 1..=24
//! and no year. Rows are mapped to 0-based hours of the simulation year.
//! Warm-up rows preceding the first `01/01 00:00` of the run period are dropped.

use crate::error::{SimError, SimResult};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Hourly column names read by the stages.
pub mod columns {
    pub const DATE_TIME: &str = "Date/Time";
    pub const OUTDOOR_DRY_BULB: &str =
        "Environment:Site Outdoor Air Drybulb Temperature [C](Hourly)";
    pub const OUTDOOR_DEW_POINT: &str =
        "Environment:Site Outdoor Air Dewpoint Temperature [C](Hourly)";
    pub const PURCHASED_ELECTRICITY: &str =
        "Whole Building:Facility Total Purchased Electricity Energy [J](Hourly)";
    pub const SURPLUS_ELECTRICITY: &str =
        "Whole Building:Facility Total Surplus Electricity Energy [J](Hourly)";
    pub const NATURAL_GAS: &str = "NaturalGas:Facility [J](Hourly)";
    pub const OCCUPANT_SET: &str =
        "ZONE OCCUPANTS:Zone Thermal Comfort Pierce Model Standard Effective Temperature [C](Hourly)";

    pub fn zone_air_temperature(zone: &str) -> String {
        format!("{}:Zone Air Temperature [C](Hourly)", zone.to_uppercase())
    }

    pub fn zone_relative_humidity(zone: &str) -> String {
        format!("{}:Zone Air Relative Humidity [%](Hourly)", zone.to_uppercase())
    }

    pub fn zone_heat_index(zone: &str) -> String {
        format!("{}:Zone Heat Index [C](Hourly)", zone.to_uppercase())
    }
}

#[derive(Debug, Clone)]
pub struct HourlySeries {
    source: PathBuf,
    timestamps: Vec<NaiveDateTime>,
    index: HashMap<String, usize>,
    names: Vec<String>,
    data: Vec<Vec<f64>>,
}

impl HourlySeries {
    /// Read `path`, stamping rows in `year`.
    pub fn read(path: &Path, year: i32) -> SimResult<Self> {
        if !path.is_file() {
            return Err(SimError::OutputMissing {
                path: path.to_path_buf(),
            });
        }
        let csv_err = |source| SimError::Csv {
            path: path.to_path_buf(),
            source,
        };
        let malformed = |message: String| SimError::MalformedOutput {
            path: path.to_path_buf(),
            message,
        };

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(csv_err)?;
        let headers: Vec<String> = reader
            .headers()
            .map_err(csv_err)?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        if headers.first().map(String::as_str) != Some(columns::DATE_TIME) {
            return Err(malformed(format!(
                "first column must be \"{}\"",
                columns::DATE_TIME
            )));
        }
        let names: Vec<String> = headers[1..].to_vec();

        let mut timestamps = Vec::new();
        let mut data = vec![Vec::new(); names.len()];
        for (line, record) in reader.records().enumerate() {
            let record = record.map_err(csv_err)?;
            let stamp = record.get(0).unwrap_or_default();
            let time = parse_stamp(stamp, year)
                .ok_or_else(|| malformed(format!("row {}: bad timestamp \"{stamp}\"", line + 1)))?;
            timestamps.push(time);
            for (col, values) in data.iter_mut().enumerate() {
                let cell = record.get(col + 1).unwrap_or_default().trim();
                let value = if cell.is_empty() {
                    f64::NAN
                } else {
                    cell.parse().map_err(|_| {
                        malformed(format!("row {}: \"{cell}\" is not a number", line + 1))
                    })?
                };
                values.push(value);
            }
        }

        let year_start = NaiveDate::from_ymd_opt(year, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .ok_or(SimError::InvalidArg {
                what: "simulation year out of range",
            })?;
        let first = timestamps
            .iter()
            .position(|t| *t == year_start)
            .ok_or_else(|| malformed("run period start (01/01 01:00) not found".to_string()))?;
        if first > 0 {
            tracing::debug!(path = %path.display(), rows = first, "dropping warm-up rows");
            timestamps.drain(..first);
            for values in &mut data {
                values.drain(..first);
            }
        }

        let index = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();
        Ok(Self {
            source: path.to_path_buf(),
            timestamps,
            index,
            names,
            data,
        })
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn column(&self, name: &str) -> SimResult<&[f64]> {
        self.index
            .get(name)
            .map(|&i| self.data[i].as_slice())
            .ok_or_else(|| SimError::ColumnMissing {
                column: name.to_string(),
            })
    }

    /// Rows with `first <= t <= last`.
    pub fn slice(&self, first: NaiveDateTime, last: NaiveDateTime) -> HourlySlice<'_> {
        let start = self.timestamps.partition_point(|t| *t < first);
        let end = self.timestamps.partition_point(|t| *t <= last).max(start);
        HourlySlice {
            series: self,
            start,
            end,
        }
    }

    /// The whole run period.
    pub fn all(&self) -> HourlySlice<'_> {
        HourlySlice {
            series: self,
            start: 0,
            end: self.len(),
        }
    }
}

/// Contiguous row range of an [`HourlySeries`].
#[derive(Debug, Clone, Copy)]
pub struct HourlySlice<'a> {
    series: &'a HourlySeries,
    start: usize,
    end: usize,
}

impl<'a> HourlySlice<'a> {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn timestamps(&self) -> &'a [NaiveDateTime] {
        &self.series.timestamps[self.start..self.end]
    }

    pub fn column(&self, name: &str) -> SimResult<&'a [f64]> {
        Ok(&self.series.column(name)?[self.start..self.end])
    }

    pub fn sum(&self, name: &str) -> SimResult<f64> {
        Ok(self.column(name)?.iter().filter(|v| v.is_finite()).sum())
    }

    /// Minimum of a column; an empty slice is an error.
    pub fn min(&self, name: &str) -> SimResult<f64> {
        self.fold(name, f64::min)
    }

    pub fn max(&self, name: &str) -> SimResult<f64> {
        self.fold(name, f64::max)
    }

    fn fold(&self, name: &str, f: fn(f64, f64) -> f64) -> SimResult<f64> {
        self.column(name)?
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .reduce(f)
            .ok_or_else(|| SimError::MalformedOutput {
                path: self.series.source.clone(),
                message: format!("no values for \"{name}\" in the requested window"),
            })
    }
}

/// Parse ` MM/DD  HH:MM:SS` (hour 1..=24) into the 0-based hour of `year`.
pub fn parse_stamp(stamp: &str, year: i32) -> Option<NaiveDateTime> {
    let mut parts = stamp.split_whitespace();
    let date = parts.next()?;
    let time = parts.next()?;
    let (month, day) = date.split_once('/')?;
    let mut hms = time.split(':');
    let hour: u32 = hms.next()?.parse().ok()?;
    let minute: u32 = hms.next()?.parse().ok()?;
    let second: u32 = hms.next().unwrap_or("0").parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month.parse().ok()?, day.parse().ok()?)?;
    date.and_hms_opt(hour.checked_sub(1)?, minute, second)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_file(name: &str, content: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("rv_sim_hourly_{nanos}"));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn at(month: u32, day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, month, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn stamps_shift_to_zero_based_hours() {
        assert_eq!(parse_stamp(" 01/01  01:00:00", 2020), Some(at(1, 1, 0)));
        assert_eq!(parse_stamp(" 02/29  24:00:00", 2020), Some(at(2, 29, 23)));
        assert_eq!(parse_stamp("garbage", 2020), None);
        assert_eq!(parse_stamp(" 01/01  00:00:00", 2020), None);
    }

    #[test]
    fn warm_up_rows_are_dropped_and_windows_slice() {
        let csv = "Date/Time,Environment:Site Outdoor Air Drybulb Temperature [C](Hourly)\n\
             12/31  23:00:00,99\n\
             12/31  24:00:00,99\n\
             01/01  01:00:00,1\n\
             01/01  02:00:00,-4\n\
             01/01  03:00:00,2\n\
             01/01  04:00:00,7\n";
        let path = temp_file("out.csv", csv);
        let series = HourlySeries::read(&path, 2020).unwrap();
        assert_eq!(series.len(), 4);
        assert_eq!(series.timestamps()[0], at(1, 1, 0));

        let window = series.slice(at(1, 1, 1), at(1, 1, 2));
        assert_eq!(window.len(), 2);
        assert_eq!(window.min(columns::OUTDOOR_DRY_BULB).unwrap(), -4.0);
        assert_eq!(window.max(columns::OUTDOOR_DRY_BULB).unwrap(), 2.0);
        assert_eq!(window.sum(columns::OUTDOOR_DRY_BULB).unwrap(), -2.0);

        let empty = series.slice(at(6, 1, 0), at(6, 2, 0));
        assert!(empty.is_empty());
        assert!(empty.min(columns::OUTDOOR_DRY_BULB).is_err());
        assert!(matches!(
            series.all().column("nope"),
            Err(SimError::ColumnMissing { .. })
        ));
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn missing_run_period_start_is_malformed() {
        let path = temp_file("out.csv", "Date/Time,X\n 06/01  01:00:00,1\n");
        assert!(matches!(
            HourlySeries::read(&path, 2020),
            Err(SimError::MalformedOutput { .. })
        ));
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    fn counting_series(hours: usize) -> HourlySeries {
        let start = at(1, 1, 0);
        HourlySeries {
            source: PathBuf::from("counting.csv"),
            timestamps: (0..hours).map(|h| start + Duration::hours(h as i64)).collect(),
            index: HashMap::from([(columns::OUTDOOR_DRY_BULB.to_string(), 0)]),
            names: vec![columns::OUTDOOR_DRY_BULB.to_string()],
            data: vec![(0..hours).map(|h| h as f64).collect()],
        }
    }

    proptest! {
        #[test]
        fn windows_are_inclusive_and_clipped_to_the_run(
            hours in 1usize..400,
            offset in 0usize..500,
            span in 0usize..200,
        ) {
            let series = counting_series(hours);
            let first = at(1, 1, 0) + Duration::hours(offset as i64);
            let last = first + Duration::hours(span as i64);
            let window = series.slice(first, last);

            let lo = offset.min(hours);
            let hi = (offset + span + 1).min(hours);
            prop_assert_eq!(window.len(), hi - lo);
            prop_assert!(window.timestamps().iter().all(|t| *t >= first && *t <= last));
            let values = window.column(columns::OUTDOOR_DRY_BULB).unwrap();
            if let Some(v) = values.first() {
                prop_assert_eq!(*v, offset as f64);
            }
        }
    }

    #[test]
    fn zone_columns_use_upper_case_names() {
        assert_eq!(
            columns::zone_air_temperature("Living|UNIT|2BR"),
            "LIVING|UNIT|2BR:Zone Air Temperature [C](Hourly)"
        );
    }
}
