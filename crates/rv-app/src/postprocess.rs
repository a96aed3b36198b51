//! Post-processing of the resilience run.
//!
//! Reads the outage windows out of the hourly output, computes the outage
//! summary (weather extremes, battery sizing, heat-stress days) and the
//! resilience report metrics, and stores them for annual prep and metric
//! extraction.

use crate::artifacts::{
    CoolingOutage, HeatingOutage, OutageSummary, OutageWindowExtract, ResilienceMetrics, UnitZones,
};
use crate::error::AppError;
use crate::stage::{StageContext, StageResult};
use rv_core::naming::case_stem;
use rv_core::{StageLabel, output_prefix};
use rv_project::runlist::SIMULATION_YEAR;
use rv_project::{Case, OutageWindow};
use rv_sim::hourly::columns as col;
use rv_sim::report::keys;
use rv_sim::{HourlySeries, OutputFiles, SimResult, TabularReport};
use std::path::Path;

/// J to kWh.
pub const J_TO_KWH: f64 = 2.778e-7;

/// Days of the cooling outage assessed for heat stress.
pub const HEAT_STRESS_DAYS: usize = 7;

pub fn post_process(ctx: &StageContext<'_>, case: &Case) -> StageResult<()> {
    ctx.check_cancel()?;
    let params = &case.params;
    let zones: UnitZones = ctx.artifact(case)?;
    let zone = zones
        .zones
        .first()
        .ok_or_else(|| AppError::InvalidInput("no dwelling-unit zones".to_string()))?;

    let prefix = output_prefix(ctx.batch(), &case.name, StageLabel::Resilience);
    let outputs = OutputFiles::new(ctx.registry.study_folder(), &prefix);
    let report = TabularReport::read(&outputs.tabular)?;
    let hourly = HourlySeries::read(&outputs.hourly, SIMULATION_YEAR)?;

    let metrics = resilience_metrics(&report)?;
    let heating = extract_window(&hourly, &params.heating_outage, &zone.name)?;
    let cooling = extract_window(&hourly, &params.cooling_outage, &zone.name)?;
    let summary = outage_summary(&heating, &cooling)?;

    tracing::debug!(
        case = %case.name,
        heating_hours = heating.hours,
        cooling_hours = cooling.hours,
        deadly_days = summary.deadly_days,
        "resilience outputs processed"
    );

    if ctx.registry.config().graphs_enabled {
        let stem = case_stem(ctx.batch(), &case.name);
        let study = ctx.registry.study_folder();
        write_window_csv(&study.join(format!("{stem}_HeatingOutage.csv")), &heating)?;
        write_window_csv(&study.join(format!("{stem}_CoolingOutage.csv")), &cooling)?;
    }

    ctx.put_artifact(case, &metrics)?;
    ctx.put_artifact(case, &summary)?;
    ctx.put_artifact(case, &HeatingOutage(heating))?;
    ctx.put_artifact(case, &CoolingOutage(cooling))?;
    Ok(())
}

pub fn resilience_metrics(report: &TabularReport) -> SimResult<ResilienceMetrics> {
    use keys::*;
    Ok(ResilienceMetrics {
        heating_set_hours: report.value(HEATING_SET, FACILITY, SET_BELOW_12_2C)?,
        hours_below_2c: report.value(TIME_BIN, TIME_BIN_TOTAL, HOURS_BELOW_2C)?,
        caution_hours: report.value(HEAT_INDEX, FACILITY, CAUTION)?,
        extreme_caution_hours: report.value(HEAT_INDEX, FACILITY, EXTREME_CAUTION)?,
        danger_hours: report.value(HEAT_INDEX, FACILITY, DANGER)?,
        extreme_danger_hours: report.value(HEAT_INDEX, FACILITY, EXTREME_DANGER)?,
        eui: report.value(SITE_SOURCE_ENERGY, TOTAL_SITE_ENERGY, ENERGY_PER_AREA)?,
    })
}

/// Hourly rows of one outage window for the given unit zone.
pub fn extract_window(
    hourly: &HourlySeries,
    window: &OutageWindow,
    zone: &str,
) -> SimResult<OutageWindowExtract> {
    let slice = hourly.slice(window.first_hour(), window.last_hour());
    Ok(OutageWindowExtract {
        first_hour: window.first_hour().format("%Y-%m-%d %H:%M").to_string(),
        hours: slice.len(),
        outdoor_dry_bulb_c: slice.column(col::OUTDOOR_DRY_BULB)?.to_vec(),
        outdoor_dew_point_c: slice.column(col::OUTDOOR_DEW_POINT)?.to_vec(),
        zone_air_temperature_c: slice.column(&col::zone_air_temperature(zone))?.to_vec(),
        zone_relative_humidity: slice.column(&col::zone_relative_humidity(zone))?.to_vec(),
        purchased_electricity_j: slice.column(col::PURCHASED_ELECTRICITY)?.to_vec(),
    })
}

pub fn outage_summary(
    heating: &OutageWindowExtract,
    cooling: &OutageWindowExtract,
) -> Result<OutageSummary, AppError> {
    let extreme = |values: &[f64], f: fn(f64, f64) -> f64, what: &str| {
        values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .reduce(f)
            .ok_or_else(|| AppError::InvalidInput(format!("{what}: outage window has no hourly values")))
    };
    let min = |values: &[f64], what: &str| extreme(values, f64::min, what);
    let max = |values: &[f64], what: &str| extreme(values, f64::max, what);
    let kwh = |values: &[f64]| values.iter().filter(|v| v.is_finite()).sum::<f64>() * J_TO_KWH;
    Ok(OutageSummary {
        min_outdoor_db_c: min(&heating.outdoor_dry_bulb_c, "heating outage")?,
        min_outdoor_dp_c: min(&heating.outdoor_dew_point_c, "heating outage")?,
        max_outdoor_db_c: max(&cooling.outdoor_dry_bulb_c, "cooling outage")?,
        max_outdoor_dp_c: max(&cooling.outdoor_dew_point_c, "cooling outage")?,
        heating_battery_kwh: kwh(&heating.purchased_electricity_j),
        cooling_battery_kwh: kwh(&cooling.purchased_electricity_j),
        deadly_days: deadly_days(&cooling.zone_air_temperature_c, &cooling.zone_relative_humidity),
    })
}

/// Mora et al. threshold: daily mean temperature above which a day is deadly
/// at the given relative humidity (fraction).
pub fn mora_threshold_c(rh: f64) -> f64 {
    49.593 - 48.580 * rh + 25.887 * rh * rh
}

/// Count of deadly days among the first complete days of the window.
pub fn deadly_days(temperature_c: &[f64], relative_humidity_pct: &[f64]) -> u32 {
    let mut count = 0;
    for (t, rh) in temperature_c
        .chunks_exact(24)
        .zip(relative_humidity_pct.chunks_exact(24))
        .take(HEAT_STRESS_DAYS)
    {
        let mean_t = t.iter().sum::<f64>() / 24.0;
        let mean_rh = rh.iter().sum::<f64>() / 24.0 / 100.0;
        if mean_t - mora_threshold_c(mean_rh) > 0.0 {
            count += 1;
        }
    }
    count
}

fn write_window_csv(path: &Path, window: &OutageWindowExtract) -> Result<(), AppError> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record([
        "Hour",
        col::OUTDOOR_DRY_BULB,
        col::OUTDOOR_DEW_POINT,
        "Zone Air Temperature [C]",
        "Zone Air Relative Humidity [%]",
        col::PURCHASED_ELECTRICITY,
    ])?;
    for i in 0..window.hours {
        let cell = |v: &[f64]| v.get(i).map(|x| x.to_string()).unwrap_or_default();
        wtr.write_record([
            i.to_string(),
            cell(&window.outdoor_dry_bulb_c),
            cell(&window.outdoor_dew_point_c),
            cell(&window.zone_air_temperature_c),
            cell(&window.zone_relative_humidity),
            cell(&window.purchased_electricity_j),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn extract(db: Vec<f64>, dp: Vec<f64>, elec: Vec<f64>) -> OutageWindowExtract {
        OutageWindowExtract {
            hours: db.len(),
            outdoor_dry_bulb_c: db,
            outdoor_dew_point_c: dp,
            purchased_electricity_j: elec,
            ..Default::default()
        }
    }

    #[test]
    fn summary_takes_extremes_from_the_matching_window() {
        let heating = extract(vec![-5.0, -12.0, 3.0], vec![-8.0, -15.0, 0.0], vec![3.6e6; 3]);
        let cooling = extract(vec![30.0, 38.5, 25.0], vec![18.0, 22.0, 20.0], vec![7.2e6, 0.0, 0.0]);
        let summary = outage_summary(&heating, &cooling).unwrap();
        assert_eq!(summary.min_outdoor_db_c, -12.0);
        assert_eq!(summary.min_outdoor_dp_c, -15.0);
        assert_eq!(summary.max_outdoor_db_c, 38.5);
        assert_eq!(summary.max_outdoor_dp_c, 22.0);
        assert!((summary.heating_battery_kwh - 3.0).abs() < 1e-2);
        assert!((summary.cooling_battery_kwh - 2.0).abs() < 1e-2);
        assert_eq!(summary.battery_kwh(), summary.heating_battery_kwh);
    }

    #[test]
    fn empty_window_is_an_error() {
        let heating = extract(vec![], vec![], vec![]);
        let cooling = extract(vec![30.0], vec![20.0], vec![0.0]);
        assert!(outage_summary(&heating, &cooling).is_err());
    }

    #[test]
    fn blank_hours_are_ignored_but_a_blank_window_fails() {
        let heating = extract(
            vec![f64::NAN, -7.0, f64::NAN],
            vec![-9.0, f64::NAN, -10.0],
            vec![3.6e6, f64::NAN, 3.6e6],
        );
        let cooling = extract(vec![31.0], vec![19.0], vec![0.0]);
        let summary = outage_summary(&heating, &cooling).unwrap();
        assert_eq!(summary.min_outdoor_db_c, -7.0);
        assert_eq!(summary.min_outdoor_dp_c, -10.0);
        assert!((summary.heating_battery_kwh - 2.0).abs() < 1e-2);

        let blank = extract(vec![f64::NAN; 3], vec![-9.0; 3], vec![0.0; 3]);
        let err = outage_summary(&blank, &cooling).unwrap_err();
        assert!(err.to_string().contains("heating outage"));
    }

    #[test]
    fn hot_humid_days_are_deadly() {
        // 3 complete days plus a partial one: hot and humid, mild, hot and humid.
        let mut t = vec![40.0; 24];
        t.extend([22.0; 24]);
        t.extend([40.0; 24]);
        t.extend([45.0; 10]);
        let rh = vec![80.0; t.len()];
        assert_eq!(deadly_days(&t, &rh), 2);
    }

    #[test]
    fn only_the_first_week_counts() {
        let t = vec![45.0; 24 * 10];
        let rh = vec![90.0; 24 * 10];
        assert_eq!(deadly_days(&t, &rh), HEAT_STRESS_DAYS as u32);
    }

    proptest! {
        #[test]
        fn deadly_days_never_exceeds_complete_days(hours in 0usize..400, t in 0.0f64..50.0) {
            let temps = vec![t; hours];
            let rh = vec![60.0; hours];
            let days = deadly_days(&temps, &rh) as usize;
            prop_assert!(days <= (hours / 24).min(HEAT_STRESS_DAYS));
        }
    }
}
