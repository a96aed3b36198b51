//! Case list (run list) parsing.
//!
//! Each row describes one case. Columns are addressed by the names the run
//! list generator writes; envelope selections are open-ended (`EXT_*` and
//! `INT_*` columns) so new construction slots need no code change.

use crate::table::CsvTable;
use crate::{ProjectError, ProjectResult};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::path::PathBuf;

/// Simulation year used for every date in the case list.
pub const SIMULATION_YEAR: i32 = 2020;

const FT2_TO_M2: f64 = 0.092_903_04;

pub mod columns {
    pub const CASE_NAME: &str = "CASE_NAME";
    pub const GEOMETRY_IDF: &str = "GEOMETRY_IDF";
    pub const EPW: &str = "EPW";
    pub const DDY: &str = "DDY";
    pub const ICFA: &str = "ICFA";
    pub const BEDROOMS: &str = "BEDROOMS";
    pub const OPERABLE_AREA: [&str; 4] = [
        "Operable_Area_N",
        "Operable_Area_S",
        "Operable_Area_W",
        "Operable_Area_E",
    ];
    pub const APPLIANCE_LIST: &str = "APPLIANCE_LIST";
    pub const PV_SIZE: &str = "PV_SIZE_[W]";
    pub const PV_TILT: &str = "PV_TILT";
    pub const INFILTRATION_RATE: &str = "INFILTRATION_RATE";
    pub const OUTAGE_1_START: &str = "OUTAGE_1_START";
    pub const OUTAGE_1_END: &str = "OUTAGE_1_END";
    pub const OUTAGE_2_START: &str = "OUTAGE_2_START";
    pub const OUTAGE_2_END: &str = "OUTAGE_2_END";
    pub const FIRST_OUTAGE: &str = "1ST_OUTAGE";
    pub const MORPH_FACTORS: [&str; 4] = ["MorphFactorDB1", "MorphFactorDP1", "MorphFactorDB2", "MorphFactorDP2"];
    pub const NAT_VENT_TYPE: &str = "NAT_VENT_TYPE";
    pub const NAT_VENT_AVAIL: &str = "NAT_VENT_AVAIL";
    pub const SHADING_AVAIL: &str = "SHADING_AVAIL";
    pub const DEMAND_COOLING_AVAIL: &str = "DEMAND_COOLING_AVAIL";
    pub const NATURAL_GAS: &str = "NATURAL_GAS";
    pub const WATER_HEATER_FUEL: &str = "WATER_HEATER_FUEL";
    pub const MECH_SYSTEM_TYPE: &str = "MECH_SYSTEM_TYPE";
    pub const GRID_REGION: &str = "GRID_REGION";
    pub const GAS_PRICE: &str = "GAS_PRICE_[$/THERM]";
    pub const ELEC_PRICE: &str = "ELEC_PRICE_[$/kWh]";
    pub const SELLBACK_PRICE: &str = "SELLBACK_PRICE_[$/kWh]";
    pub const ANALYSIS_DURATION: &str = "ANALYSIS_DURATION";
    pub const CARBON_MEASURES: &str = "CARBON_MEASURES";
    pub const ENVELOPE_COUNTRY: &str = "ENVELOPE_COUNTRY";
    pub const ENVELOPE_LABOR_FRACTION: &str = "ENVELOPE_LABOR_FRACTION";
    pub const FOUNDATION_INTERFACE_PREFIX: &str = "FOUNDATION_INTERFACE_";
    pub const FOUNDATION_INSULATION_PREFIX: &str = "FOUNDATION_INSUINSULATION_";
    pub const FOUNDATION_PERIMETER_PREFIX: &str = "FOUNDATION_PERIMETER_";
    pub const FOUNDATION_DEPTH_PREFIX: &str = "FOUNDATION_INSULATION_DEPTH_";
}

/// Columns every run list must carry regardless of the manifest version.
pub const REQUIRED_COLUMNS: [&str; 30] = [
    columns::CASE_NAME,
    columns::GEOMETRY_IDF,
    columns::EPW,
    columns::DDY,
    columns::ICFA,
    columns::BEDROOMS,
    columns::OPERABLE_AREA[0],
    columns::OPERABLE_AREA[1],
    columns::OPERABLE_AREA[2],
    columns::OPERABLE_AREA[3],
    columns::APPLIANCE_LIST,
    columns::PV_SIZE,
    columns::PV_TILT,
    columns::INFILTRATION_RATE,
    columns::OUTAGE_1_START,
    columns::OUTAGE_1_END,
    columns::OUTAGE_2_START,
    columns::OUTAGE_2_END,
    columns::FIRST_OUTAGE,
    columns::NATURAL_GAS,
    columns::WATER_HEATER_FUEL,
    columns::MECH_SYSTEM_TYPE,
    columns::GRID_REGION,
    columns::GAS_PRICE,
    columns::ELEC_PRICE,
    columns::SELLBACK_PRICE,
    columns::ANALYSIS_DURATION,
    columns::ENVELOPE_COUNTRY,
    columns::ENVELOPE_LABOR_FRACTION,
    columns::CARBON_MEASURES,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutageKind {
    Heating,
    Cooling,
}

impl OutageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OutageKind::Heating => "HEATING",
            OutageKind::Cooling => "COOLING",
        }
    }
}

/// Outage period given as whole days in the simulation year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutageWindow {
    pub kind: OutageKind,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl OutageWindow {
    /// First hour inside the window: the day after `start` at 00:00.
    pub fn first_hour(&self) -> NaiveDateTime {
        self.start.and_time(chrono::NaiveTime::MIN) + Duration::hours(24)
    }

    /// Last hour inside the window: `end` at 23:00.
    pub fn last_hour(&self) -> NaiveDateTime {
        self.end.and_time(chrono::NaiveTime::MIN) + Duration::hours(23)
    }

    pub fn contains(&self, hour: NaiveDateTime) -> bool {
        hour >= self.first_hour() && hour <= self.last_hour()
    }

    /// `MM/DD` form used in schedule objects.
    pub fn start_label(&self) -> String {
        self.start.format("%m/%d").to_string()
    }

    pub fn end_label(&self) -> String {
        self.end.format("%m/%d").to_string()
    }
}

/// Construction placed in a named envelope slot (`EXT_WALL_1`, `EXT_WINDOW_2`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeAssignment {
    pub slot: String,
    pub item: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Foundation {
    pub interface: String,
    pub insulation: Option<String>,
    pub perimeter: f64,
    pub insulation_depth: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OperableAreas {
    pub north_m2: f64,
    pub south_m2: f64,
    pub west_m2: f64,
    pub east_m2: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MorphFactors {
    pub dry_bulb_1: f64,
    pub dew_point_1: f64,
    pub dry_bulb_2: f64,
    pub dew_point_2: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResilienceControls {
    pub nat_vent_type: String,
    pub nat_vent_avail: f64,
    pub shading_avail: f64,
    pub demand_cooling_avail: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Financials {
    pub gas_price_per_therm: f64,
    pub elec_price_per_kwh: f64,
    pub sellback_price_per_kwh: f64,
    pub analysis_years: u32,
    pub carbon_measures: Vec<String>,
    pub envelope_country: String,
    pub envelope_labor_fraction: f64,
}

/// Parameter row of one case.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseParams {
    /// Geometry file, relative to the study folder.
    pub geometry: PathBuf,
    pub epw: String,
    pub ddy: String,
    pub icfa_ft2: f64,
    pub bedrooms: u32,
    pub operable_areas: OperableAreas,
    pub appliances: Vec<String>,
    pub pv_size_w: f64,
    pub pv_tilt: f64,
    pub infiltration_rate: f64,
    pub envelope: Vec<EnvelopeAssignment>,
    pub foundations: Vec<Foundation>,
    pub heating_outage: OutageWindow,
    pub cooling_outage: OutageWindow,
    pub first_outage: OutageKind,
    pub morph: MorphFactors,
    pub controls: ResilienceControls,
    pub natural_gas: bool,
    pub water_heater_fuel: String,
    pub mech_system: String,
    pub grid_region: String,
    pub financials: Financials,
}

impl CaseParams {
    /// Construction database item of the water heater.
    pub fn dhw_fuel_item(&self) -> String {
        format!("DHW_{}", self.water_heater_fuel)
    }

    pub fn icfa_m2(&self) -> f64 {
        self.icfa_ft2 * FT2_TO_M2
    }

    /// Outage windows in occurrence order.
    pub fn outages(&self) -> [OutageWindow; 2] {
        match self.first_outage {
            OutageKind::Heating => [self.heating_outage, self.cooling_outage],
            OutageKind::Cooling => [self.cooling_outage, self.heating_outage],
        }
    }

    pub fn envelope_item(&self, slot: &str) -> Option<&str> {
        self.envelope
            .iter()
            .find(|a| a.slot == slot)
            .map(|a| a.item.as_str())
    }
}

/// Parse every row of the run list into `(case name, params)`.
pub fn parse_cases(table: &CsvTable) -> ProjectResult<Vec<(String, CaseParams)>> {
    (0..table.len()).map(|row| parse_row(table, row)).collect()
}

struct RowReader<'a> {
    table: &'a CsvTable,
    row: usize,
}

impl RowReader<'_> {
    fn invalid(&self, column: &str, value: &str, reason: &str) -> ProjectError {
        ProjectError::InvalidValue {
            context: format!("run list row {}", self.row + 1),
            column: column.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    fn text(&self, column: &str) -> Option<&str> {
        self.table.text(self.row, column)
    }

    fn required_text(&self, column: &str) -> ProjectResult<String> {
        self.text(column)
            .map(str::to_string)
            .ok_or_else(|| self.invalid(column, "", "value is required"))
    }

    fn number_or(&self, column: &str, default: f64) -> ProjectResult<f64> {
        Ok(self.table.number(self.row, column)?.unwrap_or(default))
    }

    fn required_number(&self, column: &str) -> ProjectResult<f64> {
        self.table
            .number(self.row, column)?
            .ok_or_else(|| self.invalid(column, "", "value is required"))
    }

    fn count(&self, column: &str) -> ProjectResult<u32> {
        let value = self.required_number(column)?;
        if value < 0.0 || value.fract() != 0.0 {
            return Err(self.invalid(column, &value.to_string(), "expected a whole non-negative number"));
        }
        Ok(value as u32)
    }

    fn list(&self, column: &str) -> Vec<String> {
        self.text(column)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn date(&self, column: &str) -> ProjectResult<NaiveDate> {
        let raw = self.required_text(column)?;
        parse_month_day(&raw).ok_or_else(|| self.invalid(column, &raw, "expected a MM/DD date"))
    }
}

/// Parse `MM/DD` (a trailing `/YYYY` is ignored) in the simulation year.
pub fn parse_month_day(raw: &str) -> Option<NaiveDate> {
    let mut parts = raw.trim().split('/');
    let month = parts.next()?.trim().parse().ok()?;
    let day = parts.next()?.trim().parse().ok()?;
    NaiveDate::from_ymd_opt(SIMULATION_YEAR, month, day)
}

fn parse_row(table: &CsvTable, row: usize) -> ProjectResult<(String, CaseParams)> {
    use columns as c;
    let r = RowReader { table, row };

    let name = r.text(c::CASE_NAME).unwrap_or_default().to_string();

    let first_outage = match r.required_text(c::FIRST_OUTAGE)?.to_ascii_uppercase().as_str() {
        "HEATING" => OutageKind::Heating,
        "COOLING" => OutageKind::Cooling,
        other => return Err(r.invalid(c::FIRST_OUTAGE, other, "expected HEATING or COOLING")),
    };
    let window = |kind, start_col, end_col| -> ProjectResult<OutageWindow> {
        let start = r.date(start_col)?;
        let end = r.date(end_col)?;
        if end < start {
            return Err(r.invalid(end_col, &end.format("%m/%d").to_string(), "outage ends before it starts"));
        }
        Ok(OutageWindow { kind, start, end })
    };
    let second = match first_outage {
        OutageKind::Heating => OutageKind::Cooling,
        OutageKind::Cooling => OutageKind::Heating,
    };
    let outage_1 = window(first_outage, c::OUTAGE_1_START, c::OUTAGE_1_END)?;
    let outage_2 = window(second, c::OUTAGE_2_START, c::OUTAGE_2_END)?;
    let (heating_outage, cooling_outage) = match first_outage {
        OutageKind::Heating => (outage_1, outage_2),
        OutageKind::Cooling => (outage_2, outage_1),
    };

    let envelope = table
        .headers()
        .iter()
        .filter(|h| h.starts_with("EXT_") || h.starts_with("INT_"))
        .filter_map(|h| {
            r.text(h).map(|item| EnvelopeAssignment {
                slot: h.strip_suffix("_NAME").unwrap_or(h).to_string(),
                item: item.to_string(),
            })
        })
        .collect();

    let mut foundations = Vec::new();
    for n in 1..=3 {
        let interface_col = format!("{}{n}", c::FOUNDATION_INTERFACE_PREFIX);
        let Some(interface) = r.text(&interface_col) else {
            continue;
        };
        foundations.push(Foundation {
            interface: interface.to_string(),
            insulation: r
                .text(&format!("{}{n}", c::FOUNDATION_INSULATION_PREFIX))
                .map(str::to_string),
            perimeter: r.number_or(&format!("{}{n}", c::FOUNDATION_PERIMETER_PREFIX), 0.0)?,
            insulation_depth: r.number_or(&format!("{}{n}", c::FOUNDATION_DEPTH_PREFIX), 0.0)?,
        });
    }

    let [north, south, west, east] = c::OPERABLE_AREA;
    let [db1, dp1, db2, dp2] = c::MORPH_FACTORS;

    let params = CaseParams {
        geometry: PathBuf::from(r.required_text(c::GEOMETRY_IDF)?),
        epw: r.required_text(c::EPW)?,
        ddy: r.required_text(c::DDY)?,
        icfa_ft2: r.required_number(c::ICFA)?,
        bedrooms: r.count(c::BEDROOMS)?,
        operable_areas: OperableAreas {
            north_m2: r.number_or(north, 0.0)? * FT2_TO_M2,
            south_m2: r.number_or(south, 0.0)? * FT2_TO_M2,
            west_m2: r.number_or(west, 0.0)? * FT2_TO_M2,
            east_m2: r.number_or(east, 0.0)? * FT2_TO_M2,
        },
        appliances: r.list(c::APPLIANCE_LIST),
        pv_size_w: r.number_or(c::PV_SIZE, 0.0)?,
        pv_tilt: r.number_or(c::PV_TILT, 0.0)?,
        infiltration_rate: r.required_number(c::INFILTRATION_RATE)?,
        envelope,
        foundations,
        heating_outage,
        cooling_outage,
        first_outage,
        morph: MorphFactors {
            dry_bulb_1: r.number_or(db1, 0.0)?,
            dew_point_1: r.number_or(dp1, 0.0)?,
            dry_bulb_2: r.number_or(db2, 0.0)?,
            dew_point_2: r.number_or(dp2, 0.0)?,
        },
        controls: ResilienceControls {
            nat_vent_type: r.text(c::NAT_VENT_TYPE).unwrap_or("NatVent").to_string(),
            nat_vent_avail: r.number_or(c::NAT_VENT_AVAIL, 0.0)?,
            shading_avail: r.number_or(c::SHADING_AVAIL, 0.0)?,
            demand_cooling_avail: r.number_or(c::DEMAND_COOLING_AVAIL, 0.0)?,
        },
        natural_gas: r.number_or(c::NATURAL_GAS, 0.0)? == 1.0,
        water_heater_fuel: r.required_text(c::WATER_HEATER_FUEL)?,
        mech_system: r.required_text(c::MECH_SYSTEM_TYPE)?,
        grid_region: r.required_text(c::GRID_REGION)?,
        financials: Financials {
            gas_price_per_therm: r.number_or(c::GAS_PRICE, 0.0)?,
            elec_price_per_kwh: r.number_or(c::ELEC_PRICE, 0.0)?,
            sellback_price_per_kwh: r.number_or(c::SELLBACK_PRICE, 0.0)?,
            analysis_years: r.count(c::ANALYSIS_DURATION)?,
            carbon_measures: r.list(c::CARBON_MEASURES),
            envelope_country: r.text(c::ENVELOPE_COUNTRY).unwrap_or("USA").to_string(),
            envelope_labor_fraction: r.number_or(c::ENVELOPE_LABOR_FRACTION, 0.0)?,
        },
    };

    Ok((name, params))
}
