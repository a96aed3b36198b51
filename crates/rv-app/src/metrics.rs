//! Metric extraction from the annual run.
//!
//! Combines the annual outputs with the resilience artifacts into one
//! [`ResultMetrics`] per case: energy use and cost, first cost by category,
//! operational carbon from the hourly grid factors and the lifecycle present
//! values.

use crate::artifacts::{OutageSummary, ResilienceMetrics};
use crate::error::{AppError, AppResult};
use crate::lifecycle::{CashFlow, LifecycleInputs, LifecycleModel, LifecycleResult};
use crate::postprocess::J_TO_KWH;
use crate::stage::{StageContext, StageResult};
use rv_core::{StageLabel, output_prefix};
use rv_project::runlist::SIMULATION_YEAR;
use rv_project::{Case, CaseParams, ConstructionItem, SharedDatabase};
use rv_results::ResultMetrics;
use rv_sim::hourly::columns as col;
use rv_sim::report::keys;
use rv_sim::{CostLineItem, HourlySeries, OutputFiles, TabularReport};
use std::path::{Path, PathBuf};

/// J to MWh, for grid emission factors in kg/MWh.
pub const J_TO_MWH: f64 = 2.778e-10;
/// J to therms.
pub const J_TO_THERM: f64 = 9.478169879e-9;
/// kg CO2 per therm of natural gas.
pub const GAS_CO2_KG_PER_THERM: f64 = 12.7;
/// Fixed yearly electricity connection charge, $.
pub const ELECTRIC_SERVICE_CHARGE: f64 = 100.0;
/// Fixed yearly gas connection charge, $.
pub const GAS_SERVICE_CHARGE: f64 = 480.0;

/// Country whose factor applies to labor and to unlisted countries.
const DOMESTIC_COUNTRY: &str = "USA";

/// First cost split into the reported categories, $.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CostBreakdown {
    pub wall: f64,
    pub roof: f64,
    pub floor: f64,
    pub window: f64,
    pub door: f64,
    pub air_sealing: f64,
    pub mechanical: f64,
    pub water_heater: f64,
    pub appliances: f64,
    pub pv: f64,
    pub battery: f64,
}

impl CostBreakdown {
    /// Sort line items by the first category their name mentions.
    pub fn from_line_items(items: &[CostLineItem]) -> Self {
        let mut costs = Self::default();
        for item in items {
            let name = item.name.to_uppercase();
            let slot = if name.contains("WALL") {
                &mut costs.wall
            } else if name.contains("ROOF") {
                &mut costs.roof
            } else if name.contains("FLOOR") {
                &mut costs.floor
            } else if name.contains("WINDOW") {
                &mut costs.window
            } else if name.contains("DOOR") {
                &mut costs.door
            } else if name.contains("AIR SEALING") {
                &mut costs.air_sealing
            } else if name.contains("MECH") {
                &mut costs.mechanical
            } else if name.contains("DHW") {
                &mut costs.water_heater
            } else if name.contains("APPLIANCES") || name.contains("LIGHTS") {
                &mut costs.appliances
            } else if name.contains("PV COST") {
                &mut costs.pv
            } else if name.contains("BATTERY COST") {
                &mut costs.battery
            } else {
                tracing::debug!(item = %item.name, "cost line item matches no category");
                continue;
            };
            *slot += item.subtotal;
        }
        costs
    }
}

/// First-year energy costs and gas emissions.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EnergyCosts {
    pub electricity: f64,
    pub gas: f64,
    pub gas_co2_kg: f64,
}

pub fn energy_costs(hourly: &HourlySeries, params: &CaseParams) -> AppResult<EnergyCosts> {
    let year = hourly.all();
    let f = &params.financials;
    let purchased_kwh = year.sum(col::PURCHASED_ELECTRICITY)? * J_TO_KWH;
    let surplus_kwh = year.sum(col::SURPLUS_ELECTRICITY)? * J_TO_KWH;
    let mut costs = EnergyCosts {
        electricity: purchased_kwh * f.elec_price_per_kwh - surplus_kwh * f.sellback_price_per_kwh
            + ELECTRIC_SERVICE_CHARGE,
        ..Default::default()
    };
    if params.natural_gas {
        let therms = year.sum(col::NATURAL_GAS)? * J_TO_THERM;
        costs.gas = therms * f.gas_price_per_therm + GAS_SERVICE_CHARGE;
        costs.gas_co2_kg = therms * GAS_CO2_KG_PER_THERM;
    }
    Ok(costs)
}

/// Hourly grid emission factor files, in name order.
pub fn cambium_files(dir: &Path) -> AppResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_csv = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if path.is_file() && is_csv {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Operational electricity emissions per factor file, kg.
///
/// Each file holds one column of hourly factors (kg/MWh) per grid region.
pub fn electric_co2_kg(files: &[PathBuf], grid_region: &str, purchased_j: &[f64]) -> AppResult<Vec<f64>> {
    let mut years = Vec::with_capacity(files.len());
    for path in files {
        let mut rdr = csv::Reader::from_path(path)?;
        let column = rdr
            .headers()?
            .iter()
            .position(|h| h.trim() == grid_region)
            .ok_or_else(|| {
                AppError::InvalidInput(format!(
                    "{}: no column for grid region \"{grid_region}\"",
                    path.display()
                ))
            })?;
        let mut total = 0.0;
        for (record, energy) in rdr.records().zip(purchased_j) {
            let record = record?;
            let factor: f64 = record
                .get(column)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0.0);
            total += energy * J_TO_MWH * factor;
        }
        years.push(total);
    }
    Ok(years)
}

/// Lifecycle cash flows of purchased items, measures and first cost.
#[derive(Debug)]
pub struct CashFlowBuilder<'a> {
    db: &'a SharedDatabase,
    analysis_years: u32,
    carbon_price: f64,
    envelope_factor: f64,
    domestic_factor: f64,
    pub direct: Vec<CashFlow>,
    pub embodied: Vec<CashFlow>,
}

impl<'a> CashFlowBuilder<'a> {
    pub fn new(db: &'a SharedDatabase, params: &CaseParams, carbon_price: f64) -> Self {
        let domestic_factor = db.emission_factor(DOMESTIC_COUNTRY).unwrap_or(0.0);
        let envelope_factor = db
            .emission_factor(&params.financials.envelope_country)
            .unwrap_or(domestic_factor);
        Self {
            db,
            analysis_years: params.financials.analysis_years,
            carbon_price,
            envelope_factor,
            domestic_factor,
            direct: Vec::new(),
            embodied: Vec::new(),
        }
    }

    /// Spending on `item` at install and at each replacement.
    pub fn add_item(&mut self, cost: f64, item: &ConstructionItem) {
        let embodied = cost * (1.0 - item.labor_fraction) * self.envelope_factor * self.carbon_price;
        let years: Vec<u32> = if item.lifetime_years == 0 {
            vec![0]
        } else {
            (0..self.analysis_years.max(1))
                .step_by(item.lifetime_years as usize)
                .collect()
        };
        for year in years {
            self.direct.push(CashFlow::new(cost, year));
            self.embodied.push(CashFlow::new(embodied, year));
        }
    }

    /// Cost line items of the annual report, matched back to the database.
    pub fn add_line_items(&mut self, items: &[CostLineItem]) {
        for line in items {
            let lower = line.name.to_lowercase();
            let name = lower.strip_prefix("mech_").unwrap_or(&lower);
            if name == "appliances" || name == "lights" {
                continue;
            }
            match self.db.constructions.get_ignore_case(name) {
                Some(item) => self.add_item(line.subtotal, item),
                None => tracing::debug!(item = %line.name, "line item not in construction database"),
            }
        }
    }

    /// Selected appliances, priced at their mechanical cost.
    pub fn add_appliances(&mut self, appliances: &[String]) {
        for name in appliances {
            if let Some(item) = self.db.constructions.get(name) {
                self.add_item(item.mechanical_cost, item);
            }
        }
    }

    /// Carbon correction measures named by the case.
    pub fn add_carbon_measures(&mut self, names: &[String]) {
        for name in names {
            let Some(measure) = self.db.carbon_measure(name) else {
                tracing::debug!(measure = %name, "carbon measure not in database");
                continue;
            };
            let factor = self
                .db
                .emission_factor(&measure.country)
                .unwrap_or(self.domestic_factor);
            let l = measure.labor_fraction;
            let embodied =
                (measure.cost * factor * (1.0 - l) + measure.cost * self.domestic_factor * l) * self.carbon_price;
            self.direct.push(CashFlow::new(measure.cost, measure.year));
            self.embodied.push(CashFlow::new(embodied, measure.year));
        }
    }

    pub fn add_first_cost(&mut self, first_cost: f64, labor_fraction: f64) {
        let embodied = (first_cost * (1.0 - labor_fraction) * self.envelope_factor
            + first_cost * labor_fraction * self.domestic_factor)
            * self.carbon_price;
        self.direct.push(CashFlow::new(first_cost, 0));
        self.embodied.push(CashFlow::new(embodied, 0));
    }
}

/// Reference cases carry no retrofit cost.
pub fn is_base_case(case_name: &str) -> bool {
    case_name.to_uppercase().contains("BASE")
}

pub fn extract_metrics(
    ctx: &StageContext<'_>,
    case: &Case,
    lifecycle: &dyn LifecycleModel,
) -> StageResult<ResultMetrics> {
    ctx.check_cancel()?;
    let params = &case.params;
    let db = ctx.registry.database();

    let resilience: ResilienceMetrics = ctx.artifact(case)?;
    let outage: OutageSummary = ctx.artifact(case)?;

    let prefix = output_prefix(ctx.batch(), &case.name, StageLabel::Annual);
    let outputs = OutputFiles::new(ctx.registry.study_folder(), &prefix);
    let report = TabularReport::read(&outputs.tabular)?;
    let hourly = HourlySeries::read(&outputs.hourly, SIMULATION_YEAR)?;

    let eui = report.value(keys::SITE_SOURCE_ENERGY, keys::TOTAL_SITE_ENERGY, keys::ENERGY_PER_AREA)?;
    let peak_w = report.value(keys::PEAK_ELECTRICITY, keys::ELECTRICITY_FACILITY, keys::MAXIMUM_VALUE)?;
    let line_items = report.cost_line_items()?;

    let (costs, first_cost) = if is_base_case(&case.name) {
        (CostBreakdown::default(), 0.0)
    } else {
        (
            CostBreakdown::from_line_items(&line_items),
            report.value(keys::COST_ESTIMATE, keys::COST_ESTIMATE_TOTAL, keys::CURRENT_MODEL)?,
        )
    };

    let energy = energy_costs(&hourly, params)?;
    let electric_co2 = electric_co2_kg(
        &cambium_files(&db.cambium_dir())?,
        &params.grid_region,
        hourly.column(col::PURCHASED_ELECTRICITY)?,
    )?;

    let mut flows = CashFlowBuilder::new(db, params, lifecycle.carbon_price_per_kg());
    flows.add_carbon_measures(&params.financials.carbon_measures);
    flows.add_first_cost(first_cost, params.financials.envelope_labor_fraction);
    flows.add_line_items(&line_items);
    flows.add_appliances(&params.appliances);

    let inputs = LifecycleInputs {
        analysis_years: params.financials.analysis_years,
        annual_energy_cost: energy.electricity + energy.gas,
        annual_electric_co2_kg: electric_co2,
        annual_gas_co2_kg: energy.gas_co2_kg,
        direct_costs: flows.direct,
        embodied_co2_costs: flows.embodied,
        peak_electric_w: peak_w,
    };
    let lc = lifecycle.evaluate(&inputs);

    tracing::debug!(
        case = %case.name,
        model = lifecycle.name(),
        eui,
        first_cost,
        lifecycle_total = lc.total(),
        "metrics extracted"
    );

    let metrics = assemble(&resilience, &outage, eui, peak_w, first_cost, &costs, &energy, &lc);
    if let Some(column) = metrics.first_non_finite() {
        return Err(AppError::InvalidInput(format!("\"{column}\" is not a finite number")).into());
    }
    Ok(metrics)
}

#[allow(clippy::too_many_arguments)]
fn assemble(
    resilience: &ResilienceMetrics,
    outage: &OutageSummary,
    eui: f64,
    peak_w: f64,
    first_cost: f64,
    costs: &CostBreakdown,
    energy: &EnergyCosts,
    lc: &LifecycleResult,
) -> ResultMetrics {
    ResultMetrics {
        heating_set_hours: resilience.heating_set_hours,
        hours_below_2c: resilience.hours_below_2c,
        total_deadly_days: f64::from(outage.deadly_days),
        min_outdoor_db_c: outage.min_outdoor_db_c,
        min_outdoor_dp_c: outage.min_outdoor_dp_c,
        max_outdoor_db_c: outage.max_outdoor_db_c,
        max_outdoor_dp_c: outage.max_outdoor_dp_c,
        caution_hours: resilience.caution_hours,
        extreme_caution_hours: resilience.extreme_caution_hours,
        danger_hours: resilience.danger_hours,
        extreme_danger_hours: resilience.extreme_danger_hours,
        eui,
        peak_electric_demand_w: peak_w,
        heating_battery_kwh: outage.heating_battery_kwh,
        cooling_battery_kwh: outage.cooling_battery_kwh,
        total_lifecycle_cost: lc.total(),
        first_year_electric_cost: energy.electricity,
        first_year_gas_cost: energy.gas,
        first_cost,
        wall_cost: costs.wall,
        roof_cost: costs.roof,
        floor_cost: costs.floor,
        window_cost: costs.window,
        door_cost: costs.door,
        air_sealing_cost: costs.air_sealing,
        mechanical_cost: costs.mechanical,
        water_heater_cost: costs.water_heater,
        appliances_cost: costs.appliances,
        pv_cost: costs.pv,
        battery_cost: costs.battery,
        pv_direct_energy: lc.direct_energy,
        pv_direct_maintenance: lc.direct_maintenance,
        pv_operational_co2: lc.operational_co2,
        pv_embodied_co2: lc.embodied_co2,
        pv_energy_transition: lc.energy_transition,
    }
}
