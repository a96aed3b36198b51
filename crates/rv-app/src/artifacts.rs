//! Typed payloads passed between stages through the artifact store.

use rv_results::Artifact;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Internal gains of the selected appliances for one bedroom count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GainsRow {
    pub bedrooms: u32,
    pub fridge_w: f64,
    pub dishwasher_w: f64,
    pub clothes_washer_w: f64,
    pub clothes_dryer_w: f64,
    /// Fraction of high-efficacy lighting.
    pub lighting_high_efficacy: f64,
}

/// Written once in resilience prep, read by annual prep for costs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InternalGainsTable {
    pub rows: Vec<GainsRow>,
    pub total_appliance_cost: f64,
    pub lights_cost: f64,
}

impl InternalGainsTable {
    pub fn for_bedrooms(&self, bedrooms: u32) -> Option<&GainsRow> {
        self.rows.iter().find(|r| r.bedrooms == bedrooms)
    }
}

impl Artifact for InternalGainsTable {
    const KEY: &'static str = "internal_gains";
}

/// A dwelling-unit zone discovered in the geometry (`NAME|UNIT|<n>BR`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitZone {
    pub name: String,
    pub bedrooms: u32,
    pub occupancy: f64,
    pub floor_area_m2: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitZones {
    pub zones: Vec<UnitZone>,
}

impl Artifact for UnitZones {
    const KEY: &'static str = "unit_zones";
}

/// Model shared by both simulations, before any run-specific objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseModel {
    pub path: PathBuf,
    pub digest: String,
}

impl Artifact for BaseModel {
    const KEY: &'static str = "base_model";
}

/// Hourly rows of one outage window, as read from the resilience run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutageWindowExtract {
    /// First hour in the window, `YYYY-MM-DD HH:MM`.
    pub first_hour: String,
    pub hours: usize,
    pub outdoor_dry_bulb_c: Vec<f64>,
    pub outdoor_dew_point_c: Vec<f64>,
    pub zone_air_temperature_c: Vec<f64>,
    pub zone_relative_humidity: Vec<f64>,
    pub purchased_electricity_j: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeatingOutage(pub OutageWindowExtract);

impl Artifact for HeatingOutage {
    const KEY: &'static str = "heating_outage";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoolingOutage(pub OutageWindowExtract);

impl Artifact for CoolingOutage {
    const KEY: &'static str = "cooling_outage";
}

/// Scalar results of the outage windows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutageSummary {
    pub min_outdoor_db_c: f64,
    pub min_outdoor_dp_c: f64,
    pub max_outdoor_db_c: f64,
    pub max_outdoor_dp_c: f64,
    pub heating_battery_kwh: f64,
    pub cooling_battery_kwh: f64,
    pub deadly_days: u32,
}

impl OutageSummary {
    /// Battery capacity that covers the larger of the two outages.
    pub fn battery_kwh(&self) -> f64 {
        self.heating_battery_kwh.max(self.cooling_battery_kwh)
    }
}

impl Artifact for OutageSummary {
    const KEY: &'static str = "outage_summary";
}

/// Values read from the resilience tabular report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResilienceMetrics {
    pub heating_set_hours: f64,
    pub hours_below_2c: f64,
    pub caution_hours: f64,
    pub extreme_caution_hours: f64,
    pub danger_hours: f64,
    pub extreme_danger_hours: f64,
    pub eui: f64,
}

impl Artifact for ResilienceMetrics {
    const KEY: &'static str = "resilience_metrics";
}

/// Digests of the generated run models, for reruns and audits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelDigest {
    pub resilience: Option<String>,
    pub annual: Option<String>,
}

impl Artifact for ModelDigest {
    const KEY: &'static str = "model_digest";
}
