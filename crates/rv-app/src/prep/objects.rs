//! Builders for the objects the prep stages add to a model.
//!
//! Everything here is a pure function of its inputs; the same inputs render
//! to the same bytes.

use crate::artifacts::{GainsRow, UnitZone};
use crate::error::{AppError, AppResult};
use crate::gains::ZoneLoads;
use chrono::{Datelike, NaiveDate};
use rv_project::database::material_columns as mc;
use rv_project::{CaseParams, ConstructionItem, CsvTable, OutageWindow, SharedDatabase};
use rv_sim::{ModelObject, format_number};
use std::collections::BTreeMap;

pub const ALWAYS_ON: &str = "Always On";
pub const MECH_AVAILABLE: &str = "MechAvailable";
pub const NAT_VENT_AVAILABLE: &str = "NatVentAvailable";
pub const SHADING_AVAILABLE: &str = "ShadingAvailable";
pub const DEMAND_COOLING_AVAILABLE: &str = "DemandCoolingAvailable";
pub const DRY_BULB_MORPH: &str = "DryBulbMorph";
pub const DEW_POINT_MORPH: &str = "DewPointMorph";
pub const OCCUPANCY_SCHEDULE: &str = "Occupancy_Sch";
pub const ACTIVITY_SCHEDULE: &str = "Activity_Sch";

/// Geometry classes copied from the case geometry into the base model.
pub const GEOMETRY_CLASSES: [&str; 5] = [
    "Site:Location",
    "Zone",
    "BuildingSurface:Detailed",
    "FenestrationSurface:Detailed",
    "Shading:Building:Detailed",
];

/// Output variables every run reports hourly.
const HOURLY_VARIABLES: [(&str, &str); 9] = [
    ("Environment", "Site Outdoor Air Drybulb Temperature"),
    ("Environment", "Site Outdoor Air Dewpoint Temperature"),
    ("Whole Building", "Facility Total Purchased Electricity Energy"),
    ("Whole Building", "Facility Total Surplus Electricity Energy"),
    ("*", "Zone Air Temperature"),
    ("*", "Zone Air Relative Humidity"),
    ("*", "Zone Heat Index"),
    ("*", "Zone Thermal Comfort Pierce Model Standard Effective Temperature"),
    ("*", "Water Heater Heating Energy"),
];

fn n(value: f64) -> String {
    format_number(value)
}

fn month_day(date: NaiveDate) -> String {
    date.format("%m/%d").to_string()
}

/// Version, run control, output requests and the constant schedules.
pub fn simulation_control(building: &str) -> Vec<ModelObject> {
    let mut objects = vec![
        ModelObject::new("Version", ["24.1"]),
        ModelObject::new("SimulationControl", ["Yes", "Yes", "No", "No", "Yes", "No", "1"]),
        ModelObject::new(
            "Building",
            [building, "0", "Suburbs", "0.04", "0.4", "FullInteriorAndExterior", "25", "6"],
        ),
        ModelObject::new("Timestep", ["4"]),
        ModelObject::new(
            "RunPeriod",
            [
                "Run Period 1", "1", "1", "2020", "12", "31", "2020", "Wednesday", "Yes", "Yes",
                "No", "Yes", "Yes",
            ],
        ),
        ModelObject::new("GlobalGeometryRules", ["UpperLeftCorner", "Counterclockwise", "Relative"]),
        ModelObject::new("ScheduleTypeLimits", ["Fraction", "0", "1", "Continuous"]),
        ModelObject::new("ScheduleTypeLimits", ["Any Number"]),
        constant_schedule(ALWAYS_ON, 1.0),
        constant_schedule(OCCUPANCY_SCHEDULE, 1.0),
        constant_schedule(ACTIVITY_SCHEDULE, 120.0),
        ModelObject::new("OutputControl:Table:Style", ["Comma"]),
        ModelObject::new("Output:Table:SummaryReports", ["AllSummary"]),
        ModelObject::new("Output:Meter", ["NaturalGas:Facility", "Hourly"]),
    ];
    for (key, variable) in HOURLY_VARIABLES {
        objects.push(ModelObject::new("Output:Variable", [key, variable, "Hourly"]));
    }
    objects
}

pub fn constant_schedule(name: &str, value: f64) -> ModelObject {
    ModelObject::new(
        "Schedule:Constant",
        [name.to_string(), "Any Number".to_string(), n(value)],
    )
}

/// `Schedule:Compact` holding `outside` all year except inside the given
/// windows, where each window carries its own value.
pub fn windowed_schedule(name: &str, windows: &[(OutageWindow, f64)], outside: f64) -> ModelObject {
    let mut sorted: Vec<(OutageWindow, f64)> = windows.to_vec();
    sorted.sort_by_key(|(w, _)| w.start);

    let mut fields = vec![name.to_string(), "Any Number".to_string()];
    let mut covered: Option<NaiveDate> = None;
    for (window, value) in sorted {
        if covered.is_some_and(|c| window.end <= c) {
            continue;
        }
        if let Some(before) = window.start.pred_opt() {
            if window.start.ordinal() > 1 && covered.is_none_or(|c| before > c) {
                push_segment(&mut fields, &month_day(before), outside);
            }
        }
        push_segment(&mut fields, &month_day(window.end), value);
        covered = Some(window.end);
    }
    let reaches_year_end = covered.is_some_and(|c| c.month() == 12 && c.day() == 31);
    if !reaches_year_end {
        push_segment(&mut fields, "12/31", outside);
    }
    ModelObject::new("Schedule:Compact", fields)
}

fn push_segment(fields: &mut Vec<String>, through: &str, value: f64) {
    fields.push(format!("Through: {through}"));
    fields.push("For: AllDays".to_string());
    fields.push("Until: 24:00".to_string());
    fields.push(n(value));
}

/// Availability and weather-morph schedules of the resilience run.
///
/// Mechanical systems are off for both outages; passive controls take the
/// case's availability values inside the windows.
pub fn resilience_schedules(params: &CaseParams) -> Vec<ModelObject> {
    let [first, second] = params.outages();
    let both = |value: f64| [(first, value), (second, value)];
    let controls = &params.controls;
    vec![
        windowed_schedule(MECH_AVAILABLE, &both(0.0), 1.0),
        windowed_schedule(NAT_VENT_AVAILABLE, &both(controls.nat_vent_avail), 0.0),
        windowed_schedule(SHADING_AVAILABLE, &both(controls.shading_avail), 0.0),
        windowed_schedule(DEMAND_COOLING_AVAILABLE, &both(controls.demand_cooling_avail), 0.0),
    ]
}

/// Morph offsets for the two outage windows, first window first.
pub fn weather_morph(params: &CaseParams) -> Vec<ModelObject> {
    let [first, second] = params.outages();
    let m = &params.morph;
    vec![
        windowed_schedule(DRY_BULB_MORPH, &[(first, m.dry_bulb_1), (second, m.dry_bulb_2)], 0.0),
        windowed_schedule(DEW_POINT_MORPH, &[(first, m.dew_point_1), (second, m.dew_point_2)], 0.0),
        ModelObject::new(
            "WeatherProperty:SkyTemperature",
            ["Outage Morph", "DifferenceScheduleDryBulbValue", DRY_BULB_MORPH],
        ),
    ]
}

/// Availability schedules of the annual run: everything normally on.
pub fn annual_schedules(params: &CaseParams) -> Vec<ModelObject> {
    vec![
        constant_schedule(MECH_AVAILABLE, 1.0),
        constant_schedule(NAT_VENT_AVAILABLE, params.controls.nat_vent_avail),
        constant_schedule(SHADING_AVAILABLE, params.controls.shading_avail),
        constant_schedule(DEMAND_COOLING_AVAILABLE, 0.0),
    ]
}

/// Natural ventilation of one zone through its operable window area.
pub fn natural_ventilation(zone: &UnitZone, params: &CaseParams) -> ModelObject {
    let a = params.operable_areas;
    let area = a.north_m2 + a.south_m2 + a.east_m2 + a.west_m2;
    ModelObject::new(
        "ZoneVentilation:WindandStackOpenArea",
        [
            format!("{}_NatVent", zone.name),
            zone.name.clone(),
            n(area),
            NAT_VENT_AVAILABLE.to_string(),
            "0.6".to_string(),
            "0".to_string(),
            "autocalculate".to_string(),
            params.controls.nat_vent_type.clone(),
        ],
    )
}

/// Per-zone people, lighting, plug loads, sizing loads, infiltration, hot water
/// and ideal air system.
pub fn zone_objects(zone: &UnitZone, loads: &ZoneLoads, gains: &GainsRow, params: &CaseParams) -> Vec<ModelObject> {
    let z = zone.name.as_str();
    let equipment = |label: &str, watts: f64, schedule: &str| {
        ModelObject::new(
            "ElectricEquipment",
            [
                format!("{z}_{label}"),
                z.to_string(),
                schedule.to_string(),
                "EquipmentLevel".to_string(),
                n(watts),
            ],
        )
    };
    let fuel = if params.water_heater_fuel.to_ascii_uppercase().contains("GAS") {
        "NaturalGas"
    } else {
        "Electricity"
    };
    vec![
        ModelObject::new(
            "People",
            [
                format!("{z}_People"),
                z.to_string(),
                OCCUPANCY_SCHEDULE.to_string(),
                "People".to_string(),
                n(zone.occupancy),
                "".to_string(),
                "".to_string(),
                "0.3".to_string(),
                "autocalculate".to_string(),
                ACTIVITY_SCHEDULE.to_string(),
            ],
        ),
        ModelObject::new(
            "Lights",
            [
                format!("{z}_Lights"),
                z.to_string(),
                ALWAYS_ON.to_string(),
                "LightingLevel".to_string(),
                n(loads.lighting_w),
            ],
        ),
        equipment("MELs", loads.mels_w, ALWAYS_ON),
        equipment("Range", loads.range_w, ALWAYS_ON),
        equipment("Fridge", gains.fridge_w, ALWAYS_ON),
        equipment("Dishwasher", gains.dishwasher_w, ALWAYS_ON),
        equipment("ClothesWasher", gains.clothes_washer_w, ALWAYS_ON),
        equipment("ClothesDryer", gains.clothes_dryer_w, ALWAYS_ON),
        ModelObject::new(
            "OtherEquipment",
            [
                format!("{z}_SizingLoads"),
                "None".to_string(),
                z.to_string(),
                ALWAYS_ON.to_string(),
                "EquipmentLevel".to_string(),
                n(loads.sizing_sensible_w + loads.sizing_latent_w),
                "".to_string(),
                "".to_string(),
                n(loads.sizing_latent_w / (loads.sizing_sensible_w + loads.sizing_latent_w).max(1.0)),
            ],
        ),
        ModelObject::new(
            "ZoneInfiltration:DesignFlowRate",
            [
                format!("{z}_Infiltration"),
                z.to_string(),
                ALWAYS_ON.to_string(),
                "Flow/ExteriorArea".to_string(),
                "".to_string(),
                "".to_string(),
                n(params.infiltration_rate),
            ],
        ),
        ModelObject::new(
            "WaterUse:Equipment",
            [
                format!("{z}_DHW"),
                "DHW".to_string(),
                n(loads.dhw_flow_m3_s),
                ALWAYS_ON.to_string(),
                "".to_string(),
                "".to_string(),
                "".to_string(),
                z.to_string(),
            ],
        ),
        ModelObject::new(
            "WaterHeater:Mixed",
            [
                format!("{z}_{}", params.dhw_fuel_item()),
                "0.189".to_string(),
                ALWAYS_ON.to_string(),
                "2".to_string(),
                "100".to_string(),
                "Cycle".to_string(),
                "autosize".to_string(),
                fuel.to_string(),
            ],
        ),
        ModelObject::new(
            "ZoneHVAC:IdealLoadsAirSystem",
            [
                format!("{z}_{}", params.mech_system),
                MECH_AVAILABLE.to_string(),
                format!("{z} Supply Inlet"),
                "".to_string(),
                "".to_string(),
                "50".to_string(),
                "13".to_string(),
            ],
        ),
    ]
}

/// Outdoor air through an energy recovery ventilator; runs off `schedule`.
pub fn energy_recovery_ventilator(zone: &UnitZone, schedule: &str) -> ModelObject {
    // 20 cfm per occupant.
    let flow_m3_s = zone.occupancy * 0.00944;
    ModelObject::new(
        "ZoneVentilation:DesignFlowRate",
        [
            format!("{}_ERV", zone.name),
            zone.name.clone(),
            schedule.to_string(),
            "Flow/Zone".to_string(),
            n(flow_m3_s),
            "".to_string(),
            "".to_string(),
            "".to_string(),
            "Balanced".to_string(),
            "0".to_string(),
            "1".to_string(),
        ],
    )
}

pub fn photovoltaics(params: &CaseParams) -> Option<ModelObject> {
    if params.pv_size_w <= 0.0 {
        return None;
    }
    Some(ModelObject::new(
        "Generator:PVWatts",
        [
            "PV".to_string(),
            "5".to_string(),
            n(params.pv_size_w),
            "Standard".to_string(),
            "14".to_string(),
            "FixedRoofMounted".to_string(),
            n(params.pv_tilt),
            "180".to_string(),
        ],
    ))
}

/// Kiva foundations and their exposed perimeters.
pub fn foundations(params: &CaseParams) -> Vec<ModelObject> {
    let mut objects = Vec::new();
    for f in &params.foundations {
        objects.push(ModelObject::new(
            "Foundation:Kiva",
            [
                f.interface.clone(),
                "".to_string(),
                f.insulation.clone().unwrap_or_default(),
                n(f.insulation_depth),
            ],
        ));
        objects.push(ModelObject::new(
            "SurfaceProperty:ExposedFoundationPerimeter",
            [f.interface.clone(), "TotalExposedPerimeter".to_string(), n(f.perimeter)],
        ));
    }
    objects
}

/// Construction objects for every assigned envelope item, plus the materials
/// and glazing systems their layers name. Sorted by name.
pub fn envelope_constructions(params: &CaseParams, db: &SharedDatabase) -> AppResult<Vec<ModelObject>> {
    let mut constructions: BTreeMap<String, ModelObject> = BTreeMap::new();
    let mut layers: BTreeMap<String, ModelObject> = BTreeMap::new();

    for assignment in &params.envelope {
        if constructions.contains_key(&assignment.item) {
            continue;
        }
        let item = db
            .constructions
            .get(&assignment.item)
            .ok_or_else(|| unknown(&assignment.item, &assignment.slot, "construction database"))?;
        for layer in &item.layers {
            if !layers.contains_key(layer) {
                layers.insert(layer.clone(), layer_object(layer, item, db)?);
            }
        }
        let fields = std::iter::once(item.name.clone()).chain(item.layers.iter().cloned());
        constructions.insert(item.name.clone(), ModelObject::new("Construction", fields));
    }

    Ok(layers.into_values().chain(constructions.into_values()).collect())
}

fn layer_object(layer: &str, item: &ConstructionItem, db: &SharedDatabase) -> AppResult<ModelObject> {
    if let Some(row) = db.materials.find_row(mc::NAME, layer) {
        let m = &db.materials;
        return Ok(ModelObject::new(
            "Material",
            [
                layer.to_string(),
                m.text(row, mc::ROUGHNESS).unwrap_or("MediumRough").to_string(),
                n(required_number(m, row, mc::THICKNESS, layer)?),
                n(required_number(m, row, mc::CONDUCTIVITY, layer)?),
                n(required_number(m, row, mc::DENSITY, layer)?),
                n(required_number(m, row, mc::SPECIFIC_HEAT, layer)?),
            ],
        ));
    }
    if let Some(row) = db.windows.find_row(mc::NAME, layer) {
        let w = &db.windows;
        return Ok(ModelObject::new(
            "WindowMaterial:SimpleGlazingSystem",
            [
                layer.to_string(),
                n(required_number(w, row, mc::U_FACTOR, layer)?),
                n(required_number(w, row, mc::SHGC, layer)?),
            ],
        ));
    }
    Err(unknown(layer, &item.name, "material or window database"))
}

fn required_number(table: &CsvTable, row: usize, column: &str, layer: &str) -> AppResult<f64> {
    table
        .number(row, column)?
        .ok_or_else(|| AppError::InvalidInput(format!("{layer}: \"{column}\" is empty")))
}

fn unknown(item: &str, context: &str, database: &'static str) -> AppError {
    AppError::UnknownItem {
        item: item.to_string(),
        context: context.to_string(),
        database,
    }
}

/// Cost line items the simulator prices in the annual run.
///
/// Assemblies are priced per area of the surfaces that use them, so
/// unselected assemblies come back with zero quantity. Battery storage is
/// sized to the larger outage; PV per installed watt.
pub fn cost_line_items(
    params: &CaseParams,
    db: &SharedDatabase,
    appliance_cost: f64,
    lights_cost: f64,
    battery_kwh: f64,
) -> Vec<ModelObject> {
    let mut objects = Vec::new();
    let dhw_item = params.dhw_fuel_item();
    for item in db.constructions.items() {
        if item.cost_per_area > 0.0 && item.is_assembly() {
            objects.push(line_item(&item.name, "Construction", &item.name, 0.0, item.cost_per_area, 0.0));
        }
        if item.mechanical_cost > 0.0 && item.name == params.mech_system {
            objects.push(general_item(&format!("MECH_{}", item.name), item.mechanical_cost));
        }
        if item.mechanical_cost > 0.0 && item.name == dhw_item {
            objects.push(general_item(&item.name, item.mechanical_cost));
        }
        if item.is_assembly() {
            continue;
        }
        if item.battery_cost_per_kwh > 0.0 {
            objects.push(general_item(&item.name, item.battery_cost_per_kwh * battery_kwh));
        }
        if item.pv_cost_per_w > 0.0 {
            objects.push(general_item(&item.name, item.pv_cost_per_w * params.pv_size_w));
        }
    }
    objects.push(general_item("APPLIANCES", appliance_cost));
    objects.push(general_item("LIGHTS", lights_cost));
    objects
}

fn general_item(name: &str, cost_each: f64) -> ModelObject {
    line_item(name, "General", "", cost_each, 0.0, 1.0)
}

fn line_item(name: &str, kind: &str, item: &str, cost_each: f64, cost_per_area: f64, quantity: f64) -> ModelObject {
    let blank = String::new;
    ModelObject::new(
        "ComponentCost:LineItem",
        [
            name.to_string(),
            blank(),
            kind.to_string(),
            item.to_string(),
            blank(),
            n(cost_each),
            n(cost_per_area),
            blank(),
            blank(),
            blank(),
            blank(),
            blank(),
            n(quantity),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rv_project::OutageKind;

    fn window(start: (u32, u32), end: (u32, u32)) -> OutageWindow {
        let date = |(m, d)| NaiveDate::from_ymd_opt(2020, m, d).unwrap();
        OutageWindow {
            kind: OutageKind::Heating,
            start: date(start),
            end: date(end),
        }
    }

    fn segments(object: &ModelObject) -> Vec<(String, String)> {
        object.fields()[2..]
            .chunks(4)
            .map(|c| (c[0].clone(), c[3].clone()))
            .collect()
    }

    #[test]
    fn schedule_segments_cover_the_year() {
        let object = windowed_schedule(
            "S",
            &[(window((8, 1), (8, 7)), 0.5), (window((2, 1), (2, 7)), 0.0)],
            1.0,
        );
        assert_eq!(
            segments(&object),
            vec![
                ("Through: 01/31".to_string(), "1".to_string()),
                ("Through: 02/07".to_string(), "0".to_string()),
                ("Through: 07/31".to_string(), "1".to_string()),
                ("Through: 08/07".to_string(), "0.5".to_string()),
                ("Through: 12/31".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn schedule_window_at_year_edges() {
        let object = windowed_schedule("S", &[(window((1, 1), (12, 31)), 0.0)], 1.0);
        assert_eq!(segments(&object), vec![("Through: 12/31".to_string(), "0".to_string())]);

        let empty = windowed_schedule("S", &[], 1.0);
        assert_eq!(segments(&empty), vec![("Through: 12/31".to_string(), "1".to_string())]);
    }

    #[test]
    fn line_items_have_thirteen_fields() {
        let object = general_item("APPLIANCES", 1250.0);
        assert_eq!(object.fields().len(), 13);
        assert_eq!(object.field(2), Some("General"));
        assert_eq!(object.field(5), Some("1250"));
        assert_eq!(object.field(12), Some("1"));
    }
}
