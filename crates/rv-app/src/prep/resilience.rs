//! Resilience prep: base model plus the outage run.

use super::objects;
use super::write_run_model;
use crate::artifacts::{BaseModel, InternalGainsTable, UnitZone, UnitZones};
use crate::error::{AppError, AppResult};
use crate::gains::{self, MAX_BEDROOMS};
use crate::stage::{StageContext, StageResult};
use rv_core::StageLabel;
use rv_core::naming::case_stem;
use rv_project::{Case, CaseRegistry};
use rv_results::model_digest;
use rv_sim::{ModelDocument, SimJob};

/// `Zone` field holding the floor area.
const ZONE_FLOOR_AREA: usize = 9;
/// Construction field of surfaces and fenestration.
const SURFACE_CONSTRUCTION: usize = 2;
/// Zone field of `BuildingSurface:Detailed`.
const SURFACE_ZONE: usize = 3;

pub fn resilience_prep(ctx: &StageContext<'_>, case: &Case) -> StageResult<SimJob> {
    let registry = ctx.registry;
    let params = &case.params;

    let geometry_path = registry.geometry_path(case);
    if !geometry_path.is_file() {
        return Err(AppError::GeometryMissing { path: geometry_path }.into());
    }
    let geometry = ModelDocument::read(&geometry_path)?;
    let weather = registry.weather_path(&params.epw);
    if !weather.is_file() {
        return Err(AppError::WeatherMissing { path: weather }.into());
    }
    let ddy = ModelDocument::read(&registry.weather_path(&params.ddy))?;
    ctx.checkpoint()?;

    let gains = gains::internal_gains_table(&params.appliances, &registry.database().constructions)?;
    ctx.put_artifact(case, &gains)?;
    ctx.checkpoint()?;

    let (base, zones) = build_base_model(registry, case, &geometry, &ddy, &gains)?;
    let stem = case_stem(ctx.batch(), &case.name);
    let base_path = registry.study_folder().join(format!("{stem}_PASS.idf"));
    let text = base.render();
    std::fs::write(&base_path, &text)?;
    ctx.put_artifact(case, &zones)?;
    ctx.put_artifact(
        case,
        &BaseModel {
            path: base_path,
            digest: model_digest(text.as_bytes()),
        },
    )?;
    ctx.checkpoint()?;

    let mut model = base;
    model.extend(objects::resilience_schedules(params));
    model.extend(objects::weather_morph(params));
    for zone in &zones.zones {
        model.push(objects::natural_ventilation(zone, params));
        model.push(objects::energy_recovery_ventilator(zone, objects::MECH_AVAILABLE));
    }
    ctx.checkpoint()?;

    let job = write_run_model(ctx, case, &model, StageLabel::Resilience)?;
    ctx.checkpoint()?;
    Ok(job)
}

/// Base name of a geometry zone (`Living|UNIT|2BR` -> `Living`).
fn base_zone_name(raw: &str) -> &str {
    raw.split('|').next().unwrap_or(raw).trim()
}

/// Everything both runs share: run control, geometry with the case's
/// constructions, unit-zone loads, design days and optional PV.
pub(crate) fn build_base_model(
    registry: &CaseRegistry,
    case: &Case,
    geometry: &ModelDocument,
    ddy: &ModelDocument,
    gains: &InternalGainsTable,
) -> AppResult<(ModelDocument, UnitZones)> {
    let params = &case.params;
    let db = registry.database();

    let mut zones = UnitZones::default();
    for zone in geometry.objects_of("Zone") {
        let Some(raw) = zone.name() else { continue };
        let area = zone
            .number(ZONE_FLOOR_AREA)
            .filter(|a| *a > 0.0)
            .unwrap_or_else(|| params.icfa_m2());
        if let Some(unit) = gains::parse_unit_zone(raw, area) {
            zones.zones.push(unit);
        }
    }
    if zones.zones.is_empty() {
        return Err(AppError::InvalidInput(format!(
            "{}: geometry has no dwelling-unit zones",
            registry.geometry_path(case).display()
        )));
    }

    let mut model = ModelDocument::new();
    model.extend(objects::simulation_control(&case_stem(registry.batch_name(), &case.name)));

    let slot_item = |slot: &str| params.envelope_item(slot).filter(|item| !item.is_empty());
    for object in geometry.objects() {
        if !objects::GEOMETRY_CLASSES.iter().any(|class| object.is(class)) {
            continue;
        }
        let mut object = object.clone();
        if object.is("Zone") {
            if let Some(raw) = object.name() {
                let base = base_zone_name(raw).to_string();
                object.set_field(0, base)?;
            }
        }
        if object.is("BuildingSurface:Detailed") || object.is("FenestrationSurface:Detailed") {
            if let Some(item) = object.field(SURFACE_CONSTRUCTION).and_then(slot_item) {
                let item = item.to_string();
                object.set_field(SURFACE_CONSTRUCTION, item)?;
            }
        }
        if object.is("BuildingSurface:Detailed") {
            if let Some(raw) = object.field(SURFACE_ZONE) {
                let base = base_zone_name(raw).to_string();
                object.set_field(SURFACE_ZONE, base)?;
            }
        }
        model.push(object);
    }
    model.extend(objects::envelope_constructions(params, db)?);
    model.extend(objects::foundations(params));

    for zone in &zones.zones {
        model.extend(unit_zone_objects(zone, gains, params)?);
    }

    model.extend(ddy.objects_of("SizingPeriod:DesignDay").cloned());
    if let Some(pv) = objects::photovoltaics(params) {
        model.push(pv);
    }
    Ok((model, zones))
}

fn unit_zone_objects(
    zone: &UnitZone,
    gains: &InternalGainsTable,
    params: &rv_project::CaseParams,
) -> AppResult<Vec<rv_sim::ModelObject>> {
    let row = gains
        .for_bedrooms(zone.bedrooms.min(MAX_BEDROOMS))
        .ok_or_else(|| AppError::InvalidInput(format!("no internal gains for {} bedrooms", zone.bedrooms)))?;
    let loads = gains::zone_loads(zone, row);
    Ok(objects::zone_objects(zone, &loads, row, params))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_names_lose_their_tags() {
        assert_eq!(base_zone_name("Living|UNIT|2BR"), "Living");
        assert_eq!(base_zone_name("Corridor"), "Corridor");
        assert_eq!(base_zone_name(" Unit A |UNIT|1BR"), "Unit A");
    }
}
