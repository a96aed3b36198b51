//! Annual prep: the full-year run, built on the base model.

use super::objects;
use super::write_run_model;
use crate::artifacts::{BaseModel, InternalGainsTable, OutageSummary, UnitZones};
use crate::error::AppError;
use crate::stage::{StageContext, StageResult};
use rv_core::StageLabel;
use rv_project::Case;
use rv_results::model_digest;
use rv_sim::{ModelDocument, SimJob};

pub fn annual_prep(ctx: &StageContext<'_>, case: &Case) -> StageResult<SimJob> {
    let params = &case.params;

    let gains: InternalGainsTable = ctx.artifact(case)?;
    let zones: UnitZones = ctx.artifact(case)?;
    let base: BaseModel = ctx.artifact(case)?;
    let outage: OutageSummary = ctx.artifact(case)?;
    ctx.checkpoint()?;

    let text = std::fs::read_to_string(&base.path)?;
    if model_digest(text.as_bytes()) != base.digest {
        return Err(AppError::InvalidInput(format!(
            "{} changed since resilience prep",
            base.path.display()
        ))
        .into());
    }
    let mut model = ModelDocument::parse(&base.path.display().to_string(), &text)?;
    ctx.checkpoint()?;

    model.extend(objects::annual_schedules(params));
    for zone in &zones.zones {
        model.push(objects::natural_ventilation(zone, params));
        model.push(objects::energy_recovery_ventilator(zone, objects::ALWAYS_ON));
    }
    ctx.checkpoint()?;

    model.extend(objects::cost_line_items(
        params,
        ctx.registry.database(),
        gains.total_appliance_cost,
        gains.lights_cost,
        outage.battery_kwh(),
    ));
    ctx.checkpoint()?;

    let job = write_run_model(ctx, case, &model, StageLabel::Annual)?;
    ctx.checkpoint()?;
    Ok(job)
}
