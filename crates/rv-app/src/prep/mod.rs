//! Model preparation stages.
//!
//! Resilience prep builds the base model shared by both runs and the outage
//! run on top of it; annual prep reloads the base model and adds the
//! full-year controls and cost line items. Each stage passes five
//! checkpoints per case.

pub mod annual;
pub mod objects;
pub mod resilience;

pub use annual::annual_prep;
pub use resilience::resilience_prep;

use crate::artifacts::ModelDigest;
use crate::stage::{StageContext, StageResult};
use rv_core::{StageLabel, output_prefix};
use rv_project::Case;
use rv_results::model_digest;
use rv_sim::{ModelDocument, SimJob};

/// Write the run model for `label` into the study folder and describe the job.
fn write_run_model(
    ctx: &StageContext<'_>,
    case: &Case,
    model: &ModelDocument,
    label: StageLabel,
) -> StageResult<SimJob> {
    let study = ctx.registry.study_folder();
    let prefix = output_prefix(ctx.batch(), &case.name, label);
    let path = study.join(format!("{prefix}.idf"));
    let text = model.render();
    std::fs::write(&path, &text)?;

    let mut digests = ctx
        .store
        .get::<ModelDigest>(ctx.batch(), &case.name)?
        .unwrap_or_default();
    let digest = model_digest(text.as_bytes());
    match label {
        StageLabel::Resilience => {
            digests = ModelDigest {
                resilience: Some(digest),
                annual: None,
            }
        }
        StageLabel::Annual => digests.annual = Some(digest),
    }
    ctx.put_artifact(case, &digests)?;

    tracing::debug!(case = %case.name, model = %path.display(), objects = model.len(), "run model written");
    Ok(SimJob {
        case: case.id,
        case_name: case.name.clone(),
        prefix,
        model: path,
        weather: ctx.registry.weather_path(&case.params.epw),
        output_dir: study.to_path_buf(),
    })
}
