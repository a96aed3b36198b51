//! Name rules for batches and cases, and the output prefixes derived from them.
//!
//! Every file the simulator writes for a case is named from
//! `{batch}_{case}_{label}`. Within one batch the batch name is fixed and case
//! names are unique, so two different (case, label) pairs never share a prefix.

use crate::error::{CoreError, CoreResult};
use core::fmt;

/// Simulator run label, one per simulator barrier in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StageLabel {
    /// Outage (resilience) simulation.
    Resilience,
    /// Full-year (annual) simulation.
    Annual,
}

impl StageLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            StageLabel::Resilience => "BR",
            StageLabel::Annual => "BA",
        }
    }
}

impl fmt::Display for StageLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_legal_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == ' '
}

fn validate_name(what: &'static str, name: &str) -> CoreResult<()> {
    if name.trim().is_empty() {
        return Err(CoreError::InvalidName {
            what,
            name: name.to_string(),
            reason: "must not be empty",
        });
    }
    if !name.chars().all(is_legal_char) {
        return Err(CoreError::InvalidName {
            what,
            name: name.to_string(),
            reason: "may contain letters, numbers, underscores, or spaces only",
        });
    }
    Ok(())
}

/// Case names end up in file names, so the alphabet is restricted.
pub fn validate_case_name(name: &str) -> CoreResult<()> {
    validate_name("case", name)
}

pub fn validate_batch_name(name: &str) -> CoreResult<()> {
    validate_name("batch", name)
}

/// Prefix handed to the simulator for one (case, run) pair.
pub fn output_prefix(batch: &str, case: &str, label: StageLabel) -> String {
    format!("{}_{}_{}", batch, case, label)
}

/// Base name shared by every stage file of a case.
pub fn case_stem(batch: &str, case: &str) -> String {
    format!("{}_{}", batch, case)
}
