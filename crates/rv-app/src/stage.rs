//! Stage outcomes and the context every stage function runs in.

use crate::error::AppError;
use crate::progress::ProgressChannel;
use rv_project::{Case, CaseRegistry};
use rv_results::{Artifact, ArtifactStore};
use std::fmt;

/// Cancellation checkpoints per case across both prep stages.
pub const CHECKPOINTS_PER_CASE: usize = 10;

/// Why a case produced no value in a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// A prerequisite artifact of an earlier stage is not in the store.
    MissingArtifact(String),
    /// The case already failed in an earlier stage.
    PriorFailure,
    /// Cancellation was observed before or during the case.
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingArtifact(key) => write!(f, "missing artifact \"{key}\""),
            SkipReason::PriorFailure => f.write_str("failed in an earlier stage"),
            SkipReason::Cancelled => f.write_str("cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    Ready(T),
    Skipped(SkipReason),
    Failed(String),
}

impl<T> StageOutcome<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, StageOutcome::Ready(_))
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            StageOutcome::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_ready(self) -> Option<T> {
        match self {
            StageOutcome::Ready(value) => Some(value),
            _ => None,
        }
    }
}

/// Early exit from a stage function.
#[derive(Debug)]
pub enum StageInterrupt {
    Cancelled,
    MissingArtifact(String),
    Failed(AppError),
}

impl From<AppError> for StageInterrupt {
    fn from(err: AppError) -> Self {
        StageInterrupt::Failed(err)
    }
}

impl From<rv_sim::SimError> for StageInterrupt {
    fn from(err: rv_sim::SimError) -> Self {
        StageInterrupt::Failed(err.into())
    }
}

impl From<rv_results::ResultsError> for StageInterrupt {
    fn from(err: rv_results::ResultsError) -> Self {
        StageInterrupt::Failed(err.into())
    }
}

impl From<std::io::Error> for StageInterrupt {
    fn from(err: std::io::Error) -> Self {
        StageInterrupt::Failed(err.into())
    }
}

impl From<csv::Error> for StageInterrupt {
    fn from(err: csv::Error) -> Self {
        StageInterrupt::Failed(err.into())
    }
}

pub type StageResult<T> = Result<T, StageInterrupt>;

/// Read-only view handed to every stage function.
pub struct StageContext<'a> {
    pub registry: &'a CaseRegistry,
    pub store: &'a ArtifactStore,
    pub progress: &'a ProgressChannel,
    checkpoint_increment: f64,
}

impl<'a> StageContext<'a> {
    pub fn new(
        registry: &'a CaseRegistry,
        store: &'a ArtifactStore,
        progress: &'a ProgressChannel,
    ) -> Self {
        let total = (CHECKPOINTS_PER_CASE * registry.case_count()).max(1);
        Self {
            registry,
            store,
            progress,
            checkpoint_increment: 1.0 / total as f64,
        }
    }

    pub fn batch(&self) -> &str {
        self.registry.batch_name()
    }

    /// Cancellation point that also counts toward batch progress.
    pub fn checkpoint(&self) -> StageResult<()> {
        self.check_cancel()?;
        self.progress.send_progress(self.checkpoint_increment);
        Ok(())
    }

    /// Cancellation point without a progress increment.
    pub fn check_cancel(&self) -> StageResult<()> {
        if self.progress.poll_cancel() {
            return Err(StageInterrupt::Cancelled);
        }
        Ok(())
    }

    /// Artifact written for `case` by an earlier stage.
    pub fn artifact<A: Artifact>(&self, case: &Case) -> StageResult<A> {
        self.store
            .get::<A>(self.batch(), &case.name)?
            .ok_or_else(|| StageInterrupt::MissingArtifact(A::KEY.to_string()))
    }

    pub fn put_artifact<A: Artifact>(&self, case: &Case, value: &A) -> StageResult<()> {
        self.store.put(self.batch(), &case.name, value)?;
        Ok(())
    }
}
