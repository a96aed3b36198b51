//! Batch orchestration for building-energy simulation studies.
//!
//! This crate drives every case of a [`rv_project::CaseRegistry`] through
//! resilience prep, the outage simulation, post-processing, annual prep, the
//! full-year simulation and metric extraction, and collects one result row per
//! case. It is shared by the CLI and by embedding applications.

pub mod aggregate;
pub mod artifacts;
pub mod error;
pub mod gains;
pub mod lifecycle;
pub mod metrics;
pub mod pipeline;
pub mod pool;
pub mod postprocess;
pub mod prep;
pub mod progress;
pub mod stage;

// Re-export key types for convenience
pub use aggregate::{Aggregator, CaseLedger, CaseStatus};
pub use error::{AppError, AppResult};
pub use lifecycle::{CashFlow, DiscountedLifecycle, LifecycleInputs, LifecycleModel, LifecycleResult};
pub use pipeline::{BatchReport, BatchRunner, BatchWorker, FailedCase, run_batch};
pub use pool::WorkerPool;
pub use progress::{BatchHandle, BatchStage, ProgressChannel, ProgressEvent, progress_channel};
pub use stage::{CHECKPOINTS_PER_CASE, SkipReason, StageContext, StageOutcome};
