//! Bounded worker pool running one stage function over every case.

use crate::error::{AppError, AppResult};
use crate::stage::{SkipReason, StageContext, StageInterrupt, StageOutcome, StageResult};
use rayon::prelude::*;
use rv_core::timing::AccumulatingTimer;
use rv_project::Case;
use std::panic::{AssertUnwindSafe, catch_unwind};

pub struct WorkerPool {
    pool: rayon::ThreadPool,
    threads: usize,
}

impl WorkerPool {
    pub fn new(threads: usize) -> AppResult<Self> {
        let threads = threads.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("rv-worker-{i}"))
            .build()
            .map_err(|e| AppError::Pool(e.to_string()))?;
        Ok(Self { pool, threads })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Run `stage_fn` for every case whose `active` flag is set.
    ///
    /// Returns one outcome per case, in registry order. Errors and panics are
    /// confined to the case that raised them and reported on the progress
    /// channel. Once cancellation is observed no further case starts.
    pub fn run_stage<T, F>(
        &self,
        stage: &'static str,
        ctx: &StageContext<'_>,
        active: &[bool],
        busy: &AccumulatingTimer,
        stage_fn: F,
    ) -> Vec<StageOutcome<T>>
    where
        T: Send,
        F: Fn(&StageContext<'_>, &Case) -> StageResult<T> + Sync,
    {
        let cases = ctx.registry.cases();
        tracing::debug!(stage, cases = cases.len(), threads = self.threads, "stage start");

        self.pool.install(|| {
            cases
                .par_iter()
                .enumerate()
                .map(|(idx, case)| {
                    if !active.get(idx).copied().unwrap_or(false) {
                        return StageOutcome::Skipped(SkipReason::PriorFailure);
                    }
                    if ctx.progress.poll_cancel() {
                        return StageOutcome::Skipped(SkipReason::Cancelled);
                    }
                    let result = busy.time(|| catch_unwind(AssertUnwindSafe(|| stage_fn(ctx, case))));
                    match result {
                        Ok(Ok(value)) => StageOutcome::Ready(value),
                        Ok(Err(StageInterrupt::Cancelled)) => {
                            tracing::debug!(stage, case = %case.name, "stopped at checkpoint");
                            StageOutcome::Skipped(SkipReason::Cancelled)
                        }
                        Ok(Err(StageInterrupt::MissingArtifact(key))) => {
                            tracing::warn!(stage, case = %case.name, artifact = %key, "prerequisite artifact missing");
                            StageOutcome::Skipped(SkipReason::MissingArtifact(key))
                        }
                        Ok(Err(StageInterrupt::Failed(err))) => {
                            report_failure(ctx, stage, case, err.to_string())
                        }
                        Err(panic) => {
                            let message = panic
                                .downcast_ref::<&str>()
                                .map(|s| s.to_string())
                                .or_else(|| panic.downcast_ref::<String>().cloned())
                                .unwrap_or_else(|| "unknown panic".to_string());
                            report_failure(ctx, stage, case, format!("panicked: {message}"))
                        }
                    }
                })
                .collect()
        })
    }
}

fn report_failure<T>(ctx: &StageContext<'_>, stage: &str, case: &Case, message: String) -> StageOutcome<T> {
    tracing::warn!(stage, case = %case.name, "case failed: {message}");
    ctx.progress
        .send_error(format!("{}: {stage} failed: {message}", case.name));
    StageOutcome::Failed(message)
}
