//! Batch pipeline: the fixed stage sequence over every case of a registry.
//!
//! ```text
//! resilience prep -> [BR simulation] -> post-processing
//!     -> annual prep -> [BA simulation] -> metric extraction -> export
//! ```
//!
//! Pool stages run cases concurrently; the two simulations are barriers. A
//! failing case drops out with an ERROR row while the rest continue.

use crate::aggregate::{Aggregator, CaseLedger};
use crate::error::{AppError, AppResult};
use crate::lifecycle::{DiscountedLifecycle, LifecycleModel};
use crate::metrics;
use crate::pool::WorkerPool;
use crate::postprocess;
use crate::prep;
use crate::progress::{BatchHandle, BatchStage, ProgressChannel, progress_channel};
use crate::stage::{StageContext, StageOutcome, StageResult};
use rv_core::StageLabel;
use rv_core::timing::{AccumulatingTimer, BatchTimings, Timer};
use rv_project::{BatchConfig, Case, CaseRegistry};
use rv_results::{ArtifactStore, ResultRow};
use rv_sim::{CommandSimulator, ReplaySimulator, SimJob, Simulator, SimulatorInvoker};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// A case that ended the batch with an ERROR row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedCase {
    pub name: String,
    pub reason: String,
}

/// What a finished (or cancelled) batch produced.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub batch_name: String,
    pub cases: usize,
    pub succeeded: usize,
    pub failed: Vec<FailedCase>,
    pub cancelled: bool,
    pub results_csv: PathBuf,
    pub rows: Vec<ResultRow>,
    pub timings: BatchTimings,
}

pub struct BatchRunner {
    registry: Arc<CaseRegistry>,
    invoker: SimulatorInvoker,
    lifecycle: Arc<dyn LifecycleModel>,
    concurrency: usize,
}

impl BatchRunner {
    /// Runner with the backend and lifecycle model the configuration asks for.
    pub fn new(registry: Arc<CaseRegistry>) -> AppResult<Self> {
        let config = registry.config();
        let backend: Arc<dyn Simulator> = if config.replay_outputs {
            Arc::new(ReplaySimulator)
        } else {
            let exe = config.simulator.executable.clone().ok_or_else(|| {
                AppError::Validation("simulator.executable is required unless replay_outputs is set".to_string())
            })?;
            let mut sim = CommandSimulator::new(exe, config.concurrency);
            if let Some(descriptor) = &config.simulator.descriptor {
                sim = sim.with_descriptor(descriptor.clone());
            }
            Arc::new(sim)
        };
        Ok(Self {
            invoker: SimulatorInvoker::new(backend),
            lifecycle: Arc::new(DiscountedLifecycle::from_config(&config.lifecycle)),
            concurrency: config.concurrency,
            registry,
        })
    }

    pub fn with_simulator(mut self, backend: Arc<dyn Simulator>) -> Self {
        self.invoker = SimulatorInvoker::new(backend);
        self
    }

    pub fn with_lifecycle(mut self, model: Arc<dyn LifecycleModel>) -> Self {
        self.lifecycle = model;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn registry(&self) -> &CaseRegistry {
        &self.registry
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run every stage to completion, or until cancellation is observed.
    pub fn run(&self, progress: &ProgressChannel) -> AppResult<BatchReport> {
        let started = Timer::start("batch");
        let registry = self.registry.as_ref();
        let pool = WorkerPool::new(self.concurrency)?;
        let store = ArtifactStore::for_study(registry.study_folder())?;
        store.clear_batch(registry.batch_name())?;
        let ctx = StageContext::new(registry, &store, progress);

        tracing::info!(
            batch = registry.batch_name(),
            cases = registry.case_count(),
            threads = pool.threads(),
            backend = self.invoker.backend_name(),
            lifecycle = self.lifecycle.name(),
            "batch start"
        );
        if registry.config().pdf_enabled {
            tracing::info!("PDF reports are rendered from the results table outside the pipeline");
        }

        let mut state = BatchState {
            ledger: CaseLedger::new(registry.case_count()),
            aggregator: Aggregator::create(registry)?,
            timings: BatchTimings::default(),
        };

        progress.send_stage(BatchStage::ResiliencePrep);
        let jobs = state.pool_stage(&pool, &ctx, "resilience prep", prep::resilience_prep)?;
        if progress.poll_cancel() {
            return self.finish(state, progress, started, true);
        }

        progress.send_stage(BatchStage::ResilienceSimulation);
        state.simulate(&self.invoker, jobs, StageLabel::Resilience, "resilience simulation")?;
        if progress.poll_cancel() {
            return self.finish(state, progress, started, true);
        }

        progress.send_stage(BatchStage::PostProcessing);
        state.pool_stage(&pool, &ctx, "post-processing", postprocess::post_process)?;
        if progress.poll_cancel() {
            return self.finish(state, progress, started, true);
        }

        progress.send_stage(BatchStage::AnnualPrep);
        let jobs = state.pool_stage(&pool, &ctx, "annual prep", prep::annual_prep)?;
        if progress.poll_cancel() {
            return self.finish(state, progress, started, true);
        }

        progress.send_stage(BatchStage::AnnualSimulation);
        state.simulate(&self.invoker, jobs, StageLabel::Annual, "annual simulation")?;
        if progress.poll_cancel() {
            return self.finish(state, progress, started, true);
        }

        progress.send_stage(BatchStage::MetricExtraction);
        let lifecycle = self.lifecycle.as_ref();
        let results = state.pool_stage(&pool, &ctx, "metric extraction", |ctx, case| {
            metrics::extract_metrics(ctx, case, lifecycle)
        })?;
        for (case, result) in registry.cases().iter().zip(results) {
            if let Some(values) = result {
                state.aggregator.append_metrics(&case.name, &values)?;
            }
        }

        let cancelled = progress.poll_cancel();
        self.finish(state, progress, started, cancelled)
    }

    fn finish(
        &self,
        mut state: BatchState,
        progress: &ProgressChannel,
        started: Timer,
        cancelled: bool,
    ) -> AppResult<BatchReport> {
        progress.send_stage(BatchStage::Export);
        let export = Timer::start("export");
        let results_csv = state.aggregator.csv_path();
        let failed: Vec<FailedCase> = state
            .ledger
            .failed()
            .into_iter()
            .filter_map(|(idx, reason)| {
                self.registry.case_at(idx).map(|case| FailedCase {
                    name: case.name.clone(),
                    reason: reason.to_string(),
                })
            })
            .collect();
        let rows = state.aggregator.finish()?;
        state.timings.push(export, &AccumulatingTimer::new());
        state.timings.total_time_s = started.stop();

        let succeeded = rows.iter().filter(|r| !r.is_error()).count();
        if cancelled {
            tracing::warn!(rows = rows.len(), "batch cancelled, partial results exported");
            progress.send_stage(BatchStage::Cancelled);
        } else {
            tracing::info!(
                rows = rows.len(),
                succeeded,
                failed = failed.len(),
                total_time_s = state.timings.total_time_s,
                "batch complete"
            );
            progress.send_stage(BatchStage::Completed);
        }

        Ok(BatchReport {
            batch_name: self.registry.batch_name().to_string(),
            cases: self.registry.case_count(),
            succeeded,
            failed,
            cancelled,
            results_csv,
            rows,
            timings: state.timings,
        })
    }
}

/// Mutable bookkeeping of one batch run.
struct BatchState {
    ledger: CaseLedger,
    aggregator: Aggregator,
    timings: BatchTimings,
}

impl BatchState {
    /// Run a pool stage over the active cases; failures get their ERROR row
    /// right away.
    fn pool_stage<T, F>(
        &mut self,
        pool: &WorkerPool,
        ctx: &StageContext<'_>,
        stage: &'static str,
        stage_fn: F,
    ) -> AppResult<Vec<Option<T>>>
    where
        T: Send,
        F: Fn(&StageContext<'_>, &Case) -> StageResult<T> + Sync,
    {
        let busy = AccumulatingTimer::new();
        let timer = Timer::start(stage);
        let outcomes = pool.run_stage(stage, ctx, &self.ledger.active_mask(), &busy, stage_fn);
        self.timings.push(timer, &busy);

        let failed = self.ledger.record(&outcomes);
        self.aggregator.append_errors(&failed)?;
        Ok(outcomes.into_iter().map(StageOutcome::into_ready).collect())
    }

    fn simulate(
        &mut self,
        invoker: &SimulatorInvoker,
        jobs: Vec<Option<SimJob>>,
        label: StageLabel,
        stage: &'static str,
    ) -> AppResult<()> {
        let timer = Timer::start(stage);
        let jobs: Vec<SimJob> = jobs.into_iter().flatten().collect();
        let report = invoker.run_batch(&jobs, label);
        self.timings.push(timer, &AccumulatingTimer::new());

        let failed = self.ledger.record_simulation(&report);
        self.aggregator.append_errors(&failed)
    }
}

/// Open the registry for `config` and run the whole batch on this thread.
pub fn run_batch(config: BatchConfig, progress: &ProgressChannel) -> AppResult<BatchReport> {
    let registry = Arc::new(CaseRegistry::open(config)?);
    BatchRunner::new(registry)?.run(progress)
}

/// A batch running on its own thread.
pub struct BatchWorker {
    handle: JoinHandle<AppResult<BatchReport>>,
}

impl BatchWorker {
    /// Start `runner` on a background thread; the returned handle observes it.
    pub fn start(runner: BatchRunner) -> (Self, BatchHandle) {
        let (progress, observer) = progress_channel();
        let handle = thread::spawn(move || runner.run(&progress));
        (Self { handle }, observer)
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the batch to end.
    pub fn join(self) -> AppResult<BatchReport> {
        self.handle
            .join()
            .map_err(|_| AppError::Pool("batch thread panicked".to_string()))?
    }
}
