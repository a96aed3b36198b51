//! Bulk submission of ready models to a simulator backend.
//!
//! `run_batch` is the barrier between pipeline stages: it returns only once
//! every submitted job has finished.

use crate::simulator::{JobStatus, SimJob, Simulator};
use rv_core::timing::Timer;
use rv_core::{CaseId, StageLabel};
use std::collections::HashSet;
use std::sync::Arc;

/// Outcome of one job in a submission.
#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    pub case: CaseId,
    pub prefix: String,
    pub status: JobStatus,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchRunReport {
    pub jobs: Vec<JobReport>,
    pub wall_time_s: f64,
}

impl BatchRunReport {
    pub fn succeeded(&self) -> usize {
        self.jobs.iter().filter(|j| j.status.is_success()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (CaseId, &str)> {
        self.jobs.iter().filter_map(|j| match &j.status {
            JobStatus::Failed(msg) => Some((j.case, msg.as_str())),
            JobStatus::Succeeded => None,
        })
    }

    pub fn status_of(&self, case: CaseId) -> Option<&JobStatus> {
        self.jobs.iter().find(|j| j.case == case).map(|j| &j.status)
    }
}

#[derive(Clone)]
pub struct SimulatorInvoker {
    backend: Arc<dyn Simulator>,
}

impl SimulatorInvoker {
    pub fn new(backend: Arc<dyn Simulator>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Submit `jobs` as one batch and wait for all of them.
    ///
    /// A job whose process reported success but left no tabular or hourly
    /// output is reported as failed, with the tail of the simulator error
    /// log when one exists.
    pub fn run_batch(&self, jobs: &[SimJob], label: StageLabel) -> BatchRunReport {
        let timer = Timer::start("simulator");
        if jobs.is_empty() {
            tracing::info!(%label, "no ready models, skipping simulator submission");
            return BatchRunReport::default();
        }

        let mut seen = HashSet::new();
        for job in jobs {
            if !seen.insert(job.prefix.as_str()) {
                tracing::warn!(prefix = %job.prefix, "duplicate output prefix in submission");
            }
        }

        tracing::info!(
            %label,
            jobs = jobs.len(),
            backend = self.backend.name(),
            "submitting simulator batch"
        );
        let statuses = self.backend.run_batch(jobs);

        let reports: Vec<JobReport> = jobs
            .iter()
            .enumerate()
            .map(|(i, job)| {
                let status = match statuses.get(i) {
                    Some(JobStatus::Succeeded) => verify_outputs(job),
                    Some(failed) => failed.clone(),
                    None => JobStatus::Failed("simulator returned no status".to_string()),
                };
                if let JobStatus::Failed(msg) = &status {
                    tracing::warn!(case = %job.case_name, prefix = %job.prefix, "simulation failed: {msg}");
                }
                JobReport {
                    case: job.case,
                    prefix: job.prefix.clone(),
                    status,
                }
            })
            .collect();

        let report = BatchRunReport {
            jobs: reports,
            wall_time_s: timer.stop(),
        };
        tracing::info!(
            %label,
            succeeded = report.succeeded(),
            failed = report.jobs.len() - report.succeeded(),
            wall_time_s = report.wall_time_s,
            "simulator batch finished"
        );
        report
    }
}

fn verify_outputs(job: &SimJob) -> JobStatus {
    let outputs = job.outputs();
    match outputs.missing() {
        None => JobStatus::Succeeded,
        Some(path) => {
            let mut msg = format!("simulator output missing: {}", path.display());
            if let Some(tail) = outputs.error_tail(5) {
                msg.push('\n');
                msg.push_str(&tail);
            }
            JobStatus::Failed(msg)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;

    struct Recording {
        seen: Mutex<Vec<String>>,
    }

    impl Simulator for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        fn run_batch(&self, jobs: &[SimJob]) -> Vec<JobStatus> {
            let mut seen = self.seen.lock().unwrap();
            jobs.iter()
                .map(|j| {
                    seen.push(j.prefix.clone());
                    JobStatus::Succeeded
                })
                .collect()
        }
    }

    #[test]
    fn empty_submission_never_reaches_backend() {
        let backend = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
        });
        let invoker = SimulatorInvoker::new(backend.clone());
        let report = invoker.run_batch(&[], StageLabel::Resilience);
        assert!(report.jobs.is_empty());
        assert!(backend.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn success_without_outputs_is_failure() {
        let backend = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
        });
        let invoker = SimulatorInvoker::new(backend.clone());
        let job = SimJob {
            case: CaseId::from_index(2),
            case_name: "RETROFIT_B".to_string(),
            prefix: "Study_RETROFIT_B_BA".to_string(),
            model: PathBuf::from("/nowhere/model.idf"),
            weather: PathBuf::from("/nowhere/site.epw"),
            output_dir: PathBuf::from("/nowhere"),
        };
        let report = invoker.run_batch(&[job], StageLabel::Annual);
        assert_eq!(backend.seen.lock().unwrap().as_slice(), ["Study_RETROFIT_B_BA"]);
        assert_eq!(report.succeeded(), 0);
        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, CaseId::from_index(2));
        assert!(failures[0].1.contains("tbl.csv"));
    }
}
