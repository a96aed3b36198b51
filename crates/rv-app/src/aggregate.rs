//! Per-case status ledger and the single-writer results aggregator.

use crate::error::AppResult;
use crate::stage::{SkipReason, StageOutcome};
use rv_project::CaseRegistry;
use rv_results::{ResultMetrics, ResultRow, ResultsTable};
use rv_sim::{BatchRunReport, JobStatus};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseStatus {
    Active,
    Failed(String),
    Cancelled,
}

/// Where every case stands as the batch moves through its stages.
#[derive(Debug, Clone)]
pub struct CaseLedger {
    statuses: Vec<CaseStatus>,
}

impl CaseLedger {
    pub fn new(cases: usize) -> Self {
        Self {
            statuses: vec![CaseStatus::Active; cases],
        }
    }

    pub fn active_mask(&self) -> Vec<bool> {
        self.statuses
            .iter()
            .map(|s| *s == CaseStatus::Active)
            .collect()
    }

    pub fn status(&self, index: usize) -> Option<&CaseStatus> {
        self.statuses.get(index)
    }

    pub fn active_count(&self) -> usize {
        self.statuses.iter().filter(|s| **s == CaseStatus::Active).count()
    }

    pub fn failed(&self) -> Vec<(usize, &str)> {
        self.statuses
            .iter()
            .enumerate()
            .filter_map(|(i, s)| match s {
                CaseStatus::Failed(msg) => Some((i, msg.as_str())),
                _ => None,
            })
            .collect()
    }

    /// Apply one stage's outcomes; returns the indices that failed in it.
    ///
    /// A missing prerequisite artifact counts as a failure of the case.
    pub fn record<T>(&mut self, outcomes: &[StageOutcome<T>]) -> Vec<usize> {
        let mut failed = Vec::new();
        for (idx, outcome) in outcomes.iter().enumerate() {
            if self.statuses.get(idx) != Some(&CaseStatus::Active) {
                continue;
            }
            let next = match outcome {
                StageOutcome::Ready(_) | StageOutcome::Skipped(SkipReason::PriorFailure) => continue,
                StageOutcome::Failed(msg) => CaseStatus::Failed(msg.clone()),
                StageOutcome::Skipped(reason @ SkipReason::MissingArtifact(_)) => {
                    CaseStatus::Failed(reason.to_string())
                }
                StageOutcome::Skipped(SkipReason::Cancelled) => CaseStatus::Cancelled,
            };
            if matches!(next, CaseStatus::Failed(_)) {
                failed.push(idx);
            }
            self.statuses[idx] = next;
        }
        failed
    }

    /// Apply a simulator barrier's job statuses; returns the newly failed.
    pub fn record_simulation(&mut self, report: &BatchRunReport) -> Vec<usize> {
        let mut failed = Vec::new();
        for job in &report.jobs {
            let idx = job.case.index();
            if self.statuses.get(idx) != Some(&CaseStatus::Active) {
                continue;
            }
            if let JobStatus::Failed(msg) = &job.status {
                self.statuses[idx] = CaseStatus::Failed(msg.clone());
                failed.push(idx);
            }
        }
        failed
    }
}

/// Owns the results table; the only writer of result rows.
pub struct Aggregator {
    table: ResultsTable,
    order: Vec<String>,
}

impl Aggregator {
    pub fn create(registry: &CaseRegistry) -> AppResult<Self> {
        let table = ResultsTable::create(registry.study_folder(), registry.batch_name())?;
        Ok(Self {
            table,
            order: registry.cases().iter().map(|c| c.name.clone()).collect(),
        })
    }

    pub fn append_metrics(&mut self, case: &str, metrics: &ResultMetrics) -> AppResult<()> {
        self.table.append(ResultRow::from_metrics(case, metrics))?;
        Ok(())
    }

    /// ERROR rows for the given case indices.
    pub fn append_errors(&mut self, indices: &[usize]) -> AppResult<()> {
        for &idx in indices {
            if let Some(name) = self.order.get(idx) {
                tracing::info!(case = %name, "writing ERROR row");
                self.table.append(ResultRow::error(name.clone()))?;
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn csv_path(&self) -> PathBuf {
        self.table.csv_path()
    }

    /// Write the consolidated table in case order and return its rows.
    pub fn finish(self) -> AppResult<Vec<ResultRow>> {
        let order: Vec<&str> = self.order.iter().map(String::as_str).collect();
        Ok(self.table.export(&order)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rv_core::CaseId;
    use rv_sim::JobReport;

    #[test]
    fn ledger_tracks_first_failure_only() {
        let mut ledger = CaseLedger::new(4);
        let outcomes: Vec<StageOutcome<()>> = vec![
            StageOutcome::Ready(()),
            StageOutcome::Failed("geometry missing".to_string()),
            StageOutcome::Skipped(SkipReason::MissingArtifact("unit_zones".to_string())),
            StageOutcome::Skipped(SkipReason::Cancelled),
        ];
        assert_eq!(ledger.record(&outcomes), vec![1, 2]);
        assert_eq!(ledger.active_mask(), vec![true, false, false, false]);
        assert_eq!(ledger.status(3), Some(&CaseStatus::Cancelled));

        // Later stages skip inactive cases; nothing is counted twice.
        let later: Vec<StageOutcome<()>> = vec![
            StageOutcome::Failed("bad output".to_string()),
            StageOutcome::Skipped(SkipReason::PriorFailure),
            StageOutcome::Skipped(SkipReason::PriorFailure),
            StageOutcome::Skipped(SkipReason::PriorFailure),
        ];
        assert_eq!(ledger.record(&later), vec![0]);
        assert_eq!(ledger.failed().len(), 3);
        assert_eq!(ledger.active_count(), 0);
    }

    #[test]
    fn simulation_failures_mark_cases() {
        let mut ledger = CaseLedger::new(3);
        let report = BatchRunReport {
            jobs: vec![
                JobReport {
                    case: CaseId::from_index(0),
                    prefix: "B_A_BR".to_string(),
                    status: JobStatus::Succeeded,
                },
                JobReport {
                    case: CaseId::from_index(2),
                    prefix: "B_C_BR".to_string(),
                    status: JobStatus::Failed("exit status 1".to_string()),
                },
            ],
            wall_time_s: 0.0,
        };
        assert_eq!(ledger.record_simulation(&report), vec![2]);
        assert_eq!(ledger.active_mask(), vec![true, true, false]);
    }
}
