//! Simulator backends.

use crate::error::{SimError, SimResult};
use crate::outputs::OutputFiles;
use rayon::prelude::*;
use rv_core::CaseId;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// One ready-to-run model of one case.
#[derive(Debug, Clone, PartialEq)]
pub struct SimJob {
    pub case: CaseId,
    pub case_name: String,
    /// `{batch}_{case}_{label}`; every output file of the run starts with it.
    pub prefix: String,
    pub model: PathBuf,
    pub weather: PathBuf,
    pub output_dir: PathBuf,
}

impl SimJob {
    pub fn outputs(&self) -> OutputFiles {
        OutputFiles::new(&self.output_dir, &self.prefix)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    Succeeded,
    Failed(String),
}

impl JobStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, JobStatus::Succeeded)
    }
}

/// A backend that runs one bulk submission to completion.
pub trait Simulator: Send + Sync {
    fn name(&self) -> &str;

    /// Run every job and block until all have finished. Returns one status
    /// per job, in job order.
    fn run_batch(&self, jobs: &[SimJob]) -> Vec<JobStatus>;
}

/// Spawns the external simulator executable, at most `concurrency` processes
/// at a time.
#[derive(Debug, Clone)]
pub struct CommandSimulator {
    executable: PathBuf,
    descriptor: Option<PathBuf>,
    concurrency: usize,
}

impl CommandSimulator {
    pub fn new(executable: impl Into<PathBuf>, concurrency: usize) -> Self {
        Self {
            executable: executable.into(),
            descriptor: None,
            concurrency: concurrency.max(1),
        }
    }

    /// Input data dictionary handed to the simulator with `-i`.
    pub fn with_descriptor(mut self, descriptor: impl Into<PathBuf>) -> Self {
        self.descriptor = Some(descriptor.into());
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Command line for one job.
    pub fn command(&self, job: &SimJob) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.arg("-w")
            .arg(&job.weather)
            .arg("-d")
            .arg(&job.output_dir)
            .arg("-p")
            .arg(&job.prefix)
            .arg("-s")
            .arg("C")
            .arg("-r");
        if let Some(descriptor) = &self.descriptor {
            cmd.arg("-i").arg(descriptor);
        }
        cmd.arg(&job.model);
        cmd
    }

    fn run_one(&self, job: &SimJob) -> SimResult<()> {
        tracing::debug!(prefix = %job.prefix, model = %job.model.display(), "launching simulator");
        let output = self
            .command(job)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| SimError::Spawn {
                program: self.executable.clone(),
                source,
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !stderr.trim().is_empty() {
                tracing::warn!(prefix = %job.prefix, "simulator stderr: {}", stderr.trim());
            }
            return Err(SimError::ExitStatus {
                prefix: job.prefix.clone(),
                status: output.status.to_string(),
            });
        }
        Ok(())
    }
}

impl Simulator for CommandSimulator {
    fn name(&self) -> &str {
        "command"
    }

    fn run_batch(&self, jobs: &[SimJob]) -> Vec<JobStatus> {
        let run = |job: &SimJob| match self.run_one(job) {
            Ok(()) => JobStatus::Succeeded,
            Err(err) => JobStatus::Failed(err.to_string()),
        };
        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.concurrency)
            .build()
        {
            Ok(pool) => pool.install(|| jobs.par_iter().map(run).collect()),
            Err(err) => {
                tracing::warn!("simulator pool unavailable ({err}), running sequentially");
                jobs.iter().map(run).collect()
            }
        }
    }
}

/// Runs nothing; outputs from an earlier run are expected in place.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplaySimulator;

impl Simulator for ReplaySimulator {
    fn name(&self) -> &str {
        "replay"
    }

    fn run_batch(&self, jobs: &[SimJob]) -> Vec<JobStatus> {
        jobs.iter()
            .map(|job| match job.outputs().missing() {
                None => JobStatus::Succeeded,
                Some(path) => JobStatus::Failed(
                    SimError::OutputMissing {
                        path: path.to_path_buf(),
                    }
                    .to_string(),
                ),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> SimJob {
        SimJob {
            case: CaseId::from_index(0),
            case_name: "BASE".to_string(),
            prefix: "Study_BASE_BR".to_string(),
            model: PathBuf::from("/study/Study_BASE_BR.idf"),
            weather: PathBuf::from("/db/Weather Data/site.epw"),
            output_dir: PathBuf::from("/study"),
        }
    }

    #[test]
    fn command_line_layout() {
        let sim = CommandSimulator::new("energyplus", 2).with_descriptor("/opt/Energy+.idd");
        let cmd = sim.command(&job());
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            vec![
                "-w",
                "/db/Weather Data/site.epw",
                "-d",
                "/study",
                "-p",
                "Study_BASE_BR",
                "-s",
                "C",
                "-r",
                "-i",
                "/opt/Energy+.idd",
                "/study/Study_BASE_BR.idf",
            ]
        );
    }

    #[test]
    fn missing_executable_fails_the_job_only() {
        let sim = CommandSimulator::new("/definitely/not/a/simulator", 1);
        let statuses = sim.run_batch(&[job()]);
        assert_eq!(statuses.len(), 1);
        assert!(!statuses[0].is_success());
    }

    #[test]
    fn replay_requires_outputs() {
        let statuses = ReplaySimulator.run_batch(&[job()]);
        assert!(matches!(&statuses[0], JobStatus::Failed(msg) if msg.contains("tbl.csv")));
    }
}
