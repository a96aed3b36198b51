//! Batch configuration file (YAML).

use crate::validate::ValidationError;
use crate::{ProjectResult, read_to_string};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulatorConfig {
    /// Simulator executable; not needed when replaying existing outputs.
    pub executable: Option<PathBuf>,
    /// Input data dictionary handed to the simulator.
    pub descriptor: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LifecycleConfig {
    pub discount_rate: f64,
    pub carbon_price_per_kg: f64,
    pub transition_cost_per_kw: f64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            discount_rate: 0.02,
            carbon_price_per_kg: 0.25,
            transition_cost_per_kw: 100.0,
        }
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchConfig {
    pub batch_name: String,
    pub study_folder: PathBuf,
    pub run_list: PathBuf,
    pub database_dir: PathBuf,
    pub required_columns: PathBuf,
    #[serde(default)]
    pub simulator: SimulatorConfig,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub graphs_enabled: bool,
    #[serde(default)]
    pub pdf_enabled: bool,
    #[serde(default)]
    pub replay_outputs: bool,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
}

impl BatchConfig {
    /// Load, resolve relative paths against the file's directory and validate.
    pub fn load_yaml(path: &Path) -> ProjectResult<Self> {
        let content = read_to_string(path)?;
        let mut config: BatchConfig = serde_yaml::from_str(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn save_yaml(&self, path: &Path) -> ProjectResult<()> {
        self.validate()?;
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.study_folder);
        resolve(&mut self.run_list);
        resolve(&mut self.database_dir);
        resolve(&mut self.required_columns);
        if let Some(exe) = self.simulator.executable.as_mut() {
            // Bare program names are looked up on PATH.
            if exe.components().count() > 1 {
                resolve(exe);
            }
        }
        if let Some(descriptor) = self.simulator.descriptor.as_mut() {
            resolve(descriptor);
        }
    }

    /// Checks that do not need the database or run list to be loaded.
    pub fn validate(&self) -> Result<(), ValidationError> {
        rv_core::validate_batch_name(&self.batch_name).map_err(|e| ValidationError::InvalidConfig {
            field: "batch_name",
            reason: e.to_string(),
        })?;
        if self.concurrency == 0 {
            return Err(ValidationError::InvalidConfig {
                field: "concurrency",
                reason: "must be at least 1".to_string(),
            });
        }
        if !self.study_folder.is_dir() {
            return Err(ValidationError::MissingPath {
                what: "Study folder",
                path: self.study_folder.clone(),
            });
        }
        if !self.run_list.is_file() {
            return Err(ValidationError::MissingPath {
                what: "Run list",
                path: self.run_list.clone(),
            });
        }
        if let Some(descriptor) = &self.simulator.descriptor {
            if !descriptor.is_file() {
                return Err(ValidationError::MissingPath {
                    what: "Simulator descriptor",
                    path: descriptor.clone(),
                });
            }
        }
        if !self.replay_outputs && self.simulator.executable.is_none() {
            return Err(ValidationError::InvalidConfig {
                field: "simulator.executable",
                reason: "required unless replay_outputs is set".to_string(),
            });
        }
        if !(0.0..1.0).contains(&self.lifecycle.discount_rate) {
            return Err(ValidationError::InvalidConfig {
                field: "lifecycle.discount_rate",
                reason: format!("{} is outside [0, 1)", self.lifecycle.discount_rate),
            });
        }
        Ok(())
    }
}
