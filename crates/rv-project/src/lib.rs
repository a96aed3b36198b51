//! rv-project: batch configuration, shared inputs and the case registry.

pub mod config;
pub mod database;
pub mod manifest;
pub mod registry;
pub mod runlist;
pub mod table;
pub mod validate;

pub use config::{BatchConfig, LifecycleConfig, SimulatorConfig};
pub use database::{ConstructionDatabase, ConstructionItem, SharedDatabase};
pub use manifest::RequiredColumns;
pub use registry::{Case, CaseRegistry};
pub use runlist::{CaseParams, EnvelopeAssignment, Foundation, OutageKind, OutageWindow};
pub use table::CsvTable;
pub use validate::ValidationError;

use std::path::PathBuf;

pub type ProjectResult<T> = Result<T, ProjectError>;

#[derive(thiserror::Error, Debug)]
pub enum ProjectError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("File \"{path}\" cannot be parsed as CSV: {source}")]
    Csv { path: PathBuf, source: csv::Error },

    #[error("Invalid value in {context}: column \"{column}\" = \"{value}\" ({reason})")]
    InvalidValue {
        context: String,
        column: String,
        value: String,
        reason: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub(crate) fn read_to_string(path: &std::path::Path) -> ProjectResult<String> {
    std::fs::read_to_string(path).map_err(|source| ProjectError::Read {
        path: path.to_path_buf(),
        source,
    })
}
