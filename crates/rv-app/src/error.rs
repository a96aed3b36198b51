//! Error types for the rv-app orchestration layer.

use std::path::PathBuf;

/// Application error type that wraps errors from the lower crates and is
/// shared by the pipeline, the stage functions and the CLI.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Project error: {0}")]
    Project(String),

    #[error("Setup validation failed: {0}")]
    Validation(String),

    #[error("Simulation error: {0}")]
    Simulation(String),

    #[error("Results error: {0}")]
    Results(String),

    #[error("Invalid name: {0}")]
    Naming(String),

    #[error("Geometry file not found: {path}")]
    GeometryMissing { path: PathBuf },

    #[error("Weather file not found: {path}")]
    WeatherMissing { path: PathBuf },

    #[error("\"{item}\" referenced by {context} is not in the {database}")]
    UnknownItem {
        item: String,
        context: String,
        database: &'static str,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Worker pool error: {0}")]
    Pool(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for rv-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl From<rv_project::ProjectError> for AppError {
    fn from(err: rv_project::ProjectError) -> Self {
        match err {
            rv_project::ProjectError::Validation(v) => AppError::Validation(v.to_string()),
            other => AppError::Project(other.to_string()),
        }
    }
}

impl From<rv_project::ValidationError> for AppError {
    fn from(err: rv_project::ValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<rv_sim::SimError> for AppError {
    fn from(err: rv_sim::SimError) -> Self {
        AppError::Simulation(err.to_string())
    }
}

impl From<rv_results::ResultsError> for AppError {
    fn from(err: rv_results::ResultsError) -> Self {
        AppError::Results(err.to_string())
    }
}

impl From<rv_core::CoreError> for AppError {
    fn from(err: rv_core::CoreError) -> Self {
        AppError::Naming(err.to_string())
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::Results(err.to_string())
    }
}
