//! rv-results: artifact storage, result rows and the batch results table.

pub mod artifact;
pub mod hash;
pub mod table;
pub mod types;

pub use artifact::{Artifact, ArtifactStore};
pub use hash::model_digest;
pub use table::{ERROR_SENTINEL, METRIC_COLUMNS, METRIC_COUNT, RUN_NAME_COLUMN, ResultsTable, read_table};
pub use types::*;

use std::path::PathBuf;

pub type ResultsResult<T> = Result<T, ResultsError>;

#[derive(thiserror::Error, Debug)]
pub enum ResultsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid path: {message}")]
    InvalidPath { message: String },

    #[error("Invalid artifact key \"{key}\"")]
    InvalidKey { key: String },

    #[error("Artifact \"{key}\" for case \"{case}\" is corrupt at {path}: {source}")]
    CorruptArtifact {
        case: String,
        key: String,
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Result row for case \"{case}\" was already recorded")]
    DuplicateRow { case: String },

    #[error("Result row for \"{case}\" has {found} metric values, expected {expected}")]
    RowWidth {
        case: String,
        found: usize,
        expected: usize,
    },
}
