//! Error types for model generation and simulator execution.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Model syntax error in {source_name} near object {object}: {message}")]
    ModelSyntax {
        source_name: String,
        object: usize,
        message: String,
    },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Simulator output missing: {path}")]
    OutputMissing { path: PathBuf },

    #[error("Malformed simulator output {path}: {message}")]
    MalformedOutput { path: PathBuf, message: String },

    #[error("Report value not found: table \"{table}\", row \"{row}\", column \"{column}\"")]
    ReportValueMissing {
        table: String,
        row: String,
        column: String,
    },

    #[error("Hourly column not found: {column}")]
    ColumnMissing { column: String },

    #[error("Failed to launch simulator {program}: {source}")]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },

    #[error("Simulator exited with status {status} for {prefix}")]
    ExitStatus { prefix: String, status: String },

    #[error("Backend error: {message}")]
    Backend { message: String },

    #[error("CSV error in {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SimResult<T> = Result<T, SimError>;

pub(crate) fn read_to_string(path: &std::path::Path) -> SimResult<String> {
    std::fs::read_to_string(path).map_err(|source| SimError::Read {
        path: path.to_path_buf(),
        source,
    })
}
