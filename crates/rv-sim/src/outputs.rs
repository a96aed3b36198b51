//! Files the simulator writes for one run prefix.

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFiles {
    /// Tabular report (`{prefix}tbl.csv`).
    pub tabular: PathBuf,
    /// Hourly variables (`{prefix}out.csv`).
    pub hourly: PathBuf,
    /// Simulator error log (`{prefix}out.err`).
    pub errors: PathBuf,
}

impl OutputFiles {
    pub fn new(dir: &Path, prefix: &str) -> Self {
        Self {
            tabular: dir.join(format!("{prefix}tbl.csv")),
            hourly: dir.join(format!("{prefix}out.csv")),
            errors: dir.join(format!("{prefix}out.err")),
        }
    }

    /// First required output that does not exist.
    pub fn missing(&self) -> Option<&Path> {
        [&self.tabular, &self.hourly]
            .into_iter()
            .find(|p| !p.is_file())
            .map(PathBuf::as_path)
    }

    /// Last lines of the error log, if the simulator left one.
    pub fn error_tail(&self, lines: usize) -> Option<String> {
        let content = std::fs::read_to_string(&self.errors).ok()?;
        let all: Vec<&str> = content.lines().collect();
        let start = all.len().saturating_sub(lines);
        Some(all[start..].join("\n"))
    }
}
