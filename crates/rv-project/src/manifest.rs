//! Required-columns manifest.
//!
//! A JSON object keyed by database file stem (`"Construction Database"`) and
//! `"Runlist"`, each holding the column names that file must provide. The
//! manifest is maintained next to the database so that the run-list format
//! can be versioned without rebuilding the orchestrator.

use crate::validate::ValidationError;
use crate::{ProjectResult, read_to_string};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const RUNLIST_KEY: &str = "Runlist";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequiredColumns {
    pub files: BTreeMap<String, Vec<String>>,
}

impl RequiredColumns {
    pub fn load(path: &Path) -> ProjectResult<Self> {
        if !path.is_file() {
            return Err(ValidationError::MissingPath {
                what: "required-columns manifest",
                path: path.to_path_buf(),
            }
            .into());
        }
        let content = read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Columns required for a database file, looked up by its file name.
    pub fn for_file(&self, file_name: &str) -> ProjectResult<&[String]> {
        let key = file_name.strip_suffix(".csv").unwrap_or(file_name);
        self.files
            .get(key)
            .map(Vec::as_slice)
            .ok_or_else(|| {
                ValidationError::ManifestEntryMissing {
                    key: key.to_string(),
                }
                .into()
            })
    }

    pub fn runlist(&self) -> ProjectResult<&[String]> {
        self.for_file(RUNLIST_KEY)
    }
}
