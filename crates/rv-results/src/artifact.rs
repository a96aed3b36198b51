//! Artifact Store: per-case derived values that must outlive a simulator
//! barrier.
//!
//! Layout: `<root>/<batch>/<case>/<key>.json`. Every (batch, case) pair owns
//! its own directory, so concurrent writers for different cases never touch
//! the same file. Writes go to a temporary file first and are renamed into
//! place, so a reader sees either the previous value or the complete new one.

use crate::{ResultsError, ResultsResult};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Typed payload stored under a fixed key.
pub trait Artifact: Serialize + DeserializeOwned {
    const KEY: &'static str;
}

pub const ARTIFACTS_DIR: &str = "artifacts";

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root_dir: PathBuf,
}

fn validate_key(key: &str) -> ResultsResult<()> {
    let legal = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if legal {
        Ok(())
    } else {
        Err(ResultsError::InvalidKey {
            key: key.to_string(),
        })
    }
}

fn validate_scope(batch: &str, case: &str) -> ResultsResult<()> {
    rv_core::validate_batch_name(batch)
        .and_then(|_| rv_core::validate_case_name(case))
        .map_err(|e| ResultsError::InvalidPath {
            message: e.to_string(),
        })
}

impl ArtifactStore {
    pub fn new(root_dir: PathBuf) -> ResultsResult<Self> {
        if !root_dir.exists() {
            fs::create_dir_all(&root_dir)?;
        }
        Ok(Self { root_dir })
    }

    /// Store rooted at `<study>/artifacts`.
    pub fn for_study(study_folder: &Path) -> ResultsResult<Self> {
        Self::new(study_folder.join(ARTIFACTS_DIR))
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    fn batch_dir(&self, batch: &str) -> PathBuf {
        self.root_dir.join(batch)
    }

    fn case_dir(&self, batch: &str, case: &str) -> PathBuf {
        self.batch_dir(batch).join(case)
    }

    pub fn artifact_path(&self, batch: &str, case: &str, key: &str) -> PathBuf {
        self.case_dir(batch, case).join(format!("{key}.json"))
    }

    pub fn put<A: Artifact>(&self, batch: &str, case: &str, value: &A) -> ResultsResult<()> {
        let json = serde_json::to_vec_pretty(value)?;
        self.write_atomic(batch, case, A::KEY, &json)
    }

    /// `Ok(None)` when nothing was stored under the key for this case.
    pub fn get<A: Artifact>(&self, batch: &str, case: &str) -> ResultsResult<Option<A>> {
        let Some(bytes) = self.read(batch, case, A::KEY)? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| ResultsError::CorruptArtifact {
                case: case.to_string(),
                key: A::KEY.to_string(),
                path: self.artifact_path(batch, case, A::KEY),
                source,
            })
    }

    pub fn put_value(
        &self,
        batch: &str,
        case: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> ResultsResult<()> {
        let json = serde_json::to_vec_pretty(value)?;
        self.write_atomic(batch, case, key, &json)
    }

    pub fn get_value(
        &self,
        batch: &str,
        case: &str,
        key: &str,
    ) -> ResultsResult<Option<serde_json::Value>> {
        match self.read(batch, case, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn contains(&self, batch: &str, case: &str, key: &str) -> bool {
        self.artifact_path(batch, case, key).is_file()
    }

    /// Keys stored for a case, sorted.
    pub fn keys(&self, batch: &str, case: &str) -> ResultsResult<Vec<String>> {
        let dir = self.case_dir(batch, case);
        let mut keys = Vec::new();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(keys),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem() {
                    keys.push(stem.to_string_lossy().to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    pub fn remove_case(&self, batch: &str, case: &str) -> ResultsResult<()> {
        validate_scope(batch, case)?;
        remove_dir_if_present(&self.case_dir(batch, case))
    }

    pub fn clear_batch(&self, batch: &str) -> ResultsResult<()> {
        rv_core::validate_batch_name(batch).map_err(|e| ResultsError::InvalidPath {
            message: e.to_string(),
        })?;
        remove_dir_if_present(&self.batch_dir(batch))
    }

    fn read(&self, batch: &str, case: &str, key: &str) -> ResultsResult<Option<Vec<u8>>> {
        validate_scope(batch, case)?;
        validate_key(key)?;
        match fs::read(self.artifact_path(batch, case, key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_atomic(&self, batch: &str, case: &str, key: &str, bytes: &[u8]) -> ResultsResult<()> {
        validate_scope(batch, case)?;
        validate_key(key)?;
        let dir = self.case_dir(batch, case);
        fs::create_dir_all(&dir)?;

        let path = dir.join(format!("{key}.json"));
        let tmp = dir.join(format!(".{key}.json.tmp"));
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        tracing::trace!(batch, case, key, "artifact stored");
        Ok(())
    }
}

fn remove_dir_if_present(dir: &Path) -> ResultsResult<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
