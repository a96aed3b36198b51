//! Case Registry: the immutable batch value every stage reads from.

use crate::config::BatchConfig;
use crate::database::SharedDatabase;
use crate::manifest::RequiredColumns;
use crate::runlist::{self, CaseParams};
use crate::table::CsvTable;
use crate::validate;
use crate::ProjectResult;
use rv_core::CaseId;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    pub id: CaseId,
    pub name: String,
    pub params: CaseParams,
}

#[derive(Debug, Clone)]
pub struct CaseRegistry {
    config: BatchConfig,
    database: SharedDatabase,
    cases: Vec<Case>,
}

impl CaseRegistry {
    /// Run all setup validation and load the batch. Any error here means no
    /// case work may start.
    pub fn open(config: BatchConfig) -> ProjectResult<Self> {
        config.validate()?;
        let manifest = RequiredColumns::load(&config.required_columns)?;
        let database = SharedDatabase::open(&config.database_dir, &manifest)?;

        let table = CsvTable::read(&config.run_list)?;
        validate::validate_runlist_structure(&table, &manifest)?;
        let parsed = runlist::parse_cases(&table)?;
        validate::validate_runlist_inputs(&parsed, &database, &config.study_folder)?;

        tracing::info!(
            batch = %config.batch_name,
            cases = parsed.len(),
            run_list = %config.run_list.display(),
            "case registry loaded"
        );

        Ok(Self::from_parts(config, database, parsed))
    }

    /// Assemble a registry from already validated parts.
    pub fn from_parts(
        config: BatchConfig,
        database: SharedDatabase,
        parsed: Vec<(String, CaseParams)>,
    ) -> Self {
        let cases = parsed
            .into_iter()
            .enumerate()
            .map(|(idx, (name, params))| Case {
                id: CaseId::from_index(idx as u32),
                name,
                params,
            })
            .collect();
        Self {
            config,
            database,
            cases,
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn database(&self) -> &SharedDatabase {
        &self.database
    }

    pub fn batch_name(&self) -> &str {
        &self.config.batch_name
    }

    pub fn study_folder(&self) -> &Path {
        &self.config.study_folder
    }

    pub fn case_count(&self) -> usize {
        self.cases.len()
    }

    pub fn cases(&self) -> &[Case] {
        &self.cases
    }

    pub fn case(&self, id: CaseId) -> Option<&Case> {
        self.cases.get(id.index())
    }

    pub fn case_at(&self, index: usize) -> Option<&Case> {
        self.cases.get(index)
    }

    pub fn find(&self, name: &str) -> Option<&Case> {
        self.cases.iter().find(|c| c.name == name)
    }

    /// Absolute path of a case's geometry file.
    pub fn geometry_path(&self, case: &Case) -> PathBuf {
        self.study_folder().join(&case.params.geometry)
    }

    pub fn weather_path(&self, file: &str) -> PathBuf {
        self.database.weather_dir().join(file)
    }
}
