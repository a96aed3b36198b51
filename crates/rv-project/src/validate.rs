//! Setup validation: everything that must hold before any case work starts.
//!
//! Failures here are fatal for the whole batch. Problems that only affect a
//! single case (such as a geometry file that cannot be read) are left to the
//! stage that needs the input, so the rest of the batch can still run.

use crate::database::{self, REQUIRED_DIRS, REQUIRED_FILES, SharedDatabase};
use crate::manifest::RequiredColumns;
use crate::runlist::{self, CaseParams};
use crate::table::CsvTable;
use crate::{ProjectError, ProjectResult};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("{what} path \"{path}\" does not exist")]
    MissingPath { what: &'static str, path: PathBuf },

    #[error("Cannot find {kind} \"{name}\" in specified database directory")]
    MissingDatabaseItem { kind: &'static str, name: String },

    #[error("Required-columns manifest has no entry for \"{key}\"")]
    ManifestEntryMissing { key: String },

    #[error("Column \"{column}\" missing from file \"{file}\". Please make sure column exists and is named properly")]
    MissingColumn { column: String, file: String },

    #[error("Column {column} missing, run list may be out of date")]
    RunlistColumnMissing { column: String },

    #[error("Problem in run list: case name \"{name}\" {reason}")]
    InvalidCaseName { name: String, reason: String },

    #[error("Problem in run list: case name \"{name}\" appears more than once")]
    DuplicateCaseName { name: String },

    #[error("{kind} file \"{file}\" could not be found in weather folder \"{folder}\"")]
    MissingWeatherFile {
        kind: &'static str,
        file: String,
        folder: PathBuf,
    },

    #[error("Problem in run list case \"{case}\": {item_kind} \"{item}\" not found in {location}. Please make sure the run list was generated using the designated database")]
    UnknownItem {
        case: String,
        item_kind: &'static str,
        item: String,
        location: String,
    },

    #[error("Problem in run list case \"{case}\": foundation interface \"{interface}\" must be one of Slab, Crawlspace, Basement")]
    InvalidFoundationInterface { case: String, interface: String },

    #[error("Invalid configuration: {field} ({reason})")]
    InvalidConfig { field: &'static str, reason: String },
}

/// Foundation interface kinds understood by the model builder.
pub const FOUNDATION_INTERFACES: [&str; 3] = ["Slab", "Crawlspace", "Basement"];

pub fn validate_database_exists(db_dir: &Path) -> Result<(), ValidationError> {
    if !db_dir.is_dir() {
        return Err(ValidationError::MissingPath {
            what: "Database directory",
            path: db_dir.to_path_buf(),
        });
    }
    Ok(())
}

/// Every required file and folder must be present under the database root.
pub fn validate_database_structure(db_dir: &Path) -> Result<(), ValidationError> {
    for file in REQUIRED_FILES {
        if !db_dir.join(file).is_file() {
            return Err(ValidationError::MissingDatabaseItem {
                kind: "file",
                name: file.to_string(),
            });
        }
    }
    for dir in REQUIRED_DIRS {
        if !db_dir.join(dir).is_dir() {
            return Err(ValidationError::MissingDatabaseItem {
                kind: "folder",
                name: dir.to_string(),
            });
        }
    }
    Ok(())
}

/// Each database file must parse as CSV and carry its manifest columns.
pub fn validate_database_file_structures(
    db_dir: &Path,
    manifest: &RequiredColumns,
) -> ProjectResult<()> {
    for file in REQUIRED_FILES {
        let table = CsvTable::read(&db_dir.join(file))?;
        require_columns(&table, manifest.for_file(file)?, file)?;
    }
    Ok(())
}

pub fn validate_database(db_dir: &Path, manifest: &RequiredColumns) -> ProjectResult<()> {
    validate_database_exists(db_dir)?;
    validate_database_structure(db_dir)?;
    validate_database_file_structures(db_dir, manifest)
}

pub(crate) fn require_columns(
    table: &CsvTable,
    columns: &[String],
    file: &str,
) -> Result<(), ValidationError> {
    for column in columns {
        if !table.has_column(column) {
            return Err(ValidationError::MissingColumn {
                column: column.clone(),
                file: file.to_string(),
            });
        }
    }
    Ok(())
}

/// The run list must carry the manifest columns plus the ones the stages read.
pub fn validate_runlist_structure(
    runlist: &CsvTable,
    manifest: &RequiredColumns,
) -> ProjectResult<()> {
    let manifest_columns = manifest.runlist()?.iter().map(String::as_str);
    for column in manifest_columns.chain(runlist::REQUIRED_COLUMNS.iter().copied()) {
        if !runlist.has_column(column) {
            return Err(ValidationError::RunlistColumnMissing {
                column: column.to_string(),
            }
            .into());
        }
    }
    Ok(())
}

/// Referential checks of every parsed case against the shared database.
pub fn validate_runlist_inputs(
    cases: &[(String, CaseParams)],
    database: &SharedDatabase,
    study_folder: &Path,
) -> ProjectResult<()> {
    let mut names = HashSet::new();
    let weather_dir = database.weather_dir();
    let constructions = &database.constructions;
    let construction_label = format!(
        "construction database \"{}\"",
        database.path(database::CONSTRUCTION_DB).display()
    );

    for (name, params) in cases {
        rv_core::validate_case_name(name).map_err(|e| ValidationError::InvalidCaseName {
            name: name.clone(),
            reason: match e {
                rv_core::CoreError::InvalidName { reason, .. } => reason.to_string(),
                other => other.to_string(),
            },
        })?;
        if !names.insert(name.as_str()) {
            return Err(ValidationError::DuplicateCaseName { name: name.clone() }.into());
        }

        // A missing geometry file only fails its own case.
        let geometry = study_folder.join(&params.geometry);
        if !geometry.is_file() {
            tracing::warn!(
                case = %name,
                geometry = %geometry.display(),
                "geometry file not found; case will fail during preparation"
            );
        }

        for (kind, file) in [("EPW", &params.epw), ("DDY", &params.ddy)] {
            if !weather_dir.join(file).is_file() {
                return Err(ValidationError::MissingWeatherFile {
                    kind,
                    file: file.clone(),
                    folder: weather_dir.clone(),
                }
                .into());
            }
        }

        let unknown = |item_kind: &'static str, item: &str| -> ProjectError {
            ValidationError::UnknownItem {
                case: name.clone(),
                item_kind,
                item: item.to_string(),
                location: construction_label.clone(),
            }
            .into()
        };

        for appliance in &params.appliances {
            if !constructions.contains(appliance) {
                return Err(unknown("Appliance", appliance));
            }
        }

        let fuel = params.dhw_fuel_item();
        if !constructions.contains(&fuel) {
            return Err(unknown("Fuel type", &fuel));
        }

        if !constructions.contains(&params.mech_system) {
            return Err(unknown("Mechanical system", &params.mech_system));
        }

        for assignment in &params.envelope {
            if !constructions.contains(&assignment.item) {
                return Err(unknown("Envelope item", &assignment.item));
            }
        }

        for foundation in &params.foundations {
            if !FOUNDATION_INTERFACES.contains(&foundation.interface.as_str()) {
                return Err(ValidationError::InvalidFoundationInterface {
                    case: name.clone(),
                    interface: foundation.interface.clone(),
                }
                .into());
            }
            if let Some(insulation) = &foundation.insulation {
                if !constructions.contains(insulation) {
                    return Err(unknown("Foundation insulation", insulation));
                }
            }
        }
    }
    Ok(())
}
