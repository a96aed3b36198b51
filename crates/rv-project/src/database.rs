//! Shared database directory: fixed file and folder names plus typed access
//! to the tables the stages read.

use crate::manifest::RequiredColumns;
use crate::table::CsvTable;
use crate::validate::{self, ValidationError};
use crate::ProjectResult;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

pub const CARBON_CORRECTION_DB: &str = "Carbon Correction Database.csv";
pub const CONSTRUCTION_DB: &str = "Construction Database.csv";
pub const COUNTRY_EMISSIONS_DB: &str = "Country Emission Database.csv";
pub const HOURLY_EMISSIONS_DB: &str = "Hourly Emission Rates.csv";
pub const MATERIALS_DB: &str = "Material Database.csv";
pub const NP_CARBON_CORRECTION_DB: &str = "Nonperformance Carbon Correction Database.csv";
pub const WINDOW_DB: &str = "Window Database.csv";
pub const CAMBIUM_FACTORS_DIR: &str = "CambiumFactors";
pub const WEATHER_DATA_DIR: &str = "Weather Data";

pub const REQUIRED_FILES: [&str; 7] = [
    CARBON_CORRECTION_DB,
    CONSTRUCTION_DB,
    COUNTRY_EMISSIONS_DB,
    HOURLY_EMISSIONS_DB,
    MATERIALS_DB,
    NP_CARBON_CORRECTION_DB,
    WINDOW_DB,
];

pub const REQUIRED_DIRS: [&str; 2] = [CAMBIUM_FACTORS_DIR, WEATHER_DATA_DIR];

/// Column names of the construction database.
pub mod construction_columns {
    pub const NAME: &str = "Name";
    pub const OUTSIDE_LAYER: &str = "Outside_Layer";
    pub const INNER_LAYERS: [&str; 9] = [
        "Layer_2", "Layer_3", "Layer_4", "Layer_5", "Layer_6", "Layer_7", "Layer_8", "Layer_9",
        "Layer_10",
    ];
    pub const COST_PER_AREA: &str = "Cost_Per_Area_[$/m2]";
    pub const AIR_SEALING_COST: &str = "Air_Sealing_Cost_[$/ft2 ICFA]";
    pub const BATTERY_COST: &str = "Battery_Cost_[$/kWh]";
    pub const PV_COST: &str = "PV_Cost_[$/W]";
    pub const MECHANICAL_COST: &str = "Mechanical Cost";
    pub const APPLIANCE_RATING: &str = "Appliance_Rating";
    pub const LABOR_FRACTION: &str = "Labor_Fraction";
    pub const LIFETIME: &str = "Lifetime";
}

/// Column names of the material and window databases.
pub mod material_columns {
    pub const NAME: &str = "NAME";
    pub const ROUGHNESS: &str = "ROUGHNESS";
    pub const THICKNESS: &str = "THICKNESS [m]";
    pub const CONDUCTIVITY: &str = "CONDUCTIVITY [W/mK]";
    pub const DENSITY: &str = "DENSITY [kg/m3]";
    pub const SPECIFIC_HEAT: &str = "SPECIFIC HEAT CAPACITY [J/kgK]";
    pub const U_FACTOR: &str = "U-FACTOR [W/m2K]";
    pub const SHGC: &str = "SHGC";
}

/// One row of the construction database: an assembly, a piece of equipment
/// or a cost-only item (battery, PV) when no layers are given.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructionItem {
    pub name: String,
    /// Outside layer first; empty for equipment and cost-only rows.
    pub layers: Vec<String>,
    pub cost_per_area: f64,
    pub air_sealing_cost: f64,
    pub battery_cost_per_kwh: f64,
    pub pv_cost_per_w: f64,
    pub mechanical_cost: f64,
    pub appliance_rating: Option<f64>,
    pub labor_fraction: f64,
    pub lifetime_years: u32,
}

impl ConstructionItem {
    pub fn is_assembly(&self) -> bool {
        !self.layers.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstructionDatabase {
    items: Vec<ConstructionItem>,
    by_name: HashMap<String, usize>,
    by_lower_name: HashMap<String, usize>,
}

impl ConstructionDatabase {
    pub fn from_table(table: &CsvTable) -> ProjectResult<Self> {
        use construction_columns as c;

        if !table.has_column(c::NAME) {
            return Err(ValidationError::MissingColumn {
                column: c::NAME.to_string(),
                file: CONSTRUCTION_DB.to_string(),
            }
            .into());
        }

        let mut items = Vec::with_capacity(table.len());
        for row in 0..table.len() {
            let Some(name) = table.text(row, c::NAME) else {
                continue;
            };
            let layers = std::iter::once(c::OUTSIDE_LAYER)
                .chain(c::INNER_LAYERS)
                .filter_map(|col| table.text(row, col))
                .map(str::to_string)
                .collect();
            let number = |col| -> ProjectResult<f64> { Ok(table.number(row, col)?.unwrap_or(0.0)) };
            items.push(ConstructionItem {
                name: name.to_string(),
                layers,
                cost_per_area: number(c::COST_PER_AREA)?,
                air_sealing_cost: number(c::AIR_SEALING_COST)?,
                battery_cost_per_kwh: number(c::BATTERY_COST)?,
                pv_cost_per_w: number(c::PV_COST)?,
                mechanical_cost: number(c::MECHANICAL_COST)?,
                appliance_rating: table.number(row, c::APPLIANCE_RATING)?,
                labor_fraction: number(c::LABOR_FRACTION)?,
                lifetime_years: number(c::LIFETIME)?.max(0.0) as u32,
            });
        }
        Ok(Self::from_items(items))
    }

    pub fn from_items(items: Vec<ConstructionItem>) -> Self {
        let mut by_name = HashMap::new();
        let mut by_lower_name = HashMap::new();
        for (idx, item) in items.iter().enumerate() {
            by_name.entry(item.name.clone()).or_insert(idx);
            by_lower_name.entry(item.name.to_lowercase()).or_insert(idx);
        }
        Self {
            items,
            by_name,
            by_lower_name,
        }
    }

    pub fn items(&self) -> &[ConstructionItem] {
        &self.items
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ConstructionItem> {
        self.by_name.get(name).map(|&idx| &self.items[idx])
    }

    /// Case-insensitive lookup, used for simulator line items which come
    /// back upper-cased.
    pub fn get_ignore_case(&self, name: &str) -> Option<&ConstructionItem> {
        self.by_lower_name
            .get(&name.to_lowercase())
            .map(|&idx| &self.items[idx])
    }
}

/// Embodied-carbon correction measure.
#[derive(Debug, Clone, PartialEq)]
pub struct CarbonMeasure {
    pub name: String,
    pub cost: f64,
    pub year: u32,
    pub country: String,
    pub labor_fraction: f64,
}

/// Loaded, immutable view of the shared database directory.
#[derive(Debug, Clone)]
pub struct SharedDatabase {
    root: PathBuf,
    pub constructions: ConstructionDatabase,
    pub materials: CsvTable,
    pub windows: CsvTable,
    pub carbon_measures: Vec<CarbonMeasure>,
    /// Emission factor [kg/$] by country.
    pub country_factors: BTreeMap<String, f64>,
}

impl SharedDatabase {
    /// Validate the directory against the manifest and load the tables.
    pub fn open(root: &Path, manifest: &RequiredColumns) -> ProjectResult<Self> {
        validate::validate_database(root, manifest)?;

        let constructions = ConstructionDatabase::from_table(&CsvTable::read(&root.join(CONSTRUCTION_DB))?)?;
        let materials = CsvTable::read(&root.join(MATERIALS_DB))?;
        let windows = CsvTable::read(&root.join(WINDOW_DB))?;
        let carbon_measures = load_carbon_measures(&CsvTable::read(&root.join(CARBON_CORRECTION_DB))?)?;
        let country_factors = load_country_factors(&CsvTable::read(&root.join(COUNTRY_EMISSIONS_DB))?)?;

        tracing::debug!(
            root = %root.display(),
            constructions = constructions.items().len(),
            materials = materials.len(),
            windows = windows.len(),
            "loaded shared database"
        );

        Ok(Self {
            root: root.to_path_buf(),
            constructions,
            materials,
            windows,
            carbon_measures,
            country_factors,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.root.join(file)
    }

    pub fn weather_dir(&self) -> PathBuf {
        self.root.join(WEATHER_DATA_DIR)
    }

    pub fn cambium_dir(&self) -> PathBuf {
        self.root.join(CAMBIUM_FACTORS_DIR)
    }

    pub fn emission_factor(&self, country: &str) -> Option<f64> {
        self.country_factors.get(country).copied()
    }

    pub fn carbon_measure(&self, name: &str) -> Option<&CarbonMeasure> {
        self.carbon_measures.iter().find(|m| m.name == name)
    }
}

fn load_carbon_measures(table: &CsvTable) -> ProjectResult<Vec<CarbonMeasure>> {
    let mut measures = Vec::new();
    for row in 0..table.len() {
        let Some(name) = table.text(row, "Name") else {
            continue;
        };
        measures.push(CarbonMeasure {
            name: name.to_string(),
            cost: table.number(row, "Cost")?.unwrap_or(0.0),
            year: table.number(row, "Year")?.unwrap_or(0.0).max(0.0) as u32,
            country: table.text(row, "Country").unwrap_or("USA").to_string(),
            labor_fraction: table.number(row, "Labor Fraction")?.unwrap_or(0.0),
        });
    }
    Ok(measures)
}

fn load_country_factors(table: &CsvTable) -> ProjectResult<BTreeMap<String, f64>> {
    let mut factors = BTreeMap::new();
    for row in 0..table.len() {
        if let (Some(country), Some(ef)) = (table.text(row, "COUNTRY"), table.number(row, "EF [kg/$]")?) {
            factors.insert(country.to_string(), ef);
        }
    }
    Ok(factors)
}
