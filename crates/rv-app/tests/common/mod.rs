#![allow(dead_code)]

use std::collections::HashSet;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{Duration, NaiveDate};
use rv_core::{CancellationToken, StageLabel};
use rv_project::BatchConfig;
use rv_sim::hourly::columns as col;
use rv_sim::report::keys;
use rv_sim::{JobStatus, ModelDocument, SimJob, Simulator};

pub fn unique_temp_dir(prefix: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    dir.push(format!("{}_{}", prefix, nanos));
    fs::create_dir_all(&dir).expect("failed to create temp dir");
    dir
}

pub const RUNLIST_HEADER: &str = "CASE_NAME,GEOMETRY_IDF,EPW,DDY,ICFA,BEDROOMS,Operable_Area_N,Operable_Area_S,\
Operable_Area_W,Operable_Area_E,APPLIANCE_LIST,PV_SIZE_[W],PV_TILT,INFILTRATION_RATE,OUTAGE_1_START,\
OUTAGE_1_END,OUTAGE_2_START,OUTAGE_2_END,1ST_OUTAGE,NATURAL_GAS,WATER_HEATER_FUEL,MECH_SYSTEM_TYPE,\
GRID_REGION,GAS_PRICE_[$/THERM],ELEC_PRICE_[$/kWh],SELLBACK_PRICE_[$/kWh],ANALYSIS_DURATION,\
ENVELOPE_COUNTRY,ENVELOPE_LABOR_FRACTION,CARBON_MEASURES,EXT_WALL_1_NAME,EXT_ROOF_1_NAME,EXT_WINDOW_1,\
NAT_VENT_AVAIL,SHADING_AVAIL,MorphFactorDB1,MorphFactorDB2";

/// One run-list row; `wall` picks the wall assembly, `pv_w` the array size.
pub fn runlist_row(name: &str, geometry: &str, wall: &str, pv_w: f64) -> String {
    format!(
        "{name},{geometry},site.epw,site.ddy,860,2,10,10,10,10,\"FRIDGE_A, LIGHTS_LED\",{pv_w},20,0.05,\
         01/10,01/17,07/20,07/27,HEATING,0,ELEC,ASHP,CAMXc,1.5,0.2,0.05,30,USA,0.4,TIMBER_FRAME,\
         {wall},ROOF_R40,WINDOW_DOUBLE,1,1,-2,3"
    )
}

const CONSTRUCTIONS: &str = "Name,Outside_Layer,Layer_2,Cost_Per_Area_[$/m2],Battery_Cost_[$/kWh],PV_Cost_[$/W],\
Mechanical Cost,Appliance_Rating,Labor_Fraction,Lifetime
WALL_R20,Brick,Insulation,50,,,,,0.4,40
WALL_R40,Brick,Insulation,80,,,,,0.4,40
ROOF_R40,Insulation,,40,,,,,0.3,30
WINDOW_DOUBLE,Glazing2,,300,,,,,0.3,30
FRIDGE_A,,,,,,800,438,0.1,15
LIGHTS_LED,,,,,,300,0.9,0.1,10
DHW_ELEC,,,,,,1200,,0.2,15
ASHP,,,,,,9000,,0.3,20
BATTERY COST,,,,600,,,,0.1,15
PV COST,,,,,2.5,,,0.2,25
";

const MATERIALS: &str = "NAME,ROUGHNESS,THICKNESS [m],CONDUCTIVITY [W/mK],DENSITY [kg/m3],SPECIFIC HEAT CAPACITY [J/kgK]
Brick,Rough,0.1,0.7,1900,800
Insulation,MediumSmooth,0.1,0.04,30,1400
";

const GEOMETRY: &str = "! Two-zone test building
Site:Location, Test Site, 37.8, -122.4, -8, 10;
Zone, Living|UNIT|2BR, 0, 0, 0, 0, 1, 1, 2.5, autocalculate, 80;
Zone, Stair, 0, 0, 0, 0, 1, 1, 2.5, autocalculate, 10;
BuildingSurface:Detailed, Living Wall South, Wall, EXT_WALL_1, Living|UNIT|2BR, Outdoors, , SunExposed,
    WindExposed, autocalculate, 4, 0, 0, 2.5, 0, 0, 0, 10, 0, 0, 10, 0, 2.5;
BuildingSurface:Detailed, Living Roof, Roof, EXT_ROOF_1, Living|UNIT|2BR, Outdoors, , SunExposed,
    WindExposed, autocalculate, 4, 0, 8, 2.5, 0, 0, 2.5, 10, 0, 2.5, 10, 8, 2.5;
FenestrationSurface:Detailed, Living Window, Window, EXT_WINDOW_1, Living Wall South, , autocalculate,
    , 1, 4, 1, 0, 2, 1, 0, 1, 3, 0, 1, 3, 0, 2;
Output:Variable, *, Ignored Variable, Hourly;
";

const DESIGN_DAYS: &str = "SizingPeriod:DesignDay, Winter 99.6% Condns DB, 1, 21, WinterDesignDay, -1.9;
SizingPeriod:DesignDay, Summer 0.4% Condns DB, 7, 21, SummerDesignDay, 33.2;
Site:Location, Ignored, 0, 0, 0, 0;
";

pub struct Fixture {
    pub root: PathBuf,
    pub config: BatchConfig,
}

impl Fixture {
    pub fn new(prefix: &str, rows: &[String]) -> Self {
        let root = unique_temp_dir(prefix);
        let db = root.join("db");
        let study = root.join("study");
        fs::create_dir_all(db.join("CambiumFactors")).unwrap();
        fs::create_dir_all(db.join("Weather Data")).unwrap();
        fs::create_dir_all(&study).unwrap();

        fs::write(db.join("Weather Data/site.epw"), "LOCATION,Test Site\n").unwrap();
        fs::write(db.join("Weather Data/site.ddy"), DESIGN_DAYS).unwrap();
        fs::write(db.join("Construction Database.csv"), CONSTRUCTIONS).unwrap();
        fs::write(db.join("Material Database.csv"), MATERIALS).unwrap();
        fs::write(db.join("Window Database.csv"), "NAME,U-FACTOR [W/m2K],SHGC\nGlazing2,1.8,0.4\n").unwrap();
        fs::write(
            db.join("Carbon Correction Database.csv"),
            "Name,Cost,Year,Country,Labor Fraction\nTIMBER_FRAME,2000,0,CAN,0.5\n",
        )
        .unwrap();
        fs::write(db.join("Nonperformance Carbon Correction Database.csv"), "Name,Cost\n").unwrap();
        fs::write(
            db.join("Country Emission Database.csv"),
            "COUNTRY,EF [kg/$]\nUSA,0.3\nCAN,0.25\n",
        )
        .unwrap();
        fs::write(db.join("Hourly Emission Rates.csv"), "Hour,CAMXc\n0,0.2\n").unwrap();

        let mut cambium = String::from("CAMXc,ERCTc\n");
        for _ in 0..8784 {
            cambium.push_str("250,420\n");
        }
        fs::write(db.join("CambiumFactors/2025.csv"), &cambium).unwrap();

        let manifest = root.join("required_columns.json");
        fs::write(
            &manifest,
            r#"{
                "Runlist": ["CASE_NAME", "EPW", "DDY", "APPLIANCE_LIST"],
                "Construction Database": ["Name", "Mechanical Cost"],
                "Material Database": ["NAME"],
                "Window Database": ["NAME", "SHGC"],
                "Carbon Correction Database": ["Name"],
                "Nonperformance Carbon Correction Database": ["Name"],
                "Country Emission Database": ["COUNTRY"],
                "Hourly Emission Rates": []
            }"#,
        )
        .unwrap();

        fs::write(study.join("geom.idf"), GEOMETRY).unwrap();
        let run_list = study.join("runlist.csv");
        let mut content = String::from(RUNLIST_HEADER);
        for row in rows {
            content.push('\n');
            content.push_str(row);
        }
        fs::write(&run_list, content).unwrap();

        let config = BatchConfig {
            batch_name: "Study".to_string(),
            study_folder: study,
            run_list,
            database_dir: db,
            required_columns: manifest,
            simulator: Default::default(),
            concurrency: 2,
            graphs_enabled: false,
            pdf_enabled: false,
            replay_outputs: true,
            lifecycle: Default::default(),
        };
        Self { root, config }
    }

    pub fn study(&self) -> &Path {
        &self.config.study_folder
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

/// Stand-in for the simulator: writes tabular and hourly outputs whose values
/// depend only on the submitted model.
#[derive(Default)]
pub struct FakeSimulator {
    fail_prefixes: HashSet<String>,
    cancel_after: Option<(StageLabel, CancellationToken)>,
    submissions: Mutex<Vec<usize>>,
}

impl FakeSimulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs with one of these output prefixes exit with an error.
    pub fn failing<I: IntoIterator<Item = S>, S: Into<String>>(mut self, prefixes: I) -> Self {
        self.fail_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    /// Cancel the batch once the submission for `label` has finished.
    pub fn cancel_after(mut self, label: StageLabel, token: CancellationToken) -> Self {
        self.cancel_after = Some((label, token));
        self
    }

    /// Job count of every submission so far.
    pub fn submissions(&self) -> Vec<usize> {
        self.submissions.lock().unwrap().clone()
    }

    fn run_one(&self, job: &SimJob) -> JobStatus {
        if self.fail_prefixes.contains(&job.prefix) {
            let err = job.output_dir.join(format!("{}out.err", job.prefix));
            let _ = fs::write(&err, "   ** Severe  ** test failure\n   **  Fatal  ** stopped\n");
            return JobStatus::Failed("exit status: 1".to_string());
        }
        match write_outputs(job) {
            Ok(()) => JobStatus::Succeeded,
            Err(e) => JobStatus::Failed(e),
        }
    }
}

impl Simulator for FakeSimulator {
    fn name(&self) -> &str {
        "fake"
    }

    fn run_batch(&self, jobs: &[SimJob]) -> Vec<JobStatus> {
        self.submissions.lock().unwrap().push(jobs.len());
        let statuses = jobs.iter().map(|job| self.run_one(job)).collect();
        if let Some((label, token)) = &self.cancel_after {
            if jobs.iter().any(|j| j.prefix.ends_with(label.as_str())) {
                token.cancel();
            }
        }
        statuses
    }
}

fn write_outputs(job: &SimJob) -> Result<(), String> {
    let model = ModelDocument::read(&job.model).map_err(|e| e.to_string())?;
    let seed = model.len() as f64;
    let zones: Vec<String> = model
        .objects_of("Zone")
        .filter_map(|z| z.name().map(str::to_string))
        .collect();
    let has_pv = model.objects_of("Generator:PVWatts").next().is_some();

    let outputs = job.outputs();
    write_hourly(&outputs.hourly, &zones, seed, has_pv).map_err(|e| e.to_string())?;
    write_tabular(&outputs.tabular, &model, seed).map_err(|e| e.to_string())
}

fn write_hourly(path: &Path, zones: &[String], seed: f64, has_pv: bool) -> std::io::Result<()> {
    let mut out = String::new();
    out.push_str(col::DATE_TIME);
    for name in [
        col::OUTDOOR_DRY_BULB,
        col::OUTDOOR_DEW_POINT,
        col::PURCHASED_ELECTRICITY,
        col::SURPLUS_ELECTRICITY,
        col::NATURAL_GAS,
    ] {
        out.push(',');
        out.push_str(name);
    }
    for zone in zones {
        let _ = write!(
            out,
            ",{},{}",
            col::zone_air_temperature(zone),
            col::zone_relative_humidity(zone)
        );
    }
    out.push('\n');

    // A day of warm-up rows ahead of the run period.
    for hour in 1..=24 {
        let _ = write!(out, " 12/31  {hour:02}:00:00,-40,-40,0,0,0");
        for _ in zones {
            out.push_str(",0,0");
        }
        out.push('\n');
    }

    let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    for i in 0..8784i64 {
        let day = start + Duration::hours(i);
        let day_of_year = (i / 24) as f64;
        let hour = (i % 24) as f64;
        let season = (2.0 * std::f64::consts::PI * (day_of_year - 15.0) / 366.0).cos();
        let dry_bulb = 12.0 - 14.0 * season + 3.0 * (hour / 24.0 * std::f64::consts::PI).sin();
        let dew_point = dry_bulb - 6.0;
        let purchased = 3.6e6 * (1.0 + (seed % 7.0) * 0.1 + 0.5 * season.abs());
        let surplus = if has_pv && (9.0..16.0).contains(&hour) { 1.8e6 } else { 0.0 };
        let _ = write!(
            out,
            " {}  {:02}:00:00,{dry_bulb:.2},{dew_point:.2},{purchased:.1},{surplus:.1},0",
            day.format("%m/%d"),
            i % 24 + 1
        );
        for _ in zones {
            let _ = write!(out, ",{:.2},{:.1}", dry_bulb + 8.0, 70.0);
        }
        out.push('\n');
    }
    fs::write(path, out)
}

fn cell(out: &mut String, table: &str, row: &str, column: &str, value: f64) {
    let _ = writeln!(out, "\"{table}\",\"{row}\",\"{column}\",{value}");
}

fn write_tabular(path: &Path, model: &ModelDocument, seed: f64) -> std::io::Result<()> {
    use keys::*;
    let mut out = String::from("Table,Row,Column,Value\n");
    cell(&mut out, SITE_SOURCE_ENERGY, TOTAL_SITE_ENERGY, ENERGY_PER_AREA, 20.0 + seed * 0.1);
    cell(&mut out, TIME_BIN, TIME_BIN_TOTAL, HOURS_BELOW_2C, seed % 11.0);
    cell(&mut out, HEATING_SET, FACILITY, SET_BELOW_12_2C, 10.0 + seed % 5.0);
    cell(&mut out, HEAT_INDEX, FACILITY, CAUTION, 40.0);
    cell(&mut out, HEAT_INDEX, FACILITY, EXTREME_CAUTION, 12.0);
    cell(&mut out, HEAT_INDEX, FACILITY, DANGER, 3.0);
    cell(&mut out, HEAT_INDEX, FACILITY, EXTREME_DANGER, 0.0);
    cell(&mut out, PEAK_ELECTRICITY, ELECTRICITY_FACILITY, MAXIMUM_VALUE, 4000.0 + seed);

    // Assemblies cover 10 m2 per surface that uses them.
    let surfaces: Vec<&str> = model
        .objects_of("BuildingSurface:Detailed")
        .chain(model.objects_of("FenestrationSurface:Detailed"))
        .filter_map(|s| s.field(2))
        .collect();
    let mut total = 0.0;
    for (i, item) in model.objects_of("ComponentCost:LineItem").enumerate() {
        let name = item.name().unwrap_or_default().to_uppercase();
        let (quantity, subtotal) = if item.field(2) == Some("Construction") {
            let used = item.field(3).unwrap_or_default();
            let area = 10.0 * surfaces.iter().filter(|c| **c == used).count() as f64;
            (area, area * item.number(6).unwrap_or(0.0))
        } else {
            let quantity = item.number(12).unwrap_or(0.0);
            (quantity, quantity * item.number(5).unwrap_or(0.0))
        };
        total += subtotal;
        let row = (i + 1).to_string();
        let _ = writeln!(out, "\"{COST_LINE_ITEMS}\",\"{row}\",\"{ITEM_NAME}\",\"{name}\"");
        cell(&mut out, COST_LINE_ITEMS, &row, QUANTITY, quantity);
        cell(&mut out, COST_LINE_ITEMS, &row, SUBTOTAL, subtotal);
    }
    cell(&mut out, COST_ESTIMATE, COST_ESTIMATE_TOTAL, CURRENT_MODEL, total);
    fs::write(path, out)
}
