mod common;

use std::fs;
use std::sync::Arc;

use common::{FakeSimulator, Fixture, runlist_row};
use rv_app::{BatchRunner, BatchStage, ProgressEvent, progress_channel};
use rv_core::StageLabel;
use rv_project::CaseRegistry;
use rv_results::{ResultRow, read_table};
use rv_sim::ModelDocument;

fn runner(fixture: &Fixture, sim: Arc<FakeSimulator>) -> BatchRunner {
    let registry = CaseRegistry::open(fixture.config.clone()).expect("registry should open");
    BatchRunner::new(Arc::new(registry))
        .expect("runner should build")
        .with_simulator(sim)
}

fn metric(row: &ResultRow, column: &str) -> f64 {
    row.get(column)
        .and_then(|v| v.as_number())
        .unwrap_or_else(|| panic!("{} has no number in \"{column}\"", row.run_name))
}

fn three_cases() -> Vec<String> {
    vec![
        runlist_row("BASE", "geom.idf", "WALL_R20", 0.0),
        runlist_row("RETROFIT_A", "missing.idf", "WALL_R20", 0.0),
        runlist_row("RETROFIT_B", "geom.idf", "WALL_R40", 3000.0),
    ]
}

#[test]
fn missing_geometry_only_fails_its_own_case() {
    let mut fixture = Fixture::new("rv_app_isolation", &three_cases());
    fixture.config.graphs_enabled = true;
    let sim = Arc::new(FakeSimulator::new());
    let (progress, handle) = progress_channel();

    let report = runner(&fixture, Arc::clone(&sim))
        .run(&progress)
        .expect("batch should finish");

    assert_eq!(report.cases, 3);
    assert_eq!(report.succeeded, 2);
    assert!(!report.cancelled);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].name, "RETROFIT_A");

    let names: Vec<&str> = report.rows.iter().map(|r| r.run_name.as_str()).collect();
    assert_eq!(names, vec!["BASE", "RETROFIT_A", "RETROFIT_B"]);
    assert!(!report.rows[0].is_error());
    assert!(report.rows[1].is_error());
    assert!(!report.rows[2].is_error());

    // Only the two surviving cases reach each simulation barrier.
    assert_eq!(sim.submissions(), vec![2, 2]);

    // Failed case never passes a checkpoint.
    assert!((handle.progress() - 2.0 / 3.0).abs() < 1e-9);

    let on_disk = read_table(&report.results_csv).expect("results table should read back");
    assert_eq!(on_disk, report.rows);

    assert!(fixture.study().join("Study_BASE_HeatingOutage.csv").is_file());
    assert!(fixture.study().join("Study_RETROFIT_B_CoolingOutage.csv").is_file());
    assert!(!fixture.study().join("Study_RETROFIT_A_HeatingOutage.csv").exists());
}

#[test]
fn base_case_reports_no_retrofit_costs() {
    let fixture = Fixture::new("rv_app_costs", &three_cases());
    let (progress, _handle) = progress_channel();
    let report = runner(&fixture, Arc::new(FakeSimulator::new()))
        .run(&progress)
        .expect("batch should finish");

    let base = &report.rows[0];
    assert_eq!(metric(base, "First Cost [$]"), 0.0);
    assert_eq!(metric(base, "Wall Cost [$]"), 0.0);
    assert_eq!(metric(base, "PV Cost [$]"), 0.0);

    let retrofit = &report.rows[2];
    assert_eq!(metric(retrofit, "Wall Cost [$]"), 800.0);
    assert_eq!(metric(retrofit, "Roof Cost [$]"), 400.0);
    assert_eq!(metric(retrofit, "Window Cost [$]"), 3000.0);
    assert_eq!(metric(retrofit, "Mechanical Cost [$]"), 9000.0);
    assert_eq!(metric(retrofit, "Water Heater Cost [$]"), 1200.0);
    assert_eq!(metric(retrofit, "PV Cost [$]"), 7500.0);
    assert!(metric(retrofit, "First Cost [$]") > 0.0);
    assert!(metric(retrofit, "Total ADORB Cost [$]") > 0.0);
    assert_eq!(metric(retrofit, "First Year Gas Cost [$]"), 0.0);
}

#[test]
fn cases_do_not_share_state() {
    let fixture = Fixture::new(
        "rv_app_leakage",
        &[
            runlist_row("RETROFIT_B", "geom.idf", "WALL_R40", 0.0),
            runlist_row("RETROFIT_C", "geom.idf", "WALL_R20", 0.0),
        ],
    );
    let (progress, _handle) = progress_channel();
    let report = runner(&fixture, Arc::new(FakeSimulator::new()))
        .run(&progress)
        .expect("batch should finish");

    assert_eq!(metric(&report.rows[0], "Wall Cost [$]"), 800.0);
    assert_eq!(metric(&report.rows[1], "Wall Cost [$]"), 500.0);

    let wall_of = |case: &str| {
        let path = fixture.study().join(format!("Study_{case}_BA.idf"));
        let model = ModelDocument::read(&path).expect("annual model should parse");
        model
            .objects_of("BuildingSurface:Detailed")
            .find(|s| s.name() == Some("Living Wall South"))
            .and_then(|s| s.field(2))
            .map(str::to_string)
    };
    assert_eq!(wall_of("RETROFIT_B").as_deref(), Some("WALL_R40"));
    assert_eq!(wall_of("RETROFIT_C").as_deref(), Some("WALL_R20"));
}

#[test]
fn empty_run_list_exports_an_empty_table() {
    let fixture = Fixture::new("rv_app_empty", &[]);
    let sim = Arc::new(FakeSimulator::new());
    let (progress, handle) = progress_channel();
    let report = runner(&fixture, Arc::clone(&sim))
        .run(&progress)
        .expect("empty batch should finish");

    assert_eq!(report.cases, 0);
    assert!(report.rows.is_empty());
    assert!(report.failed.is_empty());
    assert!(report.results_csv.is_file());
    assert!(read_table(&report.results_csv).unwrap().is_empty());
    assert_eq!(handle.progress(), 0.0);
}

#[test]
fn simulation_failure_writes_an_error_row() {
    let fixture = Fixture::new("rv_app_simfail", &three_cases());
    let sim = Arc::new(FakeSimulator::new().failing(["Study_RETROFIT_B_BA"]));
    let (progress, _handle) = progress_channel();
    let report = runner(&fixture, sim).run(&progress).expect("batch should finish");

    let failed: Vec<&str> = report.failed.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(failed, vec!["RETROFIT_A", "RETROFIT_B"]);
    assert_eq!(report.succeeded, 1);
    assert!(report.rows[2].is_error());
    assert!(!report.rows[0].is_error());
}

#[test]
fn cancel_before_start_writes_no_rows() {
    let fixture = Fixture::new("rv_app_cancel_early", &three_cases());
    let sim = Arc::new(FakeSimulator::new());
    let (progress, handle) = progress_channel();
    handle.request_cancel();

    let report = runner(&fixture, Arc::clone(&sim))
        .run(&progress)
        .expect("cancelled batch still exports");

    assert!(report.cancelled);
    assert!(report.rows.is_empty());
    assert!(sim.submissions().is_empty());
    assert!(report.results_csv.is_file());
}

#[test]
fn cancel_during_outage_run_keeps_finished_rows_only() {
    let fixture = Fixture::new("rv_app_cancel_mid", &three_cases());
    let (progress, handle) = progress_channel();
    let sim = Arc::new(FakeSimulator::new().cancel_after(StageLabel::Resilience, handle.cancel_token()));

    let report = runner(&fixture, Arc::clone(&sim))
        .run(&progress)
        .expect("cancelled batch still exports");

    assert!(report.cancelled);
    // The geometry failure was recorded before the cancel; nothing else was.
    assert_eq!(report.rows.len(), 1);
    assert_eq!(report.rows[0].run_name, "RETROFIT_A");
    assert_eq!(sim.submissions(), vec![2]);

    let stages: Vec<BatchStage> = handle
        .try_events()
        .into_iter()
        .filter_map(|e| match e {
            ProgressEvent::Stage { stage, .. } => Some(stage),
            _ => None,
        })
        .collect();
    assert_eq!(stages.last(), Some(&BatchStage::Cancelled));
    assert!(!stages.contains(&BatchStage::AnnualPrep));
}

#[test]
fn stage_events_follow_the_pipeline_order() {
    let fixture = Fixture::new("rv_app_events", &[runlist_row("BASE", "geom.idf", "WALL_R20", 0.0)]);
    let (progress, handle) = progress_channel();
    runner(&fixture, Arc::new(FakeSimulator::new()))
        .run(&progress)
        .expect("batch should finish");

    let stages: Vec<BatchStage> = handle
        .try_events()
        .into_iter()
        .filter_map(|e| match e {
            ProgressEvent::Stage { stage, .. } => Some(stage),
            _ => None,
        })
        .collect();
    assert_eq!(
        stages,
        vec![
            BatchStage::ResiliencePrep,
            BatchStage::ResilienceSimulation,
            BatchStage::PostProcessing,
            BatchStage::AnnualPrep,
            BatchStage::AnnualSimulation,
            BatchStage::MetricExtraction,
            BatchStage::Export,
            BatchStage::Completed,
        ]
    );
    assert!((handle.progress() - 1.0).abs() < 1e-9);
}

#[test]
fn rerun_regenerates_identical_models() {
    let fixture = Fixture::new("rv_app_rerun", &three_cases());
    let files = ["Study_BASE_PASS.idf", "Study_BASE_BR.idf", "Study_RETROFIT_B_BA.idf"];

    let (progress, _handle) = progress_channel();
    let first = runner(&fixture, Arc::new(FakeSimulator::new()))
        .run(&progress)
        .expect("first run");
    let before: Vec<Vec<u8>> = files
        .iter()
        .map(|f| fs::read(fixture.study().join(f)).unwrap())
        .collect();

    let (progress, _handle) = progress_channel();
    let second = runner(&fixture, Arc::new(FakeSimulator::new()))
        .run(&progress)
        .expect("second run");
    let after: Vec<Vec<u8>> = files
        .iter()
        .map(|f| fs::read(fixture.study().join(f)).unwrap())
        .collect();

    assert_eq!(before, after);
    assert_eq!(first.rows, second.rows);
}

#[test]
fn worker_count_does_not_change_results() {
    let rows: Vec<String> = (0..8)
        .map(|i| {
            let wall = if i % 2 == 0 { "WALL_R20" } else { "WALL_R40" };
            runlist_row(&format!("CASE_{i}"), "geom.idf", wall, f64::from(i) * 500.0)
        })
        .collect();
    let fixture = Fixture::new("rv_app_workers", &rows);

    let run = |workers: usize| {
        let (progress, _handle) = progress_channel();
        runner(&fixture, Arc::new(FakeSimulator::new()))
            .with_concurrency(workers)
            .run(&progress)
            .expect("batch should finish")
    };
    let serial = run(1);
    let parallel = run(4);

    assert_eq!(serial.rows.len(), 8);
    assert_eq!(serial.succeeded, 8);
    assert_eq!(serial.rows, parallel.rows);
}
