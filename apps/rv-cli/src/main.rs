use clap::{Parser, Subcommand};
use rv_app::{
    AppError, AppResult, BatchReport, BatchRunner, BatchStage, BatchWorker, ProgressEvent,
};
use rv_project::{BatchConfig, CaseRegistry};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "revive")]
#[command(about = "REVIVE batch runner - resilience and lifecycle studies of building retrofits", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the batch configuration, databases and run list
    Validate {
        /// Path to the batch YAML file
        config_path: PathBuf,
    },
    /// List the cases of a batch
    Cases {
        /// Path to the batch YAML file
        config_path: PathBuf,
    },
    /// Run every case of a batch
    Run {
        /// Path to the batch YAML file
        config_path: PathBuf,
        /// Worker count (overrides the configuration)
        #[arg(long)]
        concurrency: Option<usize>,
        /// Read existing simulator outputs instead of running the simulator
        #[arg(long)]
        replay: bool,
        /// Cancel the batch once this file exists
        #[arg(long)]
        stop_file: Option<PathBuf>,
        /// Write the batch report as JSON
        #[arg(long)]
        summary_json: Option<PathBuf>,
    },
    /// Show the exported results table of a batch
    Results {
        /// Path to the batch YAML file
        config_path: PathBuf,
    },
}

fn main() -> AppResult<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config_path } => cmd_validate(&config_path),
        Commands::Cases { config_path } => cmd_cases(&config_path),
        Commands::Run {
            config_path,
            concurrency,
            replay,
            stop_file,
            summary_json,
        } => cmd_run(
            &config_path,
            concurrency,
            replay,
            stop_file.as_deref(),
            summary_json.as_deref(),
        ),
        Commands::Results { config_path } => cmd_results(&config_path),
    }
}

fn cmd_validate(config_path: &Path) -> AppResult<()> {
    println!("Validating batch: {}", config_path.display());
    let config = BatchConfig::load_yaml(config_path)?;
    let registry = CaseRegistry::open(config)?;
    println!(
        "✓ Batch '{}' is valid ({} cases)",
        registry.batch_name(),
        registry.case_count()
    );
    Ok(())
}

fn cmd_cases(config_path: &Path) -> AppResult<()> {
    let registry = CaseRegistry::open(BatchConfig::load_yaml(config_path)?)?;

    if registry.case_count() == 0 {
        println!("No cases in run list");
        return Ok(());
    }
    println!("Cases in batch '{}':", registry.batch_name());
    for case in registry.cases() {
        let geometry = registry.geometry_path(case);
        let marker = if geometry.is_file() { "" } else { "  (geometry missing)" };
        println!(
            "  {} - {} ({} bedrooms, {:.0} ft2){}",
            case.id,
            case.name,
            case.params.bedrooms,
            case.params.icfa_ft2,
            marker
        );
    }
    Ok(())
}

fn cmd_run(
    config_path: &Path,
    concurrency: Option<usize>,
    replay: bool,
    stop_file: Option<&Path>,
    summary_json: Option<&Path>,
) -> AppResult<()> {
    let mut config = BatchConfig::load_yaml(config_path)?;
    if let Some(n) = concurrency {
        config.concurrency = n.max(1);
    }
    if replay {
        config.replay_outputs = true;
    }
    let registry = Arc::new(CaseRegistry::open(config)?);
    println!(
        "Running batch '{}': {} cases",
        registry.batch_name(),
        registry.case_count()
    );

    let runner = BatchRunner::new(registry)?;
    println!("  workers = {}", runner.concurrency());
    let (worker, handle) = BatchWorker::start(runner);

    let started = Instant::now();
    let mut stage = BatchStage::ResiliencePrep;
    let mut last_emit = Instant::now();
    let mut stop_requested = false;
    while !worker.is_finished() {
        for event in handle.try_events() {
            handle_event(event, &mut stage);
        }
        if let Some(path) = stop_file {
            if !stop_requested && path.exists() {
                tracing::info!(stop_file = %path.display(), "stop file found, requesting cancellation");
                clear_progress_line();
                println!("Stop file found, cancelling after the current step...");
                handle.request_cancel();
                stop_requested = true;
            }
        }
        if last_emit.elapsed().as_millis() >= 100 {
            render_cli_progress(stage, handle.progress(), started.elapsed().as_secs_f64());
            last_emit = Instant::now();
        }
        thread::sleep(Duration::from_millis(25));
    }
    let report = worker.join()?;
    tracing::debug!(
        batch = %report.batch_name,
        rows = report.rows.len(),
        cancelled = report.cancelled,
        "batch worker joined"
    );
    for event in handle.try_events() {
        handle_event(event, &mut stage);
    }
    clear_progress_line();

    if report.cancelled {
        println!("✗ Batch cancelled: {} rows exported", report.rows.len());
    } else {
        println!(
            "✓ Batch completed: {} succeeded, {} failed",
            report.succeeded,
            report.failed.len()
        );
    }
    for failed in &report.failed {
        println!("  ERROR {}: {}", failed.name, failed.reason);
    }
    println!("  Results: {}", report.results_csv.display());

    print_timing_summary(&report);

    if let Some(path) = summary_json {
        let json = serde_json::to_string_pretty(&report).map_err(|e| AppError::Results(e.to_string()))?;
        std::fs::write(path, json)?;
        println!("✓ Wrote batch summary to {}", path.display());
    }
    Ok(())
}

fn handle_event(event: ProgressEvent, stage: &mut BatchStage) {
    match event {
        ProgressEvent::Stage { stage: next, .. } => *stage = next,
        ProgressEvent::Error { message } => {
            clear_progress_line();
            println!("  ✗ {}", message);
        }
        ProgressEvent::Progress { .. } => {}
    }
}

fn clear_progress_line() {
    print!("\r{}\r", " ".repeat(120));
    let _ = io::stdout().flush();
}

fn render_cli_progress(stage: BatchStage, fraction: f64, elapsed_s: f64) {
    let width = 28usize;
    let filled = ((fraction * width as f64).round() as usize).min(width);
    let bar = format!(
        "{}{}",
        "#".repeat(filled),
        "-".repeat(width.saturating_sub(filled))
    );
    print!(
        "\r[{}] {:>6.2}%  stage={}  elapsed={:.1}s",
        bar,
        fraction * 100.0,
        stage.label(),
        elapsed_s
    );
    let _ = io::stdout().flush();
}

fn print_timing_summary(report: &BatchReport) {
    let timings = &report.timings;
    let total = timings.total_time_s.max(1.0e-12);

    println!("\nTiming summary:");
    for step in &timings.stages {
        let pct = 100.0 * step.wall_time_s / total;
        print!("  {:<22} {:>8.3}s ({:>5.1}%)", step.stage, step.wall_time_s, pct);
        if step.tasks > 0 {
            print!("  busy={:.3}s over {} cases", step.busy_time_s, step.tasks);
        }
        println!();
    }
    println!("  Total: {:.3}s", timings.total_time_s);
}

fn cmd_results(config_path: &Path) -> AppResult<()> {
    let config = BatchConfig::load_yaml(config_path)?;
    let path = config
        .study_folder
        .join(format!("{}_ResultsTable.csv", config.batch_name));
    if !path.is_file() {
        println!("No results table for batch '{}' yet", config.batch_name);
        return Ok(());
    }

    let rows = rv_results::read_table(&path)?;
    println!("Results of batch '{}' ({} rows):", config.batch_name, rows.len());
    for row in &rows {
        if row.is_error() {
            println!("  {:<24} ERROR", row.run_name);
            continue;
        }
        let number = |column: &str| row.get(column).and_then(|v| v.as_number()).unwrap_or(0.0);
        println!(
            "  {:<24} EUI={:<8.2} first cost=${:<10.0} lifecycle=${:.0}",
            row.run_name,
            number("EUI"),
            number("First Cost [$]"),
            number("Total ADORB Cost [$]")
        );
    }
    Ok(())
}
