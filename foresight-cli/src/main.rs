//! Foresight CLI — pipeline stage commands and store inspection.
//!
//! Commands:
//! - `collect` — fetch new daily bars for the universe since the last run
//! - `clean` — normalize raw bars into dense daily series
//! - `evaluate` — fit the forecast model and score held-out accuracy
//! - `run` — execute collect, clean, and evaluate in order
//! - `status` — report watermarks, store contents, and the last summary

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use foresight_core::data::{
    BarProvider, SeriesStore, Stage, SyntheticProvider, WatermarkStore, YahooProvider,
};
use foresight_core::forecast::DriftForecaster;
use foresight_pipeline::{
    load_summary, reference_now, run_clean, run_collect, run_evaluate, run_pipeline,
    CleanSummary, CollectSummary, EvalSummary, PipelineConfig,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "foresight",
    about = "Foresight — daily price ingestion and forecast evaluation pipeline"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch new daily bars for the universe since the last run.
    Collect {
        /// Path to a TOML pipeline config. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Use the deterministic synthetic provider instead of the network.
        #[arg(long, default_value_t = false)]
        synthetic: bool,
    },
    /// Normalize raw bars into dense daily series.
    Clean {
        /// Path to a TOML pipeline config. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Fit the forecast model and score held-out accuracy.
    Evaluate {
        /// Path to a TOML pipeline config. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Execute collect, clean, and evaluate in order.
    Run {
        /// Path to a TOML pipeline config. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Use the deterministic synthetic provider instead of the network.
        #[arg(long, default_value_t = false)]
        synthetic: bool,
    },
    /// Report watermarks, store contents, and the last evaluation summary.
    Status {
        /// Path to a TOML pipeline config. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Collect { config, synthetic } => cmd_collect(config, synthetic),
        Commands::Clean { config } => cmd_clean(config),
        Commands::Evaluate { config } => cmd_evaluate(config),
        Commands::Run { config, synthetic } => cmd_run(config, synthetic),
        Commands::Status { config } => cmd_status(config),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Load the pipeline config, or defaults when no path is given.
///
/// Relative paths inside the config (universe files) resolve against
/// the config file's directory.
fn load_config(path: Option<&Path>) -> Result<(PipelineConfig, PathBuf)> {
    match path {
        Some(p) => {
            let config = PipelineConfig::load(p)
                .with_context(|| format!("loading config {}", p.display()))?;
            let base = p.parent().unwrap_or(Path::new(".")).to_path_buf();
            Ok((config, base))
        }
        None => Ok((PipelineConfig::default(), PathBuf::from("."))),
    }
}

fn make_provider(synthetic: bool) -> Result<Box<dyn BarProvider>> {
    if synthetic {
        Ok(Box::new(SyntheticProvider::new()))
    } else {
        let provider =
            YahooProvider::new().context("building the Yahoo Finance provider")?;
        Ok(Box::new(provider))
    }
}

fn cmd_collect(config_path: Option<PathBuf>, synthetic: bool) -> Result<()> {
    let (config, base_dir) = load_config(config_path.as_deref())?;
    let provider = make_provider(synthetic)?;

    let summary = run_collect(&config, &base_dir, provider.as_ref(), reference_now())?;
    print_collect_summary(&summary);

    if !summary.all_succeeded() {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_clean(config_path: Option<PathBuf>) -> Result<()> {
    let (config, _) = load_config(config_path.as_deref())?;

    let summary = run_clean(&config, reference_now())?;
    print_clean_summary(&summary);

    if !summary.all_succeeded() {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_evaluate(config_path: Option<PathBuf>) -> Result<()> {
    let (config, _) = load_config(config_path.as_deref())?;
    let model = DriftForecaster::new();

    let summary = run_evaluate(&config, &model, reference_now())?;
    print_eval_summary(&summary);

    if !summary.all_succeeded() {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_run(config_path: Option<PathBuf>, synthetic: bool) -> Result<()> {
    let (config, base_dir) = load_config(config_path.as_deref())?;
    let provider = make_provider(synthetic)?;
    let model = DriftForecaster::new();

    let report = run_pipeline(
        &config,
        &base_dir,
        provider.as_ref(),
        &model,
        reference_now(),
    )?;

    print_collect_summary(&report.collect);
    print_clean_summary(&report.clean);
    print_eval_summary(&report.evaluate);

    Ok(())
}

fn cmd_status(config_path: Option<PathBuf>) -> Result<()> {
    let (config, _) = load_config(config_path.as_deref())?;
    let store = SeriesStore::open(&config.storage.data_dir);
    let watermarks = WatermarkStore::open(config.storage.data_dir.join("watermarks"));

    println!("Data dir: {}", config.storage.data_dir.display());
    println!();
    println!("{:<10} {:<28}", "Stage", "Last run");
    println!("{}", "-".repeat(38));
    for stage in [Stage::Collect, Stage::Clean, Stage::Evaluate] {
        let last = match watermarks.read(stage) {
            Ok(Some(t)) => t.to_string(),
            Ok(None) => "(never)".to_string(),
            Err(e) => format!("(unreadable: {e})"),
        };
        println!("{:<10} {:<28}", stage.as_str(), last);
    }

    let symbols = store.raw_symbols().unwrap_or_default();
    if symbols.is_empty() {
        println!();
        println!("Store is empty.");
        return Ok(());
    }

    println!();
    println!(
        "{:<8} {:<25} {:>8} {:>8} {:>10}",
        "Symbol", "Raw range", "Raw", "Cleaned", "Forecast"
    );
    println!("{}", "-".repeat(64));
    for symbol in &symbols {
        let (range, raw_rows) = match store.raw_meta(symbol) {
            Some(meta) => (
                format!("{} to {}", meta.start_date, meta.end_date),
                meta.row_count.to_string(),
            ),
            None => ("(no meta)".to_string(), "-".to_string()),
        };
        let cleaned = match store.cleaned_meta(symbol) {
            Some(meta) => meta.row_count.to_string(),
            None => "-".to_string(),
        };
        let forecast = match store.forecast_meta(symbol) {
            Some(meta) => meta.row_count.to_string(),
            None => "-".to_string(),
        };
        println!(
            "{:<8} {:<25} {:>8} {:>8} {:>10}",
            symbol, range, raw_rows, cleaned, forecast
        );
    }

    if let Ok(artifact) = load_summary(&config.storage.artifacts_dir) {
        println!();
        println!(
            "Last evaluation: {} succeeded, {} failed",
            artifact.aggregate.succeeded,
            artifact.aggregate.failed.len()
        );
        for (name, value) in &artifact.aggregate.means {
            println!("  mean {name:<7} {value:>12.6}");
        }
    }

    Ok(())
}

fn print_collect_summary(s: &CollectSummary) {
    println!();
    println!("=== Collection ===");
    println!("Window:     {} to {}", s.window_start, s.window_end);
    println!("Attempted:  {}", s.attempted);
    println!("Stored:     {}", s.stored);
    if !s.no_data.is_empty() {
        println!("No data:    {}", s.no_data.join(", "));
    }
    for (symbol, err) in &s.store_failed {
        println!("Store failed for {symbol}: {err}");
    }
}

fn print_clean_summary(s: &CleanSummary) {
    println!();
    println!("=== Cleaning ===");
    println!("Window:     {} to {}", s.window_start, s.window_end);
    println!("Attempted:  {}", s.attempted);
    println!("Cleaned:    {}", s.cleaned);
    for (symbol, err) in &s.failed {
        println!("Failed for {symbol}: {err}");
    }
}

fn print_eval_summary(s: &EvalSummary) {
    println!();
    println!("=== Evaluation ===");
    println!("Attempted:  {}", s.attempted);
    println!("Succeeded:  {}", s.succeeded());
    for result in &s.results {
        if let Some(err) = &result.error {
            println!("Failed for {}: {err}", result.symbol);
        }
    }
    if !s.aggregate.means.is_empty() {
        println!();
        println!("--- Aggregate means ---");
        for (name, value) in &s.aggregate.means {
            println!("{name:<8} {value:>12.6}");
        }
    }
}
