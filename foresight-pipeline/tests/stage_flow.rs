//! Integration tests for the full stage flow.
//!
//! These run collect, clean, and evaluate against temp directories with
//! the synthetic provider and the built-in drift model, and check the
//! invariants each stage promises the next.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use foresight_core::data::{SeriesStore, Stage, SyntheticProvider, WatermarkStore};
use foresight_core::forecast::DriftForecaster;
use foresight_pipeline::{
    load_summary, run_clean, run_collect, run_evaluate, run_pipeline, PipelineConfig,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

fn temp_dir() -> PathBuf {
    let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir().join(format!(
        "foresight_stage_flow_{}_{id}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn test_config(dir: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.storage.data_dir = dir.join("data");
    config.storage.artifacts_dir = dir.join("artifacts");
    config.collection.tickers = vec!["AAPL".into(), "MSFT".into()];
    config.collection.epoch_start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    config.cleaning.window_start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    config.evaluation.horizon_days = 10;
    config
}

fn run_instant() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 3)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

#[test]
fn full_pipeline_produces_dense_series_and_artifacts() {
    let dir = temp_dir();
    let config = test_config(&dir);
    let provider = SyntheticProvider::new();
    let model = DriftForecaster::new();

    let report = run_pipeline(&config, &dir, &provider, &model, run_instant()).unwrap();

    assert_eq!(report.collect.stored, 2);
    assert!(report.collect.all_succeeded());
    assert_eq!(report.clean.cleaned, 2);
    assert_eq!(report.evaluate.succeeded(), 2);

    // Cleaned output: one point per calendar day, Jan 1 through Jun 3,
    // strictly increasing, all finite
    let store = SeriesStore::open(&config.storage.data_dir);
    for symbol in ["AAPL", "MSFT"] {
        let points = store.load_points(symbol).unwrap();
        assert_eq!(points.len(), 155, "{symbol} should cover 155 days");
        assert_eq!(points[0].date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(
            points.last().unwrap().date,
            NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
        );
        assert!(points
            .windows(2)
            .all(|w| w[1].date - w[0].date == Duration::days(1)));
        assert!(points.iter().all(|p| p.close.is_finite() && p.close > 0.0));

        let forecast = store.load_forecast(symbol).unwrap();
        assert_eq!(forecast.len(), 155, "fitted points plus held-out horizon");
    }

    // Artifacts are in place and agree with the in-memory aggregate
    assert!(config.storage.artifacts_dir.join("metrics.csv").exists());
    assert!(config.storage.artifacts_dir.join("results.json").exists());
    let summary = load_summary(&config.storage.artifacts_dir).unwrap();
    assert_eq!(summary.aggregate, report.evaluate.aggregate);
    assert_eq!(summary.aggregate.succeeded, 2);
    assert_eq!(summary.aggregate.means.len(), 4);

    // Every stage advanced its watermark to the run instant
    let watermarks = WatermarkStore::open(config.storage.data_dir.join("watermarks"));
    for stage in [Stage::Collect, Stage::Clean, Stage::Evaluate] {
        assert_eq!(watermarks.read(stage).unwrap(), Some(run_instant()));
    }

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn repeating_a_window_leaves_the_store_unchanged() {
    let dir = temp_dir();
    let config = test_config(&dir);
    let provider = SyntheticProvider::new();

    run_collect(&config, &dir, &provider, run_instant()).unwrap();
    let store = SeriesStore::open(&config.storage.data_dir);
    let first = store.load_bars("AAPL").unwrap();

    // Clearing the watermark makes the second run recompute the exact
    // same window from the epoch
    std::fs::remove_file(
        config
            .storage
            .data_dir
            .join("watermarks/collect_last_run.log"),
    )
    .unwrap();
    run_collect(&config, &dir, &provider, run_instant()).unwrap();

    let second = store.load_bars("AAPL").unwrap();
    assert_eq!(first, second, "re-running the same window must not change rows");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn next_run_extends_rather_than_refetches() {
    let dir = temp_dir();
    let config = test_config(&dir);
    let provider = SyntheticProvider::new();

    run_collect(&config, &dir, &provider, run_instant()).unwrap();
    let store = SeriesStore::open(&config.storage.data_dir);
    let first_len = store.load_bars("AAPL").unwrap().len();

    // One week later: the window resumes after the watermark and picks
    // up Jun 4-7 (Tue-Fri), four new trading days
    let later = NaiveDate::from_ymd_opt(2024, 6, 10)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap();
    let summary = run_collect(&config, &dir, &provider, later).unwrap();
    assert_eq!(summary.window_start, NaiveDate::from_ymd_opt(2024, 6, 4).unwrap());

    let bars = store.load_bars("AAPL").unwrap();
    assert_eq!(bars.len(), first_len + 4);

    let mut dates: Vec<NaiveDate> = bars.iter().map(|b| b.date).collect();
    dates.dedup();
    assert_eq!(dates.len(), bars.len(), "no duplicate dates after merge");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn watermark_files_use_the_documented_format() {
    let dir = temp_dir();
    let config = test_config(&dir);
    let provider = SyntheticProvider::new();

    run_collect(&config, &dir, &provider, run_instant()).unwrap();
    run_clean(&config, run_instant()).unwrap();
    run_evaluate(&config, &DriftForecaster::new(), run_instant()).unwrap();

    for stage in ["collect", "clean", "evaluate"] {
        let path = config
            .storage
            .data_dir
            .join(format!("watermarks/{stage}_last_run.log"));
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content, "Last run: 2024-06-03 12:00:00.000000\n",
            "unexpected watermark format in {stage}"
        );
    }

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn cleaning_follows_collection_without_refetch() {
    let dir = temp_dir();
    let config = test_config(&dir);
    let provider = SyntheticProvider::new();

    let collect = run_collect(&config, &dir, &provider, run_instant()).unwrap();
    assert_eq!(collect.stored, 2);

    let clean = run_clean(&config, run_instant()).unwrap();
    assert_eq!(clean.attempted, 2);
    assert!(clean.all_succeeded());

    // Raw bars skip weekends; cleaned series must not
    let store = SeriesStore::open(&config.storage.data_dir);
    let raw = store.load_bars("AAPL").unwrap();
    let cleaned = store.load_points("AAPL").unwrap();
    assert!(raw.len() < cleaned.len());

    let _ = std::fs::remove_dir_all(&dir);
}
