//! Evaluation stage — fits the model per entity and scores it against
//! held-out history.
//!
//! The trailing `horizon_days` of each cleaned series are withheld from
//! the model; it is fitted on the remainder and asked to forecast over
//! the held-out window. Accuracy metrics come from the inner join of
//! forecast and held-out dates; the Sharpe ratio comes from the
//! forecast's own value path. Each entity's produced forecast is
//! persisted beside its cleaned series.

use crate::aggregate::{aggregate, AggregateSummary};
use crate::artifacts;
use crate::config::PipelineConfig;
use crate::metrics::{annualized_sharpe, EntityMetrics};
use crate::progress::CompletionCounter;
use chrono::{NaiveDate, NaiveDateTime};
use foresight_core::data::{CleanedPoint, SeriesStore, Stage, StoreError, WatermarkError, WatermarkStore};
use foresight_core::forecast::{ForecastConfig, ForecastPoint, Forecaster};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{info, warn};

/// Fatal evaluation failures. Per-entity failures land in the results.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("evaluation watermark unreadable: {0}")]
    Watermark(#[from] WatermarkError),

    #[error("cannot enumerate cleaned series: {0}")]
    Enumerate(StoreError),
}

/// Per-entity evaluation record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub symbol: String,
    pub metrics: Option<EntityMetrics>,
    #[serde(default)]
    pub error: Option<String>,
}

impl EvaluationResult {
    pub fn success(symbol: &str, metrics: EntityMetrics) -> Self {
        Self {
            symbol: symbol.to_string(),
            metrics: Some(metrics),
            error: None,
        }
    }

    pub fn failure(symbol: &str, error: impl Into<String>) -> Self {
        Self {
            symbol: symbol.to_string(),
            metrics: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.metrics.is_some()
    }
}

/// Outcome of an evaluation run.
#[derive(Debug)]
pub struct EvalSummary {
    pub attempted: usize,
    pub results: Vec<EvaluationResult>,
    pub aggregate: AggregateSummary,
}

impl EvalSummary {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.succeeded() == self.attempted
    }
}

/// Run the evaluation stage over every entity with a cleaned series.
///
/// The watermark advances whenever the stage itself completes; per-entity
/// failures never hold it back.
pub fn run_evaluate(
    config: &PipelineConfig,
    model: &dyn Forecaster,
    now: NaiveDateTime,
) -> Result<EvalSummary, EvalError> {
    let store = SeriesStore::open(&config.storage.data_dir);
    let watermarks = WatermarkStore::open(config.storage.data_dir.join("watermarks"));

    let last_run = watermarks.read(Stage::Evaluate)?;
    let symbols = store.cleaned_symbols().map_err(EvalError::Enumerate)?;

    info!(
        symbols = symbols.len(),
        model = model.name(),
        horizon_days = config.evaluation.horizon_days,
        last_run = ?last_run,
        "evaluation starting"
    );

    let counter = CompletionCounter::new(symbols.len());
    let unit = |symbol: &String| {
        let result = evaluate_and_persist(&store, symbol, model, config);
        counter.record_done(symbol);
        result
    };

    let thread_pool = if config.evaluation.workers > 1 {
        Some(
            rayon::ThreadPoolBuilder::new()
                .num_threads(config.evaluation.workers)
                .build()
                .expect("failed to build Rayon thread pool"),
        )
    } else {
        None
    };

    let results: Vec<EvaluationResult> = if let Some(ref tp) = thread_pool {
        tp.install(|| symbols.par_iter().map(unit).collect())
    } else {
        symbols.iter().map(unit).collect()
    };

    let summary = aggregate(&results);

    info!(
        succeeded = summary.succeeded,
        failed = summary.failed.len(),
        "evaluation finished"
    );

    if let Err(e) = artifacts::write_evaluation_artifacts(
        &config.storage.artifacts_dir,
        &results,
        &summary,
        config,
    ) {
        warn!(error = %e, "failed to write evaluation artifacts");
    }

    if let Err(e) = watermarks.write(Stage::Evaluate, now) {
        warn!(error = %e, "failed to advance evaluation watermark");
    }

    Ok(EvalSummary {
        attempted: symbols.len(),
        results,
        aggregate: summary,
    })
}

/// One unit of work: load the cleaned series, evaluate the model on it,
/// persist the forecast.
fn evaluate_and_persist(
    store: &SeriesStore,
    symbol: &str,
    model: &dyn Forecaster,
    config: &PipelineConfig,
) -> EvaluationResult {
    let truth = match store.load_points(symbol) {
        Ok(points) => points,
        Err(e) => return EvaluationResult::failure(symbol, format!("load cleaned series: {e}")),
    };

    let outcome = evaluate_entity(
        &truth,
        model,
        config.evaluation.horizon_days,
        config.evaluation.risk_free_rate,
        &config.forecast,
    );

    match outcome {
        Ok((metrics, forecast)) => {
            if let Err(e) = store.replace_forecast(symbol, &forecast, model.name()) {
                warn!(symbol, error = %e, "forecast store write failed");
                return EvaluationResult::failure(symbol, format!("store forecast: {e}"));
            }
            EvaluationResult::success(symbol, metrics)
        }
        Err(reason) => {
            warn!(symbol, error = %reason, "evaluation failed");
            EvaluationResult::failure(symbol, reason)
        }
    }
}

/// Score a model against one entity's ground truth.
///
/// Fits on everything before the held-out window, then inner-joins the
/// forecast with the held-out actuals by date. Fewer than two
/// overlapping dates, or a flat forecast path, is a per-entity failure.
pub fn evaluate_entity(
    truth: &[CleanedPoint],
    model: &dyn Forecaster,
    horizon_days: u32,
    risk_free_rate: f64,
    config: &ForecastConfig,
) -> Result<(EntityMetrics, Vec<ForecastPoint>), String> {
    let horizon = horizon_days as usize;
    if truth.len() < horizon + 2 {
        return Err(format!(
            "insufficient history: {} points with a {horizon}-day held-out window",
            truth.len()
        ));
    }

    let split = truth.len() - horizon;
    let train = &truth[..split];
    let held_out = &truth[split..];

    let forecast = model
        .forecast(train, horizon_days, config)
        .map_err(|e| format!("model failed: {e}"))?;

    let predicted_by_date: BTreeMap<NaiveDate, f64> =
        forecast.iter().map(|p| (p.date, p.yhat)).collect();

    let mut actual = Vec::with_capacity(held_out.len());
    let mut predicted = Vec::with_capacity(held_out.len());
    for point in held_out {
        if let Some(&yhat) = predicted_by_date.get(&point.date) {
            actual.push(point.close);
            predicted.push(yhat);
        }
    }

    if actual.len() < 2 {
        return Err(format!(
            "only {} overlapping dates between forecast and held-out window, need at least 2",
            actual.len()
        ));
    }

    let yhat_path: Vec<f64> = forecast.iter().map(|p| p.yhat).collect();
    let sharpe = annualized_sharpe(&yhat_path, risk_free_rate)
        .ok_or_else(|| "forecast volatility is zero, Sharpe undefined".to_string())?;

    Ok((EntityMetrics::compute(&actual, &predicted, sharpe), forecast))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use foresight_core::forecast::{DriftForecaster, ForecastError};
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_dir() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir =
            std::env::temp_dir().join(format!("foresight_eval_test_{}_{id}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn test_config(dir: &Path) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.storage.data_dir = dir.join("data");
        config.storage.artifacts_dir = dir.join("artifacts");
        config.evaluation.horizon_days = 10;
        config.evaluation.workers = 2;
        config
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn now() -> NaiveDateTime {
        date(2024, 6, 3).and_hms_opt(12, 0, 0).unwrap()
    }

    /// Dense daily series starting 2024-01-01 with close = start + i * step.
    fn linear_series(len: usize, start: f64, step: f64) -> Vec<CleanedPoint> {
        (0..len)
            .map(|i| CleanedPoint {
                date: date(2024, 1, 1) + Duration::days(i as i64),
                close: start + i as f64 * step,
            })
            .collect()
    }

    /// Forecasts the same value everywhere.
    struct ConstantModel {
        value: f64,
    }

    impl Forecaster for ConstantModel {
        fn name(&self) -> &str {
            "constant"
        }

        fn forecast(
            &self,
            series: &[CleanedPoint],
            horizon_days: u32,
            _config: &ForecastConfig,
        ) -> Result<Vec<ForecastPoint>, ForecastError> {
            let mut points: Vec<ForecastPoint> = series
                .iter()
                .map(|p| ForecastPoint {
                    date: p.date,
                    yhat: self.value,
                    yhat_lower: self.value,
                    yhat_upper: self.value,
                })
                .collect();
            let last = series.last().map(|p| p.date).unwrap_or(date(2024, 1, 1));
            for step in 1..=horizon_days as i64 {
                points.push(ForecastPoint {
                    date: last + Duration::days(step),
                    yhat: self.value,
                    yhat_lower: self.value,
                    yhat_upper: self.value,
                });
            }
            Ok(points)
        }
    }

    /// Forecasts dates far away from anything the truth covers.
    struct DisjointModel;

    impl Forecaster for DisjointModel {
        fn name(&self) -> &str {
            "disjoint"
        }

        fn forecast(
            &self,
            series: &[CleanedPoint],
            horizon_days: u32,
            _config: &ForecastConfig,
        ) -> Result<Vec<ForecastPoint>, ForecastError> {
            let offset = Duration::days(10_000);
            Ok((0..series.len() + horizon_days as usize)
                .map(|i| ForecastPoint {
                    date: date(2024, 1, 1) + offset + Duration::days(i as i64),
                    yhat: 100.0 + i as f64,
                    yhat_lower: 99.0 + i as f64,
                    yhat_upper: 101.0 + i as f64,
                })
                .collect())
        }
    }

    // ─── evaluate_entity ────────────────────────────────────────────

    #[test]
    fn linear_truth_scores_perfectly_under_drift() {
        let truth = linear_series(100, 100.0, 1.0);
        let model = DriftForecaster::new();
        let config = ForecastConfig::default();

        let (metrics, forecast) = evaluate_entity(&truth, &model, 10, 0.0, &config).unwrap();

        // Drift on a perfectly linear series continues it exactly
        assert!(metrics.mae < 1e-9, "mae = {}", metrics.mae);
        assert!(metrics.rmse < 1e-9, "rmse = {}", metrics.rmse);
        assert!(metrics.sharpe.is_finite() && metrics.sharpe > 0.0);

        // Fitted values for the 90 training days plus 10 held-out days
        assert_eq!(forecast.len(), 100);
        assert_eq!(forecast.last().unwrap().date, truth.last().unwrap().date);
    }

    #[test]
    fn short_series_is_rejected() {
        let truth = linear_series(5, 100.0, 1.0);
        let model = DriftForecaster::new();
        let config = ForecastConfig::default();

        let err = evaluate_entity(&truth, &model, 10, 0.0, &config).unwrap_err();
        assert!(err.contains("insufficient history"), "{err}");
    }

    #[test]
    fn flat_forecast_has_no_sharpe() {
        let truth = linear_series(50, 100.0, 1.0);
        let model = ConstantModel { value: 100.0 };
        let config = ForecastConfig::default();

        let err = evaluate_entity(&truth, &model, 10, 0.0, &config).unwrap_err();
        assert!(err.contains("volatility"), "{err}");
    }

    #[test]
    fn disjoint_forecast_dates_fail_the_join() {
        let truth = linear_series(50, 100.0, 1.0);
        let model = DisjointModel;
        let config = ForecastConfig::default();

        let err = evaluate_entity(&truth, &model, 10, 0.0, &config).unwrap_err();
        assert!(err.contains("overlapping dates"), "{err}");
    }

    // ─── run_evaluate ───────────────────────────────────────────────

    #[test]
    fn evaluates_and_persists_forecasts() {
        let dir = temp_dir();
        let config = test_config(&dir);
        let store = SeriesStore::open(&config.storage.data_dir);

        store
            .replace_points("SPY", &linear_series(60, 100.0, 1.0))
            .unwrap();
        store
            .replace_points("QQQ", &linear_series(60, 400.0, 2.0))
            .unwrap();

        let model = DriftForecaster::new();
        let summary = run_evaluate(&config, &model, now()).unwrap();

        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.succeeded(), 2);
        assert!(summary.all_succeeded());
        assert_eq!(summary.aggregate.means.len(), 4);

        // 50 fitted points + 10 held-out days per entity
        let forecast = store.load_forecast("SPY").unwrap();
        assert_eq!(forecast.len(), 60);

        let watermarks = WatermarkStore::open(config.storage.data_dir.join("watermarks"));
        assert_eq!(watermarks.read(Stage::Evaluate).unwrap(), Some(now()));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn one_failing_entity_does_not_block_others() {
        let dir = temp_dir();
        let config = test_config(&dir);
        let store = SeriesStore::open(&config.storage.data_dir);

        store
            .replace_points("SPY", &linear_series(60, 100.0, 1.0))
            .unwrap();
        // Too short for a 10-day held-out window
        store
            .replace_points("TINY", &linear_series(5, 50.0, 1.0))
            .unwrap();

        let model = DriftForecaster::new();
        let summary = run_evaluate(&config, &model, now()).unwrap();

        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.succeeded(), 1);
        assert_eq!(summary.aggregate.failed, vec!["TINY"]);

        let spy = summary.results.iter().find(|r| r.symbol == "SPY").unwrap();
        assert!(spy.is_success());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn empty_cleaned_store_evaluates_nothing() {
        let dir = temp_dir();
        let config = test_config(&dir);

        let model = DriftForecaster::new();
        let summary = run_evaluate(&config, &model, now()).unwrap();

        assert_eq!(summary.attempted, 0);
        assert!(summary.aggregate.means.is_empty());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupt_watermark_aborts_run() {
        let dir = temp_dir();
        let config = test_config(&dir);

        let wm_dir = config.storage.data_dir.join("watermarks");
        fs::create_dir_all(&wm_dir).unwrap();
        fs::write(wm_dir.join("evaluate_last_run.log"), "nonsense").unwrap();

        let model = DriftForecaster::new();
        let err = run_evaluate(&config, &model, now()).unwrap_err();
        assert!(matches!(err, EvalError::Watermark(_)));

        let _ = fs::remove_dir_all(&dir);
    }
}
