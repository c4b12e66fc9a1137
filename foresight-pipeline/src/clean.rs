//! Cleaning stage — turns raw bars into dense, gap-free daily series.
//!
//! Every entity with raw data is re-cleaned over the full window on
//! each run and its cleaned series replaced wholesale. Entities whose
//! raw data cannot support normalization (no usable closes, or a single
//! close against a multi-day window) are recorded as failures and the
//! rest proceed.

use crate::config::PipelineConfig;
use crate::progress::CompletionCounter;
use chrono::{NaiveDate, NaiveDateTime};
use foresight_core::data::{
    normalize, SeriesStore, Stage, StoreError, WatermarkError, WatermarkStore,
};
use rayon::prelude::*;
use thiserror::Error;
use tracing::{info, warn};

/// Fatal cleaning failures. Per-entity failures land in the summary.
#[derive(Debug, Error)]
pub enum CleanError {
    #[error("cleaning watermark unreadable: {0}")]
    Watermark(#[from] WatermarkError),

    #[error("cannot enumerate raw series: {0}")]
    Enumerate(StoreError),
}

/// Outcome of a cleaning run.
#[derive(Debug)]
pub struct CleanSummary {
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub attempted: usize,
    pub cleaned: usize,
    pub failed: Vec<(String, String)>,
}

impl CleanSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Run the cleaning stage over every entity present in the raw store.
///
/// The watermark advances whenever the stage itself completes; per-entity
/// failures never hold it back.
pub fn run_clean(config: &PipelineConfig, now: NaiveDateTime) -> Result<CleanSummary, CleanError> {
    let store = SeriesStore::open(&config.storage.data_dir);
    let watermarks = WatermarkStore::open(config.storage.data_dir.join("watermarks"));

    let last_run = watermarks.read(Stage::Clean)?;
    let symbols = store.raw_symbols().map_err(CleanError::Enumerate)?;

    let window_start = config.cleaning.window_start;
    let window_end = now.date();

    info!(
        symbols = symbols.len(),
        start = %window_start,
        end = %window_end,
        last_run = ?last_run,
        "cleaning starting"
    );

    let counter = CompletionCounter::new(symbols.len());
    let unit = |symbol: &String| {
        let outcome = clean_entity(&store, symbol, window_start, window_end);
        counter.record_done(symbol);
        (symbol.clone(), outcome)
    };

    let thread_pool = if config.cleaning.workers > 1 {
        Some(
            rayon::ThreadPoolBuilder::new()
                .num_threads(config.cleaning.workers)
                .build()
                .expect("failed to build Rayon thread pool"),
        )
    } else {
        None
    };

    let outcomes: Vec<(String, Result<(), String>)> = if let Some(ref tp) = thread_pool {
        tp.install(|| symbols.par_iter().map(unit).collect())
    } else {
        symbols.iter().map(unit).collect()
    };

    let mut summary = CleanSummary {
        window_start,
        window_end,
        attempted: symbols.len(),
        cleaned: 0,
        failed: Vec::new(),
    };
    for (symbol, outcome) in outcomes {
        match outcome {
            Ok(()) => summary.cleaned += 1,
            Err(reason) => summary.failed.push((symbol, reason)),
        }
    }

    info!(
        cleaned = summary.cleaned,
        failed = summary.failed.len(),
        "cleaning finished"
    );

    if let Err(e) = watermarks.write(Stage::Clean, now) {
        warn!(error = %e, "failed to advance cleaning watermark");
    }

    Ok(summary)
}

/// One unit of work: load an entity's raw bars, normalize, replace the
/// cleaned series.
fn clean_entity(
    store: &SeriesStore,
    symbol: &str,
    window_start: NaiveDate,
    window_end: NaiveDate,
) -> Result<(), String> {
    let bars = store
        .load_bars(symbol)
        .map_err(|e| format!("load raw bars: {e}"))?;

    let points = normalize(&bars, window_start, window_end).map_err(|e| {
        warn!(symbol, error = %e, "normalization failed");
        format!("normalize: {e}")
    })?;

    store
        .replace_points(symbol, &points)
        .map_err(|e| format!("store cleaned series: {e}"))?;

    Ok(())
}
