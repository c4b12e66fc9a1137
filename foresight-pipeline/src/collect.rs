//! Collection stage — fans entity fetches across a bounded worker pool.
//!
//! Each entity is one unit of work: fetch its window, then merge the
//! bars into the raw store. Entities are independent; a failure in one
//! never blocks the rest. Empty results and fetch errors are both
//! reported as "no data" since the caller cannot tell a delisted symbol
//! from a transient outage. The stage waits for every unit before
//! returning.

use crate::config::PipelineConfig;
use crate::progress::CompletionCounter;
use chrono::{NaiveDate, NaiveDateTime};
use foresight_core::data::{
    BarProvider, SeriesStore, Stage, Universe, UniverseError, WatermarkError, WatermarkStore,
};
use rayon::prelude::*;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Fatal collection failures. Per-entity failures land in the summary.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("universe resolution failed: {0}")]
    Universe(#[from] UniverseError),

    #[error("collection watermark unreadable: {0}")]
    Watermark(#[from] WatermarkError),
}

/// Outcome of a collection run.
#[derive(Debug)]
pub struct CollectSummary {
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub attempted: usize,
    pub stored: usize,
    /// Entities with no usable data: empty results and fetch errors alike.
    pub no_data: Vec<String>,
    /// Entities whose bars arrived but could not be persisted.
    pub store_failed: Vec<(String, String)>,
}

impl CollectSummary {
    pub fn all_succeeded(&self) -> bool {
        self.no_data.is_empty() && self.store_failed.is_empty()
    }
}

enum FetchOutcome {
    Stored,
    NoData,
    StoreFailed { reason: String },
}

/// Compute the fetch window from the prior watermark.
///
/// Resumes the day after the last run, or at the epoch when no run has
/// happened yet. The window is half-open and never empty: a run on the
/// same day as the watermark still re-fetches the previous day, which
/// the date-keyed merge absorbs.
pub fn collection_window(
    watermark: Option<NaiveDateTime>,
    epoch_start: NaiveDate,
    now: NaiveDateTime,
) -> (NaiveDate, NaiveDate) {
    let mut start = match watermark {
        Some(last) => last.date() + chrono::Duration::days(1),
        None => epoch_start,
    };
    let end = now.date();
    if start >= end {
        start = end - chrono::Duration::days(1);
    }
    (start, end)
}

/// Run the collection stage over the configured universe.
///
/// The watermark advances whenever the stage itself completes; per-entity
/// failures never hold it back.
pub fn run_collect(
    config: &PipelineConfig,
    base_dir: &Path,
    provider: &dyn BarProvider,
    now: NaiveDateTime,
) -> Result<CollectSummary, CollectError> {
    let store = SeriesStore::open(&config.storage.data_dir);
    let watermarks = WatermarkStore::open(config.storage.data_dir.join("watermarks"));

    let symbols = resolve_universe(config, base_dir)?;
    let last_run = watermarks.read(Stage::Collect)?;
    let (window_start, window_end) =
        collection_window(last_run, config.collection.epoch_start, now);

    info!(
        symbols = symbols.len(),
        start = %window_start,
        end = %window_end,
        provider = provider.name(),
        "collection starting"
    );

    let counter = CompletionCounter::new(symbols.len());
    let unit = |symbol: &String| {
        let outcome = fetch_and_store(provider, &store, symbol, window_start, window_end);
        counter.record_done(symbol);
        (symbol.clone(), outcome)
    };

    let thread_pool = if config.collection.workers > 1 {
        Some(
            rayon::ThreadPoolBuilder::new()
                .num_threads(config.collection.workers)
                .build()
                .expect("failed to build Rayon thread pool"),
        )
    } else {
        None
    };

    let outcomes: Vec<(String, FetchOutcome)> = if let Some(ref tp) = thread_pool {
        tp.install(|| symbols.par_iter().map(unit).collect())
    } else {
        symbols.iter().map(unit).collect()
    };

    let mut summary = CollectSummary {
        window_start,
        window_end,
        attempted: symbols.len(),
        stored: 0,
        no_data: Vec::new(),
        store_failed: Vec::new(),
    };
    for (symbol, outcome) in outcomes {
        match outcome {
            FetchOutcome::Stored => summary.stored += 1,
            FetchOutcome::NoData => summary.no_data.push(symbol),
            FetchOutcome::StoreFailed { reason } => summary.store_failed.push((symbol, reason)),
        }
    }

    info!(
        stored = summary.stored,
        no_data = summary.no_data.len(),
        store_failed = summary.store_failed.len(),
        "collection finished"
    );

    if let Err(e) = watermarks.write(Stage::Collect, now) {
        warn!(error = %e, "failed to advance collection watermark");
    }

    Ok(summary)
}

/// One unit of work: fetch an entity's window, then merge into the store.
fn fetch_and_store(
    provider: &dyn BarProvider,
    store: &SeriesStore,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> FetchOutcome {
    match provider.fetch(symbol, start, end) {
        Ok(result) if result.bars.is_empty() => {
            debug!(symbol, "no bars in window");
            FetchOutcome::NoData
        }
        Ok(result) => match store.append_bars(symbol, &result.bars, provider.name()) {
            Ok(()) => FetchOutcome::Stored,
            Err(e) => {
                warn!(symbol, error = %e, "store write failed");
                FetchOutcome::StoreFailed {
                    reason: e.to_string(),
                }
            }
        },
        Err(e) => {
            warn!(symbol, error = %e, "fetch failed");
            FetchOutcome::NoData
        }
    }
}

fn resolve_universe(
    config: &PipelineConfig,
    base_dir: &Path,
) -> Result<Vec<String>, UniverseError> {
    if let Some(file) = &config.collection.universe_file {
        let path = if file.is_absolute() {
            file.clone()
        } else {
            base_dir.join(file)
        };
        let universe = Universe::from_file(&path)?;
        return universe.resolve(path.parent().unwrap_or(base_dir));
    }

    if !config.collection.tickers.is_empty() {
        return Universe::from_tickers(config.collection.tickers.clone()).resolve(base_dir);
    }

    Universe::default_us().resolve(base_dir)
}
