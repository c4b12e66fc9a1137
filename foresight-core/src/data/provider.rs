//! Bar provider trait and structured error types.
//!
//! The BarProvider trait abstracts over daily-bar sources (Yahoo Finance,
//! deterministic synthetic data) so the collection stage can swap
//! implementations and tests can inject failures per symbol.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw daily OHLCV bar as delivered by a provider, before normalization.
///
/// Bars are auto-adjusted at the source; there is no separate adjusted close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Structured error types for provider operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("invalid date range: start {start} must be before end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("data error: {0}")]
    Other(String),
}

/// Result of a successful fetch for a single symbol.
///
/// `bars` may be empty: a symbol that exists but traded nowhere in the
/// requested window is a valid, empty response, not an error.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub symbol: String,
    pub bars: Vec<RawBar>,
    pub source: DataSource,
}

/// Where the data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    YahooFinance,
    Synthetic,
}

/// Trait for daily-bar providers.
///
/// Implementations must validate the requested range (`start < end`) before
/// doing any work and must be safe to call concurrently from worker threads.
pub trait BarProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch daily bars for a symbol over `[start, end)`.
    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError>;
}

/// Range guard shared by provider implementations.
pub(crate) fn check_range(start: NaiveDate, end: NaiveDate) -> Result<(), DataError> {
    if start >= end {
        return Err(DataError::InvalidRange { start, end });
    }
    Ok(())
}
