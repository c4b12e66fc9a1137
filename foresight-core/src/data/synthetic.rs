//! Synthetic bar provider for offline development and tests.
//!
//! Produces a deterministic random walk per symbol so that runs are
//! reproducible. Results derived from synthetic bars carry the
//! `DataSource::Synthetic` tag.

use super::provider::{check_range, BarProvider, DataError, DataSource, FetchResult, RawBar};
use chrono::{Datelike, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Deterministic synthetic bar provider.
///
/// The random walk is seeded from the symbol name, so the same symbol
/// and window always yield identical bars.
pub struct SyntheticProvider;

impl SyntheticProvider {
    pub fn new() -> Self {
        Self
    }

    /// Generate weekday bars over the half-open window `[start, end)`.
    fn generate_bars(symbol: &str, start: NaiveDate, end: NaiveDate) -> Vec<RawBar> {
        // Deterministic seed from symbol name
        let seed_bytes = blake3::hash(symbol.as_bytes());
        let seed: [u8; 32] = *seed_bytes.as_bytes();
        let mut rng = StdRng::from_seed(seed);

        let mut bars = Vec::new();
        let mut price = 100.0_f64;
        let mut current = start;

        while current < end {
            // Exchanges are closed on weekends
            let weekday = current.weekday();
            if weekday == chrono::Weekday::Sat || weekday == chrono::Weekday::Sun {
                current += chrono::Duration::days(1);
                continue;
            }

            let daily_return: f64 = rng.gen_range(-0.03..0.03);
            let open = price;
            let close = price * (1.0 + daily_return);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
            let volume = rng.gen_range(500_000..5_000_000u64);

            bars.push(RawBar {
                date: current,
                open,
                high,
                low,
                close,
                volume,
            });

            price = close;
            current += chrono::Duration::days(1);
        }

        bars
    }
}

impl Default for SyntheticProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl BarProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        check_range(start, end)?;
        Ok(FetchResult {
            symbol: symbol.to_string(),
            bars: Self::generate_bars(symbol, start, end),
            source: DataSource::Synthetic,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn same_symbol_is_deterministic() {
        let p = SyntheticProvider::new();
        let a = p.fetch("SPY", date(2024, 1, 1), date(2024, 2, 1)).unwrap();
        let b = p.fetch("SPY", date(2024, 1, 1), date(2024, 2, 1)).unwrap();

        assert_eq!(a.bars.len(), b.bars.len());
        for (x, y) in a.bars.iter().zip(b.bars.iter()) {
            assert_eq!(x.date, y.date);
            assert_eq!(x.close, y.close);
        }
    }

    #[test]
    fn different_symbols_diverge() {
        let p = SyntheticProvider::new();
        let spy = p.fetch("SPY", date(2024, 1, 1), date(2024, 2, 1)).unwrap();
        let qqq = p.fetch("QQQ", date(2024, 1, 1), date(2024, 2, 1)).unwrap();

        assert_eq!(spy.bars.len(), qqq.bars.len());
        assert_ne!(spy.bars[0].close, qqq.bars[0].close);
    }

    #[test]
    fn skips_weekends_and_excludes_end() {
        let p = SyntheticProvider::new();
        // 2024-01-06 is a Saturday, 2024-01-07 a Sunday
        let result = p.fetch("SPY", date(2024, 1, 5), date(2024, 1, 9)).unwrap();
        let dates: Vec<NaiveDate> = result.bars.iter().map(|b| b.date).collect();
        assert_eq!(dates, vec![date(2024, 1, 5), date(2024, 1, 8)]);
    }

    #[test]
    fn prices_stay_positive() {
        let p = SyntheticProvider::new();
        let result = p.fetch("XYZ", date(2020, 1, 1), date(2024, 1, 1)).unwrap();
        assert!(result.bars.iter().all(|b| b.low > 0.0));
        assert_eq!(result.source, DataSource::Synthetic);
    }

    #[test]
    fn rejects_inverted_range() {
        let p = SyntheticProvider::new();
        let err = p.fetch("SPY", date(2024, 2, 1), date(2024, 1, 1)).unwrap_err();
        assert!(matches!(err, DataError::InvalidRange { .. }));
    }
}
