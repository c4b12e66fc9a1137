//! Parquet-backed series store with Hive-style partitioning.
//!
//! Layout:
//! - `{data_dir}/raw/symbol={SYMBOL}/{year}.parquet` (one file per year)
//! - `{data_dir}/cleaned/symbol={SYMBOL}/series.parquet`
//! - `{data_dir}/forecast/symbol={SYMBOL}/forecast.parquet`
//!
//! Raw writes are date-keyed merges: a re-delivered date overwrites the
//! stored row instead of duplicating it. Cleaned and forecast writes
//! replace the whole series. All writes are atomic (.tmp then rename),
//! every symbol carries a metadata sidecar, and corrupt Parquet files
//! are quarantined on read ({filename}.quarantined).

use super::normalize::CleanedPoint;
use super::provider::RawBar;
use super::watermark::reference_now;
use crate::forecast::ForecastPoint;
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Errors from the series store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no stored series for '{symbol}'")]
    NoSeries { symbol: String },

    #[error("refusing to write empty series for '{symbol}'")]
    EmptyWrite { symbol: String },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("parquet error: {0}")]
    Parquet(String),

    #[error("validation failed: {0}")]
    Validation(String),
}

/// Metadata sidecar for one stored symbol series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesMeta {
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub row_count: usize,
    pub data_hash: String,
    pub source: String,
    pub written_at: chrono::NaiveDateTime,
}

/// The Parquet series store.
pub struct SeriesStore {
    data_dir: PathBuf,
}

impl SeriesStore {
    pub fn open(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Root directory of the store.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn symbol_dir(&self, tree: &str, symbol: &str) -> PathBuf {
        self.data_dir.join(tree).join(format!("symbol={symbol}"))
    }

    fn raw_year_path(&self, symbol: &str, year: i32) -> PathBuf {
        self.symbol_dir("raw", symbol).join(format!("{year}.parquet"))
    }

    fn meta_path(&self, tree: &str, symbol: &str) -> PathBuf {
        self.symbol_dir(tree, symbol).join("meta.json")
    }

    // ── Raw tree ────────────────────────────────────────────────────

    /// Merge bars into a symbol's raw series.
    ///
    /// Bars are keyed by date within year partitions; an incoming bar
    /// whose date is already stored overwrites the stored row. Only
    /// partitions touched by the incoming batch are rewritten.
    pub fn append_bars(&self, symbol: &str, bars: &[RawBar], source: &str) -> Result<(), StoreError> {
        if bars.is_empty() {
            return Err(StoreError::EmptyWrite {
                symbol: symbol.to_string(),
            });
        }

        let sym_dir = self.symbol_dir("raw", symbol);
        fs::create_dir_all(&sym_dir)
            .map_err(|e| StoreError::Io(format!("failed to create dir: {e}")))?;

        // Group incoming bars by year
        let mut by_year: BTreeMap<i32, Vec<&RawBar>> = BTreeMap::new();
        for bar in bars {
            by_year.entry(bar.date.year()).or_default().push(bar);
        }

        for (year, year_bars) in &by_year {
            let path = self.raw_year_path(symbol, *year);

            // Merge with the existing partition, incoming dates win
            let mut by_date: BTreeMap<NaiveDate, RawBar> = BTreeMap::new();
            if path.exists() {
                match load_and_validate_bars(&path) {
                    Ok(existing) => {
                        for bar in existing {
                            by_date.insert(bar.date, bar);
                        }
                    }
                    Err(e) => {
                        quarantine(&path, &e);
                    }
                }
            }
            for bar in year_bars {
                by_date.insert(bar.date, (*bar).clone());
            }

            let merged: Vec<RawBar> = by_date.into_values().collect();
            let df = bars_to_dataframe(&merged)?;
            write_parquet_atomic(&df, &path)?;
        }

        // Sidecar reflects the full merged series, not just this batch
        let all = self.load_bars(symbol)?;
        self.write_meta("raw", symbol, &all, source, |bar| bar.date)?;

        Ok(())
    }

    /// Load all raw bars for a symbol, sorted by date ascending.
    pub fn load_bars(&self, symbol: &str) -> Result<Vec<RawBar>, StoreError> {
        let sym_dir = self.symbol_dir("raw", symbol);
        if !sym_dir.exists() {
            return Err(StoreError::NoSeries {
                symbol: symbol.to_string(),
            });
        }

        let mut all_bars = Vec::new();

        let entries =
            fs::read_dir(&sym_dir).map_err(|e| StoreError::Io(format!("read dir: {e}")))?;

        for entry in entries {
            let entry = entry.map_err(|e| StoreError::Io(format!("dir entry: {e}")))?;
            let path = entry.path();

            // Skip non-parquet files (meta.json, .quarantined, etc)
            if path.extension().and_then(|e| e.to_str()) != Some("parquet") {
                continue;
            }

            match load_and_validate_bars(&path) {
                Ok(bars) => all_bars.extend(bars),
                Err(e) => quarantine(&path, &e),
            }
        }

        if all_bars.is_empty() {
            return Err(StoreError::NoSeries {
                symbol: symbol.to_string(),
            });
        }

        all_bars.sort_by_key(|b| b.date);
        Ok(all_bars)
    }

    /// Symbols present in the raw tree, sorted.
    pub fn raw_symbols(&self) -> Result<Vec<String>, StoreError> {
        self.tree_symbols("raw")
    }

    pub fn raw_meta(&self, symbol: &str) -> Option<SeriesMeta> {
        self.read_meta("raw", symbol)
    }

    // ── Cleaned tree ────────────────────────────────────────────────

    /// Replace a symbol's cleaned series wholesale.
    pub fn replace_points(&self, symbol: &str, points: &[CleanedPoint]) -> Result<(), StoreError> {
        if points.is_empty() {
            return Err(StoreError::EmptyWrite {
                symbol: symbol.to_string(),
            });
        }

        let sym_dir = self.symbol_dir("cleaned", symbol);
        fs::create_dir_all(&sym_dir)
            .map_err(|e| StoreError::Io(format!("failed to create dir: {e}")))?;

        let df = points_to_dataframe(points)?;
        write_parquet_atomic(&df, &sym_dir.join("series.parquet"))?;
        self.write_meta("cleaned", symbol, points, "cleaning", |p| p.date)?;

        Ok(())
    }

    /// Load a symbol's cleaned series, sorted by date ascending.
    pub fn load_points(&self, symbol: &str) -> Result<Vec<CleanedPoint>, StoreError> {
        let path = self.symbol_dir("cleaned", symbol).join("series.parquet");
        if !path.exists() {
            return Err(StoreError::NoSeries {
                symbol: symbol.to_string(),
            });
        }

        let mut points = match load_and_validate_points(&path) {
            Ok(points) => points,
            Err(e) => {
                quarantine(&path, &e);
                return Err(e);
            }
        };

        points.sort_by_key(|p| p.date);
        Ok(points)
    }

    /// Symbols present in the cleaned tree, sorted.
    pub fn cleaned_symbols(&self) -> Result<Vec<String>, StoreError> {
        self.tree_symbols("cleaned")
    }

    pub fn cleaned_meta(&self, symbol: &str) -> Option<SeriesMeta> {
        self.read_meta("cleaned", symbol)
    }

    // ── Forecast tree ───────────────────────────────────────────────

    /// Replace a symbol's forecast series wholesale.
    ///
    /// `source` records the model that produced the forecast.
    pub fn replace_forecast(
        &self,
        symbol: &str,
        points: &[ForecastPoint],
        source: &str,
    ) -> Result<(), StoreError> {
        if points.is_empty() {
            return Err(StoreError::EmptyWrite {
                symbol: symbol.to_string(),
            });
        }

        let sym_dir = self.symbol_dir("forecast", symbol);
        fs::create_dir_all(&sym_dir)
            .map_err(|e| StoreError::Io(format!("failed to create dir: {e}")))?;

        let df = forecast_to_dataframe(points)?;
        write_parquet_atomic(&df, &sym_dir.join("forecast.parquet"))?;
        self.write_meta("forecast", symbol, points, source, |p| p.date)?;

        Ok(())
    }

    /// Load a symbol's forecast series, sorted by date ascending.
    pub fn load_forecast(&self, symbol: &str) -> Result<Vec<ForecastPoint>, StoreError> {
        let path = self.symbol_dir("forecast", symbol).join("forecast.parquet");
        if !path.exists() {
            return Err(StoreError::NoSeries {
                symbol: symbol.to_string(),
            });
        }

        let mut points = match load_and_validate_forecast(&path) {
            Ok(points) => points,
            Err(e) => {
                quarantine(&path, &e);
                return Err(e);
            }
        };

        points.sort_by_key(|p| p.date);
        Ok(points)
    }

    pub fn forecast_meta(&self, symbol: &str) -> Option<SeriesMeta> {
        self.read_meta("forecast", symbol)
    }

    // ── Shared helpers ──────────────────────────────────────────────

    fn tree_symbols(&self, tree: &str) -> Result<Vec<String>, StoreError> {
        let tree_dir = self.data_dir.join(tree);
        if !tree_dir.exists() {
            return Ok(Vec::new());
        }

        let entries =
            fs::read_dir(&tree_dir).map_err(|e| StoreError::Io(format!("read dir: {e}")))?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::Io(format!("dir entry: {e}")))?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name();
            if let Some(symbol) = name.to_str().and_then(|n| n.strip_prefix("symbol=")) {
                symbols.push(symbol.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }

    fn write_meta<T, F>(
        &self,
        tree: &str,
        symbol: &str,
        rows: &[T],
        source: &str,
        date_of: F,
    ) -> Result<(), StoreError>
    where
        T: Serialize,
        F: Fn(&T) -> NaiveDate,
    {
        let first = rows.first().ok_or_else(|| StoreError::EmptyWrite {
            symbol: symbol.to_string(),
        })?;
        let last = rows.last().ok_or_else(|| StoreError::EmptyWrite {
            symbol: symbol.to_string(),
        })?;

        let meta = SeriesMeta {
            symbol: symbol.to_string(),
            start_date: date_of(first),
            end_date: date_of(last),
            row_count: rows.len(),
            data_hash: blake3::hash(
                &serde_json::to_vec(rows)
                    .map_err(|e| StoreError::Io(format!("hash serialization: {e}")))?,
            )
            .to_hex()
            .to_string(),
            source: source.to_string(),
            written_at: reference_now(),
        };

        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| StoreError::Io(format!("meta serialization: {e}")))?;

        let path = self.meta_path(tree, symbol);
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, meta_json)
            .map_err(|e| StoreError::Io(format!("meta write: {e}")))?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            StoreError::Io(format!("atomic rename failed: {e}"))
        })?;

        Ok(())
    }

    fn read_meta(&self, tree: &str, symbol: &str) -> Option<SeriesMeta> {
        let content = fs::read_to_string(self.meta_path(tree, symbol)).ok()?;
        serde_json::from_str(&content).ok()
    }
}

/// Quarantine a corrupt Parquet file so later reads skip it.
fn quarantine(path: &Path, err: &StoreError) {
    let target = path.with_extension("parquet.quarantined");
    warn!(path = %path.display(), error = %err, "quarantining corrupt store file");
    let _ = fs::rename(path, &target);
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn epoch_days(date: NaiveDate) -> i32 {
    (date - NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()).num_days() as i32
}

fn date_from_days(days: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap() + chrono::Duration::days(days as i64)
}

fn date_column(dates: Vec<i32>) -> Result<Column, StoreError> {
    Column::new("date".into(), dates)
        .cast(&DataType::Date)
        .map_err(|e| StoreError::Parquet(format!("date cast: {e}")))
}

fn bars_to_dataframe(bars: &[RawBar]) -> Result<DataFrame, StoreError> {
    let dates: Vec<i32> = bars.iter().map(|b| epoch_days(b.date)).collect();
    let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<u64> = bars.iter().map(|b| b.volume).collect();

    DataFrame::new(vec![
        date_column(dates)?,
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("volume".into(), volumes),
    ])
    .map_err(|e| StoreError::Parquet(format!("dataframe creation: {e}")))
}

fn points_to_dataframe(points: &[CleanedPoint]) -> Result<DataFrame, StoreError> {
    let dates: Vec<i32> = points.iter().map(|p| epoch_days(p.date)).collect();
    let closes: Vec<f64> = points.iter().map(|p| p.close).collect();

    DataFrame::new(vec![date_column(dates)?, Column::new("close".into(), closes)])
        .map_err(|e| StoreError::Parquet(format!("dataframe creation: {e}")))
}

fn forecast_to_dataframe(points: &[ForecastPoint]) -> Result<DataFrame, StoreError> {
    let dates: Vec<i32> = points.iter().map(|p| epoch_days(p.date)).collect();
    let yhats: Vec<f64> = points.iter().map(|p| p.yhat).collect();
    let lowers: Vec<f64> = points.iter().map(|p| p.yhat_lower).collect();
    let uppers: Vec<f64> = points.iter().map(|p| p.yhat_upper).collect();

    DataFrame::new(vec![
        date_column(dates)?,
        Column::new("yhat".into(), yhats),
        Column::new("yhat_lower".into(), lowers),
        Column::new("yhat_upper".into(), uppers),
    ])
    .map_err(|e| StoreError::Parquet(format!("dataframe creation: {e}")))
}

/// Write a DataFrame to a Parquet file atomically (.tmp then rename).
fn write_parquet_atomic(df: &DataFrame, path: &Path) -> Result<(), StoreError> {
    let tmp_path = path.with_extension("parquet.tmp");

    let file = fs::File::create(&tmp_path)
        .map_err(|e| StoreError::Parquet(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|e| StoreError::Parquet(format!("write parquet: {e}")))?;

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        StoreError::Io(format!("atomic rename failed: {e}"))
    })?;

    Ok(())
}

fn read_parquet(path: &Path, expected_cols: &[&str]) -> Result<DataFrame, StoreError> {
    let file = fs::File::open(path).map_err(|e| StoreError::Parquet(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| StoreError::Parquet(format!("read: {e}")))?;

    if df.height() == 0 {
        return Err(StoreError::Validation("empty parquet file".into()));
    }

    for col_name in expected_cols {
        if df.column(col_name).is_err() {
            return Err(StoreError::Validation(format!(
                "missing column '{col_name}'"
            )));
        }
    }

    Ok(df)
}

fn date_chunked(df: &DataFrame) -> Result<Vec<NaiveDate>, StoreError> {
    let ca = df
        .column("date")
        .map_err(|e| StoreError::Parquet(format!("column read: {e}")))?
        .date()
        .map_err(|e| StoreError::Parquet(format!("date column type: {e}")))?;

    let mut dates = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let days = ca
            .get(i)
            .ok_or_else(|| StoreError::Parquet(format!("null date at row {i}")))?;
        dates.push(date_from_days(days));
    }
    Ok(dates)
}

fn f64_values(df: &DataFrame, name: &str) -> Result<Vec<f64>, StoreError> {
    let ca = df
        .column(name)
        .map_err(|e| StoreError::Parquet(format!("column read: {e}")))?
        .f64()
        .map_err(|e| StoreError::Parquet(format!("{name} column type: {e}")))?;
    Ok((0..df.height()).map(|i| ca.get(i).unwrap_or(f64::NAN)).collect())
}

fn load_and_validate_bars(path: &Path) -> Result<Vec<RawBar>, StoreError> {
    let df = read_parquet(path, &["date", "open", "high", "low", "close", "volume"])?;

    let dates = date_chunked(&df)?;
    let opens = f64_values(&df, "open")?;
    let highs = f64_values(&df, "high")?;
    let lows = f64_values(&df, "low")?;
    let closes = f64_values(&df, "close")?;
    let vol_ca = df
        .column("volume")
        .map_err(|e| StoreError::Parquet(format!("column read: {e}")))?
        .u64()
        .map_err(|e| StoreError::Parquet(format!("volume column type: {e}")))?;

    let mut bars = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        bars.push(RawBar {
            date: dates[i],
            open: opens[i],
            high: highs[i],
            low: lows[i],
            close: closes[i],
            volume: vol_ca.get(i).unwrap_or(0),
        });
    }

    Ok(bars)
}

fn load_and_validate_points(path: &Path) -> Result<Vec<CleanedPoint>, StoreError> {
    let df = read_parquet(path, &["date", "close"])?;

    let dates = date_chunked(&df)?;
    let closes = f64_values(&df, "close")?;

    Ok(dates
        .into_iter()
        .zip(closes)
        .map(|(date, close)| CleanedPoint { date, close })
        .collect())
}

fn load_and_validate_forecast(path: &Path) -> Result<Vec<ForecastPoint>, StoreError> {
    let df = read_parquet(path, &["date", "yhat", "yhat_lower", "yhat_upper"])?;

    let dates = date_chunked(&df)?;
    let yhats = f64_values(&df, "yhat")?;
    let lowers = f64_values(&df, "yhat_lower")?;
    let uppers = f64_values(&df, "yhat_upper")?;

    let mut points = Vec::with_capacity(dates.len());
    for i in 0..dates.len() {
        points.push(ForecastPoint {
            date: dates[i],
            yhat: yhats[i],
            yhat_lower: lowers[i],
            yhat_upper: uppers[i],
        });
    }

    Ok(points)
}
