//! Universe configuration — the set of symbols a run operates on.
//!
//! A universe is a TOML file naming tickers inline and/or referencing
//! CSV files that carry a symbol column (index constituent lists are
//! usually distributed this way). Symbols are normalized for the data
//! provider: class shares written with a dot become dashed (BRK.B
//! becomes BRK-B).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from universe loading and resolution.
#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("read universe file: {0}")]
    Read(String),

    #[error("parse universe TOML: {0}")]
    Parse(String),

    #[error("read symbol CSV {path}: {reason}")]
    Csv { path: String, reason: String },

    #[error("symbol CSV {path} has no '{column}' column")]
    MissingColumn { path: String, column: String },

    #[error("universe resolves to zero symbols")]
    Empty,
}

/// The universe configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Universe {
    /// Symbols listed directly in the config.
    #[serde(default)]
    pub tickers: Vec<String>,

    /// CSV files to pull additional symbols from, relative to the
    /// universe file's directory unless absolute.
    #[serde(default)]
    pub csv_files: Vec<PathBuf>,

    /// Column holding symbols in the CSV files.
    #[serde(default = "default_symbol_column")]
    pub symbol_column: String,
}

fn default_symbol_column() -> String {
    "Symbol".to_string()
}

impl Universe {
    /// Load a universe from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, UniverseError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| UniverseError::Read(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parse a universe from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, UniverseError> {
        toml::from_str(content).map_err(|e| UniverseError::Parse(e.to_string()))
    }

    /// Build a universe from an explicit ticker list.
    pub fn from_tickers(tickers: Vec<String>) -> Self {
        Self {
            tickers,
            csv_files: Vec::new(),
            symbol_column: default_symbol_column(),
        }
    }

    /// A small default US equity universe for runs with no config.
    pub fn default_us() -> Self {
        let tickers = [
            "AAPL", "MSFT", "GOOGL", "AMZN", "NVDA", "META", "JPM", "V", "JNJ", "UNH", "XOM",
            "CVX", "WMT", "PG", "KO", "HD", "SPY", "QQQ", "IWM", "DIA",
        ];
        Self {
            tickers: tickers.iter().map(|t| t.to_string()).collect(),
            csv_files: Vec::new(),
            symbol_column: default_symbol_column(),
        }
    }

    /// Resolve the universe to a sorted, deduplicated symbol list.
    ///
    /// Relative CSV paths are joined onto `base_dir`.
    pub fn resolve(&self, base_dir: &Path) -> Result<Vec<String>, UniverseError> {
        let mut symbols: BTreeSet<String> = BTreeSet::new();

        for ticker in &self.tickers {
            let normalized = normalize_symbol(ticker);
            if !normalized.is_empty() {
                symbols.insert(normalized);
            }
        }

        for file in &self.csv_files {
            let path = if file.is_absolute() {
                file.clone()
            } else {
                base_dir.join(file)
            };
            self.read_symbol_csv(&path, &mut symbols)?;
        }

        if symbols.is_empty() {
            return Err(UniverseError::Empty);
        }

        Ok(symbols.into_iter().collect())
    }

    fn read_symbol_csv(
        &self,
        path: &Path,
        symbols: &mut BTreeSet<String>,
    ) -> Result<(), UniverseError> {
        let csv_err = |e: csv::Error| UniverseError::Csv {
            path: path.display().to_string(),
            reason: e.to_string(),
        };

        let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;

        let headers = reader.headers().map_err(csv_err)?;
        let column = headers
            .iter()
            .position(|h| h == self.symbol_column)
            .ok_or_else(|| UniverseError::MissingColumn {
                path: path.display().to_string(),
                column: self.symbol_column.clone(),
            })?;

        for record in reader.records() {
            let record = record.map_err(csv_err)?;
            if let Some(raw) = record.get(column) {
                let normalized = normalize_symbol(raw);
                if !normalized.is_empty() {
                    symbols.insert(normalized);
                }
            }
        }

        Ok(())
    }
}

/// Normalize a raw symbol for the data provider.
pub fn normalize_symbol(raw: &str) -> String {
    raw.trim().replace('.', "-")
}
