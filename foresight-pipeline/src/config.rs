//! Pipeline configuration.
//!
//! One TOML file drives all three stages. Every field has a default, so
//! a missing file or an empty table still yields a runnable config.
//! Dates are written as quoted ISO strings (`epoch_start = "1999-01-01"`).

use chrono::NaiveDate;
use foresight_core::forecast::ForecastConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Storage locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub artifacts_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            artifacts_dir: PathBuf::from("artifacts"),
        }
    }
}

/// Collection stage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Start of history when no watermark exists yet.
    pub epoch_start: NaiveDate,
    pub workers: usize,
    /// Universe TOML, resolved relative to the config file's directory.
    pub universe_file: Option<PathBuf>,
    /// Inline symbols, used when no universe file is configured.
    pub tickers: Vec<String>,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            epoch_start: NaiveDate::from_ymd_opt(1999, 1, 1).unwrap(),
            workers: 8,
            universe_file: None,
            tickers: Vec::new(),
        }
    }
}

/// Cleaning stage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    /// Fixed start of the canonical window; the end is always "now".
    pub window_start: NaiveDate,
    pub workers: usize,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            window_start: NaiveDate::from_ymd_opt(2018, 1, 1).unwrap(),
            workers: 5,
        }
    }
}

/// Evaluation stage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Held-out window length in days.
    pub horizon_days: u32,
    /// Annualized risk-free rate used in the Sharpe ratio.
    pub risk_free_rate: f64,
    pub workers: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            horizon_days: 60,
            risk_free_rate: 0.0525,
            workers: 2,
        }
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    pub storage: StorageConfig,
    pub collection: CollectionConfig,
    pub cleaning: CleaningConfig,
    pub evaluation: EvaluationConfig,
    pub forecast: ForecastConfig,
}

impl PipelineConfig {
    /// Read, parse, and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config = Self::from_toml(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a config from a TOML string without validating.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Check field ranges across all sections.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (stage, workers) in [
            ("collection", self.collection.workers),
            ("cleaning", self.cleaning.workers),
            ("evaluation", self.evaluation.workers),
        ] {
            if workers == 0 {
                return Err(ConfigError::Invalid(format!(
                    "{stage}.workers must be at least 1"
                )));
            }
        }
        if self.evaluation.horizon_days == 0 {
            return Err(ConfigError::Invalid(
                "evaluation.horizon_days must be at least 1".into(),
            ));
        }
        if !self.evaluation.risk_free_rate.is_finite() || self.evaluation.risk_free_rate < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "evaluation.risk_free_rate must be a non-negative number, got {}",
                self.evaluation.risk_free_rate
            )));
        }
        self.forecast
            .validate()
            .map_err(|msg| ConfigError::Invalid(format!("forecast: {msg}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.collection.workers, 8);
        assert_eq!(config.cleaning.workers, 5);
        assert_eq!(config.evaluation.horizon_days, 60);
        assert!((config.evaluation.risk_free_rate - 0.0525).abs() < 1e-12);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = PipelineConfig::from_toml(
            r#"
            [evaluation]
            horizon_days = 30

            [collection]
            tickers = ["SPY", "QQQ"]
            "#,
        )
        .unwrap();

        assert_eq!(config.evaluation.horizon_days, 30);
        assert_eq!(config.evaluation.workers, 2);
        assert_eq!(config.collection.tickers, vec!["SPY", "QQQ"]);
        assert_eq!(
            config.collection.epoch_start,
            NaiveDate::from_ymd_opt(1999, 1, 1).unwrap()
        );
    }

    #[test]
    fn quoted_dates_parse() {
        let config = PipelineConfig::from_toml(
            r#"
            [cleaning]
            window_start = "2020-06-01"
            "#,
        )
        .unwrap();

        assert_eq!(
            config.cleaning.window_start,
            NaiveDate::from_ymd_opt(2020, 6, 1).unwrap()
        );
    }

    #[test]
    fn zero_workers_rejected() {
        let mut config = PipelineConfig::default();
        config.cleaning.workers = 0;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn forecast_errors_carry_section_prefix() {
        let mut config = PipelineConfig::default();
        config.forecast.interval_width = 2.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("forecast:"));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = PipelineConfig::load(Path::new("/nonexistent/foresight.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
