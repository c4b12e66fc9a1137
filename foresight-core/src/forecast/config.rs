//! Typed forecast model configuration.
//!
//! Every knob the model consumes is a named, validated field with an
//! explicit default. The defaults describe an additive model with
//! custom monthly/quarterly/weekly/yearly seasonality terms and the US
//! holiday calendar.

use super::holidays::{self, Holiday};
use serde::{Deserialize, Serialize};

/// Trend growth mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthMode {
    Linear,
    Logistic,
    Flat,
}

/// How seasonality components combine with the trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonalityMode {
    Additive,
    Multiplicative,
}

/// One custom seasonality component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalityTerm {
    pub name: String,
    pub period_days: f64,
    pub fourier_order: u32,
    /// Overrides `seasonality_prior_scale` when set.
    #[serde(default)]
    pub prior_scale: Option<f64>,
}

/// Forecast model configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub growth: GrowthMode,
    pub seasonality_mode: SeasonalityMode,
    pub n_changepoints: u32,
    /// Fraction of history in which changepoints may be placed.
    pub changepoint_range: f64,
    pub changepoint_prior_scale: f64,
    pub seasonality_prior_scale: f64,
    pub holidays_prior_scale: f64,
    /// Coverage of the uncertainty band, e.g. 0.90 for a 90% interval.
    pub interval_width: f64,
    pub uncertainty_samples: u32,
    pub mcmc_samples: u32,
    pub seasonalities: Vec<SeasonalityTerm>,
    pub holidays: Vec<Holiday>,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            growth: GrowthMode::Linear,
            seasonality_mode: SeasonalityMode::Additive,
            n_changepoints: 25,
            changepoint_range: 0.90,
            changepoint_prior_scale: 0.20,
            seasonality_prior_scale: 15.0,
            holidays_prior_scale: 20.0,
            interval_width: 0.90,
            uncertainty_samples: 1000,
            mcmc_samples: 0,
            seasonalities: vec![
                SeasonalityTerm {
                    name: "monthly".into(),
                    period_days: 30.5,
                    fourier_order: 12,
                    prior_scale: None,
                },
                SeasonalityTerm {
                    name: "quarterly".into(),
                    period_days: 365.25 / 4.0,
                    fourier_order: 5,
                    prior_scale: Some(15.0),
                },
                SeasonalityTerm {
                    name: "weekly".into(),
                    period_days: 7.0,
                    fourier_order: 20,
                    prior_scale: None,
                },
                SeasonalityTerm {
                    name: "yearly".into(),
                    period_days: 365.25,
                    fourier_order: 20,
                    prior_scale: None,
                },
            ],
            holidays: holidays::default_calendar(),
        }
    }
}

impl ForecastConfig {
    /// Check field ranges. Returns the first violation found.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0 < self.changepoint_range && self.changepoint_range <= 1.0) {
            return Err(format!(
                "changepoint_range must be in (0, 1], got {}",
                self.changepoint_range
            ));
        }
        if !(0.0 < self.interval_width && self.interval_width < 1.0) {
            return Err(format!(
                "interval_width must be in (0, 1), got {}",
                self.interval_width
            ));
        }
        for (field, value) in [
            ("changepoint_prior_scale", self.changepoint_prior_scale),
            ("seasonality_prior_scale", self.seasonality_prior_scale),
            ("holidays_prior_scale", self.holidays_prior_scale),
        ] {
            if value <= 0.0 {
                return Err(format!("{field} must be positive, got {value}"));
            }
        }
        for term in &self.seasonalities {
            if term.name.is_empty() {
                return Err("seasonality term with empty name".into());
            }
            if term.period_days <= 0.0 {
                return Err(format!(
                    "seasonality '{}' period must be positive, got {}",
                    term.name, term.period_days
                ));
            }
            if term.fourier_order == 0 {
                return Err(format!("seasonality '{}' fourier_order must be >= 1", term.name));
            }
            if let Some(scale) = term.prior_scale {
                if scale <= 0.0 {
                    return Err(format!(
                        "seasonality '{}' prior_scale must be positive, got {scale}",
                        term.name
                    ));
                }
            }
        }
        for holiday in &self.holidays {
            if holiday.lower_window > 0 || holiday.upper_window < 0 {
                return Err(format!(
                    "holiday '{}' windows must satisfy lower <= 0 <= upper",
                    holiday.name
                ));
            }
        }
        Ok(())
    }
}
