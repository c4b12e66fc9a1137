//! Foresight Core — ingestion, normalization, storage, and the forecast seam.
//!
//! This crate contains the data layer of the forecasting pipeline:
//! - Bar provider trait with Yahoo Finance and synthetic implementations
//! - Parquet-backed series store (raw, cleaned, forecast trees)
//! - Per-stage run watermarks
//! - Normalization engine (dedup, densify, weekend fill, interpolation)
//! - Universe resolution from TOML and symbol CSVs
//! - Forecast model trait, typed configuration, and a drift baseline

pub mod data;
pub mod forecast;
