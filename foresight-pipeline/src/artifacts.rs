//! Evaluation artifacts — JSON and CSV reporting outputs.
//!
//! Each evaluation run writes three artifacts into the artifacts
//! directory, fully replacing the previous run's set:
//! - `metrics.csv` — one row per entity with its metric values
//! - `results.json` — the full per-entity result list
//! - `summary.json` — the cross-entity aggregate
//!
//! All JSON artifacts carry a `schema_version` field. Unknown versions
//! are rejected on load.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::aggregate::AggregateSummary;
use crate::config::PipelineConfig;
use crate::evaluate::EvaluationResult;

pub const SCHEMA_VERSION: u32 = 1;

/// Full per-entity result list as persisted in `results.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsArtifact {
    pub schema_version: u32,
    pub config_hash: String,
    pub results: Vec<EvaluationResult>,
}

/// Aggregate summary as persisted in `summary.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryArtifact {
    pub schema_version: u32,
    pub config_hash: String,
    pub aggregate: AggregateSummary,
}

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize the per-entity results to pretty JSON.
pub fn export_results_json(results: &[EvaluationResult], config_hash: &str) -> Result<String> {
    let artifact = ResultsArtifact {
        schema_version: SCHEMA_VERSION,
        config_hash: config_hash.to_string(),
        results: results.to_vec(),
    };
    serde_json::to_string_pretty(&artifact).context("failed to serialize results to JSON")
}

/// Serialize the aggregate summary to pretty JSON.
pub fn export_summary_json(summary: &AggregateSummary, config_hash: &str) -> Result<String> {
    let artifact = SummaryArtifact {
        schema_version: SCHEMA_VERSION,
        config_hash: config_hash.to_string(),
        aggregate: summary.clone(),
    };
    serde_json::to_string_pretty(&artifact).context("failed to serialize summary to JSON")
}

/// Load the aggregate summary back, rejecting unknown schema versions.
pub fn load_summary(artifacts_dir: &Path) -> Result<SummaryArtifact> {
    let path = artifacts_dir.join("summary.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let artifact: SummaryArtifact =
        serde_json::from_str(&json).context("failed to deserialize summary from JSON")?;
    if artifact.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            artifact.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(artifact)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export per-entity metrics as CSV.
///
/// Columns: symbol, status, mae, mse, rmse, sharpe, error. Metric cells
/// are empty for failed entities; the error cell is empty for successes.
pub fn export_metrics_csv(results: &[EvaluationResult]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record(["symbol", "status", "mae", "mse", "rmse", "sharpe", "error"])?;

    for r in results {
        match &r.metrics {
            Some(m) => wtr.write_record([
                &r.symbol,
                "ok",
                &format!("{:.6}", m.mae),
                &format!("{:.6}", m.mse),
                &format!("{:.6}", m.rmse),
                &format!("{:.6}", m.sharpe),
                "",
            ])?,
            None => wtr.write_record([
                r.symbol.as_str(),
                "failed",
                "",
                "",
                "",
                "",
                r.error.as_deref().unwrap_or(""),
            ])?,
        }
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Write the full artifact set for one evaluation run.
///
/// Replaces any artifacts from a previous run in place.
pub fn write_evaluation_artifacts(
    artifacts_dir: &Path,
    results: &[EvaluationResult],
    summary: &AggregateSummary,
    config: &PipelineConfig,
) -> Result<()> {
    std::fs::create_dir_all(artifacts_dir).with_context(|| {
        format!("failed to create artifacts dir: {}", artifacts_dir.display())
    })?;

    let hash = config_hash(config)?;

    let csv = export_metrics_csv(results)?;
    std::fs::write(artifacts_dir.join("metrics.csv"), &csv)?;

    let results_json = export_results_json(results, &hash)?;
    std::fs::write(artifacts_dir.join("results.json"), &results_json)?;

    let summary_json = export_summary_json(summary, &hash)?;
    std::fs::write(artifacts_dir.join("summary.json"), &summary_json)?;

    Ok(())
}

/// Content hash of the pipeline configuration that produced a run.
pub fn config_hash(config: &PipelineConfig) -> Result<String> {
    let canonical =
        serde_json::to_string(config).context("failed to serialize config for hashing")?;
    Ok(blake3::hash(canonical.as_bytes()).to_hex().to_string())
}
