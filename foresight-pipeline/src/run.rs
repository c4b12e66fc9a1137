//! End-to-end pipeline orchestration: collect, clean, evaluate, in order.

use crate::clean::{run_clean, CleanError, CleanSummary};
use crate::collect::{run_collect, CollectError, CollectSummary};
use crate::config::PipelineConfig;
use crate::evaluate::{run_evaluate, EvalError, EvalSummary};
use chrono::NaiveDateTime;
use foresight_core::data::BarProvider;
use foresight_core::forecast::Forecaster;
use std::path::Path;
use thiserror::Error;
use tracing::info;

pub use foresight_core::data::reference_now;

/// A stage-level fatal failure. Per-entity failures live in the
/// stage summaries, not here.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("collection failed: {0}")]
    Collect(#[from] CollectError),

    #[error("cleaning failed: {0}")]
    Clean(#[from] CleanError),

    #[error("evaluation failed: {0}")]
    Evaluate(#[from] EvalError),
}

/// Summaries of all three stages of one pipeline run.
#[derive(Debug)]
pub struct PipelineReport {
    pub collect: CollectSummary,
    pub clean: CleanSummary,
    pub evaluate: EvalSummary,
}

/// Run collect, clean, and evaluate in sequence.
///
/// All three stages share one reference instant so they agree on the
/// calendar day. Halts on stage-fatal errors only; per-entity failures
/// are carried through in the report.
pub fn run_pipeline(
    config: &PipelineConfig,
    base_dir: &Path,
    provider: &dyn BarProvider,
    model: &dyn Forecaster,
    now: NaiveDateTime,
) -> Result<PipelineReport, PipelineError> {
    info!(now = %now, "pipeline run starting");

    let collect = run_collect(config, base_dir, provider, now)?;
    let clean = run_clean(config, now)?;
    let evaluate = run_evaluate(config, model, now)?;

    info!(
        collected = collect.stored,
        cleaned = clean.cleaned,
        evaluated = evaluate.succeeded(),
        "pipeline run finished"
    );

    Ok(PipelineReport {
        collect,
        clean,
        evaluate,
    })
}
