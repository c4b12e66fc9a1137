//! Foresight Pipeline — stage orchestration for price ingestion and
//! forecast evaluation.
//!
//! This crate builds on `foresight-core` to provide:
//! - Watermark-driven incremental collection over a bounded worker pool
//! - Wholesale re-cleaning of raw series into dense daily data
//! - Held-out forecast evaluation with per-entity metrics
//! - Cross-entity aggregation and artifact export
//! - Typed TOML pipeline configuration

pub mod aggregate;
pub mod artifacts;
pub mod clean;
pub mod collect;
pub mod config;
pub mod evaluate;
pub mod metrics;
pub mod progress;
pub mod run;

pub use aggregate::{aggregate, AggregateSummary};
pub use artifacts::{load_summary, write_evaluation_artifacts, ResultsArtifact, SummaryArtifact};
pub use clean::{run_clean, CleanError, CleanSummary};
pub use collect::{collection_window, run_collect, CollectError, CollectSummary};
pub use config::{
    CleaningConfig, CollectionConfig, ConfigError, EvaluationConfig, PipelineConfig, StorageConfig,
};
pub use evaluate::{evaluate_entity, run_evaluate, EvalError, EvalSummary, EvaluationResult};
pub use metrics::{annualized_sharpe, EntityMetrics};
pub use progress::CompletionCounter;
pub use run::{reference_now, run_pipeline, PipelineError, PipelineReport};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_is_send_sync() {
        assert_send::<PipelineConfig>();
        assert_sync::<PipelineConfig>();
    }

    #[test]
    fn summaries_are_send_sync() {
        assert_send::<CollectSummary>();
        assert_sync::<CollectSummary>();
        assert_send::<CleanSummary>();
        assert_sync::<CleanSummary>();
        assert_send::<EvalSummary>();
        assert_sync::<EvalSummary>();
    }

    #[test]
    fn result_types_are_send_sync() {
        assert_send::<EvaluationResult>();
        assert_sync::<EvaluationResult>();
        assert_send::<EntityMetrics>();
        assert_sync::<EntityMetrics>();
        assert_send::<AggregateSummary>();
        assert_sync::<AggregateSummary>();
    }

    #[test]
    fn completion_counter_is_send_sync() {
        assert_send::<CompletionCounter>();
        assert_sync::<CompletionCounter>();
    }

    #[test]
    fn errors_are_send_sync() {
        assert_send::<CollectError>();
        assert_sync::<CollectError>();
        assert_send::<CleanError>();
        assert_sync::<CleanError>();
        assert_send::<EvalError>();
        assert_sync::<EvalError>();
        assert_send::<PipelineError>();
        assert_sync::<PipelineError>();
    }
}
