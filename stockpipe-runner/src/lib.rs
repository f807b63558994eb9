//! Stockpipe Runner: the pipeline stages and what drives them.
//!
//! This crate builds on `stockpipe-core` to provide:
//! - The four stages (extract, parse, load, unify) with per-symbol outcomes
//! - The pipeline that chains them and tracks run state
//! - JSONL run history
//! - The candle snapshot endpoint

pub mod history;
pub mod ids;
pub mod pipeline;
pub mod snapshot;
pub mod stages;

pub use history::{FinalState, RunHistory, RunRecord, StageSummary};
pub use ids::job_id;
pub use pipeline::{Pipeline, PipelineError, PipelineState, RunReport};
pub use snapshot::{CandleSnapshot, EndpointResponse};
pub use stages::{SkipReason, Stage, StageError, StageReport, SymbolOutcome, SymbolReport};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn reports_are_send_sync() {
        assert_send::<StageReport>();
        assert_sync::<StageReport>();
        assert_send::<RunRecord>();
        assert_sync::<RunRecord>();
    }

    #[test]
    fn errors_are_send_sync() {
        assert_send::<StageError>();
        assert_sync::<StageError>();
        assert_send::<PipelineError>();
    }
}
