//! The four pipeline stages and their per-symbol outcomes.
//!
//! Stages communicate only through named artifacts in staging storage and
//! through warehouse tables. Each stage processes symbols one at a time in
//! configuration order.
//!
//! Outcome policy, shared by all stages:
//! - data problems skip the symbol (non-200 provider reply, malformed
//!   payload shape, upstream artifact absent because the upstream stage
//!   skipped the symbol, empty batch);
//! - infrastructure problems (secrets, transport, storage I/O, warehouse)
//!   abort the stage with a [`StageError`].
//!
//! `fail_on_missing_artifact` turns the missing-artifact skip into an error.

pub mod extract;
pub mod load;
pub mod parse;
pub mod unify;

use polars::prelude::PolarsError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use stockpipe_core::provider::ProviderError;
use stockpipe_core::secrets::SecretError;
use stockpipe_core::storage::StorageError;
use stockpipe_core::transform::SchemaError;
use stockpipe_core::warehouse::{TableRef, WarehouseError};

pub use extract::extract;
pub use load::load;
pub use parse::parse;
pub use unify::unify;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extract,
    Parse,
    Load,
    Unify,
}

impl Stage {
    pub const ORDER: [Stage; 4] = [Stage::Extract, Stage::Parse, Stage::Load, Stage::Unify];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Extract => "extract",
            Stage::Parse => "parse",
            Stage::Load => "load",
            Stage::Unify => "unify",
        };
        f.write_str(name)
    }
}

/// Fatal stage failure. Aborts the remaining symbols and all later stages.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("secret retrieval failed: {0}")]
    Secret(#[from] SecretError),

    #[error("provider request for {symbol} failed: {source}")]
    Provider {
        symbol: String,
        source: ProviderError,
    },

    #[error("storage failure for {symbol}: {source}")]
    Storage {
        symbol: String,
        source: StorageError,
    },

    #[error("artifact {key} for {symbol} is missing")]
    MissingArtifact { symbol: String, key: String },

    #[error("artifact {key} for {symbol} is unreadable: {detail}")]
    CorruptArtifact {
        symbol: String,
        key: String,
        detail: String,
    },

    #[error("encoding artifact for {symbol} failed: {detail}")]
    Encode { symbol: String, detail: String },

    #[error("building rows for {symbol} failed: {source}")]
    Frame {
        symbol: String,
        source: PolarsError,
    },

    #[error("row batch for {symbol} does not match the warehouse schema: {source}")]
    Schema {
        symbol: String,
        source: SchemaError,
    },

    #[error("warehouse operation failed: {0}")]
    Warehouse(#[from] WarehouseError),
}

/// Why a symbol was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Provider replied with a non-200 status.
    HttpStatus(u16),
    /// The upstream artifact does not exist.
    MissingArtifact(String),
    /// The raw payload's nested structure is not the expected shape.
    Malformed(String),
    /// The parsed artifact holds no records.
    EmptyBatch,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::HttpStatus(status) => write!(f, "provider returned HTTP {status}"),
            SkipReason::MissingArtifact(key) => write!(f, "artifact {key} missing"),
            SkipReason::Malformed(detail) => write!(f, "malformed payload: {detail}"),
            SkipReason::EmptyBatch => f.write_str("no records to load"),
        }
    }
}

/// Result of processing one symbol in a stage.
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolOutcome {
    /// Raw payload written to staging.
    Staged {
        key: String,
        bytes: usize,
        digest: String,
    },
    /// Parsed artifact written to staging.
    Parsed { key: String, records: usize },
    /// Rows appended to the per-symbol table.
    Loaded {
        table: TableRef,
        rows: u64,
        duplicates_dropped: usize,
    },
    Skipped(SkipReason),
}

impl SymbolOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, SymbolOutcome::Skipped(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolReport {
    pub symbol: String,
    pub outcome: SymbolOutcome,
}

/// Everything a stage did on a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct StageReport {
    pub stage: Stage,
    pub outcomes: Vec<SymbolReport>,
    /// Row count of the rebuilt unified table (unify stage only).
    pub unified_rows: Option<u64>,
}

impl StageReport {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            outcomes: Vec::new(),
            unified_rows: None,
        }
    }

    pub fn push(&mut self, symbol: &str, outcome: SymbolOutcome) {
        self.outcomes.push(SymbolReport {
            symbol: symbol.to_string(),
            outcome,
        });
    }

    pub fn outcome(&self, symbol: &str) -> Option<&SymbolOutcome> {
        self.outcomes
            .iter()
            .find(|r| r.symbol == symbol)
            .map(|r| &r.outcome)
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|r| !r.outcome.is_skipped()).count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.iter().filter(|r| r.outcome.is_skipped()).count()
    }
}

/// Resolve an absent upstream artifact per configuration.
pub(crate) fn missing_artifact(
    fail: bool,
    symbol: &str,
    key: String,
) -> Result<SymbolOutcome, StageError> {
    if fail {
        return Err(StageError::MissingArtifact {
            symbol: symbol.to_string(),
            key,
        });
    }
    tracing::warn!(symbol, key = %key, "upstream artifact missing, skipping symbol");
    Ok(SymbolOutcome::Skipped(SkipReason::MissingArtifact(key)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_counts_skips() {
        let mut report = StageReport::new(Stage::Parse);
        report.push(
            "AAPL",
            SymbolOutcome::Parsed {
                key: "parsed_AAPL_data.json".into(),
                records: 2,
            },
        );
        report.push("NFLX", SymbolOutcome::Skipped(SkipReason::HttpStatus(404)));

        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.skipped(), 1);
        assert!(report.outcome("NFLX").unwrap().is_skipped());
        assert!(report.outcome("MSFT").is_none());
    }

    #[test]
    fn missing_artifact_policy() {
        let skipped = missing_artifact(false, "NFLX", "raw_NFLX_data.json".into()).unwrap();
        assert_eq!(
            skipped,
            SymbolOutcome::Skipped(SkipReason::MissingArtifact("raw_NFLX_data.json".into()))
        );

        let fatal = missing_artifact(true, "NFLX", "raw_NFLX_data.json".into());
        assert!(matches!(fatal, Err(StageError::MissingArtifact { .. })));
    }

    #[test]
    fn stage_order_is_fixed() {
        let names: Vec<String> = Stage::ORDER.iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["extract", "parse", "load", "unify"]);
    }
}
