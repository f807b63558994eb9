//! Parser: raw artifacts → parsed artifacts.

use stockpipe_core::storage::ObjectStore;
use stockpipe_core::transform::flatten;
use stockpipe_core::PipelineConfig;

use super::{missing_artifact, SkipReason, Stage, StageError, StageReport, SymbolOutcome};

/// Flatten every symbol's raw artifact into `parsed_{SYMBOL}_data.json`.
///
/// A payload without the time-series key still produces a parsed artifact,
/// with zero records. A payload whose nesting is not the expected shape
/// produces nothing and the symbol is skipped.
pub fn parse(config: &PipelineConfig, store: &dyn ObjectStore) -> Result<StageReport, StageError> {
    tracing::info!(symbols = config.symbols.len(), "parse started");

    let mut report = StageReport::new(Stage::Parse);
    for symbol in &config.symbols {
        let outcome = match parse_symbol(config, store, symbol) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(symbol = %symbol, error = %e, "parse failed");
                return Err(e);
            }
        };
        report.push(symbol, outcome);
    }

    tracing::info!(
        parsed = report.succeeded(),
        skipped = report.skipped(),
        "parse finished"
    );
    Ok(report)
}

fn parse_symbol(
    config: &PipelineConfig,
    store: &dyn ObjectStore,
    symbol: &str,
) -> Result<SymbolOutcome, StageError> {
    let raw_key = PipelineConfig::raw_key(symbol);
    let raw = match store.get(&config.bucket, &raw_key) {
        Ok(bytes) => bytes,
        Err(e) if e.is_not_found() => {
            return missing_artifact(config.fail_on_missing_artifact, symbol, raw_key)
        }
        Err(e) => {
            return Err(StageError::Storage {
                symbol: symbol.to_string(),
                source: e,
            })
        }
    };

    let payload: serde_json::Value =
        serde_json::from_slice(&raw).map_err(|e| StageError::CorruptArtifact {
            symbol: symbol.to_string(),
            key: raw_key.clone(),
            detail: e.to_string(),
        })?;

    let flattened = match flatten(symbol, &payload) {
        Ok(flattened) => flattened,
        Err(e) => {
            tracing::error!(symbol, error = %e, "raw payload has unexpected shape, skipping symbol");
            return Ok(SymbolOutcome::Skipped(SkipReason::Malformed(e.to_string())));
        }
    };
    if let Some(notice) = &flattened.notice {
        tracing::warn!(symbol, notice = %notice, "raw payload has no daily series");
    }

    let bytes = serde_json::to_vec(&flattened.records).map_err(|e| StageError::Encode {
        symbol: symbol.to_string(),
        detail: e.to_string(),
    })?;
    let key = PipelineConfig::parsed_key(symbol);
    store
        .put(&config.bucket, &key, &bytes)
        .map_err(|e| StageError::Storage {
            symbol: symbol.to_string(),
            source: e,
        })?;

    let records = flattened.records.len();
    tracing::info!(symbol, key = %key, records, "staged parsed records");
    Ok(SymbolOutcome::Parsed { key, records })
}
