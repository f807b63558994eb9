//! Loader: parsed artifacts → per-symbol warehouse tables.

use stockpipe_core::storage::ObjectStore;
use stockpipe_core::transform::{normalize_records, ParsedRecord, WarehouseSchema};
use stockpipe_core::warehouse::Warehouse;
use stockpipe_core::PipelineConfig;

use super::{missing_artifact, SkipReason, Stage, StageError, StageReport, SymbolOutcome};

/// Normalize every symbol's parsed records and append them to
/// `{project}.{dataset}.{symbol_lower}_prices`.
///
/// Duplicates are removed within the batch only. Rows already in the table
/// from earlier runs are not consulted, so reloading the same artifact
/// appends the same dates again.
pub fn load(
    config: &PipelineConfig,
    store: &dyn ObjectStore,
    warehouse: &dyn Warehouse,
) -> Result<StageReport, StageError> {
    tracing::info!(symbols = config.symbols.len(), "load started");

    let mut report = StageReport::new(Stage::Load);
    for symbol in &config.symbols {
        let outcome = match load_symbol(config, store, warehouse, symbol) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(symbol = %symbol, error = %e, "load failed");
                return Err(e);
            }
        };
        report.push(symbol, outcome);
    }

    tracing::info!(
        loaded = report.succeeded(),
        skipped = report.skipped(),
        "load finished"
    );
    Ok(report)
}

fn load_symbol(
    config: &PipelineConfig,
    store: &dyn ObjectStore,
    warehouse: &dyn Warehouse,
    symbol: &str,
) -> Result<SymbolOutcome, StageError> {
    let key = PipelineConfig::parsed_key(symbol);
    let bytes = match store.get(&config.bucket, &key) {
        Ok(bytes) => bytes,
        Err(e) if e.is_not_found() => {
            return missing_artifact(config.fail_on_missing_artifact, symbol, key)
        }
        Err(e) => {
            return Err(StageError::Storage {
                symbol: symbol.to_string(),
                source: e,
            })
        }
    };

    let records: Vec<ParsedRecord> =
        serde_json::from_slice(&bytes).map_err(|e| StageError::CorruptArtifact {
            symbol: symbol.to_string(),
            key: key.clone(),
            detail: e.to_string(),
        })?;
    if records.is_empty() {
        tracing::warn!(symbol, key = %key, "parsed artifact is empty, nothing to load");
        return Ok(SymbolOutcome::Skipped(SkipReason::EmptyBatch));
    }

    let batch = normalize_records(&records, symbol).map_err(|e| StageError::Frame {
        symbol: symbol.to_string(),
        source: e,
    })?;
    WarehouseSchema::validate(&batch.frame).map_err(|e| StageError::Schema {
        symbol: symbol.to_string(),
        source: e,
    })?;
    tracing::info!(
        symbol,
        rows = batch.rows(),
        duplicates_dropped = batch.duplicates_dropped(),
        "normalized batch"
    );

    let table = config.symbol_table(symbol);
    let rows = warehouse.append(&table, &batch.frame)?;
    tracing::info!(symbol, table = %table, rows, "appended rows");

    Ok(SymbolOutcome::Loaded {
        table,
        rows,
        duplicates_dropped: batch.duplicates_dropped(),
    })
}
