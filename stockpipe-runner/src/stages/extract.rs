//! Extractor: provider → raw artifacts.

use stockpipe_core::provider::DailySeriesSource;
use stockpipe_core::secrets::SecretStore;
use stockpipe_core::storage::ObjectStore;
use stockpipe_core::PipelineConfig;

use super::{SkipReason, Stage, StageError, StageReport, SymbolOutcome};

/// Fetch the daily series for every configured symbol and stage each 200
/// reply verbatim as `raw_{SYMBOL}_data.json`.
///
/// The API key is retrieved once per call. Non-200 replies skip the symbol;
/// secret, transport and storage failures abort the stage.
pub fn extract(
    config: &PipelineConfig,
    secrets: &dyn SecretStore,
    source: &dyn DailySeriesSource,
    store: &dyn ObjectStore,
) -> Result<StageReport, StageError> {
    tracing::info!(provider = source.name(), symbols = config.symbols.len(), "extract started");

    let api_key = match secrets.get_secret(&config.alphavantage.api_key_secret) {
        Ok(key) => key,
        Err(e) => {
            tracing::error!(error = %e, "could not retrieve provider API key");
            return Err(e.into());
        }
    };

    let mut report = StageReport::new(Stage::Extract);
    for symbol in &config.symbols {
        let outcome = match extract_symbol(config, &api_key, source, store, symbol) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(symbol = %symbol, error = %e, "extract failed");
                return Err(e);
            }
        };
        report.push(symbol, outcome);
    }

    tracing::info!(
        staged = report.succeeded(),
        skipped = report.skipped(),
        "extract finished"
    );
    Ok(report)
}

fn extract_symbol(
    config: &PipelineConfig,
    api_key: &str,
    source: &dyn DailySeriesSource,
    store: &dyn ObjectStore,
    symbol: &str,
) -> Result<SymbolOutcome, StageError> {
    let reply = source
        .fetch_daily(symbol, api_key)
        .map_err(|e| StageError::Provider {
            symbol: symbol.to_string(),
            source: e,
        })?;

    if !reply.is_ok() {
        tracing::warn!(symbol, status = reply.status, "provider request failed, skipping symbol");
        return Ok(SymbolOutcome::Skipped(SkipReason::HttpStatus(reply.status)));
    }
    let Some(body) = reply.body else {
        tracing::warn!(symbol, "provider replied 200 without a body, skipping symbol");
        return Ok(SymbolOutcome::Skipped(SkipReason::Malformed(
            "empty response body".into(),
        )));
    };

    let bytes = serde_json::to_vec(&body).map_err(|e| StageError::Encode {
        symbol: symbol.to_string(),
        detail: e.to_string(),
    })?;
    let key = PipelineConfig::raw_key(symbol);
    store
        .put(&config.bucket, &key, &bytes)
        .map_err(|e| StageError::Storage {
            symbol: symbol.to_string(),
            source: e,
        })?;

    let digest = blake3::hash(&bytes).to_hex().to_string();
    tracing::info!(symbol, key = %key, bytes = bytes.len(), "staged raw payload");
    Ok(SymbolOutcome::Staged {
        key,
        bytes: bytes.len(),
        digest,
    })
}
