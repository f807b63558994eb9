//! Candle snapshot endpoint: one-shot fetch, staged under a job id.
//!
//! Response bodies:
//! - 200 `{num_entries, job_id, bucket_name, blob_name}`
//! - 500 `{error}` when the fetch or the upload fails
//!
//! A provider error payload (`s` other than `"ok"`) is logged and staged as-is.

use serde::Serialize;
use serde_json::{json, Value};

use stockpipe_core::config::FinnhubConfig;
use stockpipe_core::provider::{CandleRequest, CandleSource};
use stockpipe_core::secrets::{SecretError, SecretStore};
use stockpipe_core::storage::ObjectStore;

use crate::ids::job_id;

const BLOB_NAME: &str = "finnhub_data.json";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointResponse {
    pub status: u16,
    pub body: Value,
}

impl EndpointResponse {
    fn error(message: impl Into<String>) -> Self {
        Self {
            status: 500,
            body: json!({ "error": message.into() }),
        }
    }
}

pub struct CandleSnapshot<'a> {
    config: &'a FinnhubConfig,
    store: &'a dyn ObjectStore,
    source: &'a dyn CandleSource,
    api_key: String,
    db_token: String,
}

impl<'a> CandleSnapshot<'a> {
    /// Retrieves the provider key and the database token up front; either
    /// one missing fails construction.
    pub fn new(
        config: &'a FinnhubConfig,
        secrets: &dyn SecretStore,
        store: &'a dyn ObjectStore,
        source: &'a dyn CandleSource,
    ) -> Result<Self, SecretError> {
        let api_key = secrets.get_secret(&config.api_key_secret)?;
        let db_token = secrets.get_secret(&config.db_token_secret)?;
        tracing::debug!(provider = source.name(), "snapshot credentials retrieved");
        Ok(Self {
            config,
            store,
            source,
            api_key,
            db_token,
        })
    }

    /// Token for the downstream analytical database.
    pub fn db_token(&self) -> &str {
        &self.db_token
    }

    pub fn handle(&self) -> EndpointResponse {
        let job_id = job_id();
        let request = CandleRequest {
            symbol: self.config.symbol.clone(),
            resolution: self.config.resolution.clone(),
            from: self.config.from,
            to: self.config.to,
        };

        let data = match self.source.fetch_candles(&request, &self.api_key) {
            Ok(data) => data,
            Err(e) => {
                tracing::error!(symbol = %request.symbol, error = %e, "candle fetch failed");
                return EndpointResponse::error(e.to_string());
            }
        };

        let num_entries = data
            .get("t")
            .and_then(Value::as_array)
            .map_or(0, |t| t.len());
        if data.get("s").and_then(Value::as_str) == Some("ok") {
            tracing::info!(symbol = %request.symbol, records = num_entries, "candles fetched");
        } else {
            tracing::warn!(symbol = %request.symbol, payload = %data, "provider returned an error payload");
        }

        let bytes = match serde_json::to_vec(&data) {
            Ok(bytes) => bytes,
            Err(e) => return EndpointResponse::error(e.to_string()),
        };
        let blob_name = format!("jobs/{job_id}/{BLOB_NAME}");
        if let Err(e) = self.store.put(&self.config.bucket, &blob_name, &bytes) {
            tracing::error!(job_id = %job_id, error = %e, "snapshot upload failed");
            return EndpointResponse::error(e.to_string());
        }
        tracing::info!(bucket = %self.config.bucket, blob = %blob_name, "snapshot uploaded");

        EndpointResponse {
            status: 200,
            body: json!({
                "num_entries": num_entries,
                "job_id": job_id,
                "bucket_name": self.config.bucket,
                "blob_name": blob_name,
            }),
        }
    }
}
