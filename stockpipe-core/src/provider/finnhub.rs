//! Finnhub candle client used by the snapshot endpoint.

use super::{build_client, CandleRequest, CandleSource, ProviderError};
use crate::config::FinnhubConfig;
use serde_json::Value;

pub struct FinnhubClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl FinnhubClient {
    pub fn new(config: &FinnhubConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client(None)?,
            base_url: config.base_url.clone(),
        })
    }
}

impl CandleSource for FinnhubClient {
    fn name(&self) -> &str {
        "finnhub"
    }

    /// The body is decoded regardless of status: Finnhub reports errors in
    /// the payload itself (`{"s": "no_data"}`, `{"error": "..."}`).
    fn fetch_candles(&self, request: &CandleRequest, token: &str) -> Result<Value, ProviderError> {
        let from = request.from.to_string();
        let to = request.to.to_string();
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("symbol", request.symbol.as_str()),
                ("resolution", request.resolution.as_str()),
                ("from", from.as_str()),
                ("to", to.as_str()),
                ("token", token),
            ])
            .send()
            .map_err(|e| ProviderError::Transport {
                provider: self.name().into(),
                detail: e.without_url().to_string(),
            })?;

        resp.json().map_err(|e| ProviderError::Decode {
            provider: self.name().into(),
            detail: e.without_url().to_string(),
        })
    }
}
