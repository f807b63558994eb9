//! Alpha Vantage daily time series client.
//!
//! Issues `GET {base_url}?function=TIME_SERIES_DAILY&symbol={symbol}&apikey={key}`.
//! The response body is returned decoded but otherwise untouched; shape
//! interpretation happens in [`crate::transform::flatten`].

use super::{build_client, DailySeriesSource, HttpReply, ProviderError};
use crate::config::AlphaVantageConfig;
use serde_json::Value;

pub struct AlphaVantageClient {
    client: reqwest::blocking::Client,
    base_url: String,
    function: String,
}

impl AlphaVantageClient {
    pub fn new(config: &AlphaVantageConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            base_url: config.base_url.clone(),
            function: config.function.clone(),
        })
    }

    fn query<'a>(&'a self, symbol: &'a str, api_key: &'a str) -> [(&'static str, &'a str); 3] {
        [
            ("function", self.function.as_str()),
            ("symbol", symbol),
            ("apikey", api_key),
        ]
    }
}

impl DailySeriesSource for AlphaVantageClient {
    fn name(&self) -> &str {
        "alphavantage"
    }

    fn fetch_daily(&self, symbol: &str, api_key: &str) -> Result<HttpReply, ProviderError> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(&self.query(symbol, api_key))
            .send()
            .map_err(|e| ProviderError::Transport {
                provider: self.name().into(),
                // Strip the URL: it carries the API key in its query string.
                detail: e.without_url().to_string(),
            })?;

        let status = resp.status().as_u16();
        let text = resp.text().map_err(|e| ProviderError::Transport {
            provider: self.name().into(),
            detail: e.without_url().to_string(),
        })?;
        decode_reply(self.name(), symbol, status, &text)
    }
}

/// Map a status and raw body to a reply. Only a 200 body is decoded, and a
/// 200 body that is not JSON is an error.
fn decode_reply(
    provider: &str,
    symbol: &str,
    status: u16,
    text: &str,
) -> Result<HttpReply, ProviderError> {
    if status != 200 {
        return Ok(HttpReply::status(status));
    }
    let body: Value = serde_json::from_str(text).map_err(|e| ProviderError::Decode {
        provider: provider.into(),
        detail: format!("{symbol}: {e}"),
    })?;
    Ok(HttpReply::ok(body))
}
