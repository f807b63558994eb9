//! Market data providers.
//!
//! Two independent providers sit behind traits so stages and the snapshot
//! endpoint can be driven by fixtures in tests:
//! - [`DailySeriesSource`]: daily time series per symbol (Alpha Vantage).
//! - [`CandleSource`]: candle snapshot for one symbol (Finnhub).
//!
//! Providers perform one request per call. There is no retry or backoff; a
//! failed request is reported and the caller decides what it means.

pub mod alphavantage;
pub mod finnhub;

use serde_json::Value;
use thiserror::Error;

pub use alphavantage::AlphaVantageClient;
pub use finnhub::FinnhubClient;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request to {provider} failed: {detail}")]
    Transport { provider: String, detail: String },

    #[error("{provider} returned a body that is not JSON: {detail}")]
    Decode { provider: String, detail: String },

    #[error("HTTP client setup failed: {0}")]
    Client(String),
}

/// Reply from a provider: the status code, and the decoded JSON body when the
/// status is a success.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    pub status: u16,
    pub body: Option<Value>,
}

impl HttpReply {
    pub fn ok(body: Value) -> Self {
        Self {
            status: 200,
            body: Some(body),
        }
    }

    pub fn status(status: u16) -> Self {
        Self { status, body: None }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Source of raw daily time series payloads.
pub trait DailySeriesSource: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch the daily series for one symbol.
    ///
    /// Any HTTP status is returned as `Ok`; only transport and body decoding
    /// failures are errors.
    fn fetch_daily(&self, symbol: &str, api_key: &str) -> Result<HttpReply, ProviderError>;
}

/// Parameters of a candle request.
#[derive(Debug, Clone, PartialEq)]
pub struct CandleRequest {
    pub symbol: String,
    pub resolution: String,
    pub from: i64,
    pub to: i64,
}

/// Source of candle payloads (`{s: "ok" | error, t: [...], ...}`).
pub trait CandleSource: Send + Sync {
    fn name(&self) -> &str;

    fn fetch_candles(&self, request: &CandleRequest, token: &str) -> Result<Value, ProviderError>;
}

pub(crate) fn build_client(
    timeout_secs: Option<u64>,
) -> Result<reqwest::blocking::Client, ProviderError> {
    let mut builder =
        reqwest::blocking::Client::builder().user_agent(concat!("stockpipe/", env!("CARGO_PKG_VERSION")));
    if let Some(secs) = timeout_secs {
        builder = builder.timeout(std::time::Duration::from_secs(secs));
    }
    builder
        .build()
        .map_err(|e| ProviderError::Client(e.to_string()))
}
