//! Run configuration for the pipeline and the candle snapshot endpoint.
//!
//! Loaded from a TOML file; every field has a default so a partial file
//! (or no file at all) yields a usable configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::warehouse::TableRef;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Explicit configuration passed into every stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Tracked ticker symbols, processed in this order by every stage.
    pub symbols: Vec<String>,
    /// Staging bucket holding raw and parsed artifacts.
    pub bucket: String,
    pub project: String,
    pub dataset: String,
    /// Name of the cross-symbol table rebuilt by the unifier.
    pub unified_table: String,
    pub storage_root: PathBuf,
    pub warehouse_root: PathBuf,
    pub history_path: PathBuf,
    /// Treat a missing upstream artifact as fatal instead of skipping the symbol.
    pub fail_on_missing_artifact: bool,
    pub alphavantage: AlphaVantageConfig,
    pub finnhub: FinnhubConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlphaVantageConfig {
    pub base_url: String,
    pub function: String,
    pub api_key_secret: String,
    /// Request timeout. `None` leaves the transport default in place.
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FinnhubConfig {
    pub base_url: String,
    pub symbol: String,
    pub resolution: String,
    pub from: i64,
    pub to: i64,
    pub bucket: String,
    pub api_key_secret: String,
    pub db_token_secret: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            symbols: ["AAPL", "NFLX", "MSFT", "NVDA", "AMZN"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            bucket: "finnhub-financial-data".into(),
            project: "finnhub-pipeline-ba882".into(),
            dataset: "financial_data".into(),
            unified_table: "all_stocks_prices".into(),
            storage_root: PathBuf::from("staging"),
            warehouse_root: PathBuf::from("warehouse"),
            history_path: PathBuf::from("runs.jsonl"),
            fail_on_missing_artifact: false,
            alphavantage: AlphaVantageConfig::default(),
            finnhub: FinnhubConfig::default(),
        }
    }
}

impl Default for AlphaVantageConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.alphavantage.co/query".into(),
            function: "TIME_SERIES_DAILY".into(),
            api_key_secret:
                "projects/finnhub-pipeline-ba882/secrets/alphavantage-api-key/versions/latest"
                    .into(),
            timeout_secs: None,
        }
    }
}

impl Default for FinnhubConfig {
    fn default() -> Self {
        Self {
            base_url: "https://finnhub.io/api/v1/stock/candle".into(),
            symbol: "AAPL".into(),
            resolution: "D".into(),
            from: 1_672_531_200,
            to: 1_704_067_200,
            bucket: "financial-pipeline-group-6-bucket".into(),
            api_key_secret:
                "projects/financial-pipeline-group-6/secrets/FINNHUB_API_KEY/versions/latest"
                    .into(),
            db_token_secret: "projects/financial-pipeline-group-6/secrets/mother_db/versions/latest"
                .into(),
        }
    }
}

impl PipelineConfig {
    /// Load and validate a configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbols.is_empty() {
            return Err(ConfigError::Invalid("symbol list is empty".into()));
        }
        let mut seen = HashSet::new();
        let mut tables = HashSet::new();
        for symbol in &self.symbols {
            let well_formed = !symbol.is_empty()
                && symbol
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
            if !well_formed {
                return Err(ConfigError::Invalid(format!("malformed symbol '{symbol}'")));
            }
            if !seen.insert(symbol.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate symbol '{symbol}'")));
            }
            // Distinct symbols can still collapse onto one table name.
            let table = self.symbol_table(symbol).table;
            if !tables.insert(table.clone()) {
                return Err(ConfigError::Invalid(format!(
                    "symbol '{symbol}' maps to table '{table}' already used by another symbol"
                )));
            }
        }
        for (name, value) in [
            ("bucket", &self.bucket),
            ("project", &self.project),
            ("dataset", &self.dataset),
            ("unified_table", &self.unified_table),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{name} is empty")));
            }
        }
        Ok(())
    }

    /// Object key of the raw provider payload for a symbol.
    pub fn raw_key(symbol: &str) -> String {
        format!("raw_{symbol}_data.json")
    }

    /// Object key of the parsed record list for a symbol.
    pub fn parsed_key(symbol: &str) -> String {
        format!("parsed_{symbol}_data.json")
    }

    /// `{project}.{dataset}.{symbol_lower}_prices`
    pub fn symbol_table(&self, symbol: &str) -> TableRef {
        let table = format!("{}_prices", symbol.to_lowercase().replace(['.', '-'], "_"));
        TableRef::new(&self.project, &self.dataset, table)
    }

    pub fn symbol_tables(&self) -> Vec<TableRef> {
        self.symbols.iter().map(|s| self.symbol_table(s)).collect()
    }

    pub fn unified_table_ref(&self) -> TableRef {
        TableRef::new(&self.project, &self.dataset, &self.unified_table)
    }
}
