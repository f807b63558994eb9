//! Flattening of the provider's nested daily series into parsed records.
//!
//! Raw payload shape:
//!
//! ```json
//! { "Time Series (Daily)": { "2024-01-03": { "1. open": "184.22", ... }, ... } }
//! ```
//!
//! Entry order follows the document order of the payload; no sorting is applied.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Key holding the per-date mapping in a daily series payload.
pub const TIME_SERIES_KEY: &str = "Time Series (Daily)";

/// Keys the provider uses for throttling and error notices delivered with HTTP 200.
const NOTICE_KEYS: [&str; 3] = ["Error Message", "Note", "Information"];

/// Provider field labels and the canonical column each maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderField {
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl ProviderField {
    pub const ALL: [ProviderField; 5] = [
        ProviderField::Open,
        ProviderField::High,
        ProviderField::Low,
        ProviderField::Close,
        ProviderField::Volume,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ProviderField::Open => "1. open",
            ProviderField::High => "2. high",
            ProviderField::Low => "3. low",
            ProviderField::Close => "4. close",
            ProviderField::Volume => "5. volume",
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            ProviderField::Open => "open",
            ProviderField::High => "high",
            ProviderField::Low => "low",
            ProviderField::Close => "close",
            ProviderField::Volume => "volume",
        }
    }
}

/// One flat daily record. Values stay string-encoded until the loader coerces them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedRecord {
    pub symbol: String,
    pub date: String,
    pub open: Option<String>,
    pub high: Option<String>,
    pub low: Option<String>,
    pub close: Option<String>,
    pub volume: Option<String>,
}

impl ParsedRecord {
    fn set(&mut self, field: ProviderField, value: Option<String>) {
        match field {
            ProviderField::Open => self.open = value,
            ProviderField::High => self.high = value,
            ProviderField::Low => self.low = value,
            ProviderField::Close => self.close = value,
            ProviderField::Volume => self.volume = value,
        }
    }

    pub fn get(&self, field: ProviderField) -> Option<&str> {
        match field {
            ProviderField::Open => self.open.as_deref(),
            ProviderField::High => self.high.as_deref(),
            ProviderField::Low => self.low.as_deref(),
            ProviderField::Close => self.close.as_deref(),
            ProviderField::Volume => self.volume.as_deref(),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ShapeError {
    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("'Time Series (Daily)' is not an object")]
    SeriesNotAnObject,

    #[error("entry for {date} is not an object")]
    EntryNotAnObject { date: String },

    #[error("field '{label}' on {date} has unsupported value {value}")]
    BadFieldValue {
        date: String,
        label: &'static str,
        value: String,
    },
}

/// Result of flattening one payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Flattened {
    pub records: Vec<ParsedRecord>,
    /// Provider notice text when the series key is absent and the payload explains why.
    pub notice: Option<String>,
}

/// Flatten a raw payload for `symbol`.
///
/// A payload without the series key yields zero records, not an error.
pub fn flatten(symbol: &str, payload: &Value) -> Result<Flattened, ShapeError> {
    let root = payload.as_object().ok_or(ShapeError::NotAnObject)?;

    let series = match root.get(TIME_SERIES_KEY) {
        None => {
            return Ok(Flattened {
                records: Vec::new(),
                notice: provider_notice(root),
            })
        }
        Some(v) => v.as_object().ok_or(ShapeError::SeriesNotAnObject)?,
    };

    let mut records = Vec::with_capacity(series.len());
    for (date, entry) in series {
        let fields = entry
            .as_object()
            .ok_or_else(|| ShapeError::EntryNotAnObject { date: date.clone() })?;

        let mut record = ParsedRecord {
            symbol: symbol.to_string(),
            date: date.clone(),
            open: None,
            high: None,
            low: None,
            close: None,
            volume: None,
        };
        for field in ProviderField::ALL {
            record.set(field, field_value(date, field, fields)?);
        }
        records.push(record);
    }

    Ok(Flattened {
        records,
        notice: None,
    })
}

fn field_value(
    date: &str,
    field: ProviderField,
    fields: &Map<String, Value>,
) -> Result<Option<String>, ShapeError> {
    match fields.get(field.label()) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(ShapeError::BadFieldValue {
            date: date.to_string(),
            label: field.label(),
            value: other.to_string(),
        }),
    }
}

fn provider_notice(root: &Map<String, Value>) -> Option<String> {
    NOTICE_KEYS.iter().find_map(|key| {
        root.get(*key).map(|v| match v {
            Value::String(s) => format!("{key}: {s}"),
            other => format!("{key}: {other}"),
        })
    })
}
