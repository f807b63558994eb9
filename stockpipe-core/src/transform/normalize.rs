//! Parsed records → warehouse row batch.
//!
//! Prices are coerced to `Float64` and volume to `Int64`. Volume goes through
//! `Float64` first so float-formatted counts (`"1500000.0"`, `"1.5e6"`) keep
//! their value. Coercion is non-strict: a value that does not parse becomes null instead of failing
//! the batch. Rows are stamped with the symbol and reduced to the first
//! occurrence of each date, preserving input order.

use polars::prelude::*;

use super::flatten::ParsedRecord;
use super::schema::WAREHOUSE_COLUMNS;

/// A normalized batch ready for append.
#[derive(Debug, Clone)]
pub struct NormalizedBatch {
    pub frame: DataFrame,
    pub input_rows: usize,
}

impl NormalizedBatch {
    pub fn rows(&self) -> usize {
        self.frame.height()
    }

    pub fn duplicates_dropped(&self) -> usize {
        self.input_rows - self.rows()
    }
}

/// Build a string-typed frame from parsed records.
pub fn records_to_frame(records: &[ParsedRecord]) -> PolarsResult<DataFrame> {
    let symbols: Vec<&str> = records.iter().map(|r| r.symbol.as_str()).collect();
    let dates: Vec<&str> = records.iter().map(|r| r.date.as_str()).collect();
    let opens: Vec<Option<&str>> = records.iter().map(|r| r.open.as_deref()).collect();
    let highs: Vec<Option<&str>> = records.iter().map(|r| r.high.as_deref()).collect();
    let lows: Vec<Option<&str>> = records.iter().map(|r| r.low.as_deref()).collect();
    let closes: Vec<Option<&str>> = records.iter().map(|r| r.close.as_deref()).collect();
    let volumes: Vec<Option<&str>> = records.iter().map(|r| r.volume.as_deref()).collect();

    DataFrame::new(vec![
        Column::new("symbol".into(), symbols),
        Column::new("date".into(), dates),
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("volume".into(), volumes),
    ])
}

/// Coerce, stamp and deduplicate a string-typed frame.
pub fn normalize(df: DataFrame, symbol: &str) -> PolarsResult<DataFrame> {
    df.lazy()
        .with_columns([
            col("open").cast(DataType::Float64),
            col("high").cast(DataType::Float64),
            col("low").cast(DataType::Float64),
            col("close").cast(DataType::Float64),
            col("volume")
                .cast(DataType::Float64)
                .cast(DataType::Int64),
            lit(symbol).alias("symbol"),
        ])
        .unique_stable(Some(vec!["date".into()]), UniqueKeepStrategy::First)
        .select(WAREHOUSE_COLUMNS.iter().map(|c| col(*c)).collect::<Vec<_>>())
        .collect()
}

/// Full loader transform for one symbol's parsed records.
pub fn normalize_records(records: &[ParsedRecord], symbol: &str) -> PolarsResult<NormalizedBatch> {
    let frame = normalize(records_to_frame(records)?, symbol)?;
    Ok(NormalizedBatch {
        frame,
        input_rows: records.len(),
    })
}
