//! Analytical warehouse seam.
//!
//! Tables are addressed as `project.dataset.table`. The pipeline needs two
//! operations: append a row batch to a per-symbol table, and rebuild the
//! unified table as the `UNION ALL` of the per-symbol tables.

pub mod parquet_store;

use polars::prelude::{DataFrame, PolarsError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub use parquet_store::ParquetWarehouse;

#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("table {0} not found")]
    TableNotFound(TableRef),

    #[error("schema mismatch on {table}: expected {expected}, got {actual}")]
    SchemaMismatch {
        table: TableRef,
        expected: String,
        actual: String,
    },

    #[error("warehouse I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("warehouse frame error on {table}: {source}")]
    Frame { table: TableRef, source: PolarsError },
}

/// Fully qualified table reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableRef {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl TableRef {
    pub fn new(
        project: impl Into<String>,
        dataset: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            dataset: dataset.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

pub trait Warehouse: Send + Sync {
    /// Append rows to `table`, creating it on first load. Column types are
    /// taken from the batch. Returns the number of rows written.
    fn append(&self, table: &TableRef, batch: &DataFrame) -> Result<u64, WarehouseError>;

    /// Replace `target` with all rows of `sources`, concatenated in order,
    /// without de-duplication. Returns the row count of the new table.
    fn replace_with_union_all(
        &self,
        target: &TableRef,
        sources: &[TableRef],
    ) -> Result<u64, WarehouseError>;

    fn read_table(&self, table: &TableRef) -> Result<DataFrame, WarehouseError>;

    fn table_exists(&self, table: &TableRef) -> bool;
}

/// SQL equivalent of [`Warehouse::replace_with_union_all`].
pub fn union_all_statement(target: &TableRef, sources: &[TableRef]) -> String {
    let selects: Vec<String> = sources
        .iter()
        .map(|s| format!("SELECT * FROM `{s}`"))
        .collect();
    format!(
        "CREATE OR REPLACE TABLE `{target}` AS\n{}",
        selects.join("\nUNION ALL\n")
    )
}
