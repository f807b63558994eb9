//! Warehouse row layout: column names, order and types of an appended batch.

use polars::prelude::*;

/// Column order of a warehouse row batch.
pub const WAREHOUSE_COLUMNS: [&str; 7] = ["symbol", "date", "open", "high", "low", "close", "volume"];

pub struct WarehouseSchema;

impl WarehouseSchema {
    /// Type of a warehouse column; `None` for names outside the layout.
    pub fn dtype(column: &str) -> Option<DataType> {
        match column {
            "symbol" | "date" => Some(DataType::String),
            "open" | "high" | "low" | "close" => Some(DataType::Float64),
            "volume" => Some(DataType::Int64),
            _ => None,
        }
    }

    pub fn schema() -> Schema {
        WAREHOUSE_COLUMNS
            .iter()
            .filter_map(|name| Self::dtype(name).map(|dt| Field::new((*name).into(), dt)))
            .collect()
    }

    /// Check that `df` has exactly the columns of [`Self::schema`], typed and ordered.
    pub fn validate(df: &DataFrame) -> Result<(), SchemaError> {
        let actual = df.schema();
        for (name, wanted) in Self::schema().iter() {
            let found = actual
                .get(name)
                .ok_or_else(|| SchemaError::MissingColumn(name.to_string()))?;
            if found != wanted {
                return Err(SchemaError::TypeMismatch {
                    column: name.to_string(),
                    expected: wanted.clone(),
                    actual: found.clone(),
                });
            }
        }

        let order: Vec<String> = df
            .get_column_names()
            .into_iter()
            .map(|n| n.to_string())
            .collect();
        if order != WAREHOUSE_COLUMNS {
            return Err(SchemaError::ColumnOrder(order));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("warehouse batch lacks column '{0}'")]
    MissingColumn(String),

    #[error("warehouse column '{column}' is {actual}, expected {expected}")]
    TypeMismatch {
        column: String,
        expected: DataType,
        actual: DataType,
    },

    #[error("warehouse columns out of order: {0:?}")]
    ColumnOrder(Vec<String>),
}
