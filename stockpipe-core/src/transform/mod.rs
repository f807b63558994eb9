//! Payload flattening and row normalization

pub mod flatten;
pub mod normalize;
pub mod schema;

pub use flatten::{flatten, Flattened, ParsedRecord, ProviderField, ShapeError, TIME_SERIES_KEY};
pub use normalize::{normalize, normalize_records, records_to_frame, NormalizedBatch};
pub use schema::{SchemaError, WarehouseSchema, WAREHOUSE_COLUMNS};
