//! Stockpipe Core: configuration, collaborator seams and row transforms.
//!
//! This crate holds everything the pipeline stages are built from:
//! - Run configuration (symbol set, bucket, warehouse location)
//! - Collaborator seams: secret store, object store, data providers, warehouse
//! - Provider payload flattening into typed parsed records
//! - Row normalization (numeric coercion, symbol stamp, date de-duplication)

pub mod config;
pub mod provider;
pub mod secrets;
pub mod storage;
pub mod transform;
pub mod warehouse;

pub use config::{ConfigError, PipelineConfig};
