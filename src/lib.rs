//! Dataset ingestion: load a raw tabular file, profile its schema, and record it in a
//! JSON catalog keyed by dataset name.

pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod logging;
pub mod pipeline;

pub use config::PipelineConfig;
pub use error::{IngestError, Result};
pub use pipeline::{ingest, IngestReport};
