//! Error handling for interchange operations.
//!
//! Provides error types with context for raw file parsing, schema
//! conformance, artifact writing, and version manifest handling.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InterchangeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed input in {path} at line {line}: {reason}")]
    MalformedInput {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Row does not conform to schema of {product}: {reason}")]
    SchemaDrift { product: String, reason: String },

    #[error("Temporary artifact already exists (another writer?): {path}")]
    TempFileExists { path: PathBuf },

    #[error("Worker failed while parsing {path}: {reason}")]
    WorkerFailed { path: PathBuf, reason: String },

    #[error("Processing cancelled")]
    Cancelled,

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl InterchangeError {
    /// Malformed input pointing at a 1-based line number
    pub fn malformed(path: impl Into<PathBuf>, line: usize, reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }

    pub fn schema_drift(product: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SchemaDrift {
            product: product.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, InterchangeError>;
