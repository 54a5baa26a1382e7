//! Error handling for tag trajectory conversion.
//!
//! Fatal conditions for a single file conversion live here. Malformed lines,
//! unsplittable bin names and matchup misses are not errors at this level:
//! they are counted in the parse and matchup statistics and the conversion
//! carries on.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TagError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Input not found at path: {path}")]
    InputNotFound { path: PathBuf },

    #[error("Failed to load profile document {path}: {reason}")]
    ProfileLoad { path: PathBuf, reason: String },

    #[error(
        "Dimension overflow for '{variable}': {count} samples exceed the representable dimension length"
    )]
    DimensionOverflow { variable: String, count: usize },

    #[error("No location fixes found in file: {path}")]
    NoLocationData { path: PathBuf },

    #[error("No time series data found in file: {path}")]
    EmptyDataset { path: PathBuf },

    #[error("Writer failed for {path}: {reason}")]
    WriterFailed { path: PathBuf, reason: String },

    #[error("Conversion of {path} exceeded the {timeout:?} deadline")]
    Timeout { path: PathBuf, timeout: Duration },

    #[error("Conversion failed for file: {path} - {reason}")]
    ConversionFailed { path: PathBuf, reason: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl TagError {
    /// Wrap any writer-side failure with the output path it concerns
    pub fn writer(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self::WriterFailed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TagError>;
