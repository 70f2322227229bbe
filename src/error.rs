//! Error types for sleep-features

use thiserror::Error;

/// Errors that can occur while preparing features
#[derive(Debug, Error)]
pub enum PrepareError {
    #[error("Invalid phase: {0} (expected train, test or dev)")]
    InvalidPhase(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Time bucket {0} outside lookup domain [0, 239]")]
    LookupDomain(i64),

    #[error("Invalid period: {0} (must be positive)")]
    InvalidPeriod(u32),

    #[error("Malformed timestamp at row {row}: {value:?} ({reason})")]
    MalformedTimestamp {
        row: usize,
        value: String,
        reason: String,
    },

    #[error("Feature {0} is not produced by the standard schema")]
    FeatureUnavailable(String),

    #[error("Series id {0:?} cannot be used as a directory name")]
    InvalidSeriesId(String),

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Null value in column {column} at row {row}")]
    NullValue { column: String, row: usize },

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error at {path}: {source}")]
    IoAt {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Failed to write array: {0}")]
    Npy(#[from] ndarray_npy::WriteNpyError),
}

impl PrepareError {
    /// Attach the offending path to an I/O error
    pub fn io_at(path: &std::path::Path, source: std::io::Error) -> Self {
        PrepareError::IoAt {
            path: path.display().to_string(),
            source,
        }
    }

    /// Short name of the pipeline stage this error belongs to
    pub fn stage(&self) -> &'static str {
        match self {
            PrepareError::InvalidPhase(_)
            | PrepareError::Config(_)
            | PrepareError::InvalidPeriod(_) => "config",
            PrepareError::LookupDomain(_) => "assemble",
            PrepareError::MalformedTimestamp { .. }
            | PrepareError::MissingColumn(_)
            | PrepareError::NullValue { .. }
            | PrepareError::ParseError(_)
            | PrepareError::JsonError(_)
            | PrepareError::Arrow(_)
            | PrepareError::Parquet(_) => "load",
            PrepareError::Npy(_)
            | PrepareError::FeatureUnavailable(_)
            | PrepareError::InvalidSeriesId(_) => "export",
            PrepareError::Io(_) | PrepareError::IoAt { .. } => "io",
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, PrepareError>;
