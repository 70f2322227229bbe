//! Sleep Features - offline feature preparation for accelerometer sleep series
//!
//! Turns a table of wrist accelerometer readings into per-series NumPy arrays
//! through a deterministic pipeline: timestamp parsing → normalization →
//! sort and partition by series → feature assembly → per-feature export.
//!
//! ## Modules
//!
//! - **Signals**: time-of-day lookup tables (Gaussian mixtures, cubic fit)
//! - **Encoder**: circular encoding of periodic time fields
//! - **Features**: per-series feature tables
//! - **Export**: one `.npy` file per feature per series

pub mod config;
pub mod encoder;
pub mod error;
pub mod export;
pub mod features;
pub mod normalizer;
pub mod pipeline;
pub mod schema;
pub mod signals;
pub mod types;

pub use config::{ConfigOverrides, DirConfig, Phase, PrepareConfig};
pub use error::{PrepareError, Result};
pub use export::{SeriesExport, SeriesExporter};
pub use features::FeatureAssembler;
pub use normalizer::{NormalizationParams, Normalizer};
pub use pipeline::{prepare_data, NoProgress, Pipeline, PrepareSummary, ProgressObserver};
pub use signals::{SignalParams, SignalTables};
pub use types::{FeatureName, FeatureSchema, SeriesFeatureTable, FEATURE_NAMES};

// Schema exports
pub use schema::{load_readings, ReadingAdapter, TIMESTAMP_FORMAT};

/// Crate version reported by the CLI
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported in run summaries
pub const PRODUCER_NAME: &str = "sleep-features";
