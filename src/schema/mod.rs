//! Input table schema
//!
//! Column layout of the accelerometer series table and the adapters that
//! turn Parquet or NDJSON input into normalized readings.

mod adapter;
mod timestamp;

pub use adapter::*;
pub use timestamp::*;

/// Column holding the series identifier
pub const COL_SERIES_ID: &str = "series_id";
/// Column holding the step index
pub const COL_STEP: &str = "step";
/// Column holding the arm angle
pub const COL_ANGLEZ: &str = "anglez";
/// Column holding the motion energy
pub const COL_ENMO: &str = "enmo";
/// Column holding the timestamp string
pub const COL_TIMESTAMP: &str = "timestamp";
