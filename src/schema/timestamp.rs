//! Timestamp parsing
//!
//! Input timestamps carry a numeric UTC offset without a colon
//! (`2018-08-14T15:30:00-0400`). They are converted to UTC instants, so hour
//! and minute features are UTC wall-clock values.

use chrono::{DateTime, Utc};

/// `chrono` format of input timestamps
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// Parse an input timestamp into a UTC instant
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_str(value, TIMESTAMP_FORMAT).map(|dt| dt.with_timezone(&Utc))
}
