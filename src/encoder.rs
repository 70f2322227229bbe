//! Circular time encoding
//!
//! Maps a periodic integer field onto the unit circle so that the two ends of
//! the period (hour 23 and hour 0, December and January) stay close.

use std::f64::consts::PI;

use crate::error::{PrepareError, Result};

/// Period of hour-of-day
pub const HOURS_PER_DAY: u32 = 24;
/// Period of month-of-year
pub const MONTHS_PER_YEAR: u32 = 12;
/// Period of minute-of-hour
pub const MINUTES_PER_HOUR: u32 = 60;

/// Encode `x` as `(sin, cos)` of `2π (x mod period) / period`.
///
/// Negative `x` wraps into `[0, period)`.
pub fn encode(x: i64, period: u32) -> Result<(f64, f64)> {
    if period == 0 {
        return Err(PrepareError::InvalidPeriod(period));
    }

    let period = i64::from(period);
    let rad = 2.0 * PI * x.rem_euclid(period) as f64 / period as f64;
    Ok((rad.sin(), rad.cos()))
}
