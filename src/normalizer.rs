//! Signal normalization
//!
//! This module z-scores the two raw accelerometer signals against fixed
//! population statistics. The statistics are never recomputed from data.

use serde::{Deserialize, Serialize};

/// Population mean of `anglez` (degrees)
pub const ANGLEZ_MEAN: f32 = -8.810476;
/// Population standard deviation of `anglez` (degrees)
pub const ANGLEZ_STD: f32 = 35.521877;
/// Population mean of `enmo`
pub const ENMO_MEAN: f32 = 0.041315;
/// Population standard deviation of `enmo`
pub const ENMO_STD: f32 = 0.101829;

/// Mean/std pairs used for z-scoring
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizationParams {
    pub anglez_mean: f32,
    pub anglez_std: f32,
    pub enmo_mean: f32,
    pub enmo_std: f32,
}

impl Default for NormalizationParams {
    fn default() -> Self {
        Self {
            anglez_mean: ANGLEZ_MEAN,
            anglez_std: ANGLEZ_STD,
            enmo_mean: ENMO_MEAN,
            enmo_std: ENMO_STD,
        }
    }
}

/// Normalizer for the raw `anglez` and `enmo` signals
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer {
    params: NormalizationParams,
}

impl Normalizer {
    pub fn new(params: NormalizationParams) -> Self {
        Self { params }
    }

    /// Z-score one reading. NaN inputs stay NaN.
    pub fn normalize(&self, anglez: f32, enmo: f32) -> (f32, f32) {
        let p = &self.params;
        (
            (anglez - p.anglez_mean) / p.anglez_std,
            (enmo - p.enmo_mean) / p.enmo_std,
        )
    }
}

/// Convert degrees to radians, keeping single precision
pub fn deg_to_rad(degrees: f32) -> f32 {
    std::f32::consts::PI / 180.0 * degrees
}
