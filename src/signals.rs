//! Time-of-day signal lookup tables
//!
//! Three priors indexed by time bucket (`hour * 10 + minute / 6`):
//! - `awake`: two-component Gaussian mixture fitted to wake-up times
//! - `onset`: two-component Gaussian mixture fitted to sleep onset times
//! - `poly`: cubic fit of the sleep probability curve
//!
//! Tables are dense over the closed domain [0, 239] and evaluated at `bucket / 10`
//! (fractional hours).

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::{PrepareError, Result};

/// Number of 6-minute buckets in a day
pub const N_TIME_BUCKETS: usize = 240;

/// Parameters of a two-component Gaussian mixture
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MixtureParams {
    /// Weight of the first component; the second gets `1 - w1`
    pub w1: f64,
    pub mu1: f64,
    pub sigma1: f64,
    pub mu2: f64,
    pub sigma2: f64,
}

impl MixtureParams {
    /// Density of the mixture at `t`
    pub fn density(&self, t: f64) -> f64 {
        self.w1 * gaussian_pdf(t, self.mu1, self.sigma1)
            + (1.0 - self.w1) * gaussian_pdf(t, self.mu2, self.sigma2)
    }
}

/// Fitted parameters of all three tables
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalParams {
    pub awake: MixtureParams,
    pub onset: MixtureParams,
    /// Constant, linear, quadratic and cubic coefficients
    pub poly: [f64; 4],
}

impl Default for SignalParams {
    fn default() -> Self {
        Self {
            awake: MixtureParams {
                w1: 0.47799486,
                mu1: 10.89539674,
                sigma1: 0.87151052,
                mu2: 11.82689931,
                sigma2: 2.06792452,
            },
            onset: MixtureParams {
                w1: 0.97292814,
                mu1: 2.12861738,
                sigma1: 1.699476,
                mu2: 22.7643724,
                sigma2: 0.42483832,
            },
            poly: [
                0.7498337722857453,
                -0.29120336781669365,
                0.0325499456141388,
                -0.000865744935362603,
            ],
        }
    }
}

/// Normal probability density
pub fn gaussian_pdf(t: f64, mu: f64, sigma: f64) -> f64 {
    let z = t - mu;
    (-(z * z) / (2.0 * sigma * sigma)).exp() / (sigma * (2.0 * PI).sqrt())
}

/// Evaluate `c[0] + c[1] t + c[2] t^2 + c[3] t^3`
pub fn cubic(coefficients: &[f64; 4], t: f64) -> f64 {
    coefficients[0] + coefficients[1] * t + coefficients[2] * t * t + coefficients[3] * t * t * t
}

/// Values of the three tables at one bucket
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalValues {
    pub awake: f64,
    pub onset: f64,
    pub poly: f64,
}

/// Precomputed lookup tables, immutable once built
#[derive(Debug, Clone)]
pub struct SignalTables {
    awake: Vec<f64>,
    onset: Vec<f64>,
    poly: Vec<f64>,
}

impl Default for SignalTables {
    fn default() -> Self {
        Self::build(&SignalParams::default())
    }
}

impl SignalTables {
    /// Evaluate every bucket of the domain
    pub fn build(params: &SignalParams) -> Self {
        let hours = (0..N_TIME_BUCKETS).map(|b| b as f64 / 10.0);

        Self {
            awake: hours.clone().map(|t| params.awake.density(t)).collect(),
            onset: hours.clone().map(|t| params.onset.density(t)).collect(),
            poly: hours.map(|t| cubic(&params.poly, t)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.awake.len()
    }

    pub fn is_empty(&self) -> bool {
        self.awake.is_empty()
    }

    /// Look up all three values for a bucket
    pub fn lookup(&self, bucket: i64) -> Result<SignalValues> {
        let idx = usize::try_from(bucket)
            .ok()
            .filter(|&i| i < N_TIME_BUCKETS)
            .ok_or(PrepareError::LookupDomain(bucket))?;

        Ok(SignalValues {
            awake: self.awake[idx],
            onset: self.onset[idx],
            poly: self.poly[idx],
        })
    }

    pub fn awake(&self) -> &[f64] {
        &self.awake
    }

    pub fn onset(&self) -> &[f64] {
        &self.onset
    }

    pub fn poly(&self) -> &[f64] {
        &self.poly
    }
}

/// Time bucket of an hour/minute pair: `hour * 10 + minute / 6`
pub fn time_bucket(hour: u32, minute: u32) -> i64 {
    i64::from(hour) * 10 + i64::from(minute / 6)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_mixture(t: f64, w1: f64, mu1: f64, s1: f64, mu2: f64, s2: f64) -> f64 {
        let pdf = |mu: f64, s: f64| {
            1.0 / (s * (2.0 * PI).sqrt()) * (-0.5 * ((t - mu) / s).powi(2)).exp()
        };
        w1 * pdf(mu1, s1) + (1.0 - w1) * pdf(mu2, s2)
    }

    #[test]
    fn test_tables_cover_domain() {
        let tables = SignalTables::default();
        assert_eq!(tables.len(), N_TIME_BUCKETS);

        for b in 0..N_TIME_BUCKETS as i64 {
            assert!(tables.lookup(b).is_ok());
        }
    }

    #[test]
    fn test_awake_matches_closed_form() {
        let tables = SignalTables::default();

        for b in 0..240 {
            let t = b as f64 / 10.0;
            let expected =
                reference_mixture(t, 0.47799486, 10.89539674, 0.87151052, 11.82689931, 2.06792452);
            assert!((tables.awake()[b] - expected).abs() < 1e-9, "bucket {b}");
        }
    }

    #[test]
    fn test_onset_matches_closed_form() {
        let tables = SignalTables::default();

        for b in 0..240 {
            let t = b as f64 / 10.0;
            let expected =
                reference_mixture(t, 0.97292814, 2.12861738, 1.699476, 22.7643724, 0.42483832);
            assert!((tables.onset()[b] - expected).abs() < 1e-9, "bucket {b}");
        }
    }

    #[test]
    fn test_poly_matches_closed_form() {
        let tables = SignalTables::default();

        for b in 0..240 {
            let t = b as f64 / 10.0;
            let expected = 0.7498337722857453 - 0.29120336781669365 * t
                + 0.0325499456141388 * t.powi(2)
                - 0.000865744935362603 * t.powi(3);
            assert!((tables.poly()[b] - expected).abs() < 1e-9, "bucket {b}");
        }
    }

    #[test]
    fn test_poly_at_midnight_is_constant_term() {
        let tables = SignalTables::default();
        let values = tables.lookup(0).unwrap();
        assert!((values.poly - 0.7498337722857453).abs() < 1e-12);
    }

    #[test]
    fn test_out_of_domain_lookup() {
        let tables = SignalTables::default();

        assert!(matches!(tables.lookup(240), Err(PrepareError::LookupDomain(240))));
        assert!(matches!(tables.lookup(-1), Err(PrepareError::LookupDomain(-1))));
    }

    #[test]
    fn test_build_is_deterministic() {
        let a = SignalTables::default();
        let b = SignalTables::build(&SignalParams::default());

        assert_eq!(a.awake(), b.awake());
        assert_eq!(a.onset(), b.onset());
        assert_eq!(a.poly(), b.poly());
    }

    #[test]
    fn test_synthetic_params() {
        let params = SignalParams {
            awake: MixtureParams { w1: 1.0, mu1: 0.0, sigma1: 1.0, mu2: 0.0, sigma2: 1.0 },
            onset: MixtureParams { w1: 0.0, mu1: 0.0, sigma1: 1.0, mu2: 0.0, sigma2: 1.0 },
            poly: [1.0, 0.0, 0.0, 0.0],
        };
        let tables = SignalTables::build(&params);
        let values = tables.lookup(0).unwrap();

        let peak = 1.0 / (2.0 * PI).sqrt();
        assert!((values.awake - peak).abs() < 1e-12);
        assert!((values.onset - peak).abs() < 1e-12);
        assert_eq!(values.poly, 1.0);
    }

    #[test]
    fn test_time_bucket() {
        assert_eq!(time_bucket(0, 0), 0);
        assert_eq!(time_bucket(0, 5), 0);
        assert_eq!(time_bucket(0, 6), 1);
        assert_eq!(time_bucket(12, 6), 121);
        assert_eq!(time_bucket(23, 59), 239);
    }
}
