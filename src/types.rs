//! Core types for the feature preparation pipeline
//!
//! This module defines the data structures that flow through each stage:
//! raw readings, normalized readings, feature rows and per-series tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{PrepareError, Result};

/// One accelerometer reading as stored in the input table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawReading {
    /// Series (subject/device) identifier
    pub series_id: String,
    /// Step index within the recording
    pub step: u32,
    /// Arm angle relative to the horizontal plane (degrees)
    pub anglez: f32,
    /// Euclidean norm minus one of the acceleration
    pub enmo: f32,
    /// ISO-8601 timestamp with numeric offset, e.g. `2018-08-14T15:30:00-0400`
    pub timestamp: String,
}

/// A reading after timestamp parsing and z-scoring
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedReading {
    /// Shared by every reading of the same series
    pub series_id: Arc<str>,
    pub step: u32,
    /// Z-scored angle
    pub anglez: f32,
    /// Z-scored motion energy
    pub enmo: f32,
    /// Instant of the reading, converted to UTC
    pub timestamp: DateTime<Utc>,
    /// Raw angle in radians, taken before normalization
    pub anglez_rad: f32,
}

/// Element type of an exported feature array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    F32,
    F64,
}

impl Dtype {
    /// NumPy dtype string
    pub fn numpy_str(&self) -> &'static str {
        match self {
            Dtype::F32 => "float32",
            Dtype::F64 => "float64",
        }
    }
}

/// Every feature the assembler knows how to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureName {
    Anglez,
    Enmo,
    Step,
    HourSin,
    HourCos,
    MonthSin,
    MonthCos,
    MinuteSin,
    MinuteCos,
    AnglezSin,
    AnglezCos,
    SignalAwake,
    SignalOnset,
    SignalPoly,
}

impl FeatureName {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureName::Anglez => "anglez",
            FeatureName::Enmo => "enmo",
            FeatureName::Step => "step",
            FeatureName::HourSin => "hour_sin",
            FeatureName::HourCos => "hour_cos",
            FeatureName::MonthSin => "month_sin",
            FeatureName::MonthCos => "month_cos",
            FeatureName::MinuteSin => "minute_sin",
            FeatureName::MinuteCos => "minute_cos",
            FeatureName::AnglezSin => "anglez_sin",
            FeatureName::AnglezCos => "anglez_cos",
            FeatureName::SignalAwake => "signal_awake",
            FeatureName::SignalOnset => "signal_onset",
            FeatureName::SignalPoly => "signal_poly",
        }
    }

    /// Element type written for this feature
    pub fn dtype(&self) -> Dtype {
        match self {
            FeatureName::Anglez
            | FeatureName::Enmo
            | FeatureName::AnglezSin
            | FeatureName::AnglezCos => Dtype::F32,
            _ => Dtype::F64,
        }
    }

    /// File name of the exported array
    pub fn file_name(&self) -> String {
        format!("{}.npy", self.as_str())
    }
}

impl fmt::Display for FeatureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exported features, in file order
pub const FEATURE_NAMES: [FeatureName; 7] = [
    FeatureName::Anglez,
    FeatureName::Enmo,
    FeatureName::HourSin,
    FeatureName::HourCos,
    FeatureName::SignalAwake,
    FeatureName::SignalOnset,
    FeatureName::SignalPoly,
];

/// Features of the extended schema, in file order
pub const EXTENDED_FEATURE_NAMES: [FeatureName; 11] = [
    FeatureName::Anglez,
    FeatureName::Enmo,
    FeatureName::Step,
    FeatureName::HourSin,
    FeatureName::HourCos,
    FeatureName::MonthSin,
    FeatureName::MonthCos,
    FeatureName::MinuteSin,
    FeatureName::MinuteCos,
    FeatureName::AnglezSin,
    FeatureName::AnglezCos,
];

/// Which set of feature columns gets exported
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureSchema {
    /// Normalized signals, hour encoding and time-of-day priors
    #[default]
    Standard,
    /// Normalized signals, relative step, hour/month/minute encodings and angle trigonometry
    Extended,
}

impl FeatureSchema {
    pub fn names(&self) -> &'static [FeatureName] {
        match self {
            FeatureSchema::Standard => &FEATURE_NAMES,
            FeatureSchema::Extended => &EXTENDED_FEATURE_NAMES,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureSchema::Standard => "standard",
            FeatureSchema::Extended => "extended",
        }
    }
}

impl FromStr for FeatureSchema {
    type Err = PrepareError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "standard" => Ok(FeatureSchema::Standard),
            "extended" => Ok(FeatureSchema::Extended),
            other => Err(PrepareError::Config(format!(
                "unknown feature schema {other:?} (expected standard or extended)"
            ))),
        }
    }
}

/// Feature values of one reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureRow {
    pub anglez: f32,
    pub enmo: f32,
    pub hour_sin: f64,
    pub hour_cos: f64,
    pub signal_awake: f64,
    pub signal_onset: f64,
    pub signal_poly: f64,
}

/// Additional values produced only for the extended schema
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtendedFeatures {
    /// Row position divided by series length
    pub step: f64,
    pub month_sin: f64,
    pub month_cos: f64,
    pub minute_sin: f64,
    pub minute_cos: f64,
    pub anglez_sin: f32,
    pub anglez_cos: f32,
}

/// One feature column ready to be written
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureColumn {
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl FeatureColumn {
    pub fn len(&self) -> usize {
        match self {
            FeatureColumn::F32(v) => v.len(),
            FeatureColumn::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> Dtype {
        match self {
            FeatureColumn::F32(_) => Dtype::F32,
            FeatureColumn::F64(_) => Dtype::F64,
        }
    }
}

/// Feature rows of one series, in timestamp order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesFeatureTable {
    pub rows: Vec<FeatureRow>,
    /// Present only when assembled for the extended schema; same length as `rows`
    pub extended: Option<Vec<ExtendedFeatures>>,
}

impl SeriesFeatureTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Extract one feature as a flat column
    pub fn column(&self, name: FeatureName) -> Result<FeatureColumn> {
        let rows = &self.rows;
        let extended = || {
            self.extended
                .as_ref()
                .ok_or_else(|| PrepareError::FeatureUnavailable(name.to_string()))
        };

        let column = match name {
            FeatureName::Anglez => FeatureColumn::F32(rows.iter().map(|r| r.anglez).collect()),
            FeatureName::Enmo => FeatureColumn::F32(rows.iter().map(|r| r.enmo).collect()),
            FeatureName::HourSin => FeatureColumn::F64(rows.iter().map(|r| r.hour_sin).collect()),
            FeatureName::HourCos => FeatureColumn::F64(rows.iter().map(|r| r.hour_cos).collect()),
            FeatureName::SignalAwake => {
                FeatureColumn::F64(rows.iter().map(|r| r.signal_awake).collect())
            }
            FeatureName::SignalOnset => {
                FeatureColumn::F64(rows.iter().map(|r| r.signal_onset).collect())
            }
            FeatureName::SignalPoly => {
                FeatureColumn::F64(rows.iter().map(|r| r.signal_poly).collect())
            }
            FeatureName::Step => FeatureColumn::F64(extended()?.iter().map(|e| e.step).collect()),
            FeatureName::MonthSin => {
                FeatureColumn::F64(extended()?.iter().map(|e| e.month_sin).collect())
            }
            FeatureName::MonthCos => {
                FeatureColumn::F64(extended()?.iter().map(|e| e.month_cos).collect())
            }
            FeatureName::MinuteSin => {
                FeatureColumn::F64(extended()?.iter().map(|e| e.minute_sin).collect())
            }
            FeatureName::MinuteCos => {
                FeatureColumn::F64(extended()?.iter().map(|e| e.minute_cos).collect())
            }
            FeatureName::AnglezSin => {
                FeatureColumn::F32(extended()?.iter().map(|e| e.anglez_sin).collect())
            }
            FeatureName::AnglezCos => {
                FeatureColumn::F32(extended()?.iter().map(|e| e.anglez_cos).collect())
            }
        };
        Ok(column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(anglez: f32) -> FeatureRow {
        FeatureRow {
            anglez,
            enmo: 0.5,
            hour_sin: 0.0,
            hour_cos: 1.0,
            signal_awake: 0.1,
            signal_onset: 0.2,
            signal_poly: 0.3,
        }
    }

    #[test]
    fn test_feature_names_order() {
        let names: Vec<&str> = FEATURE_NAMES.iter().map(|f| f.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "anglez",
                "enmo",
                "hour_sin",
                "hour_cos",
                "signal_awake",
                "signal_onset",
                "signal_poly"
            ]
        );
    }

    #[test]
    fn test_dtypes() {
        assert_eq!(FeatureName::Anglez.dtype(), Dtype::F32);
        assert_eq!(FeatureName::Enmo.dtype(), Dtype::F32);
        assert_eq!(FeatureName::SignalPoly.dtype(), Dtype::F64);
        assert_eq!(FeatureName::HourSin.file_name(), "hour_sin.npy");
    }

    #[test]
    fn test_column_extraction_preserves_order() {
        let table = SeriesFeatureTable {
            rows: vec![row(1.0), row(2.0), row(3.0)],
            extended: None,
        };

        assert_eq!(
            table.column(FeatureName::Anglez).unwrap(),
            FeatureColumn::F32(vec![1.0, 2.0, 3.0])
        );
        assert_eq!(table.column(FeatureName::SignalOnset).unwrap().len(), 3);
    }

    #[test]
    fn test_extended_column_requires_extended_table() {
        let table = SeriesFeatureTable {
            rows: vec![row(1.0)],
            extended: None,
        };

        assert!(matches!(
            table.column(FeatureName::MonthSin),
            Err(PrepareError::FeatureUnavailable(_))
        ));
    }

    #[test]
    fn test_schema_from_str() {
        assert_eq!("standard".parse::<FeatureSchema>().unwrap(), FeatureSchema::Standard);
        assert_eq!(FeatureSchema::Extended.names().len(), 11);
        assert!("fancy".parse::<FeatureSchema>().is_err());
    }

    #[test]
    fn test_deserialize_raw_reading() {
        let json = r#"{
            "series_id": "038441c925bb",
            "step": 0,
            "anglez": 2.6367,
            "enmo": 0.0217,
            "timestamp": "2018-08-14T15:30:00-0400"
        }"#;

        let reading: RawReading = serde_json::from_str(json).unwrap();
        assert_eq!(reading.series_id, "038441c925bb");
        assert_eq!(reading.step, 0);
    }
}
