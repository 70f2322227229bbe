//! Feature assembly
//!
//! This module turns the sorted, normalized readings of one series into a
//! feature table:
//! - Hour-of-day circular encoding
//! - Time-of-day priors from the signal lookup tables
//! - Month/minute encodings, relative step and angle trigonometry (extended schema)

use chrono::{Datelike, Timelike};

use crate::encoder::{encode, HOURS_PER_DAY, MINUTES_PER_HOUR, MONTHS_PER_YEAR};
use crate::error::Result;
use crate::signals::{time_bucket, SignalTables};
use crate::types::{
    ExtendedFeatures, FeatureRow, FeatureSchema, NormalizedReading, SeriesFeatureTable,
};

/// Feature assembler for one series at a time
pub struct FeatureAssembler<'a> {
    tables: &'a SignalTables,
    schema: FeatureSchema,
}

impl<'a> FeatureAssembler<'a> {
    /// Assembler for the standard schema
    pub fn new(tables: &'a SignalTables) -> Self {
        Self::with_schema(tables, FeatureSchema::Standard)
    }

    pub fn with_schema(tables: &'a SignalTables, schema: FeatureSchema) -> Self {
        Self { tables, schema }
    }

    /// Assemble the feature table of one series.
    ///
    /// Output rows are in exactly the same order as `readings`.
    pub fn assemble(&self, readings: &[NormalizedReading]) -> Result<SeriesFeatureTable> {
        let rows = readings
            .iter()
            .map(|reading| self.feature_row(reading))
            .collect::<Result<Vec<_>>>()?;

        let extended = match self.schema {
            FeatureSchema::Standard => None,
            FeatureSchema::Extended => {
                let n = readings.len();
                Some(
                    readings
                        .iter()
                        .enumerate()
                        .map(|(idx, reading)| extended_features(reading, idx, n))
                        .collect::<Result<Vec<_>>>()?,
                )
            }
        };

        Ok(SeriesFeatureTable { rows, extended })
    }

    fn feature_row(&self, reading: &NormalizedReading) -> Result<FeatureRow> {
        let hour = reading.timestamp.hour();
        let minute = reading.timestamp.minute();

        let (hour_sin, hour_cos) = encode(i64::from(hour), HOURS_PER_DAY)?;
        let signals = self.tables.lookup(time_bucket(hour, minute))?;

        Ok(FeatureRow {
            anglez: reading.anglez,
            enmo: reading.enmo,
            hour_sin,
            hour_cos,
            signal_awake: signals.awake,
            signal_onset: signals.onset,
            signal_poly: signals.poly,
        })
    }
}

fn extended_features(reading: &NormalizedReading, idx: usize, n: usize) -> Result<ExtendedFeatures> {
    let (month_sin, month_cos) = encode(i64::from(reading.timestamp.month()), MONTHS_PER_YEAR)?;
    let (minute_sin, minute_cos) =
        encode(i64::from(reading.timestamp.minute()), MINUTES_PER_HOUR)?;

    Ok(ExtendedFeatures {
        step: idx as f64 / n as f64,
        month_sin,
        month_cos,
        minute_sin,
        minute_cos,
        anglez_sin: reading.anglez_rad.sin(),
        anglez_cos: reading.anglez_rad.cos(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FeatureName;
    use chrono::{TimeZone, Utc};

    fn reading(hour: u32, minute: u32, anglez: f32) -> NormalizedReading {
        NormalizedReading {
            series_id: "s1".into(),
            step: 0,
            anglez,
            enmo: 0.25,
            timestamp: Utc.with_ymd_and_hms(2020, 3, 1, hour, minute, 0).unwrap(),
            anglez_rad: 0.0,
        }
    }

    #[test]
    fn test_hour_encoding() {
        let tables = SignalTables::default();
        let assembler = FeatureAssembler::new(&tables);
        let table = assembler
            .assemble(&[reading(0, 0, 0.0), reading(12, 0, 0.0), reading(6, 30, 0.0)])
            .unwrap();

        assert!(table.rows[0].hour_sin.abs() < 1e-12);
        assert!((table.rows[0].hour_cos - 1.0).abs() < 1e-12);
        assert!(table.rows[1].hour_sin.abs() < 1e-12);
        assert!((table.rows[1].hour_cos + 1.0).abs() < 1e-12);
        assert!((table.rows[2].hour_sin - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_signal_lookup_by_bucket() {
        let tables = SignalTables::default();
        let assembler = FeatureAssembler::new(&tables);
        let table = assembler.assemble(&[reading(12, 7, 0.0)]).unwrap();

        // 12:07 falls in bucket 121
        let expected = tables.lookup(121).unwrap();
        assert_eq!(table.rows[0].signal_awake, expected.awake);
        assert_eq!(table.rows[0].signal_onset, expected.onset);
        assert_eq!(table.rows[0].signal_poly, expected.poly);
    }

    #[test]
    fn test_order_preserved() {
        let tables = SignalTables::default();
        let assembler = FeatureAssembler::new(&tables);
        let input = vec![reading(5, 0, 3.0), reading(1, 0, 1.0), reading(3, 0, 2.0)];
        let table = assembler.assemble(&input).unwrap();

        let anglez: Vec<f32> = table.rows.iter().map(|r| r.anglez).collect();
        assert_eq!(anglez, vec![3.0, 1.0, 2.0]);
        assert!(table.extended.is_none());
    }

    #[test]
    fn test_empty_series() {
        let tables = SignalTables::default();
        let table = FeatureAssembler::new(&tables).assemble(&[]).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_extended_schema() {
        let tables = SignalTables::default();
        let assembler = FeatureAssembler::with_schema(&tables, FeatureSchema::Extended);
        let mut r = reading(0, 15, 0.0);
        r.anglez_rad = std::f32::consts::FRAC_PI_2;
        let table = assembler.assemble(&[r.clone(), r]).unwrap();

        let ext = table.extended.as_ref().unwrap();
        assert_eq!(ext.len(), 2);
        assert_eq!(ext[0].step, 0.0);
        assert_eq!(ext[1].step, 0.5);
        // March encodes to the top of the circle
        assert!((ext[0].month_sin - 1.0).abs() < 1e-12);
        // Minute 15 is a quarter turn
        assert!((ext[0].minute_sin - 1.0).abs() < 1e-12);
        assert!((ext[0].anglez_sin - 1.0).abs() < 1e-6);

        assert_eq!(table.column(FeatureName::Step).unwrap().len(), 2);
    }
}
