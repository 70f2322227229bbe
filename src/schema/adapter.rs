//! Adapter for reading series tables into normalized readings
//!
//! Parquet is the production format. NDJSON (one reading per line) is accepted
//! for small fixtures when the path ends in `.ndjson` or `.jsonl`.

use arrow::array::{Array, ArrayRef, Float32Array, StringArray, UInt32Array};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::collections::HashSet;
use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

use super::timestamp::parse_timestamp;
use super::{COL_ANGLEZ, COL_ENMO, COL_SERIES_ID, COL_STEP, COL_TIMESTAMP};
use crate::error::{PrepareError, Result};
use crate::normalizer::{deg_to_rad, Normalizer};
use crate::types::{NormalizedReading, RawReading};

/// On-disk format of a series table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Parquet,
    Ndjson,
}

impl InputFormat {
    /// Pick the format from the file extension; anything unknown is Parquet
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("ndjson") | Some("jsonl") => InputFormat::Ndjson,
            _ => InputFormat::Parquet,
        }
    }
}

/// Adapter for converting input tables to readings
pub struct ReadingAdapter;

impl ReadingAdapter {
    /// Load, parse and normalize every row of a series table
    pub fn load(path: &Path, normalizer: &Normalizer) -> Result<Vec<NormalizedReading>> {
        match InputFormat::from_path(path) {
            InputFormat::Parquet => Self::load_parquet(path, normalizer),
            InputFormat::Ndjson => {
                let ndjson = fs::read_to_string(path).map_err(|e| PrepareError::io_at(path, e))?;
                Self::normalize(Self::parse_ndjson(&ndjson)?, normalizer)
            }
        }
    }

    /// Read a Parquet table batch by batch, casting compatible column types.
    ///
    /// Each record batch is normalized as soon as it is decoded, so raw
    /// strings never outlive their batch.
    pub fn load_parquet(path: &Path, normalizer: &Normalizer) -> Result<Vec<NormalizedReading>> {
        let file = File::open(path).map_err(|e| PrepareError::io_at(path, e))?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        let n_rows = usize::try_from(builder.metadata().file_metadata().num_rows()).unwrap_or(0);
        let reader = builder.build()?;

        let mut rows = RowNormalizer::new(normalizer);
        let mut readings = Vec::with_capacity(n_rows);
        for batch in reader {
            append_batch(&batch?, &mut rows, &mut readings)?;
        }
        Ok(readings)
    }

    /// Parse NDJSON (newline-delimited JSON) containing readings
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<RawReading>> {
        let mut readings = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<RawReading>(trimmed) {
                Ok(reading) => readings.push(reading),
                Err(e) => {
                    return Err(PrepareError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(readings)
    }

    /// Parse timestamps and z-score signals.
    ///
    /// The first malformed timestamp fails the whole batch.
    pub fn normalize(
        readings: Vec<RawReading>,
        normalizer: &Normalizer,
    ) -> Result<Vec<NormalizedReading>> {
        let mut rows = RowNormalizer::new(normalizer);
        readings
            .iter()
            .enumerate()
            .map(|(row, raw)| {
                rows.reading(
                    row,
                    &raw.series_id,
                    raw.step,
                    raw.anglez,
                    raw.enmo,
                    &raw.timestamp,
                )
            })
            .collect()
    }
}

/// Load, parse and normalize a series table
pub fn load_readings(path: &Path, normalizer: &Normalizer) -> Result<Vec<NormalizedReading>> {
    ReadingAdapter::load(path, normalizer)
}

/// Builds normalized readings row by row, handing out one shared
/// `Arc<str>` per distinct series id
struct RowNormalizer<'a> {
    normalizer: &'a Normalizer,
    series_ids: HashSet<Arc<str>>,
}

impl<'a> RowNormalizer<'a> {
    fn new(normalizer: &'a Normalizer) -> Self {
        Self {
            normalizer,
            series_ids: HashSet::new(),
        }
    }

    fn series_id(&mut self, id: &str) -> Arc<str> {
        if let Some(existing) = self.series_ids.get(id) {
            return Arc::clone(existing);
        }
        let id: Arc<str> = Arc::from(id);
        self.series_ids.insert(Arc::clone(&id));
        id
    }

    fn reading(
        &mut self,
        row: usize,
        series_id: &str,
        step: u32,
        anglez: f32,
        enmo: f32,
        timestamp: &str,
    ) -> Result<NormalizedReading> {
        let parsed = parse_timestamp(timestamp).map_err(|e| PrepareError::MalformedTimestamp {
            row,
            value: timestamp.to_string(),
            reason: e.to_string(),
        })?;
        let (z_anglez, z_enmo) = self.normalizer.normalize(anglez, enmo);

        Ok(NormalizedReading {
            series_id: self.series_id(series_id),
            step,
            anglez: z_anglez,
            enmo: z_enmo,
            timestamp: parsed,
            anglez_rad: deg_to_rad(anglez),
        })
    }
}

fn column(batch: &RecordBatch, name: &str, data_type: &DataType) -> Result<ArrayRef> {
    let array = batch
        .column_by_name(name)
        .ok_or_else(|| PrepareError::MissingColumn(name.to_string()))?;
    Ok(cast(array.as_ref(), data_type)?)
}

fn downcast<'a, T: 'static>(array: &'a ArrayRef, name: &str) -> Result<&'a T> {
    array.as_any().downcast_ref::<T>().ok_or_else(|| {
        PrepareError::ParseError(format!("column {name} has unexpected type {}", array.data_type()))
    })
}

/// Normalize and append the rows of one record batch.
///
/// Missing signal values become NaN; missing identifiers, steps or timestamps
/// are errors.
fn append_batch(
    batch: &RecordBatch,
    rows: &mut RowNormalizer<'_>,
    readings: &mut Vec<NormalizedReading>,
) -> Result<()> {
    let series_id = column(batch, COL_SERIES_ID, &DataType::Utf8)?;
    let step = column(batch, COL_STEP, &DataType::UInt32)?;
    let anglez = column(batch, COL_ANGLEZ, &DataType::Float32)?;
    let enmo = column(batch, COL_ENMO, &DataType::Float32)?;
    let timestamp = column(batch, COL_TIMESTAMP, &DataType::Utf8)?;

    let series_id = downcast::<StringArray>(&series_id, COL_SERIES_ID)?;
    let step = downcast::<UInt32Array>(&step, COL_STEP)?;
    let anglez = downcast::<Float32Array>(&anglez, COL_ANGLEZ)?;
    let enmo = downcast::<Float32Array>(&enmo, COL_ENMO)?;
    let timestamp = downcast::<StringArray>(&timestamp, COL_TIMESTAMP)?;

    let offset = readings.len();
    readings.reserve(batch.num_rows());

    for i in 0..batch.num_rows() {
        let row = offset + i;
        let null_at = |column: &str| PrepareError::NullValue {
            column: column.to_string(),
            row,
        };

        if series_id.is_null(i) {
            return Err(null_at(COL_SERIES_ID));
        }
        if step.is_null(i) {
            return Err(null_at(COL_STEP));
        }
        if timestamp.is_null(i) {
            return Err(null_at(COL_TIMESTAMP));
        }

        readings.push(rows.reading(
            row,
            series_id.value(i),
            step.value(i),
            if anglez.is_null(i) { f32::NAN } else { anglez.value(i) },
            if enmo.is_null(i) { f32::NAN } else { enmo.value(i) },
            timestamp.value(i),
        )?);
    }

    Ok(())
}
