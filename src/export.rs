//! Series export
//!
//! Writes each feature column of a series to its own NumPy (`.npy`) file:
//!
//! ```text
//! <output_root>/<series_id>/anglez.npy
//! <output_root>/<series_id>/enmo.npy
//! ...
//! ```
//!
//! Files are written one after the other; a crash mid-series leaves a partial
//! directory that the next full run removes.

use ndarray::Array1;
use ndarray_npy::WriteNpyExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{PrepareError, Result};
use crate::types::{FeatureColumn, FeatureName, SeriesFeatureTable};

/// Result of exporting one series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesExport {
    pub series_id: String,
    pub n_rows: usize,
    /// Written files, in feature order
    pub files: Vec<PathBuf>,
}

/// Exporter writing one directory per series under a common root
#[derive(Debug, Clone)]
pub struct SeriesExporter {
    output_root: PathBuf,
}

impl SeriesExporter {
    pub fn new<P: AsRef<Path>>(output_root: P) -> Self {
        Self {
            output_root: output_root.as_ref().to_path_buf(),
        }
    }

    /// Directory holding the arrays of one series
    pub fn series_dir(&self, series_id: &str) -> PathBuf {
        self.output_root.join(series_id)
    }

    /// Write one `.npy` file per feature of `table`
    pub fn export(
        &self,
        series_id: &str,
        table: &SeriesFeatureTable,
        feature_names: &[FeatureName],
    ) -> Result<SeriesExport> {
        if !is_valid_series_id(series_id) {
            return Err(PrepareError::InvalidSeriesId(series_id.to_string()));
        }

        let dir = self.series_dir(series_id);
        fs::create_dir_all(&dir).map_err(|e| PrepareError::io_at(&dir, e))?;

        let mut files = Vec::with_capacity(feature_names.len());
        for &name in feature_names {
            let column = table.column(name)?;
            let path = dir.join(name.file_name());
            write_column(&path, column)?;
            files.push(path);
        }

        tracing::debug!(
            series_id,
            n_rows = table.len(),
            n_files = files.len(),
            "exported series"
        );

        Ok(SeriesExport {
            series_id: series_id.to_string(),
            n_rows: table.len(),
            files,
        })
    }
}

/// A series id must name a single directory inside the output root
fn is_valid_series_id(series_id: &str) -> bool {
    !series_id.is_empty()
        && series_id != "."
        && series_id != ".."
        && !series_id.contains(|c: char| c == '/' || c == '\\')
}

/// Write a column as a 1-D array
fn write_column(path: &Path, column: FeatureColumn) -> Result<()> {
    let file = File::create(path).map_err(|e| PrepareError::io_at(path, e))?;
    let mut writer = BufWriter::new(file);

    match column {
        FeatureColumn::F32(values) => Array1::from_vec(values).write_npy(&mut writer)?,
        FeatureColumn::F64(values) => Array1::from_vec(values).write_npy(&mut writer)?,
    }

    writer.flush().map_err(|e| PrepareError::io_at(path, e))
}
