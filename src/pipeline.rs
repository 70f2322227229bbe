//! Pipeline orchestration
//!
//! This module provides the public API of the crate. It runs a full
//! preparation pass for one phase:
//!
//! 1. Reset the phase output directory (runs are never incremental)
//! 2. Load the series table, parse timestamps and normalize signals
//! 3. Sort by `(series_id, timestamp)` and partition by series
//! 4. Assemble and export every series on a worker pool

use chrono::Utc;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::instrument;
use uuid::Uuid;

use crate::config::{Phase, PrepareConfig};
use crate::error::{PrepareError, Result};
use crate::export::{SeriesExport, SeriesExporter};
use crate::features::FeatureAssembler;
use crate::normalizer::Normalizer;
use crate::schema::load_readings;
use crate::signals::SignalTables;
use crate::types::{FeatureSchema, NormalizedReading};

/// Observer notified as series are exported.
///
/// Called from worker threads, in no particular series order.
pub trait ProgressObserver: Sync {
    /// Called once the number of series is known
    fn on_start(&self, _n_series: usize) {}

    /// Called after each series has been written
    fn on_series(&self, _export: &SeriesExport) {}
}

/// Observer that ignores every event
#[derive(Debug, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {}

/// Report of a completed run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareSummary {
    pub run_id: String,
    pub phase: Phase,
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    pub feature_schema: FeatureSchema,
    pub feature_names: Vec<String>,
    pub n_rows: usize,
    pub n_series: usize,
    pub series: Vec<SeriesExport>,
    pub computed_at_utc: String,
}

/// Feature preparation pipeline for one phase
pub struct Pipeline {
    config: PrepareConfig,
    normalizer: Normalizer,
    tables: SignalTables,
}

impl Pipeline {
    /// Validate the configuration and build the lookup tables
    pub fn new(config: PrepareConfig) -> Result<Self> {
        config.validate()?;

        let normalizer = Normalizer::new(config.normalization);
        let tables = SignalTables::build(&config.signals);

        Ok(Self {
            config,
            normalizer,
            tables,
        })
    }

    /// Run without progress reporting
    pub fn run(&self) -> Result<PrepareSummary> {
        self.run_with_progress(&NoProgress)
    }

    /// Run, reporting each exported series to `progress`
    pub fn run_with_progress(&self, progress: &dyn ProgressObserver) -> Result<PrepareSummary> {
        let input_path = self.config.input_path();
        let output_dir = self.config.output_dir();

        reset_output_dir(&output_dir, self.config.phase)?;

        let readings = self.load_series(&input_path)?;
        let groups = partition_by_series(&readings);

        tracing::info!(
            n_rows = readings.len(),
            n_series = groups.len(),
            "series table loaded"
        );

        progress.on_start(groups.len());
        let series = self.save_features(&groups, &output_dir, progress)?;

        tracing::info!(
            output = %output_dir.display(),
            n_series = series.len(),
            "features saved"
        );

        Ok(PrepareSummary {
            run_id: Uuid::new_v4().to_string(),
            phase: self.config.phase,
            input_path,
            output_dir,
            feature_schema: self.config.feature_schema,
            feature_names: self
                .config
                .feature_schema
                .names()
                .iter()
                .map(|f| f.to_string())
                .collect(),
            n_rows: readings.len(),
            n_series: series.len(),
            series,
            computed_at_utc: Utc::now().to_rfc3339(),
        })
    }

    /// Load, normalize and sort the whole input table
    #[instrument(skip_all, fields(phase = %self.config.phase))]
    fn load_series(&self, input_path: &Path) -> Result<Vec<NormalizedReading>> {
        tracing::info!(input = %input_path.display(), "loading series table");

        let mut readings = load_readings(input_path, &self.normalizer)?;
        sort_readings(&mut readings);
        Ok(readings)
    }

    /// Assemble and export every series on the worker pool
    #[instrument(skip_all, fields(phase = %self.config.phase, n_series = groups.len()))]
    fn save_features(
        &self,
        groups: &[&[NormalizedReading]],
        output_dir: &Path,
        progress: &dyn ProgressObserver,
    ) -> Result<Vec<SeriesExport>> {
        let exporter = SeriesExporter::new(output_dir);
        let assembler = FeatureAssembler::with_schema(&self.tables, self.config.feature_schema);
        let feature_names = self.config.feature_schema.names();

        let process = |group: &&[NormalizedReading]| -> Result<SeriesExport> {
            let series_id = &group[0].series_id;
            let table = assembler.assemble(group)?;
            let export = exporter.export(series_id, &table, feature_names)?;
            progress.on_series(&export);
            Ok(export)
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.num_threads.unwrap_or(0))
            .build()
            .map_err(|e| PrepareError::Config(format!("failed to create thread pool: {e}")))?;

        pool.install(|| groups.par_iter().map(process).collect())
    }
}

/// Run a full preparation pass for `config`
pub fn prepare_data(config: PrepareConfig) -> Result<PrepareSummary> {
    Pipeline::new(config)?.run()
}

/// Remove and recreate the output root of a phase
fn reset_output_dir(output_dir: &Path, phase: Phase) -> Result<()> {
    if output_dir.exists() {
        fs::remove_dir_all(output_dir).map_err(|e| PrepareError::io_at(output_dir, e))?;
        tracing::warn!(%phase, dir = %output_dir.display(), "removed existing output directory");
    }
    fs::create_dir_all(output_dir).map_err(|e| PrepareError::io_at(output_dir, e))
}

/// Stable sort by series, then time. Equal timestamps fall back to step.
pub fn sort_readings(readings: &mut [NormalizedReading]) {
    readings.sort_by(|a, b| {
        a.series_id
            .cmp(&b.series_id)
            .then_with(|| a.timestamp.cmp(&b.timestamp))
            .then_with(|| a.step.cmp(&b.step))
    });
}

/// Split sorted readings into contiguous runs of equal `series_id`
pub fn partition_by_series(readings: &[NormalizedReading]) -> Vec<&[NormalizedReading]> {
    let mut groups = Vec::new();
    let mut start = 0;

    for i in 1..=readings.len() {
        if i == readings.len() || readings[i].series_id != readings[start].series_id {
            if i > start {
                groups.push(&readings[start..i]);
            }
            start = i;
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn reading(series_id: &str, minute: u32, step: u32) -> NormalizedReading {
        NormalizedReading {
            series_id: series_id.into(),
            step,
            anglez: step as f32,
            enmo: 0.0,
            timestamp: Utc.with_ymd_and_hms(2020, 1, 1, 0, minute, 0).unwrap(),
            anglez_rad: 0.0,
        }
    }

    #[test]
    fn test_sort_by_series_then_time() {
        let mut readings = vec![
            reading("b", 5, 0),
            reading("a", 10, 1),
            reading("a", 0, 2),
            reading("b", 1, 3),
        ];
        sort_readings(&mut readings);

        let order: Vec<(&str, u32)> = readings
            .iter()
            .map(|r| (&*r.series_id, r.step))
            .collect();
        assert_eq!(order, vec![("a", 2), ("a", 1), ("b", 3), ("b", 0)]);
    }

    #[test]
    fn test_sort_ties_broken_by_step() {
        let mut readings = vec![reading("a", 0, 7), reading("a", 0, 3)];
        sort_readings(&mut readings);

        assert_eq!(readings[0].step, 3);
    }

    #[test]
    fn test_partition() {
        let readings = vec![
            reading("a", 0, 0),
            reading("a", 1, 1),
            reading("b", 0, 2),
            reading("c", 0, 3),
            reading("c", 1, 4),
        ];
        let groups = partition_by_series(&readings);

        let sizes: Vec<usize> = groups.iter().map(|g| g.len()).collect();
        assert_eq!(sizes, vec![2, 1, 2]);
        assert_eq!(&*groups[2][0].series_id, "c");
    }

    #[test]
    fn test_partition_empty() {
        assert!(partition_by_series(&[]).is_empty());
    }

    #[test]
    fn test_pipeline_rejects_zero_threads() {
        let config = PrepareConfig::new(Phase::Train).with_num_threads(Some(0));
        assert!(matches!(Pipeline::new(config), Err(PrepareError::Config(_))));
    }
}
