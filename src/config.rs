//! Run configuration
//!
//! A run is described by a small JSON document:
//!
//! ```json
//! {
//!   "phase": "train",
//!   "dir": { "data_dir": "data", "processed_dir": "processed" },
//!   "feature_schema": "standard",
//!   "num_threads": null
//! }
//! ```
//!
//! Command-line flags are applied as [`ConfigOverrides`] on top of the file,
//! so a shared file may leave `phase` out. The phase is validated after
//! overrides and before any filesystem access.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{PrepareError, Result};
use crate::normalizer::NormalizationParams;
use crate::signals::SignalParams;
use crate::types::FeatureSchema;

/// Dataset partition being processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Train,
    Test,
    Dev,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Train => "train",
            Phase::Test => "test",
            Phase::Dev => "dev",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = PrepareError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "train" => Ok(Phase::Train),
            "test" => Ok(Phase::Test),
            "dev" => Ok(Phase::Dev),
            other => Err(PrepareError::InvalidPhase(other.to_string())),
        }
    }
}

/// Input and output roots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirConfig {
    /// Source root for the train and test tables
    pub data_dir: PathBuf,
    /// Source root for the dev table and root of all output
    pub processed_dir: PathBuf,
}

impl Default for DirConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            processed_dir: PathBuf::from("processed"),
        }
    }
}

/// Configuration of one preparation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrepareConfig {
    pub phase: Phase,
    #[serde(default)]
    pub dir: DirConfig,
    /// Explicit input table, replacing the phase default
    #[serde(default)]
    pub input: Option<PathBuf>,
    #[serde(default)]
    pub feature_schema: FeatureSchema,
    /// Worker threads for per-series export; `None` uses every core
    #[serde(default)]
    pub num_threads: Option<usize>,
    #[serde(default)]
    pub normalization: NormalizationParams,
    #[serde(default)]
    pub signals: SignalParams,
}

/// Values given on the command line; each one that is set replaces the file value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub phase: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub processed_dir: Option<PathBuf>,
    pub input: Option<PathBuf>,
    pub feature_schema: Option<FeatureSchema>,
    pub num_threads: Option<usize>,
}

/// Raw file form, with the phase kept as text so that an unknown value maps
/// to [`PrepareError::InvalidPhase`]
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    phase: Option<String>,
    #[serde(default)]
    dir: DirConfig,
    #[serde(default)]
    input: Option<PathBuf>,
    #[serde(default)]
    feature_schema: Option<String>,
    #[serde(default)]
    num_threads: Option<usize>,
    #[serde(default)]
    normalization: NormalizationParams,
    #[serde(default)]
    signals: SignalParams,
}

impl PrepareConfig {
    /// Configuration with default directories and constants
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            dir: DirConfig::default(),
            input: None,
            feature_schema: FeatureSchema::default(),
            num_threads: None,
            normalization: NormalizationParams::default(),
            signals: SignalParams::default(),
        }
    }

    pub fn with_dirs<P: AsRef<Path>, Q: AsRef<Path>>(mut self, data_dir: P, processed_dir: Q) -> Self {
        self.dir = DirConfig {
            data_dir: data_dir.as_ref().to_path_buf(),
            processed_dir: processed_dir.as_ref().to_path_buf(),
        };
        self
    }

    pub fn with_input<P: AsRef<Path>>(mut self, input: P) -> Self {
        self.input = Some(input.as_ref().to_path_buf());
        self
    }

    pub fn with_feature_schema(mut self, schema: FeatureSchema) -> Self {
        self.feature_schema = schema;
        self
    }

    pub fn with_num_threads(mut self, num_threads: Option<usize>) -> Self {
        self.num_threads = num_threads;
        self
    }

    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_json_with_overrides(json, &ConfigOverrides::default())
    }

    /// Parse a JSON configuration, apply `overrides`, then validate
    pub fn from_json_with_overrides(json: &str, overrides: &ConfigOverrides) -> Result<Self> {
        let file: ConfigFile =
            serde_json::from_str(json).map_err(|e| PrepareError::Config(e.to_string()))?;
        Self::resolve(file, overrides)
    }

    /// Load a JSON configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_file_with_overrides(path, &ConfigOverrides::default())
    }

    /// Load a JSON configuration file and apply `overrides`
    pub fn from_file_with_overrides<P: AsRef<Path>>(
        path: P,
        overrides: &ConfigOverrides,
    ) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            PrepareError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_with_overrides(&json, overrides)
    }

    /// Build a configuration from defaults and `overrides` alone
    pub fn from_overrides(overrides: &ConfigOverrides) -> Result<Self> {
        Self::resolve(ConfigFile::default(), overrides)
    }

    fn resolve(file: ConfigFile, overrides: &ConfigOverrides) -> Result<Self> {
        let phase = overrides
            .phase
            .as_ref()
            .or(file.phase.as_ref())
            .ok_or_else(|| PrepareError::Config("phase is required".to_string()))?
            .parse::<Phase>()?;

        let feature_schema = match overrides.feature_schema {
            Some(schema) => schema,
            None => file
                .feature_schema
                .as_deref()
                .map(str::parse::<FeatureSchema>)
                .transpose()?
                .unwrap_or_default(),
        };

        let config = Self {
            phase,
            dir: DirConfig {
                data_dir: overrides.data_dir.clone().unwrap_or(file.dir.data_dir),
                processed_dir: overrides
                    .processed_dir
                    .clone()
                    .unwrap_or(file.dir.processed_dir),
            },
            input: overrides.input.clone().or(file.input),
            feature_schema,
            num_threads: overrides.num_threads.or(file.num_threads),
            normalization: file.normalization,
            signals: file.signals,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<()> {
        if self.num_threads == Some(0) {
            return Err(PrepareError::Config(
                "num_threads must be at least 1".to_string(),
            ));
        }

        let n = &self.normalization;
        if !(n.anglez_std > 0.0 && n.enmo_std > 0.0) {
            return Err(PrepareError::Config(
                "normalization standard deviations must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Input table for the configured phase
    pub fn input_path(&self) -> PathBuf {
        if let Some(input) = &self.input {
            return input.clone();
        }

        let file_name = format!("{}_series.parquet", self.phase);
        match self.phase {
            Phase::Train | Phase::Test => self.dir.data_dir.join(file_name),
            Phase::Dev => self.dir.processed_dir.join(file_name),
        }
    }

    /// Output root for the configured phase
    pub fn output_dir(&self) -> PathBuf {
        self.dir.processed_dir.join(self.phase.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_from_str() {
        assert_eq!("train".parse::<Phase>().unwrap(), Phase::Train);
        assert_eq!("dev".parse::<Phase>().unwrap(), Phase::Dev);
        assert!(matches!(
            "bogus".parse::<Phase>(),
            Err(PrepareError::InvalidPhase(p)) if p == "bogus"
        ));
    }

    #[test]
    fn test_input_path_by_phase() {
        let config = PrepareConfig::new(Phase::Train).with_dirs("/data", "/processed");
        assert_eq!(config.input_path(), PathBuf::from("/data/train_series.parquet"));

        let config = PrepareConfig::new(Phase::Test).with_dirs("/data", "/processed");
        assert_eq!(config.input_path(), PathBuf::from("/data/test_series.parquet"));

        let config = PrepareConfig::new(Phase::Dev).with_dirs("/data", "/processed");
        assert_eq!(config.input_path(), PathBuf::from("/processed/dev_series.parquet"));
        assert_eq!(config.output_dir(), PathBuf::from("/processed/dev"));

        let config = config.with_input("/tmp/small.ndjson");
        assert_eq!(config.input_path(), PathBuf::from("/tmp/small.ndjson"));
    }

    #[test]
    fn test_from_json() {
        let config = PrepareConfig::from_json(
            r#"{
                "phase": "test",
                "dir": { "data_dir": "in", "processed_dir": "out" },
                "feature_schema": "extended",
                "num_threads": 2
            }"#,
        )
        .unwrap();

        assert_eq!(config.phase, Phase::Test);
        assert_eq!(config.dir.data_dir, PathBuf::from("in"));
        assert_eq!(config.feature_schema, FeatureSchema::Extended);
        assert_eq!(config.num_threads, Some(2));
        assert_eq!(config.normalization, NormalizationParams::default());
        assert_eq!(config.signals, SignalParams::default());
    }

    #[test]
    fn test_from_json_defaults() {
        let config = PrepareConfig::from_json(r#"{ "phase": "train" }"#).unwrap();

        assert_eq!(config.dir, DirConfig::default());
        assert_eq!(config.feature_schema, FeatureSchema::Standard);
        assert_eq!(config.num_threads, None);
    }

    #[test]
    fn test_from_json_invalid_phase() {
        let result = PrepareConfig::from_json(r#"{ "phase": "bogus" }"#);
        assert!(matches!(result, Err(PrepareError::InvalidPhase(_))));
    }

    #[test]
    fn test_from_json_missing_phase() {
        let result = PrepareConfig::from_json(r#"{ "dir": { "data_dir": "a", "processed_dir": "b" } }"#);
        assert!(matches!(result, Err(PrepareError::Config(_))));
    }

    #[test]
    fn test_flag_phase_fills_missing_file_phase() {
        let overrides = ConfigOverrides {
            phase: Some("dev".to_string()),
            ..Default::default()
        };
        let config = PrepareConfig::from_json_with_overrides(
            r#"{ "dir": { "data_dir": "d", "processed_dir": "p" } }"#,
            &overrides,
        )
        .unwrap();

        assert_eq!(config.phase, Phase::Dev);
        assert_eq!(config.input_path(), PathBuf::from("p/dev_series.parquet"));
    }

    #[test]
    fn test_flags_take_precedence_over_file() {
        let overrides = ConfigOverrides {
            phase: Some("test".to_string()),
            processed_dir: Some(PathBuf::from("elsewhere")),
            feature_schema: Some(FeatureSchema::Standard),
            num_threads: Some(4),
            ..Default::default()
        };
        let config = PrepareConfig::from_json_with_overrides(
            r#"{
                "phase": "train",
                "dir": { "data_dir": "in", "processed_dir": "out" },
                "feature_schema": "extended",
                "num_threads": 2
            }"#,
            &overrides,
        )
        .unwrap();

        assert_eq!(config.phase, Phase::Test);
        assert_eq!(config.dir.data_dir, PathBuf::from("in"));
        assert_eq!(config.dir.processed_dir, PathBuf::from("elsewhere"));
        assert_eq!(config.feature_schema, FeatureSchema::Standard);
        assert_eq!(config.num_threads, Some(4));
    }

    #[test]
    fn test_flag_phase_replaces_invalid_file_phase() {
        let overrides = ConfigOverrides {
            phase: Some("train".to_string()),
            ..Default::default()
        };
        let config =
            PrepareConfig::from_json_with_overrides(r#"{ "phase": "bogus" }"#, &overrides).unwrap();

        assert_eq!(config.phase, Phase::Train);
    }

    #[test]
    fn test_invalid_flag_phase() {
        let overrides = ConfigOverrides {
            phase: Some("bogus".to_string()),
            ..Default::default()
        };
        let result = PrepareConfig::from_json_with_overrides(r#"{ "phase": "train" }"#, &overrides);
        assert!(matches!(result, Err(PrepareError::InvalidPhase(p)) if p == "bogus"));
    }

    #[test]
    fn test_from_overrides_without_phase() {
        let result = PrepareConfig::from_overrides(&ConfigOverrides::default());
        assert!(matches!(result, Err(PrepareError::Config(_))));

        let overrides = ConfigOverrides {
            phase: Some("train".to_string()),
            data_dir: Some(PathBuf::from("/data")),
            ..Default::default()
        };
        let config = PrepareConfig::from_overrides(&overrides).unwrap();
        assert_eq!(config.input_path(), PathBuf::from("/data/train_series.parquet"));
        assert_eq!(config.dir.processed_dir, PathBuf::from("processed"));
    }

    #[test]
    fn test_zero_threads_rejected() {
        let result = PrepareConfig::from_json(r#"{ "phase": "dev", "num_threads": 0 }"#);
        assert!(matches!(result, Err(PrepareError::Config(_))));
    }
}
