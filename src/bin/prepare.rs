//! prepare - Command-line interface for sleep-features
//!
//! Commands:
//! - run: Prepare per-series feature arrays for one phase
//! - validate: Load and parse an input table without writing anything
//! - schema: Print the exported feature schema
//! - inspect: Summarize the arrays of one exported series

use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::Array1;
use ndarray_npy::{ReadNpyError, ReadNpyExt};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::Level;

use sleep_features::pipeline::{partition_by_series, sort_readings};
use sleep_features::types::Dtype;
use sleep_features::{
    load_readings, ConfigOverrides, FeatureName, FeatureSchema, Normalizer, Pipeline,
    PrepareConfig, PrepareError, PrepareSummary, ProgressObserver, SeriesExport, PRODUCER_NAME, VERSION,
};

/// prepare - Turn accelerometer series into per-feature NumPy arrays
#[derive(Parser)]
#[command(name = "prepare")]
#[command(version = VERSION)]
#[command(about = "Prepare sleep-state features from accelerometer series", long_about = None)]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by commands that resolve a run configuration
#[derive(clap::Args)]
struct ConfigArgs {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dataset phase: train, test or dev
    #[arg(long)]
    phase: Option<String>,

    /// Source root for train and test tables
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Source root for the dev table and root of all output
    #[arg(long)]
    processed_dir: Option<PathBuf>,

    /// Explicit input table (.parquet, .ndjson or .jsonl)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Feature schema to export
    #[arg(long, value_enum)]
    feature_schema: Option<SchemaArg>,

    /// Worker threads (defaults to all cores)
    #[arg(long)]
    threads: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Prepare per-series feature arrays for one phase
    Run {
        #[command(flatten)]
        config: ConfigArgs,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,

        /// Disable the progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Load and parse an input table without writing anything
    Validate {
        #[command(flatten)]
        config: ConfigArgs,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the exported feature schema
    Schema {
        /// Schema to print
        #[arg(value_enum, default_value = "standard")]
        schema: SchemaArg,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Summarize the arrays of one exported series directory
    Inspect {
        /// Series directory (e.g. processed/train/038441c925bb)
        dir: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SchemaArg {
    /// anglez, enmo, hour encoding and time-of-day priors
    Standard,
    /// anglez, enmo, relative step, hour/month/minute encodings, angle trigonometry
    Extended,
}

impl From<SchemaArg> for FeatureSchema {
    fn from(arg: SchemaArg) -> Self {
        match arg {
            SchemaArg::Standard => FeatureSchema::Standard,
            SchemaArg::Extended => FeatureSchema::Extended,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let level = if verbose {
        Level::DEBUG
    } else if quiet {
        Level::WARN
    } else {
        Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), PrepareCliError> {
    match cli.command {
        Commands::Run {
            config,
            json,
            no_progress,
        } => cmd_run(&config, json, no_progress),
        Commands::Validate { config, json } => cmd_validate(&config, json),
        Commands::Schema { schema, json } => cmd_schema(schema.into(), json),
        Commands::Inspect { dir, json } => cmd_inspect(&dir, json),
    }
}

/// Resolve the run configuration: file values, replaced by any flag that is set
fn resolve_config(args: &ConfigArgs) -> Result<PrepareConfig, PrepareError> {
    let overrides = ConfigOverrides {
        phase: args.phase.clone(),
        data_dir: args.data_dir.clone(),
        processed_dir: args.processed_dir.clone(),
        input: args.input.clone(),
        feature_schema: args.feature_schema.map(FeatureSchema::from),
        num_threads: args.threads,
    };

    match &args.config {
        Some(path) => PrepareConfig::from_file_with_overrides(path, &overrides),
        None => PrepareConfig::from_overrides(&overrides),
    }
}

fn cmd_run(args: &ConfigArgs, json: bool, no_progress: bool) -> Result<(), PrepareCliError> {
    let config = resolve_config(args)?;
    let pipeline = Pipeline::new(config)?;

    let summary = if !no_progress && atty::is(atty::Stream::Stderr) {
        let progress = BarProgress::new();
        let summary = pipeline.run_with_progress(&progress);
        progress.bar.finish_and_clear();
        summary?
    } else {
        pipeline.run()?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    Ok(())
}

fn print_summary(summary: &PrepareSummary) {
    println!("Preparation Report");
    println!("==================");
    println!("Producer:  {} {}", PRODUCER_NAME, VERSION);
    println!("Run:       {}", summary.run_id);
    println!("Phase:     {}", summary.phase);
    println!("Input:     {}", summary.input_path.display());
    println!("Output:    {}", summary.output_dir.display());
    println!("Schema:    {}", summary.feature_schema.as_str());
    println!("Rows:      {}", summary.n_rows);
    println!("Series:    {}", summary.n_series);
    println!("Features:  {}", summary.feature_names.join(", "));
}

fn cmd_validate(args: &ConfigArgs, json: bool) -> Result<(), PrepareCliError> {
    let config = resolve_config(args)?;
    let input = config.input_path();

    let mut readings = load_readings(&input, &Normalizer::new(config.normalization))?;
    sort_readings(&mut readings);
    let groups = partition_by_series(&readings);

    let report = ValidationReport {
        input: input.display().to_string(),
        total_rows: readings.len(),
        series: groups
            .iter()
            .map(|group| SeriesReport {
                series_id: group[0].series_id.to_string(),
                n_rows: group.len(),
                first_timestamp: group[0].timestamp.to_rfc3339(),
                last_timestamp: group[group.len() - 1].timestamp.to_rfc3339(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Input:      {}", report.input);
        println!("Total rows: {}", report.total_rows);
        println!("Series:     {}", report.series.len());

        for series in &report.series {
            println!(
                "  - {}: {} rows ({} .. {})",
                series.series_id, series.n_rows, series.first_timestamp, series.last_timestamp
            );
        }
    }

    Ok(())
}

fn cmd_schema(schema: FeatureSchema, json: bool) -> Result<(), PrepareCliError> {
    let columns: Vec<SchemaColumn> = schema
        .names()
        .iter()
        .map(|name| SchemaColumn {
            name: name.as_str().to_string(),
            file: name.file_name(),
            dtype: name.dtype().numpy_str().to_string(),
        })
        .collect();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "schema": schema.as_str(),
                "columns": columns,
            }))?
        );
    } else {
        println!("Feature Schema: {}", schema.as_str());
        println!();
        println!("Each series directory holds one 1-D array per feature:");
        println!();
        for column in &columns {
            println!("  {:<14} {:<9} {}", column.name, column.dtype, column.file);
        }
    }

    Ok(())
}

fn cmd_inspect(dir: &Path, json: bool) -> Result<(), PrepareCliError> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("npy"))
        .collect();
    paths.sort();

    if paths.is_empty() {
        return Err(PrepareCliError::NoArrays(dir.display().to_string()));
    }

    let mut reports = Vec::with_capacity(paths.len());
    for path in &paths {
        reports.push(inspect_array(path)?);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        println!("Series: {}", dir.display());
        println!();
        println!(
            "  {:<14} {:<9} {:>8} {:>12} {:>12} {:>12}",
            "feature", "dtype", "len", "min", "max", "mean"
        );
        for r in &reports {
            println!(
                "  {:<14} {:<9} {:>8} {:>12.6} {:>12.6} {:>12.6}",
                r.feature, r.dtype, r.len, r.min, r.max, r.mean
            );
        }
    }

    Ok(())
}

fn feature_from_stem(stem: &str) -> Option<FeatureName> {
    FeatureSchema::Extended
        .names()
        .iter()
        .chain(FeatureSchema::Standard.names())
        .copied()
        .find(|name| name.as_str() == stem)
}

fn inspect_array(path: &Path) -> Result<ArrayReport, PrepareCliError> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    let dtype = feature_from_stem(&stem).map(|f| f.dtype()).unwrap_or(Dtype::F64);

    let values: Vec<f64> = match dtype {
        Dtype::F32 => Array1::<f32>::read_npy(File::open(path)?)?
            .iter()
            .map(|&v| f64::from(v))
            .collect(),
        Dtype::F64 => Array1::<f64>::read_npy(File::open(path)?)?.to_vec(),
    };

    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let (min, max, mean) = if finite.is_empty() {
        (f64::NAN, f64::NAN, f64::NAN)
    } else {
        (
            finite.iter().copied().fold(f64::INFINITY, f64::min),
            finite.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            finite.iter().sum::<f64>() / finite.len() as f64,
        )
    };

    Ok(ArrayReport {
        feature: stem,
        dtype: dtype.numpy_str().to_string(),
        len: values.len(),
        non_finite: values.len() - finite.len(),
        min,
        max,
        mean,
    })
}

// Progress reporting

struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} series ({eta})")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        Self { bar }
    }
}

impl ProgressObserver for BarProgress {
    fn on_start(&self, n_series: usize) {
        self.bar.set_length(n_series as u64);
    }

    fn on_series(&self, _export: &SeriesExport) {
        self.bar.inc(1);
    }
}

// Error types

#[derive(Debug)]
enum PrepareCliError {
    Io(io::Error),
    Prepare(PrepareError),
    Json(serde_json::Error),
    ReadArray(ReadNpyError),
    NoArrays(String),
}

impl From<io::Error> for PrepareCliError {
    fn from(e: io::Error) -> Self {
        PrepareCliError::Io(e)
    }
}

impl From<PrepareError> for PrepareCliError {
    fn from(e: PrepareError) -> Self {
        PrepareCliError::Prepare(e)
    }
}

impl From<serde_json::Error> for PrepareCliError {
    fn from(e: serde_json::Error) -> Self {
        PrepareCliError::Json(e)
    }
}

impl From<ReadNpyError> for PrepareCliError {
    fn from(e: ReadNpyError) -> Self {
        PrepareCliError::ReadArray(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    stage: String,
    message: String,
    hint: Option<String>,
}

impl From<PrepareCliError> for CliError {
    fn from(e: PrepareCliError) -> Self {
        match e {
            PrepareCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                stage: "io".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            PrepareCliError::Prepare(e) => {
                let (code, hint) = match &e {
                    PrepareError::InvalidPhase(_) => (
                        "INVALID_PHASE",
                        "Set --phase or the config \"phase\" to train, test or dev",
                    ),
                    PrepareError::Config(_) | PrepareError::InvalidPeriod(_) => {
                        ("CONFIG_ERROR", "Check the configuration file and flags")
                    }
                    PrepareError::MalformedTimestamp { .. } => (
                        "MALFORMED_TIMESTAMP",
                        "Timestamps must look like 2018-08-14T15:30:00-0400",
                    ),
                    PrepareError::MissingColumn(_) | PrepareError::NullValue { .. } => (
                        "SCHEMA_ERROR",
                        "Input needs series_id, step, anglez, enmo and timestamp columns",
                    ),
                    PrepareError::LookupDomain(_) => {
                        ("LOOKUP_DOMAIN", "Time bucket derivation produced an impossible value")
                    }
                    PrepareError::Io(_) | PrepareError::IoAt { .. } => {
                        ("IO_ERROR", "Check file paths and permissions")
                    }
                    _ => ("PREPARE_ERROR", "Run 'prepare validate' to check the input"),
                };
                CliError {
                    code: code.to_string(),
                    stage: e.stage().to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            PrepareCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                stage: "report".to_string(),
                message: e.to_string(),
                hint: None,
            },
            PrepareCliError::ReadArray(e) => CliError {
                code: "ARRAY_ERROR".to_string(),
                stage: "inspect".to_string(),
                message: e.to_string(),
                hint: Some("Files must be 1-D float32/float64 .npy arrays".to_string()),
            },
            PrepareCliError::NoArrays(dir) => CliError {
                code: "NO_ARRAYS".to_string(),
                stage: "inspect".to_string(),
                message: format!("No .npy files found in {}", dir),
                hint: Some("Point inspect at a single series directory".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    input: String,
    total_rows: usize,
    series: Vec<SeriesReport>,
}

#[derive(serde::Serialize)]
struct SeriesReport {
    series_id: String,
    n_rows: usize,
    first_timestamp: String,
    last_timestamp: String,
}

#[derive(serde::Serialize)]
struct SchemaColumn {
    name: String,
    file: String,
    dtype: String,
}

#[derive(serde::Serialize)]
struct ArrayReport {
    feature: String,
    dtype: String,
    len: usize,
    non_finite: usize,
    min: f64,
    max: f64,
    mean: f64,
}
