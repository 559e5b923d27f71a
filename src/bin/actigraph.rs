//! Actigraph CLI - Command-line interface for Synheart Actigraph
//!
//! Commands:
//! - process: Run one recording session through the pipeline, or reconcile
//!   a saved window table with the session's sleep and step records
//! - validate: Check measurement records without processing them
//! - config: Print the default pipeline configuration

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use synheart_actigraph::schema::{RawRecord, RecordAdapter};
use synheart_actigraph::types::{ActivityWindow, Thresholds};
use synheart_actigraph::{
    ActivityProcessor, ComputeError, PipelineConfig, TracingObserver, VERSION,
};

/// Actigraph - Activity and sleep timelines from wrist-worn sensor logs
#[derive(Parser)]
#[command(name = "actigraph")]
#[command(author = "Synheart AI Inc")]
#[command(version = VERSION)]
#[command(about = "Turn raw accelerometer and counter logs into an activity timeline", long_about = None)]
struct Cli {
    /// Log pipeline diagnostics to stderr (repeat for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process one recording session into a session report
    Process {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Pipeline configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Reuse a persisted threshold record instead of deriving one
        #[arg(long)]
        thresholds: Option<PathBuf>,

        /// Write the threshold record used for classification to a file
        #[arg(long, conflicts_with = "windows")]
        thresholds_out: Option<PathBuf>,

        /// Reuse a classified window table (JSON array) instead of the
        /// accelerometer records; only the timeline is written
        #[arg(long, conflicts_with = "thresholds")]
        windows: Option<PathBuf>,

        /// Shift all record timestamps by this many milliseconds
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        time_offset_ms: i64,

        /// Pretty-print the report
        #[arg(long)]
        pretty: bool,
    },

    /// Validate measurement records
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the default pipeline configuration
    Config,
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

/// Install a stderr fmt subscriber; `RUST_LOG` wins over `-v`
fn setup_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let layer = fmt::layer()
        .with_target(false)
        .with_writer(io::stderr);

    tracing_subscriber::registry().with(filter).with(layer).init();
}

fn run(cli: Cli) -> Result<(), ActigraphCliError> {
    match cli.command {
        Commands::Process {
            input,
            output,
            input_format,
            config,
            thresholds,
            thresholds_out,
            windows,
            time_offset_ms,
            pretty,
        } => cmd_process(
            &input,
            &output,
            input_format,
            config.as_deref(),
            thresholds.as_deref(),
            thresholds_out.as_deref(),
            windows.as_deref(),
            time_offset_ms,
            pretty,
        ),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Config => cmd_config(),
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_process(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    config: Option<&Path>,
    thresholds: Option<&Path>,
    thresholds_out: Option<&Path>,
    windows: Option<&Path>,
    time_offset_ms: i64,
    pretty: bool,
) -> Result<(), ActigraphCliError> {
    let mut pipeline_config = match config {
        Some(path) => PipelineConfig::from_json(&fs::read_to_string(path)?)?,
        None => PipelineConfig::default(),
    };
    if let Some(path) = thresholds {
        let record: Thresholds = serde_json::from_str(&fs::read_to_string(path)?)?;
        pipeline_config.classifier.thresholds = Some(record);
    }
    let processor = ActivityProcessor::with_config(pipeline_config)?;

    let records = read_records(input, &input_format)?;
    if records.is_empty() {
        return Err(ActigraphCliError::NoRecords);
    }

    let adapter = RecordAdapter::with_time_offset_ms(time_offset_ms);
    if let Some(path) = windows {
        let table: Vec<ActivityWindow> = serde_json::from_str(&fs::read_to_string(path)?)?;
        let input = adapter.to_session(&records, &TracingObserver);
        let timeline =
            processor.reconcile_windows(&table, &input.sleep, &input.steps, &TracingObserver)?;
        tracing::info!(
            windows = table.len(),
            entries = timeline.len(),
            "window table reconciled"
        );

        let output_data = if pretty {
            serde_json::to_string_pretty(&timeline)?
        } else {
            serde_json::to_string(&timeline)?
        };
        return write_output(output, &output_data);
    }

    let report = processor.process_records(&records, &adapter, &TracingObserver)?;
    tracing::info!(
        session_id = %report.session_id,
        entries = report.timeline.len(),
        "session processed"
    );

    if let Some(path) = thresholds_out {
        fs::write(path, serde_json::to_string_pretty(&report.thresholds)?)?;
    }

    let output_data = if pretty {
        report.to_json_pretty()?
    } else {
        report.to_json()?
    };
    write_output(output, &output_data)
}

fn cmd_validate(
    input: &Path,
    input_format: InputFormat,
    json: bool,
) -> Result<(), ActigraphCliError> {
    let records = read_records(input, &input_format)?;
    let results = RecordAdapter::new().validate_records(&records);

    let report = ValidationReport {
        total_records: records.len(),
        valid_records: records.len() - results.len(),
        invalid_records: results.len(),
        errors: results
            .iter()
            .map(|r| ValidationErrorDetail {
                index: r.index,
                kind: r.kind.clone(),
                error: r.error.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total records:   {}", report.total_records);
        println!("Valid records:   {}", report.valid_records);
        println!("Invalid records: {}", report.invalid_records);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - Record {} ({}): {}", err.index, err.kind, err.error);
            }
        }
    }

    if report.invalid_records > 0 {
        Err(ActigraphCliError::ValidationFailed(report.invalid_records))
    } else {
        Ok(())
    }
}

fn cmd_config() -> Result<(), ActigraphCliError> {
    println!("{}", PipelineConfig::default().to_json()?);
    Ok(())
}

// Helper functions

fn read_records(input: &Path, format: &InputFormat) -> Result<Vec<RawRecord>, ActigraphCliError> {
    let input_data = if input.to_string_lossy() == "-" {
        if atty::is(atty::Stream::Stdin) {
            return Err(ActigraphCliError::StdinIsTerminal);
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let records = match format {
        InputFormat::Ndjson => RecordAdapter::parse_ndjson(&input_data)?,
        InputFormat::Json => RecordAdapter::parse_array(&input_data)?,
    };
    Ok(records)
}

fn write_output(output: &Path, data: &str) -> Result<(), ActigraphCliError> {
    if output.to_string_lossy() == "-" {
        println!("{}", data);
    } else {
        fs::write(output, data)?;
    }
    Ok(())
}

// Error handling

enum ActigraphCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    NoRecords,
    StdinIsTerminal,
    ValidationFailed(usize),
}

impl From<io::Error> for ActigraphCliError {
    fn from(e: io::Error) -> Self {
        ActigraphCliError::Io(e)
    }
}

impl From<ComputeError> for ActigraphCliError {
    fn from(e: ComputeError) -> Self {
        ActigraphCliError::Compute(e)
    }
}

impl From<serde_json::Error> for ActigraphCliError {
    fn from(e: serde_json::Error) -> Self {
        ActigraphCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<ActigraphCliError> for CliError {
    fn from(e: ActigraphCliError) -> Self {
        match e {
            ActigraphCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            ActigraphCliError::Compute(e) => compute_error(e),
            ActigraphCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            ActigraphCliError::NoRecords => CliError {
                code: "NO_RECORDS".to_string(),
                message: "No records found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            ActigraphCliError::StdinIsTerminal => CliError {
                code: "NO_INPUT".to_string(),
                message: "stdin is a terminal".to_string(),
                hint: Some("Pipe records into stdin or pass a file with --input".to_string()),
            },
            ActigraphCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} records failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
        }
    }
}

fn compute_error(e: ComputeError) -> CliError {
    let (code, hint) = match &e {
        ComputeError::Configuration(_) => (
            "CONFIGURATION_ERROR",
            "Check the configuration file and that all three axes are present",
        ),
        ComputeError::DataFormat { .. } => ("DATA_FORMAT_ERROR", "Run 'actigraph validate' for details"),
        ComputeError::AlignmentExhaustion { .. } => (
            "ALIGNMENT_EXHAUSTED",
            "Axis clocks diverge beyond the look-ahead limit; raise aligner.max_window or split the session",
        ),
        ComputeError::InvariantViolation { .. } => (
            "INVARIANT_VIOLATION",
            "The timeline failed its consistency check; please report this input",
        ),
        ComputeError::InsufficientData(_) => (
            "INSUFFICIENT_DATA",
            "Provide sleep_total records overlapping the recording, or pass --thresholds",
        ),
        ComputeError::ParseError(_) | ComputeError::JsonError(_) => {
            ("PARSE_ERROR", "Ensure each record has date_time, kind and data fields")
        }
    };
    CliError {
        code: code.to_string(),
        message: e.to_string(),
        hint: Some(hint.to_string()),
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_records: usize,
    valid_records: usize,
    invalid_records: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    kind: String,
    error: String,
}
