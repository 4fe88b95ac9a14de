//! Stress CLI - Command-line interface for Synheart Stress
//!
//! Commands:
//! - analyze: Replay recorded beat intervals and emit stress reports
//! - simulate: Run the synthetic interval source through the engine
//! - doctor: Diagnose configuration and baseline health

use chrono::Duration;
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use synheart_stress::baseline::BaselineLearner;
use synheart_stress::clock::{Clock, ManualClock};
use synheart_stress::config::EngineConfig;
use synheart_stress::encoder::{StressEncoder, StressReport};
use synheart_stress::pipeline::StressProcessor;
use synheart_stress::sources::{SimulatedSource, SourceManager};
use synheart_stress::types::BeatInterval;
use synheart_stress::{StressError, ENGINE_VERSION, PRODUCER_NAME};

/// Stress - On-device HRV analysis and stress scoring
#[derive(Parser)]
#[command(name = "stress")]
#[command(author = "Synheart AI Inc")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Score stress from beat-to-beat intervals", long_about = None)]
struct Cli {
    /// Log engine decisions to stderr (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay recorded intervals and emit a report per tick plus a final one
    Analyze {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        format: InputFormat,

        /// Engine configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Buffer window in seconds (overrides the config file)
        #[arg(long)]
        window_secs: Option<f64>,

        /// Recomputation period in seconds (overrides the config file)
        #[arg(long)]
        tick_secs: Option<f64>,

        /// Load baseline from file
        #[arg(long)]
        load_baseline: Option<PathBuf>,

        /// Save baseline to file after processing
        #[arg(long)]
        save_baseline: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,
    },

    /// Run the synthetic interval source and emit reports
    Simulate {
        /// Simulated duration in seconds
        #[arg(long, default_value = "120")]
        seconds: u32,

        /// Mean interval in milliseconds
        #[arg(long, default_value = "800")]
        mean_ms: f64,

        /// Engine configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,
    },

    /// Diagnose configuration and baseline health
    Doctor {
        /// Check baseline file
        #[arg(long)]
        baseline: Option<PathBuf>,

        /// Check engine configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one interval per line)
    Ndjson,
    /// JSON array of intervals
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one report per line)
    Ndjson,
    /// JSON array of reports
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let error = CliError::from(e);
            eprintln!(
                "{}",
                serde_json::to_string(&error).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), StressCliError> {
    match cli.command {
        Commands::Analyze {
            input,
            format,
            config,
            window_secs,
            tick_secs,
            load_baseline,
            save_baseline,
            output_format,
        } => {
            let config = load_config(config.as_deref(), window_secs, tick_secs)?;
            cmd_analyze(
                &input,
                format,
                config,
                load_baseline.as_deref(),
                save_baseline.as_deref(),
                output_format,
            )
        }

        Commands::Simulate {
            seconds,
            mean_ms,
            config,
            output_format,
        } => {
            let config = load_config(config.as_deref(), None, None)?;
            cmd_simulate(seconds, mean_ms, config, output_format)
        }

        Commands::Doctor {
            baseline,
            config,
            json,
        } => cmd_doctor(baseline.as_deref(), config.as_deref(), json),
    }
}

fn load_config(
    path: Option<&Path>,
    window_secs: Option<f64>,
    tick_secs: Option<f64>,
) -> Result<EngineConfig, StressCliError> {
    let mut config = match path {
        Some(path) => EngineConfig::from_json(&fs::read_to_string(path)?)?,
        None => EngineConfig::default(),
    };
    if let Some(window) = window_secs {
        config.window_secs = window;
    }
    if let Some(tick) = tick_secs {
        config.tick_secs = tick;
    }
    config.validate()?;
    Ok(config)
}

fn cmd_analyze(
    input: &Path,
    format: InputFormat,
    config: EngineConfig,
    load_baseline: Option<&Path>,
    save_baseline: Option<&Path>,
    output_format: OutputFormat,
) -> Result<(), StressCliError> {
    // Read input
    let input_data = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let mut intervals = match format {
        InputFormat::Ndjson => parse_ndjson(&input_data)?,
        InputFormat::Json => parse_array(&input_data)?,
    };
    intervals.sort_by_key(|i| i.timestamp);

    let first = match intervals.first() {
        Some(first) => first.timestamp,
        None => return Err(StressCliError::NoIntervals),
    };

    // The clock follows interval timestamps so windows and ticks use recorded time
    let clock = ManualClock::new(first);
    let mut processor = StressProcessor::with_config(config, Box::new(clock.clone()))?;

    if let Some(path) = load_baseline {
        processor.load_baseline(&fs::read_to_string(path)?)?;
    }

    let encoder = StressEncoder::new();
    let mut reports: Vec<StressReport> = Vec::new();
    let mut accepted = 0usize;

    for interval in &intervals {
        clock.set(interval.timestamp);
        if processor.ingest(*interval).is_accepted() {
            accepted += 1;
        }
        if let Some(reading) = processor.tick() {
            reports.push(encoder.encode(&reading));
        }
    }

    reports.push(encoder.encode(&processor.reading()));

    tracing::info!(
        total = intervals.len(),
        accepted,
        rejected = intervals.len() - accepted,
        reports = reports.len(),
        "analysis complete"
    );

    if let Some(path) = save_baseline {
        fs::write(path, processor.save_baseline()?)?;
    }

    print!("{}", format_output(&reports, &output_format)?);
    Ok(())
}

fn cmd_simulate(
    seconds: u32,
    mean_ms: f64,
    config: EngineConfig,
    output_format: OutputFormat,
) -> Result<(), StressCliError> {
    let start = chrono::Utc::now();
    let clock = ManualClock::new(start);
    let mut processor = StressProcessor::with_config(config, Box::new(clock.clone()))?;

    let mut sources = SourceManager::new();
    sources.switch_to(Box::new(SimulatedSource::new(mean_ms)?), start)?;

    let encoder = StressEncoder::new();
    let mut reports: Vec<StressReport> = Vec::new();

    for _ in 0..seconds {
        clock.advance(Duration::seconds(1));
        for interval in sources.poll(clock.now())? {
            processor.ingest(interval);
        }
        if let Some(reading) = processor.tick() {
            reports.push(encoder.encode(&reading));
        }
    }
    sources.stop();

    print!("{}", format_output(&reports, &output_format)?);
    Ok(())
}

fn cmd_doctor(
    baseline: Option<&Path>,
    config: Option<&Path>,
    json: bool,
) -> Result<(), StressCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    // Check engine version
    checks.push(DoctorCheck {
        name: "engine_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Stress engine version {}", ENGINE_VERSION),
    });

    // Check configuration; the baseline check below uses it when valid
    let mut engine_config = EngineConfig::default();
    let config_check = match config {
        None => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: "Using built-in defaults".to_string(),
        },
        Some(path) => match fs::read_to_string(path) {
            Ok(content) => match EngineConfig::from_json(&content) {
                Ok(config) => {
                    let check = DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Ok,
                        message: format!(
                            "Config valid (window {}s, tick {}s)",
                            config.window_secs, config.tick_secs
                        ),
                    };
                    engine_config = config;
                    check
                }
                Err(e) => DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: e.to_string(),
                },
            },
            Err(e) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: format!("Cannot read config file: {}", e),
            },
        },
    };
    checks.push(config_check);

    // Check baseline file if provided
    if let Some(path) = baseline {
        let check = if !path.exists() {
            DoctorCheck {
                name: "baseline".to_string(),
                status: CheckStatus::Warning,
                message: "Baseline file does not exist".to_string(),
            }
        } else {
            match fs::read_to_string(path) {
                Ok(content) => match BaselineLearner::from_json(&content, &engine_config) {
                    Ok(learner) => DoctorCheck {
                        name: "baseline".to_string(),
                        status: CheckStatus::Ok,
                        message: format!(
                            "Baseline file valid ({}, {} measurements)",
                            learner.state().as_str(),
                            learner.sample_count()
                        ),
                    },
                    Err(e) => DoctorCheck {
                        name: "baseline".to_string(),
                        status: CheckStatus::Error,
                        message: format!("Invalid baseline: {}", e),
                    },
                },
                Err(e) => DoctorCheck {
                    name: "baseline".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Cannot read baseline file: {}", e),
                },
            }
        };
        checks.push(check);
    }

    // Check stdin is available (for `analyze --input -`)
    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (ready for --input -)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: ENGINE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Stress Doctor Report");
        println!("====================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");
        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(StressCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn parse_ndjson(data: &str) -> Result<Vec<BeatInterval>, StressCliError> {
    let mut intervals = Vec::new();
    for (index, line) in data.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let interval = BeatInterval::from_json(trimmed).map_err(|e| {
            StressCliError::ParseError(format!("Line {}: {}", index + 1, e))
        })?;
        intervals.push(interval);
    }
    Ok(intervals)
}

fn parse_array(data: &str) -> Result<Vec<BeatInterval>, StressCliError> {
    let values: Vec<serde_json::Value> = serde_json::from_str(data)?;
    values
        .iter()
        .enumerate()
        .map(|(index, value)| {
            BeatInterval::from_json(&value.to_string()).map_err(|e| {
                StressCliError::ParseError(format!("Element {}: {}", index, e))
            })
        })
        .collect()
}

fn format_output(
    reports: &[StressReport],
    format: &OutputFormat,
) -> Result<String, StressCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for report in reports {
                lines.push(serde_json::to_string(report)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(reports)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(reports)?),
    }
}

// Error types

#[derive(Debug)]
enum StressCliError {
    Io(io::Error),
    Engine(StressError),
    Json(serde_json::Error),
    NoIntervals,
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for StressCliError {
    fn from(e: io::Error) -> Self {
        StressCliError::Io(e)
    }
}

impl From<StressError> for StressCliError {
    fn from(e: StressError) -> Self {
        StressCliError::Engine(e)
    }
}

impl From<serde_json::Error> for StressCliError {
    fn from(e: serde_json::Error) -> Self {
        StressCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<StressCliError> for CliError {
    fn from(e: StressCliError) -> Self {
        match e {
            StressCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            StressCliError::Engine(StressError::InvalidConfig(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Run 'stress doctor --config <file>' for details".to_string()),
            },
            StressCliError::Engine(e) => CliError {
                code: "ENGINE_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            StressCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            StressCliError::NoIntervals => CliError {
                code: "NO_INTERVALS".to_string(),
                message: "No beat intervals found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            StressCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            StressCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some(
                    "Each interval needs an RFC 3339 \"timestamp\" and a numeric \"duration_ms\""
                        .to_string(),
                ),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
