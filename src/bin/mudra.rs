//! Mudra CLI - Command-line interface for Mudra Flux
//!
//! Commands:
//! - replay: Run a recorded tick stream through a session (batch mode)
//! - run: Process ticks from stdin one line at a time (streaming mode)
//! - validate: Check a tick stream without running it
//! - config: Print or check a fusion configuration
//! - doctor: Diagnose installation and configuration

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use mudra_flux::pipeline::{parse_ticks, process_ticks, validate_stream, SessionReport};
use mudra_flux::{ComputeError, FusionConfig, FusionSession, TickInput, FLUX_VERSION, PRODUCER_NAME};

/// Mudra - real-time gesture, posture and heart-rate state fusion
#[derive(Parser)]
#[command(name = "mudra")]
#[command(version = FLUX_VERSION)]
#[command(about = "Fuse landmark and heart-rate ticks into session state", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded tick stream (batch mode)
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Fusion configuration JSON file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Only print the session summary
        #[arg(long)]
        summary_only: bool,
    },

    /// Process ticks from stdin (streaming mode)
    Run {
        /// Fusion configuration JSON file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Flush output after each snapshot
        #[arg(long, default_value = "true")]
        flush: bool,

        /// Print the session summary to stderr on exit
        #[arg(long)]
        summary: bool,
    },

    /// Validate a tick stream
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the default configuration, or check a configuration file
    Config {
        /// Configuration file to check instead of printing defaults
        #[arg(long)]
        check: Option<PathBuf>,
    },

    /// Diagnose installation and configuration
    Doctor {
        /// Check a configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one snapshot per line, summary last)
    Ndjson,
    /// Single JSON report
    Json,
    /// Pretty-printed JSON report
    JsonPretty,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

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

fn run(cli: Cli) -> Result<(), MudraCliError> {
    match cli.command {
        Commands::Replay {
            input,
            output,
            config,
            output_format,
            summary_only,
        } => cmd_replay(&input, &output, config.as_deref(), output_format, summary_only),

        Commands::Run {
            config,
            flush,
            summary,
        } => cmd_run(config.as_deref(), flush, summary),

        Commands::Validate { input, json } => cmd_validate(&input, json),

        Commands::Config { check } => cmd_config(check.as_deref()),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),
    }
}

fn read_input(input: &Path) -> Result<String, MudraCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn load_config(path: Option<&Path>) -> Result<FusionConfig, MudraCliError> {
    match path {
        Some(path) => {
            info!(path = %path.display(), "loading fusion config");
            Ok(FusionConfig::from_json(&fs::read_to_string(path)?)?)
        }
        None => Ok(FusionConfig::default()),
    }
}

fn cmd_replay(
    input: &Path,
    output: &Path,
    config: Option<&Path>,
    output_format: OutputFormat,
    summary_only: bool,
) -> Result<(), MudraCliError> {
    let config = load_config(config)?;
    let ticks = parse_ticks(&read_input(input)?)?;
    if ticks.is_empty() {
        return Err(MudraCliError::NoTicks);
    }
    info!(ticks = ticks.len(), "replaying session");

    let report = process_ticks(&ticks, config)?;
    let output_data = if summary_only {
        serde_json::to_string_pretty(&report.summary)? + "\n"
    } else {
        format_report(&report, &output_format)?
    };

    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_run(config: Option<&Path>, flush: bool, summary: bool) -> Result<(), MudraCliError> {
    let mut session = FusionSession::with_config(load_config(config)?)?;

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for (i, line) in stdin.lock().lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        let tick: TickInput = serde_json::from_str(trimmed).map_err(|e| {
            MudraCliError::ParseError(format!("line {}: {}", i + 1, e))
        })?;
        let snapshot = session.try_tick(&tick)?;

        writeln!(stdout, "{}", serde_json::to_string(&snapshot)?)?;
        if flush {
            stdout.flush()?;
        }
    }
    stdout.flush()?;

    if summary {
        eprintln!("{}", serde_json::to_string_pretty(&session.summary())?);
    }

    Ok(())
}

fn cmd_validate(input: &Path, json: bool) -> Result<(), MudraCliError> {
    let (total_ticks, issues) = validate_stream(&read_input(input)?)?;
    let errors: Vec<ValidationErrorDetail> = issues
        .into_iter()
        .map(|issue| ValidationErrorDetail {
            position: issue.position,
            error: issue.error,
        })
        .collect();

    let report = ValidationReport {
        total_ticks,
        valid_ticks: total_ticks - errors.len(),
        invalid_ticks: errors.len(),
        errors,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total ticks:   {}", report.total_ticks);
        println!("Valid ticks:   {}", report.valid_ticks);
        println!("Invalid ticks: {}", report.invalid_ticks);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - tick {}: {}", err.position, err.error);
            }
        }
    }

    if report.invalid_ticks > 0 {
        Err(MudraCliError::ValidationFailed(report.invalid_ticks))
    } else {
        Ok(())
    }
}

fn cmd_config(check: Option<&Path>) -> Result<(), MudraCliError> {
    match check {
        Some(path) => {
            load_config(Some(path))?;
            println!("{}: ok", path.display());
        }
        None => println!("{}", FusionConfig::default().to_json()?),
    }
    Ok(())
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), MudraCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "flux_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Mudra Flux version {}", FLUX_VERSION),
    });

    checks.push(match FusionConfig::default().validate() {
        Ok(()) => DoctorCheck {
            name: "default_config".to_string(),
            status: CheckStatus::Ok,
            message: "Built-in defaults are valid".to_string(),
        },
        Err(e) => DoctorCheck {
            name: "default_config".to_string(),
            status: CheckStatus::Error,
            message: e.to_string(),
        },
    });

    if let Some(path) = config {
        let check = if !path.exists() {
            DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Warning,
                message: "Config file does not exist".to_string(),
            }
        } else {
            match fs::read_to_string(path) {
                Ok(content) => match FusionConfig::from_json(&content) {
                    Ok(_) => DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Ok,
                        message: "Config file valid".to_string(),
                    },
                    Err(e) => DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Error,
                        message: format!("Invalid config: {}", e),
                    },
                },
                Err(e) => DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Cannot read config file: {}", e),
                },
            }
        };
        checks.push(check);
    }

    checks.push(DoctorCheck {
        name: "stdin".to_string(),
        status: CheckStatus::Ok,
        message: if atty::is(atty::Stream::Stdin) {
            "stdin is a TTY (interactive mode)".to_string()
        } else {
            "stdin is a pipe (streaming mode ready)".to_string()
        },
    });

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: FLUX_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Mudra Doctor Report");
        println!("===================");
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
        Err(MudraCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn format_report(report: &SessionReport, format: &OutputFormat) -> Result<String, MudraCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::with_capacity(report.snapshots.len() + 1);
            for snapshot in &report.snapshots {
                lines.push(serde_json::to_string(snapshot)?);
            }
            lines.push(serde_json::to_string(&report.summary)?);
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(report)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(report)?),
    }
}

// Error types

#[derive(Debug)]
enum MudraCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    NoTicks,
    ValidationFailed(usize),
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for MudraCliError {
    fn from(e: io::Error) -> Self {
        MudraCliError::Io(e)
    }
}

impl From<ComputeError> for MudraCliError {
    fn from(e: ComputeError) -> Self {
        MudraCliError::Compute(e)
    }
}

impl From<serde_json::Error> for MudraCliError {
    fn from(e: serde_json::Error) -> Self {
        MudraCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<MudraCliError> for CliError {
    fn from(e: MudraCliError) -> Self {
        match e {
            MudraCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            MudraCliError::Compute(ComputeError::InvalidConfig(msg)) => CliError {
                code: "INVALID_CONFIG".to_string(),
                message: msg,
                hint: Some("Run 'mudra config' to see the defaults".to_string()),
            },
            MudraCliError::Compute(e @ ComputeError::NonMonotonicTick(_)) => CliError {
                code: "NON_MONOTONIC_TICK".to_string(),
                message: e.to_string(),
                hint: Some("Sort ticks by timestamp".to_string()),
            },
            MudraCliError::Compute(e) => CliError {
                code: "COMPUTE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'mudra validate' for details".to_string()),
            },
            MudraCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            MudraCliError::NoTicks => CliError {
                code: "NO_TICKS".to_string(),
                message: "No ticks found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            MudraCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} ticks failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            MudraCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            MudraCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Each line must be one tick JSON object".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_ticks: usize,
    valid_ticks: usize,
    invalid_ticks: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    /// Line for NDJSON input, element for a JSON array
    position: usize,
    error: String,
}

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
