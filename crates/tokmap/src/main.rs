//! Binary entry point for the tokmap CLI.
//!
//! ## Usage
//!
//! ```bash
//! # Replay a unification script and print the identifier report
//! tokmap run script.json
//!
//! # Override the script's configuration
//! tokmap run script.json --config tokmap.json
//!
//! # Validate a configuration file
//! tokmap check-config tokmap.json
//! ```

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use tokmap::output::{
    emit_response, emit_response_compact, CheckConfigResponse, ErrorResponse, RunResponse,
};
use tokmap::script::{run_script, Script};
use tokmap_core::config::AnalysisConfig;
use tokmap_core::{ErrorCode, TokmapError};

// ============================================================================
// CLI Structure
// ============================================================================

/// Whole-program identifier identity for C sources.
///
/// All output is JSON on stdout; logs go to stderr.
#[derive(Parser, Debug)]
#[command(name = "tokmap", version, about = "Whole-program identifier identity for C sources")]
struct Cli {
    /// Log level for tracing output.
    #[arg(long, global = true, value_enum, default_value = "warn")]
    log_level: LogLevel,

    /// Emit single-line JSON.
    #[arg(long, global = true)]
    compact: bool,

    #[command(subcommand)]
    command: Command,
}

/// Log level for tracing output.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a unification script and report the resulting classes.
    Run {
        /// Path to the JSON script.
        script: PathBuf,
        /// Configuration file; takes precedence over the script's `config`.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Validate a configuration file and print it with defaults filled in.
    CheckConfig {
        /// Path to the JSON configuration.
        path: PathBuf,
    },
}

// ============================================================================
// Main
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.log_level);

    match execute(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let error_code = ErrorCode::from(&err);
            let response = ErrorResponse::from_error(&err);

            // Errors go to stdout as JSON, like every other response.
            let _ = emit(&response, cli.compact);
            let _ = io::stdout().flush();

            ExitCode::from(error_code.code())
        }
    }
}

/// Initialize tracing subscriber.
fn init_tracing(level: LogLevel) {
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_tracing_level().to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn emit<T: serde::Serialize>(response: &T, compact: bool) -> io::Result<()> {
    let mut stdout = io::stdout();
    if compact {
        emit_response_compact(response, &mut stdout)
    } else {
        emit_response(response, &mut stdout)
    }
}

/// Execute the CLI command.
fn execute(cli: &Cli) -> Result<(), TokmapError> {
    match &cli.command {
        Command::Run { script, config } => execute_run(script, config.as_deref(), cli.compact),
        Command::CheckConfig { path } => execute_check_config(path, cli.compact),
    }
}

fn execute_run(script_path: &Path, config: Option<&Path>, compact: bool) -> Result<(), TokmapError> {
    let _span = tracing::info_span!("run", script = %script_path.display()).entered();
    let script = Script::load(script_path)?;
    let config = config.map(AnalysisConfig::load).transpose()?;
    let base_dir = script_path.parent().unwrap_or_else(|| Path::new("."));

    let run = run_script(&script, base_dir, config)?;
    let report = run.report()?;
    let response = RunResponse::new(run.steps, run.unifications, report);
    emit(&response, compact)?;
    Ok(())
}

fn execute_check_config(path: &Path, compact: bool) -> Result<(), TokmapError> {
    let config = AnalysisConfig::load(path)?;
    emit(&CheckConfigResponse::new(config), compact)?;
    Ok(())
}
