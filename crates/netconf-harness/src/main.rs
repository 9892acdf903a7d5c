// crates/netconf-harness/src/main.rs
// ============================================================================
// Module: netconf-test Entry Point
// Description: Command line front end of the conformance harness.
// Purpose: Parse options, load configuration, and run the suites.
// Dependencies: clap, netconf-config, netconf-harness, thiserror, tokio
// ============================================================================

//! ## Overview
//! `netconf-test` runs the networking conformance suites against a remote
//! CIMOM, or against a private sfcb loaded with a local provider build
//! (`--local`), optionally backed by the fake network manager (`--fake`).
//! The process exits with the suite runner's status.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Parser;
use netconf_config::HarnessConfig;
use netconf_harness::RunOptions;
use netconf_harness::open_sink;
use netconf_harness::run;
use netconf_harness::run::DEFAULT_CREDENTIAL;
use netconf_harness::run::DEFAULT_HOSTNAME;
use netconf_harness::supervise::watch::OutputEnd;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Command line of `netconf-test`.
#[derive(Parser, Debug)]
#[command(name = "netconf-test", about = "Run the OpenLMI networking conformance suites")]
struct Cli {
    /// Use the fake network manager on a private bus (needs --local).
    #[arg(short = 'f', long, action = ArgAction::SetTrue)]
    fake: bool,
    /// Network ports to test, comma separated; some suites need two.
    #[arg(short = 'p', long, value_name = "PORTS")]
    ports: Option<String>,
    /// Suite to run; repeat for several. All suites run when omitted.
    #[arg(short = 't', long = "test", value_name = "SUITE")]
    tests: Vec<String>,
    /// Start a private CIMOM with the provider build in this directory.
    #[arg(short = 'l', long, value_name = "DIR")]
    local: Option<PathBuf>,
    /// Attach gdb to the paused provider worker.
    #[arg(short = 'd', long, action = ArgAction::SetTrue)]
    debug: bool,
    /// Remote CIMOM URL.
    #[arg(long, default_value = DEFAULT_HOSTNAME)]
    hostname: String,
    /// Remote CIMOM user name.
    #[arg(long, default_value = DEFAULT_CREDENTIAL)]
    username: String,
    /// Remote CIMOM password.
    #[arg(long, default_value = DEFAULT_CREDENTIAL)]
    password: String,
    /// Harness configuration file (overrides `NETCONF_HARNESS_CONFIG`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Write run events to this file instead of stderr.
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

impl Cli {
    /// Converts parsed arguments into run options.
    fn run_options(&self) -> RunOptions {
        RunOptions {
            fake: self.fake,
            ports: self.ports.clone(),
            tests: self.tests.clone(),
            local: self.local.clone(),
            debug: self.debug,
            hostname: self.hostname.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI failure carrying a printable message.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Message printed to stderr.
    message: String,
}

impl CliError {
    /// Creates a CLI error.
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// Result alias for CLI operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run_cli().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Parses arguments and executes one run.
async fn run_cli() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    let options = cli.run_options();
    options.validate().map_err(|err| CliError::new(err.to_string()))?;

    let config = HarnessConfig::load(cli.config.as_deref())
        .map_err(|err| CliError::new(err.to_string()))?;
    let log_path = cli.log_file.clone().or_else(|| config.events.log_path.clone());
    let sink = open_sink(log_path.as_deref())
        .map_err(|err| CliError::new(format!("failed to open event log: {err}")))?;

    write_stderr_line("------ suites");
    let report = run(&options, &config, sink.as_ref())
        .await
        .map_err(|err| CliError::new(err.to_string()))?;
    if report.end == OutputEnd::Inactive {
        write_stderr_line("------ suites TIMEOUT");
    } else {
        write_stderr_line("------ suites done");
    }
    Ok(ExitCode::from(u8::try_from(report.exit_code).unwrap_or(1)))
}

// ============================================================================
// SECTION: Output
// ============================================================================

/// Writes one line to stderr, ignoring failures.
fn write_stderr_line(message: &str) {
    let mut stderr = std::io::stderr();
    let _ = writeln!(&mut stderr, "{message}");
}

/// Prints an error and returns the failure exit code.
fn emit_error(message: &str) -> ExitCode {
    write_stderr_line(&format!("netconf-test: {message}"));
    ExitCode::FAILURE
}
