// crates/netconf-harness/src/run.rs
// ============================================================================
// Module: Run Orchestration
// Description: Starts the backends, runs the suites, and tears everything down.
// Purpose: Implement one `netconf-test` invocation end to end.
// Dependencies: netconf-config, thiserror, tokio
// ============================================================================

//! ## Overview
//! A run resolves the port list, exports the suite environment, then brings
//! up the private bus (fake mode) and the private CIMOM (local mode) before
//! the suite runner starts. The runner's output is forwarded and watched for
//! silence; an inactive runner is killed and the run fails. Backends are
//! stopped in reverse order whatever the outcome.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use netconf_config::BusConfig;
use netconf_config::HarnessConfig;
use netconf_config::SuiteEnvConfig;
use netconf_config::parse_ports;
use thiserror::Error;
use tokio::process::Command;

use crate::events::Component;
use crate::events::EventSink;
use crate::events::HarnessEvent;
use crate::supervise::SuperviseError;
use crate::supervise::bus::LocalBus;
use crate::supervise::cimom::Cimom;
use crate::supervise::cimom::CimomLaunch;
use crate::supervise::watch::OutputEnd;
use crate::supervise::watch::WatchCommand;
use crate::supervise::watch::WatchedProcess;

// ============================================================================
// SECTION: Options
// ============================================================================

/// Default remote CIMOM URL.
pub const DEFAULT_HOSTNAME: &str = "https://localhost:5989";
/// Default remote user name and password.
pub const DEFAULT_CREDENTIAL: &str = "pegasus";
/// Ports the fake network manager publishes at startup.
pub const FAKE_PORTS: [&str; 2] = ["eth1", "eth2"];
/// Exit code reported when the runner produced no output for too long.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Inputs of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Serve the fake network manager on a private bus.
    pub fake: bool,
    /// Comma separated ports; discovered when absent.
    pub ports: Option<String>,
    /// Suites to run; empty runs all.
    pub tests: Vec<String>,
    /// Local provider build directory; starts a private CIMOM.
    pub local: Option<PathBuf>,
    /// Attach gdb to the paused provider worker.
    pub debug: bool,
    /// Remote CIMOM URL.
    pub hostname: String,
    /// Remote user name.
    pub username: String,
    /// Remote password.
    pub password: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            fake: false,
            ports: None,
            tests: Vec::new(),
            local: None,
            debug: false,
            hostname: DEFAULT_HOSTNAME.to_string(),
            username: DEFAULT_CREDENTIAL.to_string(),
            password: DEFAULT_CREDENTIAL.to_string(),
        }
    }
}

impl RunOptions {
    /// Rejects option combinations that cannot work.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Usage`] for fake mode without a local build.
    pub fn validate(&self) -> Result<(), RunError> {
        if self.fake && self.local.is_none() {
            return Err(RunError::Usage(
                "fake mode needs a local provider build (--local)".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Run failures that abort before a runner status exists.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RunError {
    /// Invalid option combination.
    #[error("usage error: {0}")]
    Usage(String),
    /// Port discovery found nothing.
    #[error("No usable network port found (check result of command 'nmcli dev')")]
    NoPorts,
    /// A supervised process failed.
    #[error(transparent)]
    Supervise(#[from] SuperviseError),
}

// ============================================================================
// SECTION: Environment
// ============================================================================

/// Resolves the ports under test.
///
/// # Errors
///
/// Returns [`RunError::NoPorts`] when the list ends up empty and
/// [`RunError::Supervise`] when `nmcli` cannot be run.
pub async fn resolve_ports(
    options: &RunOptions,
    bus: &BusConfig,
) -> Result<Vec<String>, RunError> {
    let ports = match &options.ports {
        Some(raw) => parse_ports(raw),
        None if options.fake => FAKE_PORTS.iter().map(ToString::to_string).collect(),
        None => list_nmcli_devices(bus).await?,
    };
    if ports.is_empty() {
        return Err(RunError::NoPorts);
    }
    Ok(ports)
}

/// Runs `nmcli -f DEVICE -t dev` and returns one device per line.
async fn list_nmcli_devices(bus: &BusConfig) -> Result<Vec<String>, SuperviseError> {
    let program = bus.nmcli.display().to_string();
    let output = Command::new(&bus.nmcli)
        .args(["-f", "DEVICE", "-t", "dev"])
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|err| SuperviseError::Spawn {
            program: program.clone(),
            message: err.to_string(),
        })?;
    if !output.status.success() {
        return Err(SuperviseError::Command {
            program,
            status: output.status.to_string(),
        });
    }
    Ok(parse_device_list(&String::from_utf8_lossy(&output.stdout)))
}

/// Splits terse `nmcli` device output into names.
#[must_use]
pub fn parse_device_list(text: &str) -> Vec<String> {
    text.lines().map(str::trim).filter(|line| !line.is_empty()).map(str::to_string).collect()
}

/// Builds the environment the suites read.
#[must_use]
pub fn suite_env(
    options: &RunOptions,
    config: &HarnessConfig,
    ports: Vec<String>,
) -> SuiteEnvConfig {
    let defaults = SuiteEnvConfig::default();
    let (url, username, password) = if options.local.is_some() {
        (config.cimom.local_url(), String::new(), String::new())
    } else {
        (options.hostname.clone(), options.username.clone(), options.password.clone())
    };
    let bus_name =
        if options.fake { config.bus.fake_bus_name.clone() } else { defaults.bus_name };
    SuiteEnvConfig {
        url,
        username,
        password,
        bus_name,
        ports,
        fake_nm: options.fake,
        timeout: Duration::from_secs(config.runner.suite_timeout_secs),
        ..defaults
    }
}

// ============================================================================
// SECTION: Run
// ============================================================================

/// Result of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// How the runner's output ended.
    pub end: OutputEnd,
    /// Process exit code to report.
    pub exit_code: i32,
}

/// Running backends, stopped in reverse start order.
#[derive(Debug, Default)]
struct Backends {
    /// Private bus with the fake network manager.
    bus: Option<LocalBus>,
    /// Private CIMOM.
    cimom: Option<Cimom>,
}

impl Backends {
    /// Stops the fake network manager first, then the CIMOM.
    async fn shutdown(&mut self, sink: &dyn EventSink) {
        if let Some(mut bus) = self.bus.take()
            && let Err(err) = bus.terminate().await
        {
            sink.record(&HarnessEvent::new("teardown_failed", Component::Bus, err.to_string()));
        }
        if let Some(mut cimom) = self.cimom.take()
            && let Err(err) = cimom.terminate()
        {
            sink.record(&HarnessEvent::new("teardown_failed", Component::Cimom, err.to_string()));
        }
        sink.record(&HarnessEvent::new("teardown_done", Component::Harness, "backends stopped"));
    }
}

/// Executes one run.
///
/// # Errors
///
/// Returns [`RunError`] when options are invalid, no port is usable, or a
/// backend or the runner cannot be started. Started backends are stopped
/// before the error is returned.
pub async fn run(
    options: &RunOptions,
    config: &HarnessConfig,
    sink: &dyn EventSink,
) -> Result<RunReport, RunError> {
    options.validate()?;
    let ports = resolve_ports(options, &config.bus).await?;
    let mut env = suite_env(options, config, ports);
    sink.record(
        &HarnessEvent::new("run_started", Component::Harness, env.url.clone())
            .with_detail(env.ports.join(",")),
    );

    let mut backends = Backends::default();
    let result = run_with_backends(options, config, &mut env, &mut backends, sink).await;
    backends.shutdown(sink).await;
    result
}

/// Starts backends and the runner; the caller owns teardown.
async fn run_with_backends(
    options: &RunOptions,
    config: &HarnessConfig,
    env: &mut SuiteEnvConfig,
    backends: &mut Backends,
    sink: &dyn EventSink,
) -> Result<RunReport, RunError> {
    let mut child_env = Vec::new();
    if options.fake {
        let bus = LocalBus::start(&config.bus, sink).await?;
        env.dbus_address = Some(bus.address().to_string());
        child_env = bus.child_env(&config.bus.fake_bus_name);
        backends.bus = Some(bus);
    }
    if let Some(provider_dir) = &options.local {
        let mut launch = CimomLaunch::for_provider_dir(&config.cimom, provider_dir, options.debug);
        launch.env = child_env;
        backends.cimom = Some(Cimom::start(&config.cimom, &launch, sink).await?);
    }

    let argv = config.runner.argv(&options.tests);
    let Some((program, args)) = argv.split_first() else {
        return Err(RunError::Usage("runner command is empty".to_string()));
    };
    let command = WatchCommand::new(program)
        .args(args)
        .envs(env.to_env_pairs())
        .current_dir(config.runner.working_dir.clone())
        .inactivity(config.runner.inactivity_timeout());
    let mut runner = WatchedProcess::spawn(command)?;
    sink.record(
        &HarnessEvent::new("runner_started", Component::Runner, argv.join(" "))
            .with_pid(runner.pid()),
    );

    let end = match backends.cimom.as_mut() {
        Some(cimom) if options.debug => {
            tokio::select! {
                attached = cimom.run_debugger(sink) => {
                    attached?;
                    runner.wait_end().await
                }
                end = runner.wait_end() => end,
            }
        }
        _ => runner.wait_end().await,
    };

    let exit_code = match end {
        OutputEnd::Inactive => {
            sink.record(&HarnessEvent::new("runner_timeout", Component::Runner, "TIMEOUT"));
            runner.kill()?;
            let _ = runner.exit_status().await;
            TIMEOUT_EXIT_CODE
        }
        OutputEnd::Eof => {
            let status = runner.exit_status().await?;
            sink.record(
                &HarnessEvent::new("runner_done", Component::Runner, "done")
                    .with_detail(status.to_string()),
            );
            status.code().unwrap_or(1)
        }
    };
    Ok(RunReport {
        end,
        exit_code,
    })
}
