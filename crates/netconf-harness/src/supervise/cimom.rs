// crates/netconf-harness/src/supervise/cimom.rs
// ============================================================================
// Module: sfcb CIMOM Supervisor
// Description: Private sfcb configuration, provider registration, and daemon.
// Purpose: Run a throwaway sfcbd with the locally built provider loaded.
// Dependencies: netconf-config, tempfile, tokio
// ============================================================================

//! ## Overview
//! A run gets its own temporary sfcb layout:
//!
//! ```text
//! <tmp>/sfcb.conf
//! <tmp>/stage/default.reg      (copied from the system staging area)
//! <tmp>/registration/          (filled by sfcbrepos)
//! <tmp>/openlmi-sfcbHttpSocket (local socket of the daemon)
//! ```
//!
//! The provider MOF is staged with `sfcbstage`, the repository is built with
//! `sfcbrepos`, and `sfcbd -c <tmp>/sfcb.conf` is started and considered up
//! once it prints the startup marker. In debug mode the daemon pauses the
//! configured provider's worker, and [`Cimom::run_debugger`] attaches gdb to
//! it. The layout is deleted when the [`Cimom`] is dropped.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use netconf_config::CimomConfig;
use tempfile::TempDir;
use tokio::process::Child;
use tokio::process::Command;

use super::SuperviseError;
use super::watch::WatchCommand;
use super::watch::WatchedProcess;
use crate::events::Component;
use crate::events::EventSink;
use crate::events::HarnessEvent;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable making sfcbd pause a provider worker at startup.
pub const PAUSE_PROVIDER_ENV: &str = "SFCB_PAUSE_PROVIDER";
/// Prefix preceding the paused worker's pid in the pause line.
const PID_PREFIX: &str = "-pid: ";
/// File name of the local HTTP socket inside the layout.
const SOCKET_NAME: &str = "openlmi-sfcbHttpSocket";

// ============================================================================
// SECTION: Layout
// ============================================================================

/// Temporary sfcb configuration tree.
#[derive(Debug)]
pub struct SfcbLayout {
    /// Owning temp dir; removed on drop.
    root: TempDir,
    /// `sfcb.conf` path.
    config_file: PathBuf,
    /// Staging directory.
    stage_dir: PathBuf,
    /// Registration directory.
    registration_dir: PathBuf,
}

impl SfcbLayout {
    /// Creates the directories and writes `sfcb.conf`.
    ///
    /// # Errors
    ///
    /// Returns [`SuperviseError::Io`] when the tree cannot be written.
    pub fn create(config: &CimomConfig, provider_dir: &Path) -> Result<Self, SuperviseError> {
        let root = tempfile::Builder::new().prefix("netconf-sfcb-").tempdir()?;
        let stage_dir = root.path().join("stage");
        let registration_dir = root.path().join("registration");
        fs::create_dir(&stage_dir)?;
        fs::create_dir(&registration_dir)?;
        let provider_dir = std::path::absolute(provider_dir)?;
        let config_file = root.path().join("sfcb.conf");
        let text = render_sfcb_conf(
            config.http_port,
            &config.system_provider_dir,
            &provider_dir,
            &registration_dir,
            &root.path().join(SOCKET_NAME),
        );
        fs::write(&config_file, text)?;
        Ok(Self {
            root,
            config_file,
            stage_dir,
            registration_dir,
        })
    }

    /// Returns the layout root.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Returns the `sfcb.conf` path.
    #[must_use]
    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Returns the local HTTP socket path.
    #[must_use]
    pub fn socket_path(&self) -> PathBuf {
        self.root.path().join(SOCKET_NAME)
    }

    /// Stages the provider MOF and registration, then builds the repository.
    ///
    /// # Errors
    ///
    /// Returns [`SuperviseError::Io`] when the default registration cannot
    /// be copied and [`SuperviseError::Command`] when `sfcbstage` or
    /// `sfcbrepos` fails.
    pub async fn register(
        &self,
        config: &CimomConfig,
        provider_mof: &Path,
        registration_file: &Path,
    ) -> Result<(), SuperviseError> {
        let default_name = config
            .default_staging_reg
            .file_name()
            .ok_or_else(|| SuperviseError::Io("default staging registration has no name".into()))?;
        fs::copy(&config.default_staging_reg, self.stage_dir.join(default_name))?;

        let mut stage = Command::new(&config.sfcbstage);
        stage
            .arg("-s")
            .arg(&self.stage_dir)
            .arg("-r")
            .arg(registration_file)
            .arg(&config.qualifiers_mof)
            .arg(provider_mof);
        run_helper(stage, &config.sfcbstage).await?;

        let mut repos = Command::new(&config.sfcbrepos);
        repos.arg("-s").arg(&self.stage_dir).arg("-r").arg(&self.registration_dir).arg("-f");
        run_helper(repos, &config.sfcbrepos).await
    }
}

/// Renders the `sfcb.conf` text.
#[must_use]
pub fn render_sfcb_conf(
    http_port: u16,
    system_provider_dir: &Path,
    provider_dir: &Path,
    registration_dir: &Path,
    socket_path: &Path,
) -> String {
    format!(
        "httpPort: {http_port}\nproviderDirs: {} {}\nregistrationDir: {}\nhttpSocketPath: {}\n",
        system_provider_dir.display(),
        provider_dir.display(),
        registration_dir.display(),
        socket_path.display()
    )
}

/// Runs a registration helper, forwarding its output, and checks its exit.
async fn run_helper(mut command: Command, program: &Path) -> Result<(), SuperviseError> {
    let output = command.stdin(Stdio::null()).output().await.map_err(|err| {
        SuperviseError::Spawn {
            program: program.display().to_string(),
            message: err.to_string(),
        }
    })?;
    {
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(&output.stdout);
        let _ = stderr.write_all(&output.stderr);
    }
    if output.status.success() {
        Ok(())
    } else {
        Err(SuperviseError::Command {
            program: program.display().to_string(),
            status: output.status.to_string(),
        })
    }
}

// ============================================================================
// SECTION: Daemon
// ============================================================================

/// Inputs of [`Cimom::start`].
#[derive(Debug, Clone)]
pub struct CimomLaunch {
    /// Provider MOF to stage.
    pub provider_mof: PathBuf,
    /// Provider registration file.
    pub registration_file: PathBuf,
    /// Directory holding the built provider library.
    pub provider_dir: PathBuf,
    /// Pause the provider worker and attach a debugger.
    pub debug: bool,
    /// Extra environment for sfcbd, such as the private bus address.
    pub env: Vec<(String, String)>,
}

impl CimomLaunch {
    /// Derives the launch inputs for a local provider build.
    #[must_use]
    pub fn for_provider_dir(config: &CimomConfig, provider_dir: &Path, debug: bool) -> Self {
        Self {
            provider_mof: config.provider_mof.clone(),
            registration_file: provider_dir.join(&config.registration_file),
            provider_dir: provider_dir.to_path_buf(),
            debug,
            env: Vec::new(),
        }
    }
}

/// A running sfcbd.
#[derive(Debug)]
pub struct Cimom {
    /// Daemon configuration.
    config: CimomConfig,
    /// Watched sfcbd.
    process: WatchedProcess,
    /// Debug mode flag.
    debug: bool,
    /// Attached debugger, if any.
    debugger: Option<Child>,
    /// Configuration tree; dropped last.
    layout: SfcbLayout,
}

impl Cimom {
    /// Registers the provider, starts sfcbd, and waits for the startup marker.
    ///
    /// # Errors
    ///
    /// Returns [`SuperviseError`] when registration fails, the daemon cannot
    /// be spawned, or the startup marker does not appear in time.
    pub async fn start(
        config: &CimomConfig,
        launch: &CimomLaunch,
        sink: &dyn EventSink,
    ) -> Result<Self, SuperviseError> {
        let layout = SfcbLayout::create(config, &launch.provider_dir)?;
        sink.record(
            &HarnessEvent::new("cimom_layout", Component::Cimom, "sfcb layout created")
                .with_detail(layout.root().display().to_string()),
        );
        layout.register(config, &launch.provider_mof, &launch.registration_file).await?;

        let mut command = WatchCommand::new(&config.sfcbd)
            .arg("-c")
            .arg(layout.config_file())
            .envs(launch.env.iter().cloned())
            .marker(config.startup_marker.as_str())
            .marker(config.pause_marker.as_str());
        if launch.debug {
            command = command.env(PAUSE_PROVIDER_ENV, config.paused_provider.as_str());
        }
        let process = WatchedProcess::spawn(command)?;
        sink.record(
            &HarnessEvent::new("cimom_spawned", Component::Cimom, "sfcbd spawned")
                .with_pid(process.pid()),
        );
        process.wait_marker(&config.startup_marker, config.startup_timeout()).await?;
        sink.record(
            &HarnessEvent::new("cimom_ready", Component::Cimom, "sfcbd started")
                .with_pid(process.pid()),
        );
        Ok(Self {
            config: config.clone(),
            process,
            debug: launch.debug,
            debugger: None,
            layout,
        })
    }

    /// Returns the configuration tree.
    #[must_use]
    pub const fn layout(&self) -> &SfcbLayout {
        &self.layout
    }

    /// Attaches gdb to the paused provider worker in debug mode.
    ///
    /// Returns the provider pid, or `None` outside debug mode. Blocks until
    /// the pause line appears.
    ///
    /// # Errors
    ///
    /// Returns [`SuperviseError`] when the pause line never appears, carries
    /// no pid, or gdb cannot be spawned.
    pub async fn run_debugger(
        &mut self,
        sink: &dyn EventSink,
    ) -> Result<Option<u32>, SuperviseError> {
        if !self.debug {
            return Ok(None);
        }
        let line = self.process.wait_marker(&self.config.pause_marker, Duration::MAX).await?;
        let pid = parse_provider_pid(&line)
            .ok_or_else(|| SuperviseError::Parse(format!("no provider pid in '{line}'")))?;
        sink.record(
            &HarnessEvent::new("provider_paused", Component::Debugger, "provider worker paused")
                .with_pid(Some(pid)),
        );
        let debugger = Command::new(&self.config.gdb)
            .arg("-q")
            .arg("-p")
            .arg(pid.to_string())
            .args(["-ex", "up 2", "-ex", "set debug_break=1", "-ex", "set follow-fork-mode child"])
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| SuperviseError::Spawn {
                program: self.config.gdb.display().to_string(),
                message: err.to_string(),
            })?;
        sink.record(
            &HarnessEvent::new("debugger_attached", Component::Debugger, "gdb attached")
                .with_pid(debugger.id()),
        );
        self.debugger = Some(debugger);
        Ok(Some(pid))
    }

    /// Returns true while sfcbd runs.
    pub fn is_alive(&mut self) -> bool {
        self.process.is_alive()
    }

    /// Sends SIGTERM to sfcbd.
    ///
    /// # Errors
    ///
    /// Returns [`SuperviseError::Io`] when the signal cannot be delivered.
    pub fn terminate(&mut self) -> Result<(), SuperviseError> {
        self.process.terminate()
    }
}

/// Extracts the worker pid from a pause line (`... -pid: 1234`).
#[must_use]
pub fn parse_provider_pid(line: &str) -> Option<u32> {
    let start = line.find(PID_PREFIX)? + PID_PREFIX.len();
    let digits: String =
        line[start..].trim_start().chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
