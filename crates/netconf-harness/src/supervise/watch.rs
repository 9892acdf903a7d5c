// crates/netconf-harness/src/supervise/watch.rs
// ============================================================================
// Module: Watched Process
// Description: Child process whose output is forwarded and scanned for markers.
// Purpose: Let the harness block until a daemon prints a readiness line.
// Dependencies: nix, tokio
// ============================================================================

//! ## Overview
//! Stdout and stderr of the child are read line by line by two pump tasks
//! and merged into one channel. A scanner task forwards each line verbatim
//! to the harness stderr and records, per marker, the first line containing
//! it. Waiters observe the scanner through a `watch` channel.
//!
//! Output ends either at EOF on both streams or, when an inactivity limit
//! is set, when no line arrives within that limit. The child itself is not
//! touched when output ends; callers decide whether to wait, terminate or
//! kill it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::process::Stdio;
use std::time::Duration;

use nix::sys::signal::Signal;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncRead;
use tokio::io::BufReader;
use tokio::process::Child;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::SuperviseError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Capacity of the merged line channel.
const LINE_CHANNEL_CAPACITY: usize = 256;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Description of a process to spawn and watch.
#[derive(Debug, Clone)]
pub struct WatchCommand {
    /// Program to run.
    program: PathBuf,
    /// Arguments.
    args: Vec<OsString>,
    /// Extra environment variables.
    env: Vec<(String, String)>,
    /// Working directory.
    cwd: Option<PathBuf>,
    /// Marker substrings to detect.
    markers: Vec<String>,
    /// Output silence after which the watch ends.
    inactivity: Option<Duration>,
}

impl WatchCommand {
    /// Starts a description for `program`.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            cwd: None,
            markers: Vec::new(),
            inactivity: None,
        }
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets one environment variable on top of the inherited environment.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Sets several environment variables.
    #[must_use]
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env.extend(vars.into_iter().map(|(key, value)| (key.into(), value.into())));
        self
    }

    /// Sets the working directory.
    #[must_use]
    pub fn current_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.cwd = dir;
        self
    }

    /// Adds a marker substring to detect.
    #[must_use]
    pub fn marker(mut self, marker: impl Into<String>) -> Self {
        self.markers.push(marker.into());
        self
    }

    /// Ends the watch after `limit` without output.
    #[must_use]
    pub const fn inactivity(mut self, limit: Duration) -> Self {
        self.inactivity = Some(limit);
        self
    }
}

/// Why output scanning stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputEnd {
    /// Both streams reached EOF.
    Eof,
    /// No line arrived within the inactivity limit.
    Inactive,
}

/// Scanner progress shared with waiters.
#[derive(Debug, Default)]
struct ScanState {
    /// First matching line per marker.
    matched: HashMap<String, String>,
    /// Set once scanning stopped.
    end: Option<OutputEnd>,
}

/// A spawned child under watch.
#[derive(Debug)]
pub struct WatchedProcess {
    /// Program path, for messages.
    program: String,
    /// Process id at spawn time.
    pid: Option<u32>,
    /// Child handle.
    child: Child,
    /// Scanner progress.
    status: watch::Receiver<ScanState>,
    /// Scanner task.
    scanner: JoinHandle<()>,
}

// ============================================================================
// SECTION: Spawning
// ============================================================================

impl WatchedProcess {
    /// Spawns the command with piped output and starts scanning.
    ///
    /// # Errors
    ///
    /// Returns [`SuperviseError::Spawn`] when the program cannot be started.
    pub fn spawn(command: WatchCommand) -> Result<Self, SuperviseError> {
        let program = command.program.display().to_string();
        let mut process = Command::new(&command.program);
        process
            .args(&command.args)
            .envs(command.env.iter().map(|(key, value)| (key.as_str(), value.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &command.cwd {
            process.current_dir(dir);
        }
        let mut child = process.spawn().map_err(|err| SuperviseError::Spawn {
            program: program.clone(),
            message: err.to_string(),
        })?;

        let (line_tx, line_rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);
        if let Some(stdout) = child.stdout.take() {
            pump(stdout, line_tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            pump(stderr, line_tx.clone());
        }
        drop(line_tx);

        let (status_tx, status_rx) = watch::channel(ScanState::default());
        let scanner = tokio::spawn(scan(line_rx, command.markers, command.inactivity, status_tx));
        Ok(Self {
            program,
            pid: child.id(),
            child,
            status: status_rx,
            scanner,
        })
    }

    // ------------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------------

    /// Returns the process id captured at spawn time.
    #[must_use]
    pub const fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Returns the program path.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Returns the first line that contained `marker`, if seen yet.
    #[must_use]
    pub fn matched_line(&self, marker: &str) -> Option<String> {
        self.status.borrow().matched.get(marker).cloned()
    }

    /// Waits until `marker` appears and returns the matching line.
    ///
    /// # Errors
    ///
    /// Returns [`SuperviseError::Timeout`] when `timeout` elapses and
    /// [`SuperviseError::Exited`] when output ends first.
    pub async fn wait_marker(
        &self,
        marker: &str,
        timeout: Duration,
    ) -> Result<String, SuperviseError> {
        let mut status = self.status.clone();
        let elapsed = tokio::time::timeout(
            timeout,
            status.wait_for(|state| state.matched.contains_key(marker) || state.end.is_some()),
        )
        .await
        .is_err();
        if elapsed {
            return Err(SuperviseError::Timeout {
                marker: marker.to_string(),
                timeout,
            });
        }
        self.matched_line(marker).ok_or_else(|| SuperviseError::Exited {
            marker: marker.to_string(),
        })
    }

    /// Waits until output ends and reports why.
    pub async fn wait_end(&self) -> OutputEnd {
        let mut status = self.status.clone();
        let _ = status.wait_for(|state| state.end.is_some()).await;
        self.status.borrow().end.unwrap_or(OutputEnd::Eof)
    }

    /// Returns true once output ended through the inactivity limit.
    #[must_use]
    pub fn timed_out(&self) -> bool {
        self.status.borrow().end == Some(OutputEnd::Inactive)
    }

    /// Returns true while the child has not exited.
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Waits for the child to exit.
    ///
    /// # Errors
    ///
    /// Returns [`SuperviseError::Io`] when waiting fails.
    pub async fn exit_status(&mut self) -> Result<ExitStatus, SuperviseError> {
        Ok(self.child.wait().await?)
    }

    // ------------------------------------------------------------------------
    // Control
    // ------------------------------------------------------------------------

    /// Sends SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns [`SuperviseError::Io`] when the signal cannot be delivered.
    pub fn terminate(&mut self) -> Result<(), SuperviseError> {
        self.signal(Signal::SIGTERM)
    }

    /// Sends SIGKILL.
    ///
    /// # Errors
    ///
    /// Returns [`SuperviseError::Io`] when the signal cannot be delivered.
    pub fn kill(&mut self) -> Result<(), SuperviseError> {
        self.signal(Signal::SIGKILL)
    }

    /// Signals the child unless it was already reaped.
    fn signal(&mut self, signal: Signal) -> Result<(), SuperviseError> {
        if !self.is_alive() {
            return Ok(());
        }
        let Some(pid) = self.pid else {
            return Ok(());
        };
        let pid = i32::try_from(pid).map_err(|err| SuperviseError::Io(err.to_string()))?;
        kill(Pid::from_raw(pid), signal)?;
        Ok(())
    }
}

impl Drop for WatchedProcess {
    fn drop(&mut self) {
        self.scanner.abort();
    }
}

// ============================================================================
// SECTION: Tasks
// ============================================================================

/// Reads lines from one stream into the merged channel.
fn pump<R>(reader: R, lines: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buffer = Vec::new();
        loop {
            buffer.clear();
            match reader.read_until(b'\n', &mut buffer).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buffer);
                    let line = line.trim_end_matches(['\r', '\n']).to_string();
                    if lines.send(line).await.is_err() {
                        break;
                    }
                }
            }
        }
    });
}

/// Forwards lines, records markers, and publishes the end of output.
async fn scan(
    mut lines: mpsc::Receiver<String>,
    markers: Vec<String>,
    inactivity: Option<Duration>,
    status: watch::Sender<ScanState>,
) {
    loop {
        let next = match inactivity {
            Some(limit) => match tokio::time::timeout(limit, lines.recv()).await {
                Ok(next) => next,
                Err(_) => {
                    status.send_modify(|state| state.end = Some(OutputEnd::Inactive));
                    return;
                }
            },
            None => lines.recv().await,
        };
        let Some(line) = next else {
            status.send_modify(|state| state.end = Some(OutputEnd::Eof));
            return;
        };
        forward(&line);
        for marker in &markers {
            if line.contains(marker.as_str()) {
                status.send_modify(|state| {
                    state.matched.entry(marker.clone()).or_insert_with(|| line.clone());
                });
            }
        }
    }
}

/// Writes one child line to stderr; write failures are ignored.
fn forward(line: &str) {
    let mut stderr = std::io::stderr().lock();
    let _ = writeln!(&mut stderr, "{line}");
}

// ============================================================================
// SECTION: Tests
// ============================================================================
