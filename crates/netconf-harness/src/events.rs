// crates/netconf-harness/src/events.rs
// ============================================================================
// Module: Harness Events
// Description: Structured run events and pluggable sinks.
// Purpose: Record what the harness did without binding to a log pipeline.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Each lifecycle step of a run (bus started, CIMOM ready, runner finished)
//! is a [`HarnessEvent`] handed to an [`EventSink`]. Sinks write one JSON
//! object per line; child output is not routed through here.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Component that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    /// Run orchestration.
    Harness,
    /// Private session bus and fake network manager.
    Bus,
    /// sfcb CIMOM.
    Cimom,
    /// Debugger attached to a provider worker.
    Debugger,
    /// Suite runner subprocess.
    Runner,
}

/// One harness event.
#[derive(Debug, Clone, Serialize)]
pub struct HarnessEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Producing component.
    pub component: Component,
    /// Human-readable message.
    pub message: String,
    /// Process id when the event concerns a process.
    pub pid: Option<u32>,
    /// Extra detail.
    pub detail: Option<String>,
}

impl HarnessEvent {
    /// Creates an event with a consistent timestamp.
    #[must_use]
    pub fn new(event: &'static str, component: Component, message: impl Into<String>) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event,
            timestamp_ms,
            component,
            message: message.into(),
            pid: None,
            detail: None,
        }
    }

    /// Attaches a process id.
    #[must_use]
    pub const fn with_pid(mut self, pid: Option<u32>) -> Self {
        self.pid = pid;
        self
    }

    /// Attaches a detail string.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Event sink for harness events.
pub trait EventSink: Send + Sync {
    /// Record an event.
    fn record(&self, event: &HarnessEvent);
}

/// Writes events as JSON lines to stderr.
pub struct StderrEventSink;

impl EventSink for StderrEventSink {
    fn record(&self, event: &HarnessEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let mut stderr = io::stderr().lock();
            let _ = writeln!(&mut stderr, "{payload}");
        }
    }
}

/// Appends events as JSON lines to a file.
pub struct FileEventSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileEventSink {
    /// Opens the event log in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl EventSink for FileEventSink {
    fn record(&self, event: &HarnessEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// Discards events.
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn record(&self, _event: &HarnessEvent) {}
}

/// Opens the file sink when a path is given, else the stderr sink.
///
/// # Errors
///
/// Returns an error if the log file cannot be opened.
pub fn open_sink(log_path: Option<&Path>) -> io::Result<Box<dyn EventSink>> {
    match log_path {
        Some(path) => Ok(Box::new(FileEventSink::new(path)?)),
        None => Ok(Box::new(StderrEventSink)),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
