// crates/netconf-fake-nm/src/events.rs
// ============================================================================
// Module: Fake NetworkManager Events
// Description: JSON-line trace of bus calls and emitted signals.
// Purpose: Let the harness and humans follow what the provider asked for.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every handled method call and every emitted signal is written to stderr as
//! one JSON object per line. The harness waits for the `bus_ready` event
//! before starting the CIMOM.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Event name written once the bus name is owned.
pub const BUS_READY_EVENT: &str = "bus_ready";

/// One trace line.
#[derive(Debug, Clone, Serialize)]
pub struct BusEvent {
    /// Event identifier (`method_call`, `signal`, `bus_ready`, `error`).
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Object path involved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Interface involved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface: Option<&'static str>,
    /// Method or signal name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member: Option<&'static str>,
    /// Free-form detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl BusEvent {
    /// Creates an event with a consistent timestamp.
    fn new(event: &'static str) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event,
            timestamp_ms,
            path: None,
            interface: None,
            member: None,
            detail: None,
        }
    }

    /// Method call handled on `path`.
    #[must_use]
    pub fn method_call(interface: &'static str, member: &'static str, path: &str) -> Self {
        Self {
            path: Some(path.to_string()),
            interface: Some(interface),
            member: Some(member),
            ..Self::new("method_call")
        }
    }

    /// Signal emitted from `path`.
    #[must_use]
    pub fn signal(interface: &'static str, member: &'static str, path: &str) -> Self {
        Self {
            path: Some(path.to_string()),
            interface: Some(interface),
            member: Some(member),
            ..Self::new("signal")
        }
    }

    /// Bus name acquired.
    #[must_use]
    pub fn bus_ready(bus_name: &str) -> Self {
        Self {
            detail: Some(bus_name.to_string()),
            ..Self::new(BUS_READY_EVENT)
        }
    }

    /// Non-fatal failure worth tracing.
    #[must_use]
    pub fn error(detail: String) -> Self {
        Self {
            detail: Some(detail),
            ..Self::new("error")
        }
    }

    /// Attaches a detail string.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

// ============================================================================
// SECTION: Emission
// ============================================================================

/// Writes one event line to stderr; write failures are ignored.
pub fn emit(event: &BusEvent) {
    if let Ok(line) = serde_json::to_string(event) {
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(&mut stderr, "{line}");
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
