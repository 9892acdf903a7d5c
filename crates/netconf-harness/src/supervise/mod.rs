// crates/netconf-harness/src/supervise/mod.rs
// ============================================================================
// Module: Process Supervision
// Description: Output scanning, sfcb CIMOM, and private bus supervisors.
// Purpose: Start external daemons and know when they are ready or gone.
// Dependencies: nix, tempfile, thiserror, tokio
// ============================================================================

//! ## Overview
//! [`watch::WatchedProcess`] is the building block: a child whose merged
//! output is forwarded to stderr and scanned for marker strings. The CIMOM
//! and bus supervisors are thin layers on top of it.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod bus;
pub mod cimom;
pub mod watch;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Supervision failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SuperviseError {
    /// A process could not be spawned.
    #[error("failed to spawn {program}: {message}")]
    Spawn {
        /// Program path.
        program: String,
        /// Underlying error.
        message: String,
    },
    /// A helper command exited unsuccessfully.
    #[error("{program} exited with {status}")]
    Command {
        /// Program path.
        program: String,
        /// Exit status description.
        status: String,
    },
    /// A marker did not appear in time.
    #[error("timed out after {}s waiting for '{marker}'", timeout.as_secs())]
    Timeout {
        /// Marker waited for.
        marker: String,
        /// Time waited.
        timeout: Duration,
    },
    /// Output ended before a marker appeared.
    #[error("process output ended before '{marker}' appeared")]
    Exited {
        /// Marker waited for.
        marker: String,
    },
    /// Command output could not be interpreted.
    #[error("unexpected output: {0}")]
    Parse(String),
    /// Filesystem or signal failure.
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for SuperviseError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<nix::Error> for SuperviseError {
    fn from(err: nix::Error) -> Self {
        Self::Io(err.to_string())
    }
}
