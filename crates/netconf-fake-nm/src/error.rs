// crates/netconf-fake-nm/src/error.rs
// ============================================================================
// Module: Fake NetworkManager Errors
// Description: Error type shared by the state model and the bus layer.
// Purpose: Map state failures onto D-Bus error names.
// Dependencies: thiserror, zbus
// ============================================================================

//! ## Overview
//! State operations fail with [`FakeNmError::InvalidArgs`] for unknown object
//! paths or unusable settings; the bus layer answers those with
//! `org.freedesktop.DBus.Error.InvalidArgs` like NetworkManager does.

use thiserror::Error;
use zbus::fdo;

/// Errors raised by the fake NetworkManager.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FakeNmError {
    /// Caller passed an unknown path or malformed settings.
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
    /// Bus connection or object registration failed.
    #[error("bus error: {0}")]
    Bus(String),
}

impl From<zbus::Error> for FakeNmError {
    fn from(err: zbus::Error) -> Self {
        Self::Bus(err.to_string())
    }
}

impl From<zbus::zvariant::Error> for FakeNmError {
    fn from(err: zbus::zvariant::Error) -> Self {
        Self::Bus(err.to_string())
    }
}

impl From<FakeNmError> for fdo::Error {
    fn from(err: FakeNmError) -> Self {
        match err {
            FakeNmError::InvalidArgs(message) => Self::InvalidArgs(message),
            FakeNmError::Bus(message) => Self::Failed(message),
        }
    }
}
