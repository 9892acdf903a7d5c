// system-tests/tests/helpers/mod.rs
// ============================================================================
// Module: System Test Helpers
// Description: Shared fixtures for the networking conformance suites.
// Purpose: Provide the CIMOM connection, indications, and backend readers.
// Dependencies: netconf-config, netconf-wbem, zbus
// ============================================================================

//! ## Overview
//! Every suite builds a [`suite::NetconfSuite`] from the environment the
//! `netconf-test` runner exports, then uses the lookups in [`network`], the
//! bus-side settings reader in [`dbus`], and [`polling`] for state that
//! settles asynchronously.

#![allow(dead_code, reason = "Shared helpers are reused across multiple test suites.")]

pub mod dbus;
pub mod polling;
pub mod suite;

/// Returns `Err(format!(...))` from the enclosing function unless `cond` holds.
macro_rules! ensure {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err(format!($($arg)+));
        }
    };
}

#[allow(unused_imports, reason = "Not every suite binary checks with ensure.")]
pub(crate) use ensure;
