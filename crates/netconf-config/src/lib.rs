// crates/netconf-config/src/lib.rs
// ============================================================================
// Module: Netconf Config
// Description: Configuration for the networking conformance harness.
// Purpose: Share one typed view of harness settings between runner and suites.
// Dependencies: serde, thiserror, toml
// ============================================================================

//! ## Overview
//! Two configuration surfaces live here. [`HarnessConfig`] is the TOML file
//! read by the `netconf-test` runner (daemon binaries, markers, timeouts).
//! [`SuiteEnvConfig`] is the environment contract the runner exports to the
//! conformance suites (CIMOM URL, credentials, ports, backend selection).

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod env;

// ============================================================================
// SECTION: Tests
// ============================================================================


// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use config::BusConfig;
pub use config::CONFIG_ENV_VAR;
pub use config::CimomConfig;
pub use config::ConfigError;
pub use config::EventsConfig;
pub use config::HarnessConfig;
pub use config::RunnerConfig;
pub use env::NetconfEnv;
pub use env::SuiteEnvConfig;
pub use env::parse_ports;
pub use env::read_env_strict;
