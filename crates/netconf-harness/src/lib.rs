// crates/netconf-harness/src/lib.rs
// ============================================================================
// Module: Netconf Harness
// Description: Daemon supervision and run orchestration for the suites.
// Purpose: Back the `netconf-test` binary with a testable library.
// Dependencies: netconf-config, netconf-fake-nm, nix, tempfile, tokio
// ============================================================================

//! ## Overview
//! `netconf-test` brings up whatever backends a run needs (a private session
//! bus with the fake network manager, a private sfcb CIMOM with a local
//! provider build), launches the conformance suites with the suite
//! environment exported, and tears the backends down afterwards.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod events;
pub mod run;
pub mod supervise;


// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use events::Component;
pub use events::EventSink;
pub use events::HarnessEvent;
pub use events::open_sink;
pub use run::RunError;
pub use run::RunOptions;
pub use run::RunReport;
pub use run::run;
pub use supervise::SuperviseError;
