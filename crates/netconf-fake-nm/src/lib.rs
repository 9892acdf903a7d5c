// crates/netconf-fake-nm/src/lib.rs
// ============================================================================
// Module: Netconf Fake NetworkManager
// Description: Simulated NetworkManager for fake-backend conformance runs.
// Purpose: Give the provider a deterministic bus peer without real devices.
// Dependencies: serde, thiserror, tokio, zbus
// ============================================================================

//! ## Overview
//! The fake serves a subset of the NetworkManager D-Bus API from memory:
//! two ethernet devices at startup, stored connection profiles, bond and
//! bridge masters created from profiles, and active connections. A
//! controller object lets tests hot-plug more devices.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod bus;
pub mod error;
pub mod events;
pub mod state;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use bus::SharedState;
pub use bus::serve;
pub use error::FakeNmError;
pub use events::BUS_READY_EVENT;
pub use events::BusEvent;
pub use state::DeviceKind;
pub use state::NmState;
