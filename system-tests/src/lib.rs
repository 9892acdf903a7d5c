// system-tests/src/lib.rs
// ============================================================================
// Module: Netconf System Tests Library
// Description: Pure helpers shared by the conformance suite binaries.
// Purpose: Keep address formatting and fixture handling unit-testable.
// Dependencies: serde, serde_json, tokio
// ============================================================================

//! ## Overview
//! The suites under `system-tests/tests` talk to a live CIMOM and bus. The
//! parts that need neither (address conversions between the bus and CIM
//! representations, the object fixture model, the per-test time limit) live
//! here so they are covered by plain unit tests.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod address;
pub mod bounded;
pub mod objects;
