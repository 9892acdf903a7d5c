// crates/netconf-wbem/src/lib.rs
// ============================================================================
// Module: Netconf WBEM
// Description: Minimal WBEM client stack for the networking conformance suites.
// Purpose: Talk CIM-XML to a CIMOM and receive its indications.
// Dependencies: axum, quick-xml, reqwest, hyper, time, tokio
// ============================================================================

//! ## Overview
//! This crate is a client only: it encodes DSP0201 CIM-XML requests, posts
//! them to a CIMOM (remote HTTP(S) or a local broker socket), decodes the
//! responses into a small typed model, and hosts the export listener that
//! receives indications.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod client;
pub mod codec;
pub mod datetime;
pub mod error;
pub mod listener;
pub mod model;
pub mod subscription;
pub mod xml;


// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use client::AssocFilter;
pub use client::ConnectionOptions;
pub use client::DEFAULT_NAMESPACE;
pub use client::Target;
pub use client::WbemConnection;
pub use datetime::CimDateTime;
pub use error::CimStatus;
pub use error::WbemError;
pub use listener::INDICATION_TIMEOUT_MESSAGE;
pub use listener::IndicationListener;
pub use listener::IndicationQueue;
pub use model::CimInstance;
pub use model::CimInstanceName;
pub use model::CimProperty;
pub use model::CimType;
pub use model::CimValue;
pub use model::MethodResult;
pub use subscription::DEFAULT_QUERY_LANGUAGE;
pub use subscription::Subscription;
pub use subscription::Subscriptions;
pub use subscription::interop_namespace;
