// crates/netconf-fake-nm/src/main.rs
// ============================================================================
// Module: Fake NetworkManager Entry Point
// Description: Owns the bus name and serves until terminated.
// Purpose: Binary spawned by the harness on its private session bus.
// Dependencies: clap, netconf-fake-nm, tokio, zbus
// ============================================================================

//! ## Overview
//! Connects to the session bus (or `--address`), registers the fake objects,
//! requests the bus name and serves until SIGTERM or SIGINT.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::Mutex;

use clap::Parser;
use netconf_fake_nm::BusEvent;
use netconf_fake_nm::FakeNmError;
use netconf_fake_nm::NmState;
use netconf_fake_nm::events::emit;
use netconf_fake_nm::serve;
use tokio::signal::unix::SignalKind;
use tokio::signal::unix::signal;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Command-line options.
#[derive(Parser, Debug)]
#[command(name = "netconf-fake-nm", about = "In-memory NetworkManager on D-Bus")]
struct Cli {
    /// Well-known bus name to own.
    #[arg(long, default_value = "org.freedesktop.FakeNetworkManager")]
    bus_name: String,
    /// Bus address; defaults to the session bus.
    #[arg(long)]
    address: Option<String>,
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// Runs the fake and maps failures to a non-zero exit.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            emit(&BusEvent::error(err.to_string()));
            ExitCode::FAILURE
        }
    }
}

/// Connects, serves, and waits for a termination signal.
async fn run(cli: Cli) -> Result<(), FakeNmError> {
    let builder = match cli.address.as_deref() {
        Some(address) => zbus::connection::Builder::address(address)?,
        None => zbus::connection::Builder::session()?,
    };
    let connection = builder.build().await?;
    let state = Arc::new(Mutex::new(NmState::with_default_devices()));
    serve(&connection, &cli.bus_name, state).await?;

    let mut terminate =
        signal(SignalKind::terminate()).map_err(|err| FakeNmError::Bus(err.to_string()))?;
    let mut interrupt =
        signal(SignalKind::interrupt()).map_err(|err| FakeNmError::Bus(err.to_string()))?;
    tokio::select! {
        _ = terminate.recv() => {}
        _ = interrupt.recv() => {}
    }
    Ok(())
}
