// crates/netconf-harness/src/supervise/bus.rs
// ============================================================================
// Module: Private Session Bus
// Description: dbus-launch session bus hosting the fake network manager.
// Purpose: Keep fake-mode runs off the system bus.
// Dependencies: netconf-config, netconf-fake-nm, nix, tokio
// ============================================================================

//! ## Overview
//! `dbus-launch` starts a session bus daemon and prints `KEY=VALUE` lines.
//! The address is handed to the fake network manager and, through
//! [`LocalBus::child_env`], to every later child (CIMOM and suites). The fake
//! counts as ready once it logs its `bus_ready` event.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::process::Stdio;

use netconf_config::BusConfig;
use netconf_config::NetconfEnv;
use netconf_fake_nm::BUS_READY_EVENT;
use nix::sys::signal::Signal;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use tokio::process::Command;

use super::SuperviseError;
use super::watch::WatchCommand;
use super::watch::WatchedProcess;
use crate::events::Component;
use crate::events::EventSink;
use crate::events::HarnessEvent;

// ============================================================================
// SECTION: Launch Output
// ============================================================================

/// Variables printed by `dbus-launch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchInfo {
    /// Session bus address.
    pub address: String,
    /// Bus daemon pid.
    pub pid: i32,
}

/// Parses `dbus-launch` output.
///
/// # Errors
///
/// Returns [`SuperviseError::Parse`] when the address or pid is missing or
/// the pid is not a number.
pub fn parse_launch_output(text: &str) -> Result<LaunchInfo, SuperviseError> {
    let variables: HashMap<&str, &str> = text
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim(), value.trim()))
        .collect();
    let address = variables
        .get(NetconfEnv::DbusSessionAddress.as_str())
        .ok_or_else(|| SuperviseError::Parse("dbus-launch printed no bus address".to_string()))?;
    let pid = variables
        .get("DBUS_SESSION_BUS_PID")
        .ok_or_else(|| SuperviseError::Parse("dbus-launch printed no bus pid".to_string()))?;
    let pid = pid
        .trim_end_matches(';')
        .parse()
        .map_err(|_| SuperviseError::Parse(format!("invalid bus pid '{pid}'")))?;
    Ok(LaunchInfo {
        address: address.trim_end_matches(';').trim_matches('\'').to_string(),
        pid,
    })
}

/// Variables that point a child at the fake network manager on `address`.
#[must_use]
pub fn fake_mode_env(address: &str, bus_name: &str) -> Vec<(String, String)> {
    vec![
        (NetconfEnv::DbusSessionAddress.as_str().to_string(), address.to_string()),
        (NetconfEnv::FakeNm.as_str().to_string(), "1".to_string()),
        (NetconfEnv::BusName.as_str().to_string(), bus_name.to_string()),
    ]
}

/// Marker the fake network manager prints once its name is owned.
#[must_use]
pub fn bus_ready_marker() -> String {
    format!("\"event\":\"{BUS_READY_EVENT}\"")
}

// ============================================================================
// SECTION: Local Bus
// ============================================================================

/// Private session bus with the fake network manager on it.
#[derive(Debug)]
pub struct LocalBus {
    /// Bus address and daemon pid.
    launch: LaunchInfo,
    /// Watched fake network manager.
    fake_nm: WatchedProcess,
}

impl LocalBus {
    /// Starts the bus daemon and the fake, and waits until the fake is ready.
    ///
    /// # Errors
    ///
    /// Returns [`SuperviseError`] when `dbus-launch` fails, its output cannot
    /// be parsed, or the fake does not become ready in time.
    pub async fn start(config: &BusConfig, sink: &dyn EventSink) -> Result<Self, SuperviseError> {
        let output = Command::new(&config.dbus_launch)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|err| SuperviseError::Spawn {
                program: config.dbus_launch.display().to_string(),
                message: err.to_string(),
            })?;
        if !output.status.success() {
            return Err(SuperviseError::Command {
                program: config.dbus_launch.display().to_string(),
                status: output.status.to_string(),
            });
        }
        let launch = parse_launch_output(&String::from_utf8_lossy(&output.stdout))?;
        sink.record(
            &HarnessEvent::new("bus_started", Component::Bus, "session bus started")
                .with_pid(u32::try_from(launch.pid).ok())
                .with_detail(launch.address.clone()),
        );

        let marker = bus_ready_marker();
        let command = WatchCommand::new(&config.fake_nm_binary)
            .arg("--bus-name")
            .arg(config.fake_bus_name.as_str())
            .env(NetconfEnv::DbusSessionAddress.as_str(), launch.address.as_str())
            .marker(marker.as_str());
        let fake_nm = match WatchedProcess::spawn(command) {
            Ok(fake_nm) => fake_nm,
            Err(err) => {
                let _ = kill(Pid::from_raw(launch.pid), Signal::SIGTERM);
                return Err(err);
            }
        };
        let mut bus = Self {
            launch,
            fake_nm,
        };
        if let Err(err) = bus.fake_nm.wait_marker(&marker, config.ready_timeout()).await {
            let _ = bus.terminate().await;
            return Err(err);
        }
        sink.record(
            &HarnessEvent::new("fake_nm_ready", Component::Bus, "fake network manager ready")
                .with_pid(bus.fake_nm.pid())
                .with_detail(config.fake_bus_name.clone()),
        );
        Ok(bus)
    }

    /// Returns the session bus address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.launch.address
    }

    /// Returns the variables later children need to reach this bus.
    ///
    /// Besides the bus address this switches the provider into fake mode
    /// and names the service it must talk to.
    #[must_use]
    pub fn child_env(&self, bus_name: &str) -> Vec<(String, String)> {
        fake_mode_env(&self.launch.address, bus_name)
    }

    /// Stops the fake, waits for it, then stops the bus daemon.
    ///
    /// # Errors
    ///
    /// Returns [`SuperviseError::Io`] when a signal cannot be delivered.
    pub async fn terminate(&mut self) -> Result<(), SuperviseError> {
        self.fake_nm.terminate()?;
        let _ = self.fake_nm.exit_status().await;
        match kill(Pid::from_raw(self.launch.pid), Signal::SIGTERM) {
            Ok(()) | Err(nix::errno::Errno::ESRCH) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
