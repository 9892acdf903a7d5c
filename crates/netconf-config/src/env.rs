// crates/netconf-config/src/env.rs
// ============================================================================
// Module: Suite Environment Contract
// Description: Environment-backed configuration shared by runner and suites.
// Purpose: Centralize env parsing with strict UTF-8 validation.
// Dependencies: std
// ============================================================================

//! ## Overview
//! The `netconf-test` runner exports these variables to the suite binaries;
//! suites can also be launched by hand with the same variables set. Values
//! are parsed with strict UTF-8 enforcement and invalid values fail closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// CIMOM URL used when none is exported.
const DEFAULT_URL: &str = "https://localhost:5989";
/// CIMOM user used when none is exported.
const DEFAULT_USERNAME: &str = "root";
/// Bus name of the real network manager.
const DEFAULT_BUS_NAME: &str = "org.freedesktop.NetworkManager";
/// Per-suite timeout used when none is exported.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

// ============================================================================
// SECTION: Environment Constants
// ============================================================================

/// Environment keys of the runner/suite contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetconfEnv {
    /// CIMOM URL (`http(s)://host:port` or `local://pegasus|sfcbd`).
    CimomUrl,
    /// CIMOM user name.
    CimomUsername,
    /// CIMOM password (may be empty).
    CimomPassword,
    /// CIMOM broker flavour (`sfcb`, `tog-pegasus`).
    CimomBroker,
    /// Bus name of the network manager the provider talks to.
    BusName,
    /// Comma separated network ports used by the suites.
    Ports,
    /// Whether the fake network manager backs the provider (`1`/`0`).
    FakeNm,
    /// Session bus address of the private bus.
    DbusSessionAddress,
    /// Per-suite timeout override in seconds.
    TimeoutSeconds,
    /// Path of the JSON fixture used by the object suite.
    ObjectsFixture,
}

impl NetconfEnv {
    /// Every key in export order.
    pub const ALL: [Self; 10] = [
        Self::CimomUrl,
        Self::CimomUsername,
        Self::CimomPassword,
        Self::CimomBroker,
        Self::BusName,
        Self::Ports,
        Self::FakeNm,
        Self::DbusSessionAddress,
        Self::TimeoutSeconds,
        Self::ObjectsFixture,
    ];

    /// Returns the canonical environment variable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CimomUrl => "LMI_CIMOM_URL",
            Self::CimomUsername => "LMI_CIMOM_USERNAME",
            Self::CimomPassword => "LMI_CIMOM_PASSWORD",
            Self::CimomBroker => "LMI_CIMOM_BROKER",
            Self::BusName => "LMI_NETWORKING_BUS_NAME",
            Self::Ports => "LMI_NETWORKING_PORTS",
            Self::FakeNm => "LMI_NETWORKING_FAKE_NM",
            Self::DbusSessionAddress => "DBUS_SESSION_BUS_ADDRESS",
            Self::TimeoutSeconds => "NETCONF_TEST_TIMEOUT_SEC",
            Self::ObjectsFixture => "NETCONF_OBJECTS_FIXTURE",
        }
    }
}

// ============================================================================
// SECTION: Config Types
// ============================================================================

/// Typed view of the suite environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteEnvConfig {
    /// CIMOM URL.
    pub url: String,
    /// CIMOM user name.
    pub username: String,
    /// CIMOM password.
    pub password: String,
    /// Optional broker flavour.
    pub broker: Option<String>,
    /// Network manager bus name.
    pub bus_name: String,
    /// Network ports under test, in order.
    pub ports: Vec<String>,
    /// True when the fake network manager is in use.
    pub fake_nm: bool,
    /// Private session bus address, when one was started.
    pub dbus_address: Option<String>,
    /// Per-suite timeout.
    pub timeout: Duration,
    /// Fixture for the object suite.
    pub objects_fixture: Option<PathBuf>,
}

impl Default for SuiteEnvConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            username: DEFAULT_USERNAME.to_string(),
            password: String::new(),
            broker: None,
            bus_name: DEFAULT_BUS_NAME.to_string(),
            ports: Vec::new(),
            fake_nm: false,
            dbus_address: None,
            timeout: DEFAULT_TIMEOUT,
            objects_fixture: None,
        }
    }
}

impl SuiteEnvConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error when an environment value is not valid UTF-8, is empty
    /// where a value is required, or fails validation.
    pub fn load() -> Result<Self, String> {
        let defaults = Self::default();
        let url = read_env_nonempty(NetconfEnv::CimomUrl.as_str())?.unwrap_or(defaults.url);
        let username =
            read_env_strict(NetconfEnv::CimomUsername.as_str())?.unwrap_or(defaults.username);
        let password = read_env_strict(NetconfEnv::CimomPassword.as_str())?.unwrap_or_default();
        let broker = read_env_nonempty(NetconfEnv::CimomBroker.as_str())?;
        let bus_name =
            read_env_nonempty(NetconfEnv::BusName.as_str())?.unwrap_or(defaults.bus_name);
        let ports = read_env_strict(NetconfEnv::Ports.as_str())?
            .map(|raw| parse_ports(&raw))
            .unwrap_or_default();
        let fake_nm = parse_bool_env(
            NetconfEnv::FakeNm.as_str(),
            read_env_nonempty(NetconfEnv::FakeNm.as_str())?,
        )?;
        let dbus_address = read_env_nonempty(NetconfEnv::DbusSessionAddress.as_str())?;
        let timeout = read_env_nonempty(NetconfEnv::TimeoutSeconds.as_str())?
            .map(|value| parse_timeout_seconds(NetconfEnv::TimeoutSeconds.as_str(), &value))
            .transpose()?
            .unwrap_or(defaults.timeout);
        let objects_fixture =
            read_env_nonempty(NetconfEnv::ObjectsFixture.as_str())?.map(PathBuf::from);
        Ok(Self {
            url,
            username,
            password,
            broker,
            bus_name,
            ports,
            fake_nm,
            dbus_address,
            timeout,
            objects_fixture,
        })
    }

    /// Returns the first configured port.
    ///
    /// # Errors
    ///
    /// Returns an error when no port is configured.
    pub fn port(&self) -> Result<&str, String> {
        self.ports.first().map(String::as_str).ok_or_else(|| {
            format!("no network port configured; set {}", NetconfEnv::Ports.as_str())
        })
    }

    /// Returns the variables to export to a child process.
    ///
    /// Unset optional values are omitted.
    #[must_use]
    pub fn to_env_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            (NetconfEnv::CimomUrl.as_str(), self.url.clone()),
            (NetconfEnv::CimomUsername.as_str(), self.username.clone()),
            (NetconfEnv::CimomPassword.as_str(), self.password.clone()),
            (NetconfEnv::BusName.as_str(), self.bus_name.clone()),
            (NetconfEnv::Ports.as_str(), self.ports.join(",")),
            (NetconfEnv::FakeNm.as_str(), if self.fake_nm { "1" } else { "0" }.to_string()),
            (NetconfEnv::TimeoutSeconds.as_str(), self.timeout.as_secs().to_string()),
        ];
        if let Some(broker) = &self.broker {
            pairs.push((NetconfEnv::CimomBroker.as_str(), broker.clone()));
        }
        if let Some(address) = &self.dbus_address {
            pairs.push((NetconfEnv::DbusSessionAddress.as_str(), address.clone()));
        }
        if let Some(fixture) = &self.objects_fixture {
            pairs.push((NetconfEnv::ObjectsFixture.as_str(), fixture.display().to_string()));
        }
        pairs
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Splits a comma separated port list, dropping empty entries.
#[must_use]
pub fn parse_ports(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|port| !port.is_empty()).map(str::to_string).collect()
}

/// Reads an environment variable and enforces UTF-8 validity.
///
/// # Errors
///
/// Returns an error when the environment variable contains invalid UTF-8.
pub fn read_env_strict(name: &str) -> Result<Option<String>, String> {
    std::env::var_os(name).map_or(Ok(None), |raw| {
        raw.into_string().map(Some).map_err(|_| format!("{name} must be valid UTF-8"))
    })
}

/// Reads an environment variable and rejects empty values.
fn read_env_nonempty(name: &str) -> Result<Option<String>, String> {
    match read_env_strict(name)? {
        Some(value) if value.trim().is_empty() => Err(format!("{name} must not be empty")),
        Some(value) => Ok(Some(value)),
        None => Ok(None),
    }
}

/// Parses a positive timeout value in seconds.
fn parse_timeout_seconds(name: &str, raw: &str) -> Result<Duration, String> {
    let secs: u64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("{name} must be a positive integer number of seconds"))?;
    if secs == 0 {
        return Err(format!("{name} must be greater than zero"));
    }
    Ok(Duration::from_secs(secs))
}

/// Parses a boolean flag; unset means false.
fn parse_bool_env(name: &str, value: Option<String>) -> Result<bool, String> {
    let Some(value) = value else {
        return Ok(false);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        _ => Err(format!("{name} must be 1/0 or true/false")),
    }
}
