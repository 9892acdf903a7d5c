// crates/netconf-config/src/config.rs
// ============================================================================
// Module: Harness Configuration
// Description: TOML configuration for the CIMOM, bus, and runner supervisors.
// Purpose: Provide strict, fail-closed config parsing with sane defaults.
// Dependencies: serde, thiserror, toml
// ============================================================================

//! ## Overview
//! The harness configuration names every external binary the runner spawns
//! and every marker it waits for. All sections default to the values used on
//! a stock Fedora install with sfcb, so an absent file is a valid config.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename looked up in the working directory.
const DEFAULT_CONFIG_NAME: &str = "netconf-harness.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "NETCONF_HARNESS_CONFIG";
/// Maximum configuration file size in bytes.
const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Top-level harness configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HarnessConfig {
    /// sfcb CIMOM supervision settings.
    #[serde(default)]
    pub cimom: CimomConfig,
    /// Private bus and fake network manager settings.
    #[serde(default)]
    pub bus: BusConfig,
    /// Test runner settings.
    #[serde(default)]
    pub runner: RunnerConfig,
    /// Structured event output settings.
    #[serde(default)]
    pub events: EventsConfig,
}

impl HarnessConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// An explicit path or `NETCONF_HARNESS_CONFIG` must point at a readable
    /// file. Without either, `netconf-harness.toml` in the working directory
    /// is used when present and built-in defaults otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading, parsing, or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(resolved) = resolve_path(path)? else {
            let mut config = Self::default();
            config.validate()?;
            return Ok(config);
        };
        let bytes = fs::read(&resolved)
            .map_err(|err| ConfigError::Io(format!("{}: {err}", resolved.display())))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let mut config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.cimom.validate()?;
        self.bus.validate()?;
        self.runner.validate()?;
        Ok(())
    }
}

/// sfcb CIMOM configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CimomConfig {
    /// Path to the `sfcbd` daemon.
    pub sfcbd: PathBuf,
    /// Path to the `sfcbstage` registration tool.
    pub sfcbstage: PathBuf,
    /// Path to the `sfcbrepos` repository builder.
    pub sfcbrepos: PathBuf,
    /// Path to `gdb`, used when debugging a paused provider.
    pub gdb: PathBuf,
    /// Stock staging registration copied into every private stage dir.
    pub default_staging_reg: PathBuf,
    /// Qualifier MOF staged ahead of the provider MOF.
    pub qualifiers_mof: PathBuf,
    /// Provider MOF describing the networking classes.
    pub provider_mof: PathBuf,
    /// Registration file name looked up inside the provider build dir.
    pub registration_file: String,
    /// System provider directory searched before the local build.
    pub system_provider_dir: PathBuf,
    /// HTTP port the private sfcbd listens on.
    pub http_port: u16,
    /// Output line marking a fully started CIMOM.
    pub startup_marker: String,
    /// Output line prefix printed when a provider pauses for a debugger.
    pub pause_marker: String,
    /// Provider class passed through `SFCB_PAUSE_PROVIDER` when debugging.
    pub paused_provider: String,
    /// Seconds to wait for the startup marker.
    pub startup_timeout_secs: u64,
}

impl Default for CimomConfig {
    fn default() -> Self {
        Self {
            sfcbd: PathBuf::from("/usr/sbin/sfcbd"),
            sfcbstage: PathBuf::from("/usr/bin/sfcbstage"),
            sfcbrepos: PathBuf::from("/usr/bin/sfcbrepos"),
            gdb: PathBuf::from("/usr/bin/gdb"),
            default_staging_reg: PathBuf::from("/var/lib/sfcb/stage/default.reg"),
            qualifiers_mof: PathBuf::from("/usr/share/openlmi-providers/05_LMI_Qualifiers.mof"),
            provider_mof: PathBuf::from("mof/LMI_Networking.mof"),
            registration_file: "LMI_Networking.reg".to_string(),
            system_provider_dir: PathBuf::from("/usr/lib64/sfcb/"),
            http_port: 54320,
            startup_marker: "localConnectServer started".to_string(),
            pause_marker: "-#- Pausing for provider:".to_string(),
            paused_provider: "LMI_IPConfigurationService".to_string(),
            startup_timeout_secs: 30,
        }
    }
}

impl CimomConfig {
    /// Returns the startup timeout as a [`Duration`].
    #[must_use]
    pub const fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    /// Returns the URL suites use to reach the private CIMOM.
    #[must_use]
    pub fn local_url(&self) -> String {
        format!("http://localhost:{}", self.http_port)
    }

    /// Validates the CIMOM section.
    fn validate(&self) -> Result<(), ConfigError> {
        require_path("cimom.sfcbd", &self.sfcbd)?;
        require_path("cimom.sfcbstage", &self.sfcbstage)?;
        require_path("cimom.sfcbrepos", &self.sfcbrepos)?;
        require_path("cimom.gdb", &self.gdb)?;
        require_path("cimom.default_staging_reg", &self.default_staging_reg)?;
        require_path("cimom.qualifiers_mof", &self.qualifiers_mof)?;
        require_path("cimom.provider_mof", &self.provider_mof)?;
        require_text("cimom.registration_file", &self.registration_file)?;
        require_text("cimom.startup_marker", &self.startup_marker)?;
        require_text("cimom.pause_marker", &self.pause_marker)?;
        require_text("cimom.paused_provider", &self.paused_provider)?;
        if self.http_port == 0 {
            return Err(ConfigError::Invalid("cimom.http_port must be non-zero".to_string()));
        }
        require_positive("cimom.startup_timeout_secs", self.startup_timeout_secs)
    }
}

/// Private bus and fake network manager configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BusConfig {
    /// Path to `dbus-launch`.
    pub dbus_launch: PathBuf,
    /// Fake network manager binary.
    pub fake_nm_binary: PathBuf,
    /// Well-known name claimed by the fake network manager.
    pub fake_bus_name: String,
    /// Well-known name of the real network manager.
    pub system_bus_name: String,
    /// Path to `nmcli`, used to discover ports on a real system.
    pub nmcli: PathBuf,
    /// Seconds to wait for the fake network manager to own its name.
    pub ready_timeout_secs: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            dbus_launch: PathBuf::from("/usr/bin/dbus-launch"),
            fake_nm_binary: PathBuf::from("netconf-fake-nm"),
            fake_bus_name: "org.freedesktop.FakeNetworkManager".to_string(),
            system_bus_name: "org.freedesktop.NetworkManager".to_string(),
            nmcli: PathBuf::from("/usr/bin/nmcli"),
            ready_timeout_secs: 10,
        }
    }
}

impl BusConfig {
    /// Returns the readiness timeout as a [`Duration`].
    #[must_use]
    pub const fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    /// Validates the bus section.
    fn validate(&self) -> Result<(), ConfigError> {
        require_path("bus.dbus_launch", &self.dbus_launch)?;
        require_path("bus.fake_nm_binary", &self.fake_nm_binary)?;
        require_path("bus.nmcli", &self.nmcli)?;
        require_text("bus.fake_bus_name", &self.fake_bus_name)?;
        require_text("bus.system_bus_name", &self.system_bus_name)?;
        require_positive("bus.ready_timeout_secs", self.ready_timeout_secs)
    }
}

/// Test runner configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerConfig {
    /// Command line of the suite runner; `--test <name>` is appended per suite.
    pub command: Vec<String>,
    /// Arguments passed after `--` to the test binaries.
    pub harness_args: Vec<String>,
    /// Seconds of output silence after which the run counts as timed out.
    pub inactivity_timeout_secs: u64,
    /// Per-suite timeout exported to the suites.
    pub suite_timeout_secs: u64,
    /// Working directory of the runner (defaults to the current one).
    pub working_dir: Option<PathBuf>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            command: ["cargo", "test", "--package", "system-tests", "--features", "system-tests"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            harness_args: vec!["--test-threads=1".to_string()],
            inactivity_timeout_secs: 60,
            suite_timeout_secs: 20,
            working_dir: None,
        }
    }
}

impl RunnerConfig {
    /// Returns the inactivity timeout as a [`Duration`].
    #[must_use]
    pub const fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout_secs)
    }

    /// Builds the runner argv for the selected suites.
    ///
    /// An empty selection runs every suite.
    #[must_use]
    pub fn argv(&self, suites: &[String]) -> Vec<String> {
        let mut argv = self.command.clone();
        for suite in suites {
            argv.push("--test".to_string());
            argv.push(suite.clone());
        }
        if !self.harness_args.is_empty() {
            argv.push("--".to_string());
            argv.extend(self.harness_args.iter().cloned());
        }
        argv
    }

    /// Validates the runner section.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.command.first() {
            Some(program) if !program.trim().is_empty() => {}
            _ => {
                return Err(ConfigError::Invalid(
                    "runner.command must name a program".to_string(),
                ));
            }
        }
        require_positive("runner.inactivity_timeout_secs", self.inactivity_timeout_secs)?;
        require_positive("runner.suite_timeout_secs", self.suite_timeout_secs)
    }
}

/// Structured event output configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EventsConfig {
    /// Optional JSON-lines log file; stderr is used otherwise.
    pub log_path: Option<PathBuf>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI, environment, or working directory.
fn resolve_path(path: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
    if let Some(path) = path {
        return Ok(Some(path.to_path_buf()));
    }
    if let Some(raw) = env::var_os(CONFIG_ENV_VAR) {
        let value = raw
            .into_string()
            .map_err(|_| ConfigError::Invalid(format!("{CONFIG_ENV_VAR} must be valid UTF-8")))?;
        if value.trim().is_empty() {
            return Err(ConfigError::Invalid(format!("{CONFIG_ENV_VAR} must not be empty")));
        }
        return Ok(Some(PathBuf::from(value)));
    }
    let fallback = PathBuf::from(DEFAULT_CONFIG_NAME);
    Ok(fallback.is_file().then_some(fallback))
}

/// Rejects empty paths.
fn require_path(field: &str, path: &Path) -> Result<(), ConfigError> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Rejects empty or whitespace-only strings.
fn require_text(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Rejects zero durations.
fn require_positive(field: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid(format!("{field} must be greater than zero")));
    }
    Ok(())
}
