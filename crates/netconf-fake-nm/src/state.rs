// crates/netconf-fake-nm/src/state.rs
// ============================================================================
// Module: Fake NetworkManager State
// Description: In-memory devices, connections, and active connections.
// Purpose: Hold fixture state independently of the bus so it can be tested.
// Dependencies: zbus (zvariant values)
// ============================================================================

//! ## Overview
//! [`NmState`] is the whole fake: a list of devices (indexed from 1), stored
//! connection settings (indexed from 0) and active connections (indexed from
//! 0). Counters never go backwards, so a deleted object's path is never
//! reused during a run. Every mutating operation returns what changed so the
//! bus layer can register objects and emit signals without re-reading state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;

use zbus::zvariant::OwnedValue;
use zbus::zvariant::Value;

use crate::error::FakeNmError;

// ============================================================================
// SECTION: Paths and Constants
// ============================================================================

/// Manager object path.
pub const MANAGER_PATH: &str = "/org/freedesktop/NetworkManager";
/// Prefix of device object paths.
pub const DEVICE_PREFIX: &str = "/org/freedesktop/NetworkManager/Devices/";
/// Prefix of active connection object paths.
pub const ACTIVE_PREFIX: &str = "/org/freedesktop/NetworkManager/ActiveConnection/";
/// Settings object path.
pub const SETTINGS_PATH: &str = "/org/freedesktop/NetworkManager/Settings";
/// Prefix of stored connection object paths.
pub const CONNECTION_PREFIX: &str = "/org/freedesktop/NetworkManager/Settings/";
/// Controller object path used by the harness to hot-plug devices.
pub const CONTROLLER_PATH: &str = "/org/fedoraproject/OpenLMINetworking/Controller";
/// Placeholder path NetworkManager uses for "no object".
pub const NO_OBJECT: &str = "/";

/// `NM_DEVICE_STATE_ACTIVATED`.
pub const DEVICE_STATE_ACTIVATED: u32 = 100;
/// `NM_ACTIVE_CONNECTION_STATE_ACTIVATED`.
pub const ACTIVE_STATE_ACTIVATED: u32 = 2;

/// Connection settings as sent over the bus (`a{sa{sv}}`).
pub type Settings = HashMap<String, HashMap<String, OwnedValue>>;

// ============================================================================
// SECTION: Records
// ============================================================================

/// Device flavours the fake knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    /// Wired ethernet port.
    Ethernet,
    /// Bond master.
    Bond,
    /// Bridge master.
    Bridge,
}

impl DeviceKind {
    /// Returns the `NM_DEVICE_TYPE` value.
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::Ethernet => 1,
            Self::Bond => 10,
            Self::Bridge => 13,
        }
    }

    /// Returns the master kind created by a connection type, if any.
    #[must_use]
    pub fn for_connection_type(kind: &str) -> Option<Self> {
        match kind {
            "bond" => Some(Self::Bond),
            "bridge" => Some(Self::Bridge),
            _ => None,
        }
    }

    /// Returns the settings group naming the interface of a master.
    const fn settings_group(self) -> &'static str {
        match self {
            Self::Ethernet => "802-3-ethernet",
            Self::Bond => "bond",
            Self::Bridge => "bridge",
        }
    }
}

/// One network device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// Index used in the object path and MAC address.
    pub index: u32,
    /// Interface name.
    pub name: String,
    /// Device flavour.
    pub kind: DeviceKind,
    /// Enslaved device paths (bond and bridge only).
    pub slaves: Vec<String>,
}

impl Device {
    /// Returns the device object path.
    #[must_use]
    pub fn path(&self) -> String {
        format!("{DEVICE_PREFIX}{}", self.index)
    }

    /// Returns the synthetic hardware address.
    #[must_use]
    pub fn hw_address(&self) -> String {
        format!("AA:BB:CC:DD:EE:{:02X}", self.index & 0xff)
    }
}

/// One stored connection profile.
#[derive(Debug)]
pub struct Connection {
    /// Index used in the object path.
    pub index: u32,
    /// Settings as last added or updated.
    pub settings: Settings,
    /// Master device created for this connection.
    pub master_device: Option<u32>,
    /// Master device index and slave device path this connection enslaved.
    pub enslaved: Option<(u32, String)>,
}

impl Connection {
    /// Returns the connection object path.
    #[must_use]
    pub fn path(&self) -> String {
        format!("{CONNECTION_PREFIX}{}", self.index)
    }

    /// Returns `connection.uuid`.
    #[must_use]
    pub fn uuid(&self) -> Option<&str> {
        setting_str(&self.settings, "connection", "uuid")
    }
}

/// One activated connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveConnection {
    /// Index used in the object path.
    pub index: u32,
    /// Device path the connection is active on.
    pub device: String,
    /// Stored connection path.
    pub connection: String,
    /// `NM_ACTIVE_CONNECTION_STATE`.
    pub state: u32,
}

impl ActiveConnection {
    /// Returns the active connection object path.
    #[must_use]
    pub fn path(&self) -> String {
        format!("{ACTIVE_PREFIX}{}", self.index)
    }
}

// ============================================================================
// SECTION: Change Reports
// ============================================================================

/// Outcome of adding a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedConnection {
    /// New connection path.
    pub path: String,
    /// New connection index.
    pub index: u32,
    /// Master device created for a bond or bridge profile.
    pub master: Option<Device>,
    /// Master device whose `Slaves` list grew.
    pub enslaved_to: Option<Device>,
}

/// Outcome of deleting a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedConnection {
    /// Deleted connection path.
    pub path: String,
    /// Master device removed with a bond or bridge profile.
    pub removed_device: Option<Device>,
    /// Master device whose `Slaves` list shrank.
    pub released_from: Option<Device>,
    /// Active connections dropped with the profile or its device.
    pub dropped_active: Vec<String>,
}

// ============================================================================
// SECTION: State
// ============================================================================

/// Whole in-memory state of the fake.
#[derive(Debug)]
pub struct NmState {
    /// Devices in creation order.
    devices: Vec<Device>,
    /// Stored connections in creation order.
    connections: Vec<Connection>,
    /// Active connections in activation order.
    active: Vec<ActiveConnection>,
    /// Next device index.
    next_device: u32,
    /// Next connection index.
    next_connection: u32,
    /// Next active connection index.
    next_active: u32,
}

impl Default for NmState {
    fn default() -> Self {
        Self {
            devices: Vec::new(),
            connections: Vec::new(),
            active: Vec::new(),
            next_device: 1,
            next_connection: 0,
            next_active: 0,
        }
    }
}

impl NmState {
    /// Creates the startup state: two ethernet devices `eth1` and `eth2`.
    #[must_use]
    pub fn with_default_devices() -> Self {
        let mut state = Self::default();
        state.add_device(None, DeviceKind::Ethernet);
        state.add_device(None, DeviceKind::Ethernet);
        state
    }

    // ------------------------------------------------------------------------
    // Devices
    // ------------------------------------------------------------------------

    /// Adds a device, named `eth<index>` unless a non-empty name is given.
    pub fn add_device(&mut self, name: Option<&str>, kind: DeviceKind) -> Device {
        let index = self.next_device;
        self.next_device += 1;
        let name = match name {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("eth{index}"),
        };
        let device = Device {
            index,
            name,
            kind,
            slaves: Vec::new(),
        };
        self.devices.push(device.clone());
        device
    }

    /// Returns all devices.
    #[must_use]
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Returns a device by index.
    #[must_use]
    pub fn device(&self, index: u32) -> Option<&Device> {
        self.devices.iter().find(|device| device.index == index)
    }

    /// Returns a device by object path.
    #[must_use]
    pub fn device_by_path(&self, path: &str) -> Option<&Device> {
        index_from(path, DEVICE_PREFIX).and_then(|index| self.device(index))
    }

    /// Returns a device by interface name.
    #[must_use]
    pub fn device_by_name(&self, name: &str) -> Option<&Device> {
        self.devices.iter().find(|device| device.name == name)
    }

    /// Returns a device by hardware address, ignoring case.
    #[must_use]
    pub fn device_by_mac(&self, mac: &str) -> Option<&Device> {
        self.devices.iter().find(|device| device.hw_address().eq_ignore_ascii_case(mac))
    }

    /// Returns every device path in creation order.
    #[must_use]
    pub fn device_paths(&self) -> Vec<String> {
        self.devices.iter().map(Device::path).collect()
    }

    /// Removes a device together with its slave links and active connections.
    fn remove_device(&mut self, index: u32) -> Option<(Device, Vec<String>)> {
        let position = self.devices.iter().position(|device| device.index == index)?;
        let device = self.devices.remove(position);
        let path = device.path();
        for other in &mut self.devices {
            other.slaves.retain(|slave| slave != &path);
        }
        let dropped = self.drop_active_where(|active| active.device == path);
        Some((device, dropped))
    }

    // ------------------------------------------------------------------------
    // Connections
    // ------------------------------------------------------------------------

    /// Stores a connection profile.
    ///
    /// Bond and bridge profiles create their master device. Profiles with
    /// `connection.master` enslave the device matching
    /// `802-3-ethernet.mac-address` to that master; an unresolvable master or
    /// slave is left alone.
    ///
    /// # Errors
    ///
    /// Returns [`FakeNmError::InvalidArgs`] when a bond or bridge profile has
    /// no interface name.
    pub fn add_connection(&mut self, settings: Settings) -> Result<AddedConnection, FakeNmError> {
        let master = match setting_str(&settings, "connection", "type")
            .and_then(DeviceKind::for_connection_type)
        {
            Some(kind) => {
                let name = setting_str(&settings, kind.settings_group(), "interface-name")
                    .or_else(|| setting_str(&settings, "connection", "interface-name"))
                    .ok_or_else(|| {
                        FakeNmError::InvalidArgs(format!(
                            "{} connection without interface-name",
                            kind.settings_group()
                        ))
                    })?
                    .to_string();
                Some(self.add_device(Some(&name), kind))
            }
            None => None,
        };

        let enslaved = self.enslave(&settings);
        let index = self.next_connection;
        self.next_connection += 1;
        let connection = Connection {
            index,
            settings,
            master_device: master.as_ref().map(|device| device.index),
            enslaved: enslaved.clone(),
        };
        let path = connection.path();
        self.connections.push(connection);
        Ok(AddedConnection {
            path,
            index,
            master,
            enslaved_to: enslaved.and_then(|(master, _)| self.device(master).cloned()),
        })
    }

    /// Links the slave described by `settings` to its master.
    fn enslave(&mut self, settings: &Settings) -> Option<(u32, String)> {
        let master_ref = setting_str(settings, "connection", "master")?;
        let master_index = self.resolve_master(master_ref)?;
        let mac = setting_mac(settings, "802-3-ethernet", "mac-address")?;
        let slave_path = self.device_by_mac(&mac)?.path();
        let master = self.devices.iter_mut().find(|device| device.index == master_index)?;
        if !master.slaves.contains(&slave_path) {
            master.slaves.push(slave_path.clone());
        }
        Some((master_index, slave_path))
    }

    /// Resolves `connection.master` given as a profile uuid or interface name.
    fn resolve_master(&self, master: &str) -> Option<u32> {
        let by_uuid = self.connections.iter().find(|connection| connection.uuid() == Some(master));
        if let Some(connection) = by_uuid {
            let name = connection
                .master_device
                .and_then(|index| self.device(index))
                .map(|device| device.name.as_str())?;
            return self.device_by_name(name).map(|device| device.index);
        }
        self.device_by_name(master)
            .filter(|device| device.kind != DeviceKind::Ethernet)
            .map(|device| device.index)
    }

    /// Returns every connection path in creation order.
    #[must_use]
    pub fn connection_paths(&self) -> Vec<String> {
        self.connections.iter().map(Connection::path).collect()
    }

    /// Returns a connection by index.
    #[must_use]
    pub fn connection(&self, index: u32) -> Option<&Connection> {
        self.connections.iter().find(|connection| connection.index == index)
    }

    /// Returns a copy of a connection's settings.
    ///
    /// # Errors
    ///
    /// Returns [`FakeNmError::InvalidArgs`] for an unknown connection.
    pub fn connection_settings(&self, index: u32) -> Result<Settings, FakeNmError> {
        let connection = self.connection(index).ok_or_else(|| unknown_connection(index))?;
        clone_settings(&connection.settings)
    }

    /// Replaces a connection's settings.
    ///
    /// # Errors
    ///
    /// Returns [`FakeNmError::InvalidArgs`] for an unknown connection.
    pub fn update_connection(&mut self, index: u32, settings: Settings) -> Result<(), FakeNmError> {
        let connection = self
            .connections
            .iter_mut()
            .find(|connection| connection.index == index)
            .ok_or_else(|| unknown_connection(index))?;
        connection.settings = settings;
        Ok(())
    }

    /// Deletes a connection, its master device and any activations of it.
    ///
    /// # Errors
    ///
    /// Returns [`FakeNmError::InvalidArgs`] for an unknown connection.
    pub fn delete_connection(&mut self, index: u32) -> Result<DeletedConnection, FakeNmError> {
        let position = self
            .connections
            .iter()
            .position(|connection| connection.index == index)
            .ok_or_else(|| unknown_connection(index))?;
        let connection = self.connections.remove(position);
        let path = connection.path();
        let mut dropped_active = self.drop_active_where(|active| active.connection == path);

        let released_from = connection.enslaved.and_then(|(master, slave)| {
            let device = self.devices.iter_mut().find(|device| device.index == master)?;
            device.slaves.retain(|entry| entry != &slave);
            Some(device.clone())
        });
        let removed_device = connection.master_device.and_then(|index| {
            let (device, dropped) = self.remove_device(index)?;
            dropped_active.extend(dropped);
            Some(device)
        });
        Ok(DeletedConnection {
            path,
            removed_device,
            released_from,
            dropped_active,
        })
    }

    // ------------------------------------------------------------------------
    // Activation
    // ------------------------------------------------------------------------

    /// Activates a stored connection on a device.
    ///
    /// The device path may be `/` for a bond or bridge profile, which then
    /// activates on its own master device.
    ///
    /// # Errors
    ///
    /// Returns [`FakeNmError::InvalidArgs`] for an unknown connection or
    /// device.
    pub fn activate(
        &mut self,
        connection_path: &str,
        device_path: &str,
    ) -> Result<ActiveConnection, FakeNmError> {
        let connection = index_from(connection_path, CONNECTION_PREFIX)
            .and_then(|index| self.connection(index))
            .ok_or_else(|| {
                FakeNmError::InvalidArgs(format!("unknown connection {connection_path}"))
            })?;
        let device = if device_path == NO_OBJECT {
            connection.master_device.and_then(|index| self.device(index))
        } else {
            self.device_by_path(device_path)
        }
        .ok_or_else(|| FakeNmError::InvalidArgs(format!("unknown device {device_path}")))?;
        let active = ActiveConnection {
            index: self.next_active,
            device: device.path(),
            connection: connection.path(),
            state: ACTIVE_STATE_ACTIVATED,
        };
        self.next_active += 1;
        self.active.push(active.clone());
        Ok(active)
    }

    /// Deactivates an active connection.
    ///
    /// # Errors
    ///
    /// Returns [`FakeNmError::InvalidArgs`] when the path is not active.
    pub fn deactivate(&mut self, active_path: &str) -> Result<ActiveConnection, FakeNmError> {
        let position =
            self.active.iter().position(|active| active.path() == active_path).ok_or_else(
                || FakeNmError::InvalidArgs(format!("unknown active connection {active_path}")),
            )?;
        Ok(self.active.remove(position))
    }

    /// Returns an active connection by index.
    #[must_use]
    pub fn active_connection(&self, index: u32) -> Option<&ActiveConnection> {
        self.active.iter().find(|active| active.index == index)
    }

    /// Returns every active connection path in activation order.
    #[must_use]
    pub fn active_paths(&self) -> Vec<String> {
        self.active.iter().map(ActiveConnection::path).collect()
    }

    /// Removes matching active connections and returns their paths.
    fn drop_active_where(&mut self, predicate: impl Fn(&ActiveConnection) -> bool) -> Vec<String> {
        let mut dropped = Vec::new();
        self.active.retain(|active| {
            if predicate(active) {
                dropped.push(active.path());
                false
            } else {
                true
            }
        });
        dropped
    }
}

// ============================================================================
// SECTION: Settings Helpers
// ============================================================================

/// Parses the trailing index of an object path under `prefix`.
#[must_use]
pub fn index_from(path: &str, prefix: &str) -> Option<u32> {
    path.strip_prefix(prefix)?.parse().ok()
}

/// Strips nested variants.
fn innermost<'a>(value: &'a Value<'a>) -> &'a Value<'a> {
    match value {
        Value::Value(inner) => innermost(inner),
        other => other,
    }
}

/// Reads a string setting.
#[must_use]
pub fn setting_str<'a>(settings: &'a Settings, group: &str, key: &str) -> Option<&'a str> {
    match innermost(settings.get(group)?.get(key)?) {
        Value::Str(text) => Some(text.as_str()),
        _ => None,
    }
}

/// Reads a hardware address setting (`ay`, or a string) as `AA:BB:...`.
#[must_use]
pub fn setting_mac(settings: &Settings, group: &str, key: &str) -> Option<String> {
    match innermost(settings.get(group)?.get(key)?) {
        Value::Array(bytes) => {
            let octets = bytes
                .iter()
                .map(|byte| match byte {
                    Value::U8(byte) => Some(format!("{byte:02X}")),
                    _ => None,
                })
                .collect::<Option<Vec<_>>>()?;
            Some(octets.join(":"))
        }
        Value::Str(text) => Some(text.as_str().to_ascii_uppercase()),
        _ => None,
    }
}

/// Deep-copies settings.
///
/// # Errors
///
/// Returns [`FakeNmError::InvalidArgs`] when a value cannot be duplicated
/// (file descriptors).
pub fn clone_settings(settings: &Settings) -> Result<Settings, FakeNmError> {
    settings
        .iter()
        .map(|(group, values)| {
            let values = values
                .iter()
                .map(|(key, value)| {
                    value
                        .try_clone()
                        .map(|value| (key.clone(), value))
                        .map_err(|err| FakeNmError::InvalidArgs(format!("{group}.{key}: {err}")))
                })
                .collect::<Result<HashMap<_, _>, _>>()?;
            Ok((group.clone(), values))
        })
        .collect()
}

/// Error for an unknown connection index.
fn unknown_connection(index: u32) -> FakeNmError {
    FakeNmError::InvalidArgs(format!("unknown connection {CONNECTION_PREFIX}{index}"))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
