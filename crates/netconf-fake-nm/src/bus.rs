// crates/netconf-fake-nm/src/bus.rs
// ============================================================================
// Module: Fake NetworkManager Bus Objects
// Description: D-Bus interfaces backed by the shared in-memory state.
// Purpose: Answer the NetworkManager API subset the provider uses.
// Dependencies: zbus, tokio
// ============================================================================

//! ## Overview
//! Each object holds the shared [`NmState`] (or an immutable snapshot for
//! active connections) and reads it on every property access, so properties
//! always reflect the latest mutation. Methods lock the state, apply one
//! mutation, release the lock, and only then touch the object server and
//! emit signals; the lock is never held across an `.await`.

#![allow(
    missing_docs,
    reason = "zbus #[interface] generates undocumented signal emitter trait methods"
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use zbus::Connection;
use zbus::fdo;
use zbus::interface;
use zbus::object_server::SignalEmitter;
use zbus::zvariant::ObjectPath;
use zbus::zvariant::OwnedObjectPath;
use zbus::zvariant::Value;

use crate::error::FakeNmError;
use crate::events::BusEvent;
use crate::events::emit;
use crate::state::ActiveConnection;
use crate::state::AddedConnection;
use crate::state::CONTROLLER_PATH;
use crate::state::DEVICE_STATE_ACTIVATED;
use crate::state::Device;
use crate::state::DeviceKind;
use crate::state::MANAGER_PATH;
use crate::state::NO_OBJECT;
use crate::state::NmState;
use crate::state::SETTINGS_PATH;
use crate::state::Settings;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Manager interface.
const MANAGER_IFACE: &str = "org.freedesktop.NetworkManager";
/// Bond device interface.
const BOND_IFACE: &str = "org.freedesktop.NetworkManager.Device.Bond";
/// Bridge device interface.
const BRIDGE_IFACE: &str = "org.freedesktop.NetworkManager.Device.Bridge";
/// Settings interface.
const SETTINGS_IFACE: &str = "org.freedesktop.NetworkManager.Settings";
/// Stored connection interface.
const CONNECTION_IFACE: &str = "org.freedesktop.NetworkManager.Settings.Connection";
/// Controller interface.
const CONTROLLER_IFACE: &str = "org.fedoraproject.OpenLMINetworking.Controller";
/// `NM_STATE_CONNECTED_GLOBAL`.
const NM_STATE_CONNECTED_GLOBAL: u32 = 70;

/// State shared by every bus object.
pub type SharedState = Arc<Mutex<NmState>>;

// ============================================================================
// SECTION: Startup
// ============================================================================

/// Registers all objects on `connection`, then requests `bus_name`.
///
/// # Errors
///
/// Returns [`FakeNmError::Bus`] when an object cannot be registered or the
/// name cannot be acquired.
pub async fn serve(
    connection: &Connection,
    bus_name: &str,
    state: SharedState,
) -> Result<(), FakeNmError> {
    let server = connection.object_server();
    server
        .at(
            MANAGER_PATH,
            Manager {
                state: Arc::clone(&state),
            },
        )
        .await?;
    server
        .at(
            SETTINGS_PATH,
            SettingsObject {
                state: Arc::clone(&state),
            },
        )
        .await?;
    server
        .at(
            CONTROLLER_PATH,
            Controller {
                state: Arc::clone(&state),
            },
        )
        .await?;
    let devices = lock(&state)?.devices().to_vec();
    for device in &devices {
        publish_device(connection, &state, device).await?;
    }
    connection.request_name(bus_name).await?;
    let emitter = SignalEmitter::new(connection, MANAGER_PATH)?;
    Manager::state_changed(&emitter, NM_STATE_CONNECTED_GLOBAL).await?;
    emit(&BusEvent::bus_ready(bus_name));
    Ok(())
}

// ============================================================================
// SECTION: Shared Helpers
// ============================================================================

/// Locks the shared state.
fn lock(state: &SharedState) -> Result<MutexGuard<'_, NmState>, FakeNmError> {
    state.lock().map_err(|_| FakeNmError::Bus("state lock poisoned".to_string()))
}

/// Converts a path string into a bus object path.
fn object_path(path: String) -> Result<OwnedObjectPath, FakeNmError> {
    OwnedObjectPath::try_from(path).map_err(|err| FakeNmError::Bus(err.to_string()))
}

/// Converts path strings into bus object paths.
fn object_paths(paths: Vec<String>) -> Result<Vec<OwnedObjectPath>, FakeNmError> {
    paths.into_iter().map(object_path).collect()
}

/// Returns the `/` placeholder path.
fn no_object() -> OwnedObjectPath {
    ObjectPath::from_static_str_unchecked(NO_OBJECT).into()
}

/// Registers a device and its type-specific interface, then announces it.
async fn publish_device(
    connection: &Connection,
    state: &SharedState,
    device: &Device,
) -> Result<(), FakeNmError> {
    let server = connection.object_server();
    let path = device.path();
    let index = device.index;
    server
        .at(
            path.as_str(),
            DeviceObject {
                state: Arc::clone(state),
                index,
            },
        )
        .await?;
    let shared = Arc::clone(state);
    match device.kind {
        DeviceKind::Ethernet => {
            server
                .at(
                    path.as_str(),
                    WiredDevice {
                        state: shared,
                        index,
                    },
                )
                .await?
        }
        DeviceKind::Bond => {
            server
                .at(
                    path.as_str(),
                    BondDevice {
                        state: shared,
                        index,
                    },
                )
                .await?
        }
        DeviceKind::Bridge => {
            server
                .at(
                    path.as_str(),
                    BridgeDevice {
                        state: shared,
                        index,
                    },
                )
                .await?
        }
    };
    let emitter = SignalEmitter::new(connection, MANAGER_PATH)?;
    Manager::device_added(&emitter, ObjectPath::try_from(path.as_str())?).await?;
    emit(&BusEvent::signal(MANAGER_IFACE, "DeviceAdded", MANAGER_PATH).with_detail(path));
    Ok(())
}

/// Unregisters a removed device and announces it.
async fn retire_device(connection: &Connection, device: &Device) -> Result<(), FakeNmError> {
    let server = connection.object_server();
    let path = device.path();
    server.remove::<DeviceObject, _>(path.as_str()).await?;
    match device.kind {
        DeviceKind::Ethernet => server.remove::<WiredDevice, _>(path.as_str()).await?,
        DeviceKind::Bond => server.remove::<BondDevice, _>(path.as_str()).await?,
        DeviceKind::Bridge => server.remove::<BridgeDevice, _>(path.as_str()).await?,
    };
    let emitter = SignalEmitter::new(connection, MANAGER_PATH)?;
    Manager::device_removed(&emitter, ObjectPath::try_from(path.as_str())?).await?;
    emit(&BusEvent::signal(MANAGER_IFACE, "DeviceRemoved", MANAGER_PATH).with_detail(path));
    Ok(())
}

/// Emits the master device's `PropertiesChanged` after its slaves changed.
async fn announce_slaves(connection: &Connection, master: &Device) -> Result<(), FakeNmError> {
    let path = master.path();
    let slaves = object_paths(master.slaves.clone())?;
    let mut properties = HashMap::new();
    properties.insert("Slaves", Value::from(slaves));
    properties.insert("HwAddress", Value::from(master.hw_address()));
    let emitter = SignalEmitter::new(connection, path.as_str())?;
    let interface = match master.kind {
        DeviceKind::Bond => {
            BondDevice::properties_changed(&emitter, properties).await?;
            BOND_IFACE
        }
        DeviceKind::Bridge => {
            BridgeDevice::properties_changed(&emitter, properties).await?;
            BRIDGE_IFACE
        }
        DeviceKind::Ethernet => return Ok(()),
    };
    emit(&BusEvent::signal(interface, "PropertiesChanged", &path).with_detail("Slaves"));
    Ok(())
}

/// Announces the current `ActiveConnections` list of the manager.
async fn announce_active(connection: &Connection, state: &SharedState) -> Result<(), FakeNmError> {
    let paths = object_paths(lock(state)?.active_paths())?;
    let mut properties = HashMap::new();
    properties.insert("ActiveConnections", Value::from(paths));
    let emitter = SignalEmitter::new(connection, MANAGER_PATH)?;
    Manager::properties_changed(&emitter, properties).await?;
    let manager = connection.object_server().interface::<_, Manager>(MANAGER_PATH).await?;
    manager.get().await.active_connections_changed(manager.signal_emitter()).await?;
    emit(
        &BusEvent::signal(MANAGER_IFACE, "PropertiesChanged", MANAGER_PATH)
            .with_detail("ActiveConnections"),
    );
    Ok(())
}

/// Registers an active connection object and announces the new list.
async fn publish_active(
    connection: &Connection,
    state: &SharedState,
    active: ActiveConnection,
) -> Result<OwnedObjectPath, FakeNmError> {
    let path = active.path();
    connection
        .object_server()
        .at(
            path.as_str(),
            ActiveObject {
                record: active,
            },
        )
        .await?;
    announce_active(connection, state).await?;
    object_path(path)
}

/// Registers a stored connection and everything it created.
async fn publish_connection(
    connection: &Connection,
    state: &SharedState,
    added: &AddedConnection,
) -> Result<OwnedObjectPath, FakeNmError> {
    connection
        .object_server()
        .at(
            added.path.as_str(),
            ConnectionObject {
                state: Arc::clone(state),
                index: added.index,
            },
        )
        .await?;
    if let Some(master) = &added.master {
        publish_device(connection, state, master).await?;
    }
    if let Some(master) = &added.enslaved_to {
        announce_slaves(connection, master).await?;
    }
    let emitter = SignalEmitter::new(connection, SETTINGS_PATH)?;
    SettingsObject::new_connection(&emitter, ObjectPath::try_from(added.path.as_str())?).await?;
    emit(
        &BusEvent::signal(SETTINGS_IFACE, "NewConnection", SETTINGS_PATH)
            .with_detail(added.path.clone()),
    );
    object_path(added.path.clone())
}

/// Reads one field of a device or fails with `UnknownObject`.
fn read_device<T>(
    state: &SharedState,
    index: u32,
    read: impl FnOnce(&Device) -> T,
) -> fdo::Result<T> {
    let state = lock(state)?;
    state
        .device(index)
        .map(read)
        .ok_or_else(|| fdo::Error::UnknownObject(format!("device {index} was removed")))
}

// ============================================================================
// SECTION: Manager
// ============================================================================

/// `/org/freedesktop/NetworkManager`.
pub struct Manager {
    /// Shared state.
    state: SharedState,
}

#[interface(name = "org.freedesktop.NetworkManager")]
impl Manager {
    /// Lists device paths.
    async fn get_devices(&self) -> fdo::Result<Vec<OwnedObjectPath>> {
        emit(&BusEvent::method_call(MANAGER_IFACE, "GetDevices", MANAGER_PATH));
        let paths = lock(&self.state)?.device_paths();
        Ok(object_paths(paths)?)
    }

    /// Activates a stored connection on a device.
    async fn activate_connection(
        &self,
        connection: ObjectPath<'_>,
        device: ObjectPath<'_>,
        specific_object: ObjectPath<'_>,
        #[zbus(connection)] bus: &Connection,
    ) -> fdo::Result<OwnedObjectPath> {
        emit(
            &BusEvent::method_call(MANAGER_IFACE, "ActivateConnection", MANAGER_PATH).with_detail(
                format!("connection={connection} device={device} specific={specific_object}"),
            ),
        );
        let active = lock(&self.state)?.activate(connection.as_str(), device.as_str())?;
        Ok(publish_active(bus, &self.state, active).await?)
    }

    /// Deactivates an active connection.
    async fn deactivate_connection(
        &self,
        active_connection: ObjectPath<'_>,
        #[zbus(connection)] bus: &Connection,
    ) -> fdo::Result<()> {
        emit(
            &BusEvent::method_call(MANAGER_IFACE, "DeactivateConnection", MANAGER_PATH)
                .with_detail(active_connection.to_string()),
        );
        let removed = lock(&self.state)?.deactivate(active_connection.as_str())?;
        bus.object_server().remove::<ActiveObject, _>(removed.path().as_str()).await?;
        Ok(announce_active(bus, &self.state).await?)
    }

    /// Stores a connection and activates it in one call.
    async fn add_and_activate_connection(
        &self,
        connection: Settings,
        device: ObjectPath<'_>,
        specific_object: ObjectPath<'_>,
        #[zbus(connection)] bus: &Connection,
    ) -> fdo::Result<(OwnedObjectPath, OwnedObjectPath)> {
        emit(
            &BusEvent::method_call(MANAGER_IFACE, "AddAndActivateConnection", MANAGER_PATH)
                .with_detail(format!("device={device} specific={specific_object}")),
        );
        let added = lock(&self.state)?.add_connection(connection)?;
        let stored = publish_connection(bus, &self.state, &added).await?;
        let active = lock(&self.state)?.activate(&added.path, device.as_str())?;
        let active = publish_active(bus, &self.state, active).await?;
        Ok((stored, active))
    }

    /// Paths of active connections.
    #[zbus(property)]
    async fn active_connections(&self) -> fdo::Result<Vec<OwnedObjectPath>> {
        let paths = lock(&self.state)?.active_paths();
        Ok(object_paths(paths)?)
    }

    /// A device appeared.
    #[zbus(signal)]
    async fn device_added(emitter: &SignalEmitter<'_>, device: ObjectPath<'_>)
    -> zbus::Result<()>;

    /// A device disappeared.
    #[zbus(signal)]
    async fn device_removed(
        emitter: &SignalEmitter<'_>,
        device: ObjectPath<'_>,
    ) -> zbus::Result<()>;

    /// Global state changed.
    #[zbus(signal)]
    async fn state_changed(emitter: &SignalEmitter<'_>, state: u32) -> zbus::Result<()>;

    /// NetworkManager-specific property change notification.
    #[zbus(signal)]
    async fn properties_changed(
        emitter: &SignalEmitter<'_>,
        properties: HashMap<&str, Value<'_>>,
    ) -> zbus::Result<()>;
}

// ============================================================================
// SECTION: Devices
// ============================================================================

/// `org.freedesktop.NetworkManager.Device` on `/Devices/<i>`.
pub struct DeviceObject {
    /// Shared state.
    state: SharedState,
    /// Device index.
    index: u32,
}

#[interface(name = "org.freedesktop.NetworkManager.Device")]
impl DeviceObject {
    /// Device state; always activated.
    #[zbus(property)]
    async fn state(&self) -> u32 {
        DEVICE_STATE_ACTIVATED
    }

    /// Interface name.
    #[zbus(property)]
    async fn interface(&self) -> fdo::Result<String> {
        read_device(&self.state, self.index, |device| device.name.clone())
    }

    /// IP interface name; same as the interface name.
    #[zbus(property)]
    async fn ip_interface(&self) -> fdo::Result<String> {
        read_device(&self.state, self.index, |device| device.name.clone())
    }

    /// `NM_DEVICE_TYPE`.
    #[zbus(property)]
    async fn device_type(&self) -> fdo::Result<u32> {
        read_device(&self.state, self.index, |device| device.kind.code())
    }

    /// IPv4 configuration object; none.
    #[zbus(property, name = "Ip4Config")]
    async fn ip4_config(&self) -> OwnedObjectPath {
        no_object()
    }

    /// IPv6 configuration object; none.
    #[zbus(property, name = "Ip6Config")]
    async fn ip6_config(&self) -> OwnedObjectPath {
        no_object()
    }

    /// DHCPv4 configuration object; none.
    #[zbus(property, name = "Dhcp4Config")]
    async fn dhcp4_config(&self) -> OwnedObjectPath {
        no_object()
    }

    /// DHCPv6 configuration object; none.
    #[zbus(property, name = "Dhcp6Config")]
    async fn dhcp6_config(&self) -> OwnedObjectPath {
        no_object()
    }
}

/// `org.freedesktop.NetworkManager.Device.Wired`.
pub struct WiredDevice {
    /// Shared state.
    state: SharedState,
    /// Device index.
    index: u32,
}

#[interface(name = "org.freedesktop.NetworkManager.Device.Wired")]
impl WiredDevice {
    /// Synthetic MAC address.
    #[zbus(property)]
    async fn hw_address(&self) -> fdo::Result<String> {
        read_device(&self.state, self.index, Device::hw_address)
    }
}

/// `org.freedesktop.NetworkManager.Device.Bond`.
pub struct BondDevice {
    /// Shared state.
    state: SharedState,
    /// Device index.
    index: u32,
}

#[interface(name = "org.freedesktop.NetworkManager.Device.Bond")]
impl BondDevice {
    /// Synthetic MAC address.
    #[zbus(property)]
    async fn hw_address(&self) -> fdo::Result<String> {
        read_device(&self.state, self.index, Device::hw_address)
    }

    /// Enslaved device paths.
    #[zbus(property)]
    async fn slaves(&self) -> fdo::Result<Vec<OwnedObjectPath>> {
        let slaves = read_device(&self.state, self.index, |device| device.slaves.clone())?;
        Ok(object_paths(slaves)?)
    }

    /// NetworkManager-specific property change notification.
    #[zbus(signal)]
    async fn properties_changed(
        emitter: &SignalEmitter<'_>,
        properties: HashMap<&str, Value<'_>>,
    ) -> zbus::Result<()>;
}

/// `org.freedesktop.NetworkManager.Device.Bridge`.
pub struct BridgeDevice {
    /// Shared state.
    state: SharedState,
    /// Device index.
    index: u32,
}

#[interface(name = "org.freedesktop.NetworkManager.Device.Bridge")]
impl BridgeDevice {
    /// Synthetic MAC address.
    #[zbus(property)]
    async fn hw_address(&self) -> fdo::Result<String> {
        read_device(&self.state, self.index, Device::hw_address)
    }

    /// Enslaved device paths.
    #[zbus(property)]
    async fn slaves(&self) -> fdo::Result<Vec<OwnedObjectPath>> {
        let slaves = read_device(&self.state, self.index, |device| device.slaves.clone())?;
        Ok(object_paths(slaves)?)
    }

    /// NetworkManager-specific property change notification.
    #[zbus(signal)]
    async fn properties_changed(
        emitter: &SignalEmitter<'_>,
        properties: HashMap<&str, Value<'_>>,
    ) -> zbus::Result<()>;
}

// ============================================================================
// SECTION: Active Connections
// ============================================================================

/// `org.freedesktop.NetworkManager.Connection.Active`.
pub struct ActiveObject {
    /// Immutable activation record.
    record: ActiveConnection,
}

#[interface(name = "org.freedesktop.NetworkManager.Connection.Active")]
impl ActiveObject {
    /// Devices the connection is active on.
    #[zbus(property)]
    async fn devices(&self) -> fdo::Result<Vec<OwnedObjectPath>> {
        Ok(vec![object_path(self.record.device.clone())?])
    }

    /// Stored connection path.
    #[zbus(property)]
    async fn connection(&self) -> fdo::Result<OwnedObjectPath> {
        Ok(object_path(self.record.connection.clone())?)
    }

    /// Activation state.
    #[zbus(property)]
    async fn state(&self) -> u32 {
        self.record.state
    }
}

// ============================================================================
// SECTION: Settings
// ============================================================================

/// `/org/freedesktop/NetworkManager/Settings`.
pub struct SettingsObject {
    /// Shared state.
    state: SharedState,
}

#[interface(name = "org.freedesktop.NetworkManager.Settings")]
impl SettingsObject {
    /// Stores a connection profile.
    async fn add_connection(
        &self,
        connection: Settings,
        #[zbus(connection)] bus: &Connection,
    ) -> fdo::Result<OwnedObjectPath> {
        emit(&BusEvent::method_call(SETTINGS_IFACE, "AddConnection", SETTINGS_PATH));
        let added = lock(&self.state)?.add_connection(connection)?;
        Ok(publish_connection(bus, &self.state, &added).await?)
    }

    /// Lists stored connection paths.
    async fn list_connections(&self) -> fdo::Result<Vec<OwnedObjectPath>> {
        emit(&BusEvent::method_call(SETTINGS_IFACE, "ListConnections", SETTINGS_PATH));
        let paths = lock(&self.state)?.connection_paths();
        Ok(object_paths(paths)?)
    }

    /// A connection profile was stored.
    #[zbus(signal)]
    async fn new_connection(
        emitter: &SignalEmitter<'_>,
        connection: ObjectPath<'_>,
    ) -> zbus::Result<()>;
}

/// `org.freedesktop.NetworkManager.Settings.Connection` on `/Settings/<n>`.
pub struct ConnectionObject {
    /// Shared state.
    state: SharedState,
    /// Connection index.
    index: u32,
}

impl ConnectionObject {
    /// Returns this object's path.
    fn path(&self) -> String {
        format!("{SETTINGS_PATH}/{}", self.index)
    }
}

#[interface(name = "org.freedesktop.NetworkManager.Settings.Connection")]
impl ConnectionObject {
    /// Returns the stored settings.
    async fn get_settings(&self) -> fdo::Result<Settings> {
        emit(&BusEvent::method_call(CONNECTION_IFACE, "GetSettings", &self.path()));
        Ok(lock(&self.state)?.connection_settings(self.index)?)
    }

    /// Replaces the stored settings.
    async fn update(
        &self,
        properties: Settings,
        #[zbus(signal_emitter)] emitter: SignalEmitter<'_>,
    ) -> fdo::Result<()> {
        let path = self.path();
        emit(&BusEvent::method_call(CONNECTION_IFACE, "Update", &path));
        lock(&self.state)?.update_connection(self.index, properties)?;
        Self::updated(&emitter).await?;
        emit(&BusEvent::signal(CONNECTION_IFACE, "Updated", &path));
        Ok(())
    }

    /// Deletes the profile and whatever it created.
    async fn delete(
        &self,
        #[zbus(connection)] bus: &Connection,
        #[zbus(signal_emitter)] emitter: SignalEmitter<'_>,
    ) -> fdo::Result<()> {
        let path = self.path();
        emit(&BusEvent::method_call(CONNECTION_IFACE, "Delete", &path));
        let deleted = lock(&self.state)?.delete_connection(self.index)?;
        for active in &deleted.dropped_active {
            bus.object_server().remove::<ActiveObject, _>(active.as_str()).await?;
        }
        if let Some(device) = &deleted.removed_device {
            retire_device(bus, device).await?;
        }
        if let Some(master) = &deleted.released_from {
            announce_slaves(bus, master).await?;
        }
        if !deleted.dropped_active.is_empty() {
            announce_active(bus, &self.state).await?;
        }
        Self::removed(&emitter).await?;
        emit(&BusEvent::signal(CONNECTION_IFACE, "Removed", &path));

        // Unregister after this call has been answered.
        let bus = bus.clone();
        tokio::spawn(async move {
            if let Err(err) =
                bus.object_server().remove::<ConnectionObject, _>(deleted.path.as_str()).await
            {
                emit(&BusEvent::error(format!("unregister {}: {err}", deleted.path)));
            }
        });
        Ok(())
    }

    /// The stored settings changed.
    #[zbus(signal)]
    async fn updated(emitter: &SignalEmitter<'_>) -> zbus::Result<()>;

    /// The profile was deleted.
    #[zbus(signal)]
    async fn removed(emitter: &SignalEmitter<'_>) -> zbus::Result<()>;
}

// ============================================================================
// SECTION: Controller
// ============================================================================

/// `/org/fedoraproject/OpenLMINetworking/Controller`.
pub struct Controller {
    /// Shared state.
    state: SharedState,
}

#[interface(name = "org.fedoraproject.OpenLMINetworking.Controller")]
impl Controller {
    /// Hot-plugs an ethernet device, named `eth<i>` when `name` is empty.
    async fn add_device(
        &self,
        name: String,
        #[zbus(connection)] bus: &Connection,
    ) -> fdo::Result<()> {
        emit(
            &BusEvent::method_call(CONTROLLER_IFACE, "AddDevice", CONTROLLER_PATH)
                .with_detail(name.clone()),
        );
        let device = lock(&self.state)?.add_device(Some(&name), DeviceKind::Ethernet);
        Ok(publish_device(bus, &self.state, &device).await?)
    }
}
