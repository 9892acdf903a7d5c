// system-tests/tests/helpers/dbus.rs
// ============================================================================
// Module: Network Manager Settings Reader
// Description: Reads connection settings straight from the bus backend.
// Purpose: Check that CIM changes reached the network manager.
// Dependencies: netconf-config, serde_json, zbus
// ============================================================================

//! ## Overview
//! In fake mode the reader joins the private session bus the runner started;
//! otherwise it uses the system bus. Settings come back as
//! `a{sa{sv}}` and are converted to [`serde_json::Value`] so assertions can
//! index them like `settings["ipv4"]["method"]`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;

use netconf_config::SuiteEnvConfig;
use serde_json::Map;
use serde_json::Value as Json;
use zbus::Connection;
use zbus::Proxy;
use zbus::connection::Builder;
use zbus::zvariant::OwnedObjectPath;
use zbus::zvariant::OwnedValue;
use zbus::zvariant::Value;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Object path of the settings service.
pub const SETTINGS_PATH: &str = "/org/freedesktop/NetworkManager/Settings";
/// Settings service interface.
pub const SETTINGS_IFACE: &str = "org.freedesktop.NetworkManager.Settings";
/// Stored connection interface.
pub const CONNECTION_IFACE: &str = "org.freedesktop.NetworkManager.Settings.Connection";

// ============================================================================
// SECTION: Reader
// ============================================================================

/// Bus client for the network manager settings service.
pub struct NmSettingsReader {
    /// Bus connection.
    connection: Connection,
    /// Network manager bus name.
    bus_name: String,
}

impl NmSettingsReader {
    /// Connects to the bus the network manager under test is on.
    pub async fn connect(env: &SuiteEnvConfig) -> Result<Self, String> {
        let builder = match (env.fake_nm, env.dbus_address.as_deref()) {
            (true, Some(address)) => Builder::address(address),
            (true, None) => Builder::session(),
            (false, _) => Builder::system(),
        }
        .map_err(|err| format!("bus address: {err}"))?;
        let connection = builder.build().await.map_err(|err| format!("bus connect: {err}"))?;
        Ok(Self {
            connection,
            bus_name: env.bus_name.clone(),
        })
    }

    /// Returns the settings of every stored connection.
    pub async fn all_settings(&self) -> Result<Vec<Json>, String> {
        let settings = self.proxy(SETTINGS_PATH, SETTINGS_IFACE).await?;
        let paths: Vec<OwnedObjectPath> = settings
            .call("ListConnections", &())
            .await
            .map_err(|err| format!("ListConnections: {err}"))?;
        let mut all = Vec::with_capacity(paths.len());
        for path in paths {
            let stored = self.proxy(path.as_str(), CONNECTION_IFACE).await?;
            let raw: HashMap<String, HashMap<String, OwnedValue>> = stored
                .call("GetSettings", &())
                .await
                .map_err(|err| format!("GetSettings {}: {err}", path.as_str()))?;
            all.push(settings_to_json(&raw));
        }
        Ok(all)
    }

    /// Returns the settings whose `connection.id` equals `id`.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<Json>, String> {
        Ok(self
            .all_settings()
            .await?
            .into_iter()
            .find(|settings| settings["connection"]["id"].as_str() == Some(id)))
    }

    /// Builds a proxy on the network manager's bus name.
    async fn proxy(&self, path: &str, interface: &str) -> Result<Proxy<'_>, String> {
        Proxy::new(&self.connection, self.bus_name.clone(), path.to_string(), interface.to_string())
            .await
            .map_err(|err| format!("proxy {path}: {err}"))
    }
}

// ============================================================================
// SECTION: Conversion
// ============================================================================

/// Converts an `a{sa{sv}}` settings map.
pub fn settings_to_json(raw: &HashMap<String, HashMap<String, OwnedValue>>) -> Json {
    let mut groups = Map::new();
    for (group, values) in raw {
        let entries =
            values.iter().map(|(key, value)| (key.clone(), value_to_json(value))).collect();
        groups.insert(group.clone(), Json::Object(entries));
    }
    Json::Object(groups)
}

/// Converts one variant value; structures become arrays.
pub fn value_to_json(value: &Value<'_>) -> Json {
    match value {
        Value::U8(number) => Json::from(*number),
        Value::Bool(flag) => Json::from(*flag),
        Value::I16(number) => Json::from(*number),
        Value::U16(number) => Json::from(*number),
        Value::I32(number) => Json::from(*number),
        Value::U32(number) => Json::from(*number),
        Value::I64(number) => Json::from(*number),
        Value::U64(number) => Json::from(*number),
        Value::F64(number) => Json::from(*number),
        Value::Str(text) => Json::from(text.as_str()),
        Value::ObjectPath(path) => Json::from(path.as_str()),
        Value::Value(inner) => value_to_json(inner),
        Value::Array(array) => Json::Array(array.iter().map(value_to_json).collect()),
        Value::Dict(dict) => Json::Object(
            dict.iter()
                .map(|(key, value)| {
                    let key = match key {
                        Value::Str(text) => text.as_str().to_string(),
                        other => value_to_json(other).to_string(),
                    };
                    (key, value_to_json(value))
                })
                .collect(),
        ),
        Value::Structure(structure) => {
            Json::Array(structure.fields().iter().map(value_to_json).collect())
        }
        _ => Json::Null,
    }
}

/// Reads a JSON array of unsigned numbers as bytes.
pub fn json_bytes(value: &Json) -> Vec<u8> {
    value
        .as_array()
        .map(|items| {
            items.iter().filter_map(Json::as_u64).filter_map(|byte| u8::try_from(byte).ok()).collect()
        })
        .unwrap_or_default()
}

/// Reads a JSON number as `u32`.
pub fn json_u32(value: &Json) -> Option<u32> {
    value.as_u64().and_then(|number| u32::try_from(number).ok())
}
