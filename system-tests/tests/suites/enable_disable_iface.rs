// system-tests/tests/suites/enable_disable_iface.rs
// ============================================================================
// Module: Enable Disable Interface Tests
// Description: RequestStateChange on LAN endpoints.
// Purpose: Verify a port can be disabled and enabled through CIM.
// Dependencies: netconf-wbem, helpers
// ============================================================================

//! Device state toggling through `LMI_LANEndpoint.RequestStateChange`.

use netconf_wbem::CimInstanceName;
use netconf_wbem::CimValue;
use netconf_wbem::WbemConnection;

use crate::helpers::ensure;
use crate::helpers::network::IP_TYPE_DHCP;
use crate::helpers::network::create_setting_for_port;
use crate::helpers::network::delete_settings_captioned;
use crate::helpers::network::find_lan_endpoint;
use crate::helpers::polling::wait_for_values;
use crate::helpers::suite::NetconfSuite;
use crate::helpers::suite::within;

/// `RequestedState` / `EnabledState` value: enabled.
const ENABLED: u16 = 2;
/// `RequestedState` value: disabled.
const DISABLED: u16 = 3;

/// Coarse device state derived from `EnabledState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviceState {
    Connected,
    Unavailable,
}

async fn device_state(
    connection: &WbemConnection,
    endpoint: &CimInstanceName,
) -> Result<DeviceState, String> {
    let endpoint = connection.get_instance(endpoint).await.map_err(|err| err.to_string())?;
    Ok(if endpoint.get_u64("EnabledState") == Some(u64::from(ENABLED)) {
        DeviceState::Connected
    } else {
        DeviceState::Unavailable
    })
}

async fn toggle_twice(suite: &NetconfSuite, caption: &str) -> Result<(), String> {
    let port = suite.port()?;
    let connection = &suite.connection;
    let endpoint = find_lan_endpoint(connection, port).await?;
    let endpoint = endpoint.require_path().map_err(|err| err.to_string())?.clone();
    create_setting_for_port(
        connection,
        port,
        &[("Caption", CimValue::from(caption)), ("IPv4Type", CimValue::from(IP_TYPE_DHCP))],
    )
    .await?;

    let mut state = device_state(connection, &endpoint).await?;
    for _ in 0..2 {
        let (requested, accepted) = match state {
            DeviceState::Connected => (DISABLED, DeviceState::Unavailable),
            DeviceState::Unavailable => (ENABLED, DeviceState::Connected),
        };
        connection
            .invoke_method(
                "RequestStateChange",
                &endpoint,
                &[("RequestedState", CimValue::from(requested))],
            )
            .await
            .map_err(|err| format!("RequestStateChange {requested}: {err}"))?;
        state = wait_for_values(&[accepted], || device_state(connection, &endpoint)).await?;
        ensure!(
            state == accepted,
            "cannot {} device {port}",
            if requested == DISABLED { "disable" } else { "enable" }
        );
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn port_can_be_disabled_and_enabled() -> Result<(), Box<dyn std::error::Error>> {
    let suite = NetconfSuite::connect()?;
    let caption = format!("Test Default {}", suite.port()?);
    let outcome = within(suite.env.timeout, toggle_twice(&suite, &caption)).await;
    let cleanup = delete_settings_captioned(&suite.connection, &caption).await;
    suite.teardown().await?;
    outcome?;
    cleanup?;
    Ok(())
}
