// system-tests/tests/suites/modify_connection.rs
// ============================================================================
// Module: Modify Connection Tests
// Description: ModifyInstance on IP assignment setting data.
// Purpose: Verify caption and address type changes and their components.
// Dependencies: netconf-wbem, helpers
// ============================================================================

//! Setting modification checks.

use netconf_wbem::AssocFilter;
use netconf_wbem::CimInstance;
use netconf_wbem::CimInstanceName;
use netconf_wbem::CimValue;
use netconf_wbem::WbemConnection;

use crate::helpers::ensure;
use crate::helpers::network::IP_TYPE_DHCP;
use crate::helpers::network::IP_TYPE_STATELESS;
use crate::helpers::network::IP_TYPE_STATIC;
use crate::helpers::network::PROTOCOL_IPV4;
use crate::helpers::network::PROTOCOL_IPV6;
use crate::helpers::network::SETTING_CLASS;
use crate::helpers::network::create_setting_for_port;
use crate::helpers::network::delete_settings_where;
use crate::helpers::suite::NetconfSuite;
use crate::helpers::suite::skip;
use crate::helpers::suite::within;

const CAPTION: &str = "XXX Test Connection";
/// `ProtocolIFType` of a setting carrying both IPv4 and IPv6.
const PROTOCOL_BOTH: u64 = 32768;

async fn create_setting(suite: &NetconfSuite) -> Result<CimInstanceName, String> {
    create_setting_for_port(
        &suite.connection,
        suite.port()?,
        &[("Caption", CimValue::from(CAPTION)), ("IPv4Type", CimValue::from(IP_TYPE_DHCP))],
    )
    .await
}

async fn cleanup(connection: &WbemConnection) -> Result<usize, String> {
    delete_settings_where(connection, |caption| caption.starts_with(CAPTION)).await
}

async fn fetch(connection: &WbemConnection, path: &CimInstanceName) -> Result<CimInstance, String> {
    connection.get_instance(path).await.map_err(|err| format!("get {path}: {err}"))
}

async fn components(
    connection: &WbemConnection,
    setting: &CimInstanceName,
    result_class: &str,
) -> Result<Vec<CimInstance>, String> {
    connection
        .associators(
            setting,
            &AssocFilter::assoc("LMI_OrderedIPAssignmentComponent").result_class(result_class),
        )
        .await
        .map_err(|err| err.to_string())
}

async fn modify_caption(suite: &NetconfSuite) -> Result<(), String> {
    let connection = &suite.connection;
    let path = create_setting(suite).await?;
    let modified = format!("{CAPTION} Modified");
    let mut setting = fetch(connection, &path).await?;
    setting.set("Caption", modified.as_str());
    connection.modify_instance(&setting).await.map_err(|err| err.to_string())?;

    let settings =
        connection.enumerate_instances(SETTING_CLASS, None).await.map_err(|err| err.to_string())?;
    ensure!(
        settings.iter().any(|setting| setting.get_str("Caption") == Some(modified.as_str())),
        "updating of Caption failed"
    );
    Ok(())
}

async fn modify_setting_method(suite: &NetconfSuite) -> Result<(), String> {
    let connection = &suite.connection;
    let path = create_setting(suite).await?;

    let mut setting = fetch(connection, &path).await?;
    setting.set("IPv4Type", IP_TYPE_STATIC);
    connection.modify_instance(&setting).await.map_err(|err| err.to_string())?;
    let mut setting = fetch(connection, &path).await?;
    ensure!(
        setting.get_u64("IPv4Type") == Some(u64::from(IP_TYPE_STATIC)),
        "IPv4Type is {:?} after switching to static",
        setting.get_u64("IPv4Type")
    );
    let statics =
        components(connection, &path, "LMI_ExtendedStaticIPAssignmentSettingData").await?;
    ensure!(statics.len() == 1, "expected one static component, found {}", statics.len());
    ensure!(
        statics[0].get_u64("ProtocolIFType") == Some(PROTOCOL_IPV4),
        "static component is not IPv4"
    );

    setting.set("IPv6Type", IP_TYPE_STATELESS);
    connection.modify_instance(&setting).await.map_err(|err| err.to_string())?;
    let setting = fetch(connection, &path).await?;
    ensure!(
        setting.get_u64("IPv6Type") == Some(u64::from(IP_TYPE_STATELESS)),
        "IPv6Type is {:?} after enabling stateless",
        setting.get_u64("IPv6Type")
    );
    ensure!(
        setting.get_u64("ProtocolIFType") == Some(PROTOCOL_BOTH),
        "ProtocolIFType is {:?}, expected both families",
        setting.get_u64("ProtocolIFType")
    );
    let plain = components(connection, &path, SETTING_CLASS).await?;
    ensure!(plain.len() == 1, "expected one stateless component, found {}", plain.len());
    ensure!(
        plain[0].get_u64("ProtocolIFType") == Some(PROTOCOL_IPV6),
        "stateless component is not IPv6"
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn caption_can_be_modified() -> Result<(), Box<dyn std::error::Error>> {
    let suite = NetconfSuite::connect()?;
    let outcome = within(suite.env.timeout, modify_caption(&suite)).await;
    let cleaned = cleanup(&suite.connection).await;
    suite.teardown().await?;
    outcome?;
    cleaned?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn address_types_can_be_modified() -> Result<(), Box<dyn std::error::Error>> {
    let suite = NetconfSuite::connect()?;
    let outcome = within(suite.env.timeout, modify_setting_method(&suite)).await;
    let cleaned = cleanup(&suite.connection).await;
    suite.teardown().await?;
    outcome?;
    cleaned?;
    skip(
        "address_types_can_be_modified",
        "disabling both address families is not checked; the provider rejects it",
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn ip_version_can_be_modified() {
    skip("ip_version_can_be_modified", "changing the IP version of a setting is not supported");
}
