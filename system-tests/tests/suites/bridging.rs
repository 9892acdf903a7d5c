// system-tests/tests/suites/bridging.rs
// ============================================================================
// Module: Bridging Tests
// Description: Bridge master and slave setting data over several ports.
// Purpose: Verify bridge options, slave creation, activation, and the switch
//          objects that appear afterwards.
// Dependencies: netconf-wbem, rand, helpers
// ============================================================================

//! Bridging checks; at least two ports are needed against a real system.

use std::time::Duration;

use netconf_wbem::AssocFilter;
use netconf_wbem::CimInstance;
use netconf_wbem::CimInstanceName;
use netconf_wbem::CimValue;
use netconf_wbem::WbemConnection;
use rand::Rng;

use crate::helpers::ensure;
use crate::helpers::network::IP_TYPE_DHCP;
use crate::helpers::network::IP_TYPE_STATELESS;
use crate::helpers::network::MODE_APPLY_NOW;
use crate::helpers::network::RC_JOB_STARTED;
use crate::helpers::network::apply_setting;
use crate::helpers::network::capabilities_of;
use crate::helpers::network::config_service;
use crate::helpers::network::create_ip_setting;
use crate::helpers::network::create_slave_setting;
use crate::helpers::network::network_connections_for;
use crate::helpers::network::remaining_xxx_captions;
use crate::helpers::suite::JOB_FILTER_QUERY;
use crate::helpers::suite::NetconfSuite;
use crate::helpers::suite::skip;
use crate::helpers::suite::within;

const CAPTION: &str = "XXX Test DHCP Bridge";
/// `Type` parameter of `LMI_CreateIPSetting`: bridging.
const TYPE_BRIDGING: u16 = 5;
const SLAVE_CLASS: &str = "LMI_BridgingSlaveSettingData";
const BRIDGE_PROPERTIES: [&str; 7] =
    ["AgeingTime", "ForwardDelay", "HelloTime", "InterfaceName", "MaxAge", "Priority", "STP"];

async fn reload(connection: &WbemConnection, path: &CimInstanceName) -> Result<CimInstance, String> {
    connection.get_instance(path).await.map_err(|err| format!("get {path}: {err}"))
}

async fn modify(connection: &WbemConnection, instance: &CimInstance) -> Result<(), String> {
    connection
        .modify_instance(instance)
        .await
        .map_err(|err| format!("modify {}: {err}", instance.classname))
}

fn check_values(instance: &CimInstance, expected: &[(&str, u64)]) -> Result<(), String> {
    for (property, value) in expected {
        ensure!(
            instance.get_u64(property) == Some(*value),
            "{property} of {} is {:?}, expected {value}",
            instance.classname,
            instance.get_u64(property)
        );
    }
    Ok(())
}

async fn create_bridge(
    connection: &WbemConnection,
    first: &CimInstanceName,
) -> Result<(CimInstanceName, CimInstanceName), String> {
    let capabilities = capabilities_of(connection, first).await?;
    let capabilities = capabilities.require_path().map_err(|err| err.to_string())?;
    let master = create_ip_setting(
        connection,
        capabilities,
        &[
            ("Caption", CimValue::from(CAPTION)),
            ("Type", CimValue::from(TYPE_BRIDGING)),
            ("IPv4Type", CimValue::from(IP_TYPE_DHCP)),
            ("IPv6Type", CimValue::from(IP_TYPE_STATELESS)),
        ],
    )
    .await
    .map_err(|err| format!("creating bridge failed: {err}"))?;
    let slaves = connection
        .associator_names(
            &master,
            &AssocFilter::assoc("LMI_OrderedIPAssignmentComponent").result_class(SLAVE_CLASS),
        )
        .await
        .map_err(|err| err.to_string())?;
    ensure!(slaves.len() == 1, "new bridge has {} slaves, expected 1", slaves.len());
    let slave = slaves.into_iter().next().ok_or("new bridge has no slave")?;
    Ok((master, slave))
}

async fn bridge_options(
    connection: &WbemConnection,
    master_path: &CimInstanceName,
) -> Result<(), String> {
    let masters = connection
        .enumerate_instances("LMI_BridgingMasterSettingData", None)
        .await
        .map_err(|err| err.to_string())?;
    ensure!(
        masters.iter().any(|master| master.get_str("Caption") == Some(CAPTION)),
        "No instance of LMI_BridgingMasterSettingData with Caption \"{CAPTION}\""
    );

    let mut master = reload(connection, master_path).await?;
    for property in BRIDGE_PROPERTIES {
        ensure!(master.contains(property), "bridge has no {property}");
    }

    let bridge_name = format!("bridge{}", rand::thread_rng().gen_range(0..=100));
    master.set("AgeingTime", 301u32);
    master.set("ForwardDelay", 16u32);
    master.set("HelloTime", 3u32);
    master.set("InterfaceName", bridge_name.as_str());
    master.set("MaxAge", 21u32);
    master.set("Priority", 128u32);
    modify(connection, &master).await?;

    let master = reload(connection, master_path).await?;
    check_values(
        &master,
        &[("AgeingTime", 301), ("ForwardDelay", 16), ("HelloTime", 3), ("MaxAge", 21), ("Priority", 128)],
    )?;
    ensure!(
        master.get_str("InterfaceName") == Some(bridge_name.as_str()),
        "InterfaceName is {:?}, expected {bridge_name}",
        master.get_str("InterfaceName")
    );
    ensure!(master.get_bool("STP") == Some(true), "STP is not enabled");
    Ok(())
}

async fn switch_objects(
    connection: &WbemConnection,
    master: &CimInstanceName,
    names: &[String],
) -> Result<(), String> {
    let services = connection
        .associators(
            master,
            &AssocFilter::assoc("LMI_IPElementSettingData").result_class("LMI_SwitchService"),
        )
        .await
        .map_err(|err| err.to_string())?;
    let service = services.first().ok_or("no LMI_SwitchService for the bridge")?;
    let service = service.require_path().map_err(|err| err.to_string())?;

    let switch_ports = connection
        .enumerate_instances("LMI_SwitchPort", None)
        .await
        .map_err(|err| err.to_string())?;
    ensure!(
        switch_ports.len() == names.len(),
        "{} switch ports, expected {}",
        switch_ports.len(),
        names.len()
    );
    let port_names: Vec<&str> =
        switch_ports.iter().filter_map(|port| port.get_str("Name")).collect();
    for name in names {
        ensure!(port_names.contains(&name.as_str()), "no LMI_SwitchPort for {name}");
    }

    let switched = connection
        .associators(
            service,
            &AssocFilter::assoc("LMI_SwitchesAmong").result_class("LMI_SwitchPort"),
        )
        .await
        .map_err(|err| err.to_string())?;
    ensure!(
        switched.len() == names.len(),
        "switch service links {} ports, expected {}",
        switched.len(),
        names.len()
    );
    for port in &switched {
        let name = port.get_str("Name").unwrap_or_default();
        ensure!(port_names.contains(&name), "switched port {name} is not a switch port");
    }

    for port in &switch_ports {
        let path = port.require_path().map_err(|err| err.to_string())?;
        let endpoints = connection
            .associators(
                path,
                &AssocFilter::assoc("LMI_EndpointIdentity").result_class("LMI_LANEndpoint"),
            )
            .await
            .map_err(|err| err.to_string())?;
        ensure!(endpoints.len() == 1, "switch port {path} has {} LAN endpoints", endpoints.len());
        ensure!(
            endpoints[0].get_str("Name") == port.get_str("Name"),
            "switch port {path} is identical to the wrong endpoint"
        );
    }
    Ok(())
}

async fn bridge_lifecycle(
    suite: &mut NetconfSuite,
    master_slot: &mut Option<CimInstanceName>,
) -> Result<(), String> {
    let network_connections = network_connections_for(&suite.connection, suite.ports()).await?;
    ensure!(network_connections.len() > 1, "At least two ports required for bridging test");
    let mut ports = Vec::with_capacity(network_connections.len());
    for network_connection in &network_connections {
        let path = network_connection.require_path().map_err(|err| err.to_string())?.clone();
        let name = network_connection.get_str("Name").unwrap_or_default().to_string();
        ports.push((path, name));
    }

    let connection = &suite.connection;
    let (master, first_slave) = create_bridge(connection, &ports[0].0).await?;
    *master_slot = Some(master.clone());
    bridge_options(connection, &master).await?;

    let mut slaves = vec![first_slave];
    for (path, _) in &ports[1..] {
        let capabilities = capabilities_of(connection, path).await?;
        let capabilities = capabilities.require_path().map_err(|err| err.to_string())?;
        let slave = create_slave_setting(connection, capabilities, &master).await?;
        ensure!(slave.is_class(SLAVE_CLASS), "slave setting is a {}", slave.classname);
        slaves.push(slave);
    }

    let associated = connection
        .associators(&master, &AssocFilter::result(SLAVE_CLASS))
        .await
        .map_err(|err| err.to_string())?;
    ensure!(
        associated.len() == ports.len(),
        "bridge has {} slaves, expected {}",
        associated.len(),
        ports.len()
    );
    let mut slave = associated.into_iter().next().ok_or("bridge has no slaves")?;
    slave.set("Priority", 33u32);
    slave.set("PathCost", 101u32);
    slave.set("HairpinMode", true);
    modify(connection, &slave).await?;
    let slave = reload(connection, slave.require_path().map_err(|err| err.to_string())?).await?;
    check_values(&slave, &[("Priority", 33), ("PathCost", 101)])?;
    ensure!(slave.get_bool("HairpinMode") == Some(true), "HairpinMode was not enabled");

    let service = config_service(connection).await?;
    let service = service.require_path().map_err(|err| err.to_string())?.clone();
    for ((path, _), slave) in ports.iter().zip(&slaves) {
        let result =
            apply_setting(&suite.connection, &service, slave, path, MODE_APPLY_NOW).await?;
        let rc = result.return_code();
        ensure!(matches!(rc, Some(0 | RC_JOB_STARTED)), "activating slave returned {rc:?}");
        if rc == Some(RC_JOB_STARTED) {
            let job = result.out_ref("Job").cloned().ok_or("no Job out parameter")?;
            suite.wait_for_job_completion(&job).await?;
        }
    }

    let names: Vec<String> = ports.into_iter().map(|(_, name)| name).collect();
    switch_objects(&suite.connection, &master, &names).await
}

async fn cleanup(
    connection: &WbemConnection,
    master: Option<&CimInstanceName>,
) -> Result<(), String> {
    if let Some(master) = master {
        connection.delete_instance(master).await.map_err(|err| format!("delete bridge: {err}"))?;
    }
    tokio::time::sleep(Duration::from_secs(1)).await;
    let remaining = remaining_xxx_captions(connection).await?;
    ensure!(remaining.is_empty(), "connections were not deleted: {}", remaining.join(", "));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn bridge_with_slaves_switches_ports() -> Result<(), Box<dyn std::error::Error>> {
    let mut suite = NetconfSuite::connect()?;
    if !suite.env.fake_nm && suite.ports().len() < 2 {
        skip("bridge_with_slaves_switches_ports", "Specify at least two ports to test bridging");
        suite.teardown().await?;
        return Ok(());
    }
    suite.subscribe(&NetconfSuite::filter_name("test_apply"), JOB_FILTER_QUERY).await?;
    let mut master = None;
    let outcome = within(suite.env.timeout, bridge_lifecycle(&mut suite, &mut master)).await;
    let cleaned = cleanup(&suite.connection, master.as_ref()).await;
    suite.teardown().await?;
    outcome?;
    cleaned?;
    Ok(())
}
