// system-tests/tests/suites/smash_conformance.rs
// ============================================================================
// Module: SMASH Conformance Tests
// Description: DSP1035 and DSP1116 profile checks.
// Purpose: Verify the provider's object model against the host LAN network
//          port profile and the IP configuration profile.
// Dependencies: netconf-wbem, system-tests, helpers
// ============================================================================

//! ## Overview
//! Read-only checks over whatever instances the provider exposes. Every
//! violation in a section is collected before the test fails, so one run
//! lists all of them. Section numbers follow DSP1035 1.0.2 and DSP1116 1.0.0.

use netconf_wbem::AssocFilter;
use netconf_wbem::CimInstance;
use netconf_wbem::CimValue;
use netconf_wbem::WbemConnection;
use system_tests::address::is_ipv4;
use system_tests::address::is_ipv6;

use crate::helpers::network::PROTOCOL_IPV4;
use crate::helpers::network::PROTOCOL_IPV6;
use crate::helpers::suite::NetconfSuite;
use crate::helpers::suite::skip;
use crate::helpers::suite::within;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Class the provider hosts its elements on.
const COMPUTER_SYSTEM_CLASS: &str = "PG_ComputerSystem";
/// `RequestedState` value: not applicable.
const NOT_APPLICABLE: u64 = 12;
/// `EnabledState` values allowed on ports and connections.
const PORT_ENABLED_STATES: [u64; 4] = [2, 3, 5, 6];
const CAPABILITIES_CLASS: &str = "LMI_NetworkEnabledLogicalElementCapabilities";

// ============================================================================
// SECTION: Findings
// ============================================================================

/// Violations collected for one section.
#[derive(Default)]
struct Findings(Vec<String>);

impl Findings {
    fn check(&mut self, ok: bool, message: impl FnOnce() -> String) {
        if !ok {
            self.0.push(message());
        }
    }

    fn record(&mut self, outcome: Result<(), String>) {
        if let Err(message) = outcome {
            self.0.push(message);
        }
    }

    fn finish(self, section: &str) -> Result<(), String> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(format!("{section}:\n  {}", self.0.join("\n  ")))
        }
    }
}

/// True when a property is missing or null.
fn absent(instance: &CimInstance, property: &str) -> bool {
    instance.get(property).is_none_or(CimValue::is_null)
}

async fn enumerate(connection: &WbemConnection, class: &str) -> Result<Vec<CimInstance>, String> {
    connection.enumerate_instances(class, None).await.map_err(|err| format!("enumerate {class}: {err}"))
}

async fn associators(
    connection: &WbemConnection,
    instance: &CimInstance,
    assoc_class: &str,
    result_class: &str,
) -> Result<Vec<CimInstance>, String> {
    let path = instance.require_path().map_err(|err| err.to_string())?;
    connection
        .associators(path, &AssocFilter::assoc(assoc_class).result_class(result_class))
        .await
        .map_err(|err| format!("associators of {path} via {assoc_class}: {err}"))
}

/// Requires `count` associators of `result_class` through `assoc_class`.
async fn association_count(
    connection: &WbemConnection,
    instance: &CimInstance,
    assoc_class: &str,
    result_class: &str,
    count: usize,
) -> Result<Vec<CimInstance>, String> {
    let found = associators(connection, instance, assoc_class, result_class).await?;
    if found.len() == count {
        Ok(found)
    } else {
        Err(format!(
            "Instance of {} should be associated to {count} instance(s) of {result_class} via \
             {assoc_class}. {} associations found",
            instance.classname,
            found.len()
        ))
    }
}

async fn hosted_on_computer_system(
    connection: &WbemConnection,
    instance: &CimInstance,
    assoc_class: &str,
) -> Result<(), String> {
    association_count(connection, instance, assoc_class, COMPUTER_SYSTEM_CLASS, 1).await.map(|_| ())
}

/// Declares a test that runs one read-only section against a fresh suite.
macro_rules! section_test {
    ($name:ident, $section:ident) => {
        #[tokio::test(flavor = "multi_thread")]
        async fn $name() -> Result<(), Box<dyn std::error::Error>> {
            let suite = NetconfSuite::connect()?;
            let outcome = within(suite.env.timeout, $section(&suite.connection)).await;
            suite.teardown().await?;
            outcome?;
            Ok(())
        }
    };
}

// ============================================================================
// SECTION: DSP1035 Host LAN Network Port
// ============================================================================

async fn network_port_state_management(connection: &WbemConnection) -> Result<(), String> {
    let mut findings = Findings::default();
    for port in enumerate(connection, "LMI_EthernetPort").await? {
        let capabilities = match association_count(
            connection,
            &port,
            "LMI_NetworkElementCapabilities",
            CAPABILITIES_CLASS,
            1,
        )
        .await
        {
            Ok(found) => found,
            Err(message) => {
                findings.0.push(message);
                continue;
            }
        };
        let capabilities = &capabilities[0];
        let supported = capabilities.get_u64_array("RequestedStatesSupported").unwrap_or_default();
        findings.check(supported.is_empty(), || {
            format!(
                "RequestedStatesSupported of {CAPABILITIES_CLASS} should be an empty list, is \
                 {supported:?}"
            )
        });
        findings.check(port.get_u64("RequestedState") == Some(NOT_APPLICABLE), || {
            format!("port RequestedState is {:?}, expected 12", port.get_u64("RequestedState"))
        });
        findings.check(
            port.get_u64("EnabledState").is_some_and(|state| PORT_ENABLED_STATES.contains(&state)),
            || format!("port EnabledState {:?} is not allowed", port.get_u64("EnabledState")),
        );
        findings.check(capabilities.get_bool("ElementNameEditSupported") != Some(true), || {
            "ElementNameEditSupported must be false on ports".to_string()
        });
    }
    findings.finish("DSP1035 7.1")
}

async fn representing_communication_endpoint(connection: &WbemConnection) -> Result<(), String> {
    let mut findings = Findings::default();
    for port in enumerate(connection, "LMI_EthernetPort").await? {
        let path = port.require_path().map_err(|err| err.to_string())?;
        let endpoints = connection
            .associators(path, &AssocFilter::result("LMI_LANEndpoint"))
            .await
            .map_err(|err| err.to_string())?;
        findings.check(!endpoints.is_empty(), || format!("port {path} has no LAN endpoint"));
        if let Some(permanent) = port.get_str("PermanentAddress").filter(|mac| !mac.is_empty()) {
            findings.check(
                endpoints.iter().any(|endpoint| endpoint.get_str("MACAddress") == Some(permanent)),
                || {
                    format!(
                        "No LANEndpoint with MACAddress same as NetworkPort's PermanentAddress \
                         ({})",
                        port.get_str("DeviceID").unwrap_or_default()
                    )
                },
            );
        }
    }

    for endpoint in enumerate(connection, "LMI_LANEndpoint").await? {
        findings.record(
            association_count(
                connection,
                &endpoint,
                "LMI_NetworkDeviceSAPImplementation",
                "LMI_EthernetPort",
                1,
            )
            .await
            .map(|_| ()),
        );
        let capabilities = match association_count(
            connection,
            &endpoint,
            "LMI_NetworkElementCapabilities",
            CAPABILITIES_CLASS,
            1,
        )
        .await
        {
            Ok(found) => found,
            Err(message) => {
                findings.0.push(message);
                continue;
            }
        };
        let capabilities = &capabilities[0];
        let supported = capabilities.get_u64_array("RequestedStatesSupported").unwrap_or_default();
        findings.check(supported == [2, 3], || {
            format!("endpoint RequestedStatesSupported is {supported:?}, expected [2, 3]")
        });
        let requested = endpoint.get_u64("RequestedState");
        findings.check(
            requested.is_some_and(|state| supported.contains(&state) || state == 5),
            || format!("endpoint RequestedState {requested:?} is not supported"),
        );
        findings.check(
            matches!(endpoint.get_u64("EnabledState"), Some(2 | 3)),
            || format!("endpoint EnabledState {:?} is not 2 or 3", endpoint.get_u64("EnabledState")),
        );
        findings.check(capabilities.get_bool("ElementNameEditSupported") != Some(true), || {
            "ElementNameEditSupported must be false on endpoints".to_string()
        });
    }
    findings.finish("DSP1035 7.2")
}

async fn class_is_absent(connection: &WbemConnection, classname: &str) -> Result<(), String> {
    let classes = connection
        .enumerate_class_names(None, true, None)
        .await
        .map_err(|err| format!("enumerate class names: {err}"))?;
    if classes.iter().any(|name| name.eq_ignore_ascii_case(classname)) {
        Err(format!("{classname} is registered but not supported"))
    } else {
        Ok(())
    }
}

section_test!(dsp1035_network_port_state_management, network_port_state_management);

section_test!(dsp1035_representing_communication_endpoint, representing_communication_endpoint);

async fn managing_network_endpoints(connection: &WbemConnection) -> Result<(), String> {
    class_is_absent(connection, "LMI_NetworkPortConfigurationService").await
}

async fn multiple_ports_single_controller(connection: &WbemConnection) -> Result<(), String> {
    class_is_absent(connection, "LMI_PortController").await
}

section_test!(dsp1035_managing_network_endpoints, managing_network_endpoints);

section_test!(dsp1035_multiple_ports_single_controller, multiple_ports_single_controller);

// ============================================================================
// SECTION: DSP1116 IP Configuration
// ============================================================================

async fn representing_network_connection(connection: &WbemConnection) -> Result<(), String> {
    let mut findings = Findings::default();
    for network_connection in enumerate(connection, "LMI_IPNetworkConnection").await? {
        findings.record(
            hosted_on_computer_system(connection, &network_connection, "LMI_NetworkHostedAccessPoint")
                .await,
        );
        findings.check(
            network_connection
                .get_u64("EnabledState")
                .is_some_and(|state| PORT_ENABLED_STATES.contains(&state)),
            || {
                format!(
                    "connection EnabledState {:?} is not allowed",
                    network_connection.get_u64("EnabledState")
                )
            },
        );
        findings.check(network_connection.get_u64("RequestedState") == Some(NOT_APPLICABLE), || {
            format!(
                "connection RequestedState is {:?}, expected 12",
                network_connection.get_u64("RequestedState")
            )
        });
    }
    findings.finish("DSP1116 7.1")
}

async fn representing_ip_version(connection: &WbemConnection) -> Result<(), String> {
    let mut findings = Findings::default();
    let connections = enumerate(connection, "LMI_IPNetworkConnection").await?;
    let settings = enumerate(connection, "LMI_IPVersionSettingData").await?;
    findings.check(!settings.is_empty(), || "no LMI_IPVersionSettingData".to_string());
    for setting in &settings {
        findings.record(
            hosted_on_computer_system(connection, setting, "LMI_IPVersionElementSettingData").await,
        );
        findings.record(
            association_count(
                connection,
                setting,
                "LMI_IPVersionElementSettingData",
                "LMI_IPNetworkConnection",
                connections.len(),
            )
            .await
            .map(|_| ()),
        );
        findings.check(
            matches!(setting.get_u64("ProtocolIFType"), Some(PROTOCOL_IPV4 | PROTOCOL_IPV6)),
            || format!("IP version ProtocolIFType {:?}", setting.get_u64("ProtocolIFType")),
        );
    }
    findings.finish("DSP1116 7.2")
}

fn check_static_setting(findings: &mut Findings, setting: &CimInstance) {
    let protocol = setting.get_u64("ProtocolIFType");
    let ipv4 = protocol == Some(PROTOCOL_IPV4);
    findings.check(setting.get_u64("AddressOrigin") == Some(3), || {
        format!("static setting AddressOrigin {:?}", setting.get_u64("AddressOrigin"))
    });
    findings.check(matches!(protocol, Some(PROTOCOL_IPV4 | PROTOCOL_IPV6)), || {
        format!("static setting ProtocolIFType {protocol:?}")
    });
    let valid = |address: &str| if ipv4 { is_ipv4(address) } else { is_ipv6(address) };
    let addresses = setting.get_str_array("IPAddresses").unwrap_or_default();
    for address in &addresses {
        findings.check(valid(address), || format!("address {address} is not valid"));
    }
    if ipv4 {
        let masks = setting.get_str_array("SubnetMasks").map_or(0, |masks| masks.len());
        findings.check(masks == addresses.len(), || {
            format!("{masks} subnet masks for {} addresses", addresses.len())
        });
        findings.check(absent(setting, "IPv6SubnetPrefixLengths"), || {
            "IPv4 setting carries IPv6SubnetPrefixLengths".to_string()
        });
    } else {
        let prefixes =
            setting.get_u64_array("IPv6SubnetPrefixLengths").map_or(0, |prefixes| prefixes.len());
        findings.check(prefixes == addresses.len(), || {
            format!("{prefixes} prefix lengths for {} addresses", addresses.len())
        });
        findings.check(absent(setting, "SubnetMasks"), || {
            "IPv6 setting carries SubnetMasks".to_string()
        });
    }
    let gateways = setting.get_str_array("GatewayAddresses").unwrap_or_default();
    findings.check(gateways.len() == addresses.len(), || {
        format!("{} gateways for {} addresses", gateways.len(), addresses.len())
    });
    for gateway in &gateways {
        findings.check(valid(gateway), || format!("gateway {gateway} is not valid"));
    }
}

async fn ip_setting(connection: &WbemConnection) -> Result<(), String> {
    let mut findings = Findings::default();
    for setting in enumerate(connection, "LMI_IPAssignmentSettingData").await? {
        let origin = setting.get_u64("AddressOrigin");
        let protocol = setting.get_u64("ProtocolIFType");
        findings.check(origin.is_some_and(|origin| (3..=11).contains(&origin)), || {
            format!("{} AddressOrigin {origin:?}", setting.classname)
        });
        if origin == Some(9) {
            findings.check(protocol == Some(PROTOCOL_IPV6), || {
                format!("stateless setting ProtocolIFType {protocol:?}")
            });
        }
        if origin == Some(11) {
            findings.check(setting.get_str("ConfigurationName").is_some_and(|name| !name.is_empty()), || {
                "cumulative setting has no ConfigurationName".to_string()
            });
        }
        if setting.is_class("LMI_ExtendedStaticIPAssignmentSettingData") {
            check_static_setting(&mut findings, &setting);
        }
        if setting.is_class("LMI_DHCPSettingData") {
            findings.check(matches!(origin, Some(4 | 7)), || {
                format!("DHCP setting AddressOrigin {origin:?}")
            });
            let expected = if origin == Some(4) { PROTOCOL_IPV4 } else { PROTOCOL_IPV6 };
            findings.check(protocol == Some(expected), || {
                format!("DHCP setting ProtocolIFType {protocol:?}, expected {expected}")
            });
        }
    }
    findings.finish("DSP1116 7.3")
}

async fn current_and_pending_settings(connection: &WbemConnection) -> Result<(), String> {
    let mut findings = Findings::default();
    for esd in enumerate(connection, "LMI_IPElementSettingData").await? {
        findings.check(matches!(esd.get_u64("IsCurrent"), Some(1 | 2)), || {
            format!("IsCurrent {:?}", esd.get_u64("IsCurrent"))
        });
        findings.check(matches!(esd.get_u64("IsNext"), Some(1..=3)), || {
            format!("IsNext {:?}", esd.get_u64("IsNext"))
        });
    }
    findings.finish("DSP1116 7.4")
}

fn check_endpoint_addresses(findings: &mut Findings, endpoint: &CimInstance) {
    let protocol = endpoint.get_u64("ProtocolIFType");
    findings.check(matches!(protocol, Some(PROTOCOL_IPV4 | PROTOCOL_IPV6)), || {
        format!("endpoint ProtocolIFType {protocol:?}")
    });
    if protocol == Some(PROTOCOL_IPV4) {
        findings.check(endpoint.get_str("IPv4Address").is_some_and(is_ipv4), || {
            "IPv4 address is not valid".to_string()
        });
        findings.check(endpoint.get_str("SubnetMask").is_some_and(is_ipv4), || {
            "IPv4 subnet mask is not valid".to_string()
        });
        findings.check(absent(endpoint, "IPv6Address"), || "IPv4 endpoint has IPv6Address".to_string());
        findings.check(absent(endpoint, "IPv6SubnetPrefixLength"), || {
            "IPv4 endpoint has IPv6SubnetPrefixLength".to_string()
        });
    } else {
        findings.check(endpoint.get_str("IPv6Address").is_some_and(is_ipv6), || {
            "IPv6 address is not valid".to_string()
        });
        findings.check(!absent(endpoint, "IPv6SubnetPrefixLength"), || {
            "IPv6 prefix length is not valid".to_string()
        });
        findings.check(absent(endpoint, "IPv4Address"), || "IPv6 endpoint has IPv4Address".to_string());
        findings.check(absent(endpoint, "SubnetMask"), || "IPv6 endpoint has SubnetMask".to_string());
    }
}

async fn representing_ip_interface(connection: &WbemConnection) -> Result<(), String> {
    let mut findings = Findings::default();
    for endpoint in enumerate(connection, "LMI_IPProtocolEndpoint").await? {
        findings.record(
            hosted_on_computer_system(connection, &endpoint, "LMI_NetworkHostedAccessPoint").await,
        );
        findings.record(
            association_count(
                connection,
                &endpoint,
                "LMI_NetworkSAPSAPDependency",
                "LMI_IPNetworkConnection",
                1,
            )
            .await
            .map(|_| ()),
        );
        // TODO: drop 0 once the provider stops reporting unknown origins.
        findings.check(
            matches!(endpoint.get_u64("AddressOrigin"), Some(0 | 3 | 4 | 7 | 9 | 10)),
            || format!("endpoint AddressOrigin {:?}", endpoint.get_u64("AddressOrigin")),
        );
        check_endpoint_addresses(&mut findings, &endpoint);
    }
    findings.finish("DSP1116 7.6")
}

async fn ip_configuration_management(connection: &WbemConnection) -> Result<(), String> {
    let mut findings = Findings::default();
    let services = enumerate(connection, "LMI_IPConfigurationService").await?;
    findings.check(services.len() == 1, || {
        format!("{} LMI_IPConfigurationService instances, expected 1", services.len())
    });
    if let Some(service) = services.first() {
        findings.record(
            hosted_on_computer_system(connection, service, "LMI_HostedIPConfigurationService").await,
        );
    }
    for network_connection in enumerate(connection, "LMI_IPNetworkConnection").await? {
        findings.record(
            association_count(
                connection,
                &network_connection,
                "LMI_IPConfigurationServiceAffectsElement",
                "LMI_IPConfigurationService",
                1,
            )
            .await
            .map(|_| ()),
        );
    }
    findings.finish("DSP1116 7.7")
}

async fn relationship_with_network_interface(connection: &WbemConnection) -> Result<(), String> {
    let mut findings = Findings::default();
    for network_connection in enumerate(connection, "LMI_IPNetworkConnection").await? {
        findings.record(
            association_count(
                connection,
                &network_connection,
                "LMI_EndpointForIPNetworkConnection",
                "LMI_LANEndpoint",
                1,
            )
            .await
            .map(|_| ()),
        );
    }
    for endpoint in enumerate(connection, "LMI_IPProtocolEndpoint").await? {
        findings.record(
            association_count(connection, &endpoint, "LMI_BindsToLANEndpoint", "LMI_LANEndpoint", 1)
                .await
                .map(|_| ()),
        );
    }
    findings.finish("DSP1116 7.10")
}

async fn remote_services(connection: &WbemConnection) -> Result<(), String> {
    let mut findings = Findings::default();
    for access_point in enumerate(connection, "LMI_NetworkRemoteServiceAccessPoint").await? {
        // AccessContext 2 is the default gateway.
        if access_point.get_u64("AccessContext") != Some(2) {
            continue;
        }
        let info = access_point.get_str("AccessInfo").unwrap_or_default();
        findings.check(is_ipv4(info) || is_ipv6(info), || {
            format!("Invalid format of default gateway {info:?}")
        });
        findings.record(
            association_count(
                connection,
                &access_point,
                "LMI_NetworkRemoteAccessAvailableToElement",
                "LMI_IPNetworkConnection",
                1,
            )
            .await
            .map(|_| ()),
        );
        findings.record(
            hosted_on_computer_system(
                connection,
                &access_point,
                "LMI_NetworkRemoteAccessAvailableToElement",
            )
            .await,
        );
    }
    findings.finish("DSP1116 7.11")
}

section_test!(dsp1116_representing_network_connection, representing_network_connection);

section_test!(dsp1116_representing_ip_version, representing_ip_version);

section_test!(dsp1116_ip_setting, ip_setting);

section_test!(dsp1116_current_and_pending_settings, current_and_pending_settings);

#[tokio::test(flavor = "multi_thread")]
async fn dsp1116_settings_of_network_connection() {
    skip(
        "dsp1116_settings_of_network_connection",
        "concurrent and accumulated settings cannot be told apart from outside",
    );
}

section_test!(dsp1116_representing_ip_interface, representing_ip_interface);

section_test!(dsp1116_ip_configuration_management, ip_configuration_management);

#[tokio::test(flavor = "multi_thread")]
async fn dsp1116_dhcp_client() {
    skip("dsp1116_dhcp_client", "the provider does not model the DHCP client");
}

#[tokio::test(flavor = "multi_thread")]
async fn dsp1116_dns_client_and_configuration() {
    skip("dsp1116_dns_client_and_configuration", "the provider does not model the DNS client");
}

section_test!(dsp1116_relationship_with_network_interface, relationship_with_network_interface);

section_test!(dsp1116_remote_services, remote_services);
