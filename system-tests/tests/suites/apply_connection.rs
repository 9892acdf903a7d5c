// system-tests/tests/suites/apply_connection.rs
// ============================================================================
// Module: Apply Connection Tests
// Description: ApplySettingToIPNetworkConnection modes.
// Purpose: Verify IsCurrent and IsNext of every setting after each mode.
// Dependencies: netconf-wbem, helpers
// ============================================================================

//! Apply mode checks over three DHCP settings on the first port.
//!
//! `IsCurrent` / `IsNext` use 1 for "is" and 2 for "is not". The applied
//! setting is the first one; the other two must end up neither current nor
//! next for every mode except 2, where they are only required not to be next.

use netconf_wbem::AssocFilter;
use netconf_wbem::CimInstance;
use netconf_wbem::CimInstanceName;
use netconf_wbem::CimValue;
use netconf_wbem::WbemConnection;

use crate::helpers::ensure;
use crate::helpers::network::IP_TYPE_DHCP;
use crate::helpers::network::RC_JOB_STARTED;
use crate::helpers::network::apply_setting;
use crate::helpers::network::capabilities_of;
use crate::helpers::network::config_service;
use crate::helpers::network::create_ip_setting;
use crate::helpers::network::find_network_connection;
use crate::helpers::suite::JOB_COMPLETED;
use crate::helpers::suite::JOB_FILTER_QUERY;
use crate::helpers::suite::JOB_INDICATION_TIMEOUT;
use crate::helpers::suite::NetconfSuite;
use crate::helpers::suite::within;

// ============================================================================
// SECTION: Expectations
// ============================================================================

/// Expected value of `IsCurrent` or `IsNext`.
#[derive(Debug, Clone, Copy)]
enum Flag {
    /// Exactly this value.
    Is(u64),
    /// The value before applying.
    Unchanged,
    /// Not checked.
    Any,
}

/// Expectations for one apply mode.
struct ModeCase {
    mode: u16,
    applied: (Flag, Flag),
    others: (Flag, Flag),
}

const NOT: Flag = Flag::Is(2);
const IS: Flag = Flag::Is(1);

// ============================================================================
// SECTION: Fixture
// ============================================================================

/// Three settings on one port, deleted on teardown.
struct ApplyFixture {
    service: CimInstanceName,
    network_connection: CimInstanceName,
    settings: Vec<CimInstanceName>,
}

impl ApplyFixture {
    async fn create(suite: &NetconfSuite) -> Result<Self, String> {
        let connection = &suite.connection;
        let port = suite.port()?;
        let network_connection = find_network_connection(connection, port).await?;
        let network_connection =
            network_connection.require_path().map_err(|err| err.to_string())?.clone();
        let capabilities = capabilities_of(connection, &network_connection).await?;
        let capabilities = capabilities.require_path().map_err(|err| err.to_string())?;
        let service = config_service(connection).await?;
        let service = service.require_path().map_err(|err| err.to_string())?.clone();
        let mut fixture = Self {
            service,
            network_connection,
            settings: Vec::new(),
        };
        for index in 1..=3 {
            let caption = format!("XXX Connection {index}");
            let created = create_ip_setting(
                connection,
                capabilities,
                &[
                    ("Caption", CimValue::from(caption.as_str())),
                    ("IPv4Type", CimValue::from(IP_TYPE_DHCP)),
                ],
            )
            .await;
            match created {
                Ok(path) => fixture.settings.push(path),
                Err(err) => {
                    fixture.delete(connection).await;
                    return Err(format!("unable to create {caption}: {err}"));
                }
            }
        }
        Ok(fixture)
    }

    async fn delete(&self, connection: &WbemConnection) {
        for setting in &self.settings {
            let _ = connection.delete_instance(setting).await;
        }
    }
}

/// Returns the `LMI_IPElementSettingData` references of a setting.
async fn element_settings(
    connection: &WbemConnection,
    setting: &CimInstanceName,
) -> Result<Vec<CimInstance>, String> {
    connection
        .references(setting, &AssocFilter::result("LMI_IPElementSettingData"))
        .await
        .map_err(|err| format!("references of {setting}: {err}"))
}

fn check_flag(
    esd: &CimInstance,
    property: &str,
    expected: Flag,
    before: Option<u64>,
) -> Result<(), String> {
    let wanted = match expected {
        Flag::Is(value) => Some(value),
        Flag::Unchanged => before,
        Flag::Any => return Ok(()),
    };
    let actual = esd.get_u64(property);
    let port = esd.get_ref("ManagedElement").and_then(|element| element.key_str("Name"));
    ensure!(
        actual == wanted,
        "{property} should be {wanted:?} (but it's {actual:?}) for port {port:?} and setting {:?}",
        esd.get_ref("SettingData").map(ToString::to_string)
    );
    Ok(())
}

// ============================================================================
// SECTION: Runner
// ============================================================================

async fn apply_mode(suite: &mut NetconfSuite, case: &ModeCase) -> Result<(), String> {
    let fixture = ApplyFixture::create(suite).await?;
    let outcome = apply_and_check(suite, &fixture, case).await;
    fixture.delete(&suite.connection).await;
    outcome
}

async fn apply_and_check(
    suite: &mut NetconfSuite,
    fixture: &ApplyFixture,
    case: &ModeCase,
) -> Result<(), String> {
    let applied = &fixture.settings[0];
    let before = element_settings(&suite.connection, applied).await?;
    let (current_before, next_before) = before
        .first()
        .map_or((None, None), |esd| (esd.get_u64("IsCurrent"), esd.get_u64("IsNext")));

    let result = apply_setting(
        &suite.connection,
        &fixture.service,
        applied,
        &fixture.network_connection,
        case.mode,
    )
    .await?;
    let rc = result.return_code();
    ensure!(matches!(rc, Some(0 | RC_JOB_STARTED)), "applying setting failed with {rc:?}");
    if rc == Some(RC_JOB_STARTED) {
        let job_path = result.out_ref("Job").cloned().ok_or("no Job out parameter")?;
        let job = suite.wait_for_job(&job_path, JOB_INDICATION_TIMEOUT).await?;
        ensure!(
            job.get_u64("JobState") == Some(JOB_COMPLETED),
            "job ended in state {:?}",
            job.get_u64("JobState")
        );
    }

    for esd in element_settings(&suite.connection, applied).await? {
        check_flag(&esd, "IsCurrent", case.applied.0, current_before)?;
        check_flag(&esd, "IsNext", case.applied.1, next_before)?;
    }
    for other in &fixture.settings[1..] {
        for esd in element_settings(&suite.connection, other).await? {
            check_flag(&esd, "IsCurrent", case.others.0, None)?;
            check_flag(&esd, "IsNext", case.others.1, None)?;
        }
    }
    Ok(())
}

async fn run_case(case: ModeCase) -> Result<(), Box<dyn std::error::Error>> {
    let mut suite = NetconfSuite::connect()?;
    suite.subscribe(&NetconfSuite::filter_name("test_apply"), JOB_FILTER_QUERY).await?;
    let outcome = within(suite.env.timeout, apply_mode(&mut suite, &case)).await;
    suite.teardown().await?;
    outcome?;
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn mode_1_makes_setting_current_and_next() -> Result<(), Box<dyn std::error::Error>> {
    run_case(ModeCase {
        mode: 1,
        applied: (IS, IS),
        others: (NOT, NOT),
    })
    .await
}

#[tokio::test(flavor = "multi_thread")]
async fn mode_2_makes_setting_next_only() -> Result<(), Box<dyn std::error::Error>> {
    run_case(ModeCase {
        mode: 2,
        applied: (Flag::Unchanged, IS),
        others: (Flag::Any, NOT),
    })
    .await
}

#[tokio::test(flavor = "multi_thread")]
async fn mode_4_clears_current_and_next() -> Result<(), Box<dyn std::error::Error>> {
    run_case(ModeCase {
        mode: 4,
        applied: (NOT, NOT),
        others: (NOT, NOT),
    })
    .await
}

#[tokio::test(flavor = "multi_thread")]
async fn mode_5_clears_next_only() -> Result<(), Box<dyn std::error::Error>> {
    run_case(ModeCase {
        mode: 5,
        applied: (Flag::Unchanged, NOT),
        others: (NOT, NOT),
    })
    .await
}

#[tokio::test(flavor = "multi_thread")]
async fn mode_32768_makes_setting_current_only() -> Result<(), Box<dyn std::error::Error>> {
    run_case(ModeCase {
        mode: 32768,
        applied: (IS, Flag::Unchanged),
        others: (NOT, NOT),
    })
    .await
}

#[tokio::test(flavor = "multi_thread")]
async fn mode_32769_clears_current_only() -> Result<(), Box<dyn std::error::Error>> {
    run_case(ModeCase {
        mode: 32769,
        applied: (NOT, Flag::Unchanged),
        others: (NOT, NOT),
    })
    .await
}
