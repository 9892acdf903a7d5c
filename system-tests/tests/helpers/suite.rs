// system-tests/tests/helpers/suite.rs
// ============================================================================
// Module: Suite Fixture
// Description: CIMOM connection, indication listener, and subscriptions.
// Purpose: Give each conformance test one place to talk to the CIMOM.
// Dependencies: netconf-config, netconf-wbem, rand, system-tests, tokio
// ============================================================================

//! ## Overview
//! [`NetconfSuite`] reads the suite environment, connects to the CIMOM, and
//! picks a random listener port in `12000..=13000`. The listener starts on
//! the first subscription. Subscriptions still active when the fixture is
//! dropped are removed on a blocking section of the multi-thread runtime.
//! Test bodies run through [`within`] with the exported suite timeout.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::ops::RangeInclusive;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use netconf_config::SuiteEnvConfig;
use netconf_wbem::CimInstance;
use netconf_wbem::CimInstanceName;
use netconf_wbem::ConnectionOptions;
use netconf_wbem::DEFAULT_QUERY_LANGUAGE;
use netconf_wbem::IndicationListener;
use netconf_wbem::IndicationQueue;
use netconf_wbem::Subscriptions;
use netconf_wbem::WbemConnection;
use netconf_wbem::interop_namespace;
use rand::Rng;
pub use system_tests::bounded::within;
use tokio::runtime::Handle;
use tokio::runtime::RuntimeFlavor;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Ports the indication listener picks from.
pub const INDICATION_PORTS: RangeInclusive<u16> = 12000..=13000;
/// Class of provider jobs.
pub const JOB_CLASS: &str = "LMI_NetworkJob";
/// `JobState` of a completed job.
pub const JOB_COMPLETED: u64 = 7;
/// Filter for job state change indications.
pub const JOB_FILTER_QUERY: &str =
    "select * from LMI_NetworkInstModification where SourceInstance isa LMI_NetworkJob";
/// Wait for one job indication.
pub const JOB_INDICATION_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// SECTION: Fixture
// ============================================================================

/// Connection plus indication plumbing shared by one test.
pub struct NetconfSuite {
    /// Environment exported by the runner.
    pub env: SuiteEnvConfig,
    /// CIMOM connection.
    pub connection: WbemConnection,
    /// Listener port handed to destinations.
    indication_port: u16,
    /// Running listener, once something was subscribed.
    listener: Option<IndicationListener>,
    /// Received indications.
    queue: Option<IndicationQueue>,
    /// Subscriptions created by this fixture.
    subscriptions: Subscriptions,
}

impl NetconfSuite {
    /// Builds the fixture from the process environment.
    pub fn connect() -> Result<Self, String> {
        Self::with_env(SuiteEnvConfig::load()?)
    }

    /// Builds the fixture from an explicit environment.
    pub fn with_env(env: SuiteEnvConfig) -> Result<Self, String> {
        let options = ConnectionOptions::new(&env.url, &env.username, &env.password);
        let connection = WbemConnection::new(&options).map_err(|err| err.to_string())?;
        let indication_port = rand::thread_rng().gen_range(INDICATION_PORTS);
        let subscriptions =
            Subscriptions::new(interop_namespace(env.broker.as_deref()), indication_port)
                .map_err(|err| err.to_string())?;
        Ok(Self {
            env,
            connection,
            indication_port,
            listener: None,
            queue: None,
            subscriptions,
        })
    }

    /// Returns the first port under test.
    pub fn port(&self) -> Result<&str, String> {
        self.env.port()
    }

    /// Returns all ports under test.
    pub fn ports(&self) -> &[String] {
        &self.env.ports
    }

    /// Returns `<prefix>_<milliseconds>` for a fresh filter name.
    pub fn filter_name(prefix: &str) -> String {
        let millis =
            SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |elapsed| elapsed.as_millis());
        format!("{prefix}_{millis}")
    }

    // ------------------------------------------------------------------------
    // Indications
    // ------------------------------------------------------------------------

    /// Creates a filter with `query` and subscribes the listener to it.
    pub async fn subscribe(&mut self, filter_name: &str, query: &str) -> Result<(), String> {
        self.ensure_listening().await?;
        self.subscriptions
            .subscribe(&self.connection, filter_name, Some(query), DEFAULT_QUERY_LANGUAGE)
            .await
            .map(|_| ())
            .map_err(|err| format!("subscribe {filter_name}: {err}"))
    }

    /// Removes the subscription created for `filter_name`.
    pub async fn unsubscribe(&mut self, filter_name: &str) -> Result<(), String> {
        self.subscriptions
            .unsubscribe(&self.connection, filter_name)
            .await
            .map_err(|err| format!("unsubscribe {filter_name}: {err}"))
    }

    /// Waits up to `timeout` for the next indication.
    pub async fn get_indication(&mut self, timeout: Duration) -> Result<CimInstance, String> {
        let queue = self.queue.as_mut().ok_or_else(|| "no indication subscription".to_string())?;
        queue.next(timeout).await.map_err(|err| err.to_string())
    }

    /// Drops indications received so far.
    pub fn discard_indications(&mut self) {
        if let Some(queue) = self.queue.as_mut() {
            queue.drain();
        }
    }

    /// Waits for a state change indication of `job` and returns the job.
    ///
    /// Indications about other instances are skipped.
    pub async fn wait_for_job(
        &mut self,
        job: &CimInstanceName,
        timeout: Duration,
    ) -> Result<CimInstance, String> {
        let id = job.key_str("InstanceID").ok_or_else(|| format!("job {job} has no InstanceID"))?;
        loop {
            let indication = self.get_indication(timeout).await?;
            if let Some(source) = indication.get_instance("SourceInstance")
                && source.is_class(JOB_CLASS)
                && source.get_str("InstanceID") == Some(id)
            {
                return Ok(source.clone());
            }
        }
    }

    /// Waits until `job` reports `JobState` completed.
    pub async fn wait_for_job_completion(&mut self, job: &CimInstanceName) -> Result<(), String> {
        loop {
            let state = self.wait_for_job(job, JOB_INDICATION_TIMEOUT).await?;
            if state.get_u64("JobState") == Some(JOB_COMPLETED) {
                return Ok(());
            }
        }
    }

    /// Removes all subscriptions and stops the listener.
    pub async fn teardown(mut self) -> Result<(), String> {
        let result = self
            .subscriptions
            .unsubscribe_all(&self.connection)
            .await
            .map_err(|err| format!("unsubscribe: {err}"));
        if let Some(listener) = self.listener.take() {
            listener.stop().await;
        }
        result
    }

    /// Starts the listener unless it is already running.
    async fn ensure_listening(&mut self) -> Result<(), String> {
        if self.listener.as_ref().is_some_and(IndicationListener::running) {
            return Ok(());
        }
        let (listener, queue) = IndicationListener::start(self.indication_port)
            .await
            .map_err(|err| err.to_string())?;
        self.listener = Some(listener);
        self.queue = Some(queue);
        Ok(())
    }
}

impl Drop for NetconfSuite {
    fn drop(&mut self) {
        if self.subscriptions.active().is_empty() {
            return;
        }
        let Ok(handle) = Handle::try_current() else {
            return;
        };
        if handle.runtime_flavor() != RuntimeFlavor::MultiThread {
            return;
        }
        let connection = &self.connection;
        let subscriptions = &mut self.subscriptions;
        tokio::task::block_in_place(|| {
            let _ = handle.block_on(subscriptions.unsubscribe_all(connection));
        });
    }
}

// ============================================================================
// SECTION: Skips
// ============================================================================

/// Reports a skipped test on stderr.
#[allow(clippy::print_stderr, reason = "Skip lines go to the runner log on stderr.")]
pub fn skip(test: &str, reason: &str) {
    eprintln!("skip: {test}: {reason}");
}
