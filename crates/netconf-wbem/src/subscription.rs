// crates/netconf-wbem/src/subscription.rs
// ============================================================================
// Module: Indication Subscriptions
// Description: Filter, listener destination, and subscription bookkeeping.
// Purpose: Route CIMOM indications to a local listener and clean up after.
// Dependencies: nix
// ============================================================================

//! ## Overview
//! A subscription is three instances in the interop namespace: a
//! `CIM_IndicationFilter` (created here only when a query is supplied), a
//! transient `CIM_ListenerDestinationCIMXML` pointing at
//! `http://localhost:<port>`, and the `CIM_IndicationSubscription` tying them
//! together. Unsubscribing deletes the subscription, then the destination.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;

use crate::client::DEFAULT_NAMESPACE;
use crate::client::WbemConnection;
use crate::error::WbemError;
use crate::model::CimInstance;
use crate::model::CimInstanceName;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Broker name that may use the Pegasus specific interop namespace.
const PEGASUS_BROKER: &str = "tog-pegasus";
/// Repository directory present when Pegasus uses `root/PG_InterOp`.
const PEGASUS_INTEROP_REPOSITORY: &str = "/var/lib/Pegasus/repository/root#PG_InterOp";
/// `PersistenceType` value of a transient destination.
const PERSISTENCE_TRANSIENT: u16 = 3;
/// Default query language of filters.
pub const DEFAULT_QUERY_LANGUAGE: &str = "DMTF:CQL";

// ============================================================================
// SECTION: Namespace Selection
// ============================================================================

/// Returns the interop namespace for a broker.
///
/// Only `tog-pegasus` with an existing `root#PG_InterOp` repository uses
/// `root/PG_InterOp`; everything else uses `root/interop`. An unset broker is
/// treated as `tog-pegasus`.
#[must_use]
pub fn interop_namespace(broker: Option<&str>) -> &'static str {
    interop_namespace_with(broker, Path::new(PEGASUS_INTEROP_REPOSITORY))
}

/// Variant of [`interop_namespace`] with an explicit repository path.
#[must_use]
pub fn interop_namespace_with(broker: Option<&str>, repository: &Path) -> &'static str {
    if broker.unwrap_or(PEGASUS_BROKER) == PEGASUS_BROKER && repository.is_dir() {
        "root/PG_InterOp"
    } else {
        "root/interop"
    }
}

// ============================================================================
// SECTION: Subscriptions
// ============================================================================

/// Instances created for one subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    /// Filter name the subscription was created for.
    pub filter_name: String,
    /// Path of the `CIM_IndicationSubscription`.
    pub subscription: CimInstanceName,
    /// Path of the `CIM_ListenerDestinationCIMXML`.
    pub destination: CimInstanceName,
}

/// Tracks subscriptions created against one listener port.
#[derive(Debug, Clone)]
pub struct Subscriptions {
    /// Interop namespace used for all instances.
    namespace: String,
    /// Host name used as `SystemName`.
    hostname: String,
    /// Listener port.
    port: u16,
    /// Active subscriptions in creation order.
    active: Vec<Subscription>,
}

impl Subscriptions {
    /// Creates an empty registry for the given namespace and listener port.
    ///
    /// # Errors
    ///
    /// Returns [`WbemError::Listener`] when the host name cannot be read.
    pub fn new(namespace: &str, port: u16) -> Result<Self, WbemError> {
        let hostname = nix::unistd::gethostname()
            .map_err(|err| WbemError::Listener(format!("gethostname: {err}")))?
            .to_string_lossy()
            .into_owned();
        Ok(Self::with_hostname(namespace, port, &hostname))
    }

    /// Creates an empty registry with an explicit host name.
    #[must_use]
    pub fn with_hostname(namespace: &str, port: u16, hostname: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            hostname: hostname.to_string(),
            port,
            active: Vec::new(),
        }
    }

    /// Returns the active subscriptions.
    #[must_use]
    pub fn active(&self) -> &[Subscription] {
        &self.active
    }

    /// Returns true when a subscription exists for `filter_name`.
    #[must_use]
    pub fn is_subscribed(&self, filter_name: &str) -> bool {
        self.active.iter().any(|entry| entry.filter_name == filter_name)
    }

    /// Subscribes the listener to a filter.
    ///
    /// With a `query`, the filter is created first; without one, an existing
    /// filter of that name is referenced.
    ///
    /// # Errors
    ///
    /// Returns [`WbemError`] when any of the instances cannot be created.
    pub async fn subscribe(
        &mut self,
        connection: &WbemConnection,
        filter_name: &str,
        query: Option<&str>,
        query_language: &str,
    ) -> Result<CimInstanceName, WbemError> {
        let filter = match query {
            Some(query) => {
                let instance = self.filter_instance(filter_name, query, query_language);
                connection.create_instance(&instance, Some(&self.namespace)).await?
            }
            None => self.system_path("CIM_IndicationFilter", filter_name),
        };
        let destination_instance = self.destination_instance(filter_name);
        let destination =
            connection.create_instance(&destination_instance, Some(&self.namespace)).await?;

        let subscription_path = CimInstanceName::new("CIM_IndicationSubscription")
            .with_namespace(self.namespace.as_str())
            .with_key("Filter", filter.clone())
            .with_key("Handler", destination.clone());
        let subscription_instance = CimInstance::new("CIM_IndicationSubscription")
            .with("Filter", filter)
            .with("Handler", destination.clone())
            .with_path(subscription_path);
        let subscription =
            connection.create_instance(&subscription_instance, Some(&self.namespace)).await?;
        self.active.push(Subscription {
            filter_name: filter_name.to_string(),
            subscription: subscription.clone(),
            destination,
        });
        Ok(subscription)
    }

    /// Removes the subscription and destination of `filter_name`.
    ///
    /// # Errors
    ///
    /// Returns [`WbemError::Protocol`] when nothing is subscribed under that
    /// name, or the first deletion failure.
    pub async fn unsubscribe(
        &mut self,
        connection: &WbemConnection,
        filter_name: &str,
    ) -> Result<(), WbemError> {
        let index =
            self.active.iter().position(|entry| entry.filter_name == filter_name).ok_or_else(
                || WbemError::Protocol(format!("no subscription for filter {filter_name}")),
            )?;
        let entry = self.active.remove(index);
        connection.delete_instance(&entry.subscription).await?;
        connection.delete_instance(&entry.destination).await
    }

    /// Removes every subscription, attempting all deletions.
    ///
    /// # Errors
    ///
    /// Returns the first deletion failure after trying the rest.
    pub async fn unsubscribe_all(&mut self, connection: &WbemConnection) -> Result<(), WbemError> {
        let mut first_error = None;
        for entry in std::mem::take(&mut self.active) {
            for path in [&entry.subscription, &entry.destination] {
                if let Err(err) = connection.delete_instance(path).await {
                    first_error.get_or_insert(err);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Builds the keys shared by filters and destinations.
    fn system_path(&self, classname: &str, name: &str) -> CimInstanceName {
        CimInstanceName::new(classname)
            .with_namespace(self.namespace.as_str())
            .with_key("CreationClassName", classname)
            .with_key("SystemCreationClassName", "CIM_ComputerSystem")
            .with_key("SystemName", self.hostname.as_str())
            .with_key("Name", name)
    }

    /// Builds a `CIM_IndicationFilter` instance.
    fn filter_instance(&self, name: &str, query: &str, query_language: &str) -> CimInstance {
        CimInstance::new("CIM_IndicationFilter")
            .with("CreationClassName", "CIM_IndicationFilter")
            .with("SystemCreationClassName", "CIM_ComputerSystem")
            .with("SystemName", self.hostname.as_str())
            .with("Name", name)
            .with("Query", query)
            .with("QueryLanguage", query_language)
            .with("SourceNamespace", DEFAULT_NAMESPACE)
            .with_path(self.system_path("CIM_IndicationFilter", name))
    }

    /// Builds a transient `CIM_ListenerDestinationCIMXML` instance.
    fn destination_instance(&self, name: &str) -> CimInstance {
        CimInstance::new("CIM_ListenerDestinationCIMXML")
            .with("CreationClassName", "CIM_ListenerDestinationCIMXML")
            .with("SystemCreationClassName", "CIM_ComputerSystem")
            .with("SystemName", self.hostname.as_str())
            .with("Name", name)
            .with("Destination", format!("http://localhost:{}", self.port))
            .with("PersistenceType", PERSISTENCE_TRANSIENT)
            .with_path(self.system_path("CIM_ListenerDestinationCIMXML", name))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
