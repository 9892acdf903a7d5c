// system-tests/src/objects.rs
// ============================================================================
// Module: Object Fixture
// Description: Expected classes and associations read from `objects.json`.
// Purpose: Drive the `objects` suite from data instead of code.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! The fixture lists classes (optional expected property values and an
//! instance count) and associations (roles, endpoint classes, optional class
//! filter, count). A string starting with `%` is a WQL query resolved against
//! the CIMOM at check time:
//! - an expected value list becomes the values of the same property in the
//!   query's result instances;
//! - a count becomes the number of result instances, or `0` when the query
//!   fails with a CIM error.
//!
//! Literal value lists are newline separated. Each expected value is consumed
//! by at most one instance.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

// ============================================================================
// SECTION: Fixture Model
// ============================================================================

/// Prefix marking a fixture string as a WQL query.
pub const QUERY_PREFIX: char = '%';

/// Upper bound for the fixture file size.
pub const MAX_FIXTURE_BYTES: u64 = 1024 * 1024;

/// Contents of `objects.json`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectsFixture {
    /// Class checks.
    #[serde(default)]
    pub classes: Vec<ClassCheck>,
    /// Association checks.
    #[serde(default)]
    pub associations: Vec<AssociationCheck>,
}

/// Expectations for the instances of one class.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassCheck {
    /// Class queried with `select * from <name>`.
    pub name: String,
    /// Maps of property name to expected values; later maps override keys.
    #[serde(default)]
    pub values: Vec<BTreeMap<String, String>>,
    /// Expected instance count.
    #[serde(default)]
    pub count: Option<CountSpec>,
}

/// Expectations for the instances of one association class.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssociationCheck {
    /// Association class.
    pub name: String,
    /// Reference property of the source end.
    pub from_role: String,
    /// Reference property of the target end.
    pub to_role: String,
    /// Expected class of the source end.
    pub from: String,
    /// Expected class of the target end.
    pub to: String,
    /// Restricts which instances are checked and counted.
    #[serde(default)]
    pub filter: Option<AssociationFilter>,
    /// Expected count of checked instances.
    #[serde(default)]
    pub count: Option<CountSpec>,
}

/// Class filter on association ends.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssociationFilter {
    /// Required source end class.
    #[serde(default)]
    pub from_class: Option<String>,
    /// Required target end class.
    #[serde(default)]
    pub to_class: Option<String>,
}

impl AssociationFilter {
    /// Returns true when both ends pass the filter.
    #[must_use]
    pub fn admits(&self, from_class: &str, to_class: &str) -> bool {
        let matches = |wanted: &Option<String>, actual: &str| {
            wanted.as_deref().is_none_or(|wanted| wanted.eq_ignore_ascii_case(actual))
        };
        matches(&self.from_class, from_class) && matches(&self.to_class, to_class)
    }
}

/// Count given as a number or as text (a number or a `%` query).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CountSpec {
    /// Literal count.
    Number(u64),
    /// Numeric text or a query.
    Text(String),
}

/// Where a fixture value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixtureValue<'a> {
    /// Newline separated literal values.
    Literal(Vec<&'a str>),
    /// WQL query text without the prefix.
    Query(&'a str),
}

/// Resolved count source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountSource<'a> {
    /// Known count.
    Fixed(u64),
    /// Count of a query's results.
    Query(&'a str),
}

/// Classifies a raw fixture string.
#[must_use]
pub fn classify(raw: &str) -> FixtureValue<'_> {
    raw.strip_prefix(QUERY_PREFIX).map_or_else(
        || FixtureValue::Literal(raw.trim().split('\n').collect()),
        FixtureValue::Query,
    )
}

impl CountSpec {
    /// Resolves the count source.
    ///
    /// # Errors
    ///
    /// Returns an error for text that is neither a query nor a number.
    pub fn source(&self) -> Result<CountSource<'_>, String> {
        match self {
            Self::Number(count) => Ok(CountSource::Fixed(*count)),
            Self::Text(text) => match text.strip_prefix(QUERY_PREFIX) {
                Some(query) => Ok(CountSource::Query(query)),
                None => text
                    .trim()
                    .parse()
                    .map(CountSource::Fixed)
                    .map_err(|_| format!("invalid count '{text}'")),
            },
        }
    }
}

impl ObjectsFixture {
    /// Parses fixture JSON.
    ///
    /// # Errors
    ///
    /// Returns an error when the JSON does not match the fixture shape.
    pub fn from_json(text: &str) -> Result<Self, String> {
        serde_json::from_str(text).map_err(|err| format!("invalid objects fixture: {err}"))
    }

    /// Reads and parses a fixture file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file is missing, too large, or malformed.
    pub fn load(path: &Path) -> Result<Self, String> {
        let metadata = std::fs::metadata(path)
            .map_err(|err| format!("unable to find {}: {err}", path.display()))?;
        if metadata.len() > MAX_FIXTURE_BYTES {
            return Err(format!("{} exceeds {MAX_FIXTURE_BYTES} bytes", path.display()));
        }
        let text = std::fs::read_to_string(path)
            .map_err(|err| format!("unable to read {}: {err}", path.display()))?;
        Self::from_json(&text).map_err(|err| format!("{}: {err}", path.display()))
    }
}

// ============================================================================
// SECTION: Value Pool
// ============================================================================

/// Expected values per property, each consumed at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValuePool {
    /// Values not yet matched, per property.
    remaining: BTreeMap<String, Vec<String>>,
}

impl ValuePool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the expected values of a property, replacing earlier ones.
    pub fn insert(&mut self, key: &str, values: Vec<String>) {
        self.remaining.insert(key.to_string(), values);
    }

    /// Returns the properties with expectations.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.remaining.keys().map(String::as_str)
    }

    /// Returns the values of `key` not yet consumed.
    #[must_use]
    pub fn remaining(&self, key: &str) -> &[String] {
        self.remaining.get(key).map_or(&[], Vec::as_slice)
    }

    /// Consumes one occurrence of `value` for `key`.
    ///
    /// # Errors
    ///
    /// Returns an error naming the still expected values when `value` is not
    /// among them.
    pub fn consume(&mut self, key: &str, value: &str) -> Result<(), String> {
        let values = self.remaining.entry(key.to_string()).or_default();
        match values.iter().position(|candidate| candidate == value) {
            Some(index) => {
                values.remove(index);
                Ok(())
            }
            None => Err(format!(
                "{key} has value '{value}', expected one of [{}]",
                values.join(", ")
            )),
        }
    }
}
