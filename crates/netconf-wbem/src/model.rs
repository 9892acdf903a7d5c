// crates/netconf-wbem/src/model.rs
// ============================================================================
// Module: CIM Data Model
// Description: Typed CIM values, instance names, instances, method results.
// Purpose: Give suites a typed, case-insensitive view of CIM objects.
// Dependencies: std
// ============================================================================

//! ## Overview
//! CIM names (classes, properties, keys, parameters) compare
//! case-insensitively while preserving the case they were created with.
//! Instance names compare by class and key values; the host is ignored and the
//! namespace only matters when both sides carry one.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use crate::datetime::CimDateTime;
use crate::error::WbemError;

// ============================================================================
// SECTION: Types
// ============================================================================

/// CIM data types as named in CIM-XML `TYPE` / `PARAMTYPE` attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CimType {
    /// `boolean`
    Boolean,
    /// `uint8`
    Uint8,
    /// `sint8`
    Sint8,
    /// `uint16`
    Uint16,
    /// `sint16`
    Sint16,
    /// `uint32`
    Uint32,
    /// `sint32`
    Sint32,
    /// `uint64`
    Uint64,
    /// `sint64`
    Sint64,
    /// `real32`
    Real32,
    /// `real64`
    Real64,
    /// `char16`
    Char16,
    /// `string`
    String,
    /// `datetime`
    DateTime,
    /// `reference`
    Reference,
    /// Embedded instance, carried as an escaped `string` on the wire.
    Instance,
}

impl CimType {
    /// Returns the CIM-XML type name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Uint8 => "uint8",
            Self::Sint8 => "sint8",
            Self::Uint16 => "uint16",
            Self::Sint16 => "sint16",
            Self::Uint32 => "uint32",
            Self::Sint32 => "sint32",
            Self::Uint64 => "uint64",
            Self::Sint64 => "sint64",
            Self::Real32 => "real32",
            Self::Real64 => "real64",
            Self::Char16 => "char16",
            Self::String | Self::Instance => "string",
            Self::DateTime => "datetime",
            Self::Reference => "reference",
        }
    }

    /// Parses a CIM-XML type name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let parsed = match name.to_ascii_lowercase().as_str() {
            "boolean" => Self::Boolean,
            "uint8" => Self::Uint8,
            "sint8" => Self::Sint8,
            "uint16" => Self::Uint16,
            "sint16" => Self::Sint16,
            "uint32" => Self::Uint32,
            "sint32" => Self::Sint32,
            "uint64" => Self::Uint64,
            "sint64" => Self::Sint64,
            "real32" => Self::Real32,
            "real64" => Self::Real64,
            "char16" => Self::Char16,
            "string" => Self::String,
            "datetime" => Self::DateTime,
            "reference" => Self::Reference,
            _ => return None,
        };
        Some(parsed)
    }
}

/// A CIM value.
#[derive(Debug, Clone, PartialEq)]
pub enum CimValue {
    /// `boolean`
    Bool(bool),
    /// `uint8`
    Uint8(u8),
    /// `sint8`
    Sint8(i8),
    /// `uint16`
    Uint16(u16),
    /// `sint16`
    Sint16(i16),
    /// `uint32`
    Uint32(u32),
    /// `sint32`
    Sint32(i32),
    /// `uint64`
    Uint64(u64),
    /// `sint64`
    Sint64(i64),
    /// `real32`
    Real32(f32),
    /// `real64`
    Real64(f64),
    /// `char16`
    Char16(char),
    /// `string`
    String(String),
    /// `datetime`
    DateTime(CimDateTime),
    /// Reference to another instance.
    Reference(CimInstanceName),
    /// Embedded instance.
    Instance(Box<CimInstance>),
    /// Array of values sharing an element type.
    Array(CimType, Vec<CimValue>),
    /// Typed null.
    Null(CimType),
}

impl CimValue {
    /// Returns the element type of this value.
    #[must_use]
    pub const fn cim_type(&self) -> CimType {
        match self {
            Self::Bool(_) => CimType::Boolean,
            Self::Uint8(_) => CimType::Uint8,
            Self::Sint8(_) => CimType::Sint8,
            Self::Uint16(_) => CimType::Uint16,
            Self::Sint16(_) => CimType::Sint16,
            Self::Uint32(_) => CimType::Uint32,
            Self::Sint32(_) => CimType::Sint32,
            Self::Uint64(_) => CimType::Uint64,
            Self::Sint64(_) => CimType::Sint64,
            Self::Real32(_) => CimType::Real32,
            Self::Real64(_) => CimType::Real64,
            Self::Char16(_) => CimType::Char16,
            Self::String(_) => CimType::String,
            Self::DateTime(_) => CimType::DateTime,
            Self::Reference(_) => CimType::Reference,
            Self::Instance(_) => CimType::Instance,
            Self::Array(kind, _) | Self::Null(kind) => *kind,
        }
    }

    /// Builds a `string[]` value.
    pub fn string_array<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Array(CimType::String, items.into_iter().map(|item| Self::String(item.into())).collect())
    }

    /// Builds a `uint8[]` value.
    pub fn u8_array<I: IntoIterator<Item = u8>>(items: I) -> Self {
        Self::Array(CimType::Uint8, items.into_iter().map(Self::Uint8).collect())
    }

    /// Builds a `uint16[]` value.
    pub fn u16_array<I: IntoIterator<Item = u16>>(items: I) -> Self {
        Self::Array(CimType::Uint16, items.into_iter().map(Self::Uint16).collect())
    }

    /// Returns true for typed nulls.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null(_))
    }

    /// Returns the string payload.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    /// Returns any integer value that fits in `u64`.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Uint8(value) => Some(u64::from(*value)),
            Self::Uint16(value) => Some(u64::from(*value)),
            Self::Uint32(value) => Some(u64::from(*value)),
            Self::Uint64(value) => Some(*value),
            Self::Sint8(value) => u64::try_from(*value).ok(),
            Self::Sint16(value) => u64::try_from(*value).ok(),
            Self::Sint32(value) => u64::try_from(*value).ok(),
            Self::Sint64(value) => u64::try_from(*value).ok(),
            _ => None,
        }
    }

    /// Returns any integer value that fits in `i64`.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Sint8(value) => Some(i64::from(*value)),
            Self::Sint16(value) => Some(i64::from(*value)),
            Self::Sint32(value) => Some(i64::from(*value)),
            Self::Sint64(value) => Some(*value),
            other => other.as_u64().and_then(|value| i64::try_from(value).ok()),
        }
    }

    /// Returns the boolean payload.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the datetime payload.
    #[must_use]
    pub const fn as_datetime(&self) -> Option<&CimDateTime> {
        match self {
            Self::DateTime(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the reference payload.
    #[must_use]
    pub const fn as_reference(&self) -> Option<&CimInstanceName> {
        match self {
            Self::Reference(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the embedded instance payload.
    #[must_use]
    pub fn as_instance(&self) -> Option<&CimInstance> {
        match self {
            Self::Instance(value) => Some(value),
            _ => None,
        }
    }

    /// Returns array elements.
    #[must_use]
    pub fn as_array(&self) -> Option<&[Self]> {
        match self {
            Self::Array(_, items) => Some(items),
            _ => None,
        }
    }

    /// Returns the CIM-XML text form of a scalar value.
    ///
    /// Arrays, references, embedded instances, and nulls have no scalar text.
    #[must_use]
    pub fn to_wire_string(&self) -> Option<String> {
        let text = match self {
            Self::Bool(value) => if *value { "TRUE" } else { "FALSE" }.to_string(),
            Self::Uint8(value) => value.to_string(),
            Self::Sint8(value) => value.to_string(),
            Self::Uint16(value) => value.to_string(),
            Self::Sint16(value) => value.to_string(),
            Self::Uint32(value) => value.to_string(),
            Self::Sint32(value) => value.to_string(),
            Self::Uint64(value) => value.to_string(),
            Self::Sint64(value) => value.to_string(),
            Self::Real32(value) => value.to_string(),
            Self::Real64(value) => value.to_string(),
            Self::Char16(value) => value.to_string(),
            Self::String(value) => value.clone(),
            Self::DateTime(value) => value.to_string(),
            Self::Reference(_) | Self::Instance(_) | Self::Array(..) | Self::Null(_) => {
                return None;
            }
        };
        Some(text)
    }

    /// Parses scalar text received for the given type.
    ///
    /// # Errors
    ///
    /// Returns [`WbemError::Protocol`] when the text does not fit the type.
    pub fn parse_scalar(kind: CimType, text: &str) -> Result<Self, WbemError> {
        let bad = || WbemError::Protocol(format!("invalid {} value: \"{text}\"", kind.as_str()));
        let trimmed = text.trim();
        let value = match kind {
            CimType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "true" => Self::Bool(true),
                "false" => Self::Bool(false),
                _ => return Err(bad()),
            },
            CimType::Uint8 => Self::Uint8(trimmed.parse().map_err(|_| bad())?),
            CimType::Sint8 => Self::Sint8(trimmed.parse().map_err(|_| bad())?),
            CimType::Uint16 => Self::Uint16(trimmed.parse().map_err(|_| bad())?),
            CimType::Sint16 => Self::Sint16(trimmed.parse().map_err(|_| bad())?),
            CimType::Uint32 => Self::Uint32(trimmed.parse().map_err(|_| bad())?),
            CimType::Sint32 => Self::Sint32(trimmed.parse().map_err(|_| bad())?),
            CimType::Uint64 => Self::Uint64(trimmed.parse().map_err(|_| bad())?),
            CimType::Sint64 => Self::Sint64(trimmed.parse().map_err(|_| bad())?),
            CimType::Real32 => Self::Real32(trimmed.parse().map_err(|_| bad())?),
            CimType::Real64 => Self::Real64(trimmed.parse().map_err(|_| bad())?),
            CimType::Char16 => Self::Char16(text.chars().next().ok_or_else(bad)?),
            CimType::String | CimType::Instance => Self::String(text.to_string()),
            CimType::DateTime => Self::DateTime(CimDateTime::parse(trimmed)?),
            CimType::Reference => return Err(bad()),
        };
        Ok(value)
    }

    /// Compares two values the way key bindings compare.
    ///
    /// Integers compare numerically across widths; strings compare exactly.
    #[must_use]
    pub fn key_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Reference(left), Self::Reference(right)) => left == right,
            _ => match (self.as_i64(), other.as_i64()) {
                (Some(left), Some(right)) => left == right,
                _ => match (self.as_u64(), other.as_u64()) {
                    (Some(left), Some(right)) => left == right,
                    _ => self.to_wire_string() == other.to_wire_string() && !self.is_null(),
                },
            },
        }
    }
}

impl fmt::Display for CimValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reference(path) => write!(f, "{path}"),
            Self::Instance(instance) => write!(f, "instance of {}", instance.classname),
            Self::Array(_, items) => {
                f.write_str("[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Null(_) => f.write_str("NULL"),
            Self::String(value) => write!(f, "\"{value}\""),
            scalar => f.write_str(&scalar.to_wire_string().unwrap_or_default()),
        }
    }
}

impl From<&str> for CimValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for CimValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for CimValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<u8> for CimValue {
    fn from(value: u8) -> Self {
        Self::Uint8(value)
    }
}

impl From<u16> for CimValue {
    fn from(value: u16) -> Self {
        Self::Uint16(value)
    }
}

impl From<u32> for CimValue {
    fn from(value: u32) -> Self {
        Self::Uint32(value)
    }
}

impl From<u64> for CimValue {
    fn from(value: u64) -> Self {
        Self::Uint64(value)
    }
}

impl From<CimDateTime> for CimValue {
    fn from(value: CimDateTime) -> Self {
        Self::DateTime(value)
    }
}

impl From<CimInstanceName> for CimValue {
    fn from(value: CimInstanceName) -> Self {
        Self::Reference(value)
    }
}

impl From<CimInstance> for CimValue {
    fn from(value: CimInstance) -> Self {
        Self::Instance(Box::new(value))
    }
}

// ============================================================================
// SECTION: Instance Names
// ============================================================================

/// Object path of a CIM instance.
#[derive(Debug, Clone, Default)]
pub struct CimInstanceName {
    /// Class name.
    pub classname: String,
    /// Namespace, when known.
    pub namespace: Option<String>,
    /// Host, when the path was received with one.
    pub host: Option<String>,
    /// Ordered key bindings.
    pub keybindings: Vec<(String, CimValue)>,
}

impl CimInstanceName {
    /// Creates a path without keys.
    #[must_use]
    pub fn new(classname: impl Into<String>) -> Self {
        Self {
            classname: classname.into(),
            ..Self::default()
        }
    }

    /// Sets the namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Adds or replaces a key binding.
    #[must_use]
    pub fn with_key(mut self, name: &str, value: impl Into<CimValue>) -> Self {
        self.set_key(name, value);
        self
    }

    /// Adds or replaces a key binding in place.
    pub fn set_key(&mut self, name: &str, value: impl Into<CimValue>) {
        let value = value.into();
        if let Some(slot) =
            self.keybindings.iter_mut().find(|(key, _)| key.eq_ignore_ascii_case(name))
        {
            slot.1 = value;
        } else {
            self.keybindings.push((name.to_string(), value));
        }
    }

    /// Returns a key value by case-insensitive name.
    #[must_use]
    pub fn key(&self, name: &str) -> Option<&CimValue> {
        self.keybindings.iter().find(|(key, _)| key.eq_ignore_ascii_case(name)).map(|(_, v)| v)
    }

    /// Returns a string key value.
    #[must_use]
    pub fn key_str(&self, name: &str) -> Option<&str> {
        self.key(name).and_then(CimValue::as_str)
    }

    /// Returns true when the class name matches case-insensitively.
    #[must_use]
    pub fn is_class(&self, classname: &str) -> bool {
        self.classname.eq_ignore_ascii_case(classname)
    }
}

impl PartialEq for CimInstanceName {
    fn eq(&self, other: &Self) -> bool {
        if !self.classname.eq_ignore_ascii_case(&other.classname) {
            return false;
        }
        if let (Some(left), Some(right)) = (&self.namespace, &other.namespace)
            && left.trim_matches('/') != right.trim_matches('/')
        {
            return false;
        }
        self.keybindings.len() == other.keybindings.len()
            && self
                .keybindings
                .iter()
                .all(|(name, value)| other.key(name).is_some_and(|theirs| value.key_eq(theirs)))
    }
}

impl fmt::Display for CimInstanceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(namespace) = &self.namespace {
            write!(f, "{namespace}:")?;
        }
        f.write_str(&self.classname)?;
        for (index, (name, value)) in self.keybindings.iter().enumerate() {
            f.write_str(if index == 0 { "." } else { "," })?;
            match value {
                CimValue::String(text) => {
                    write!(f, "{name}=\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))?;
                }
                CimValue::Reference(path) => {
                    let nested = path.to_string().replace('\\', "\\\\").replace('"', "\\\"");
                    write!(f, "{name}=\"{nested}\"")?;
                }
                other => write!(f, "{name}={other}")?,
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Instances
// ============================================================================

/// A named property value.
#[derive(Debug, Clone, PartialEq)]
pub struct CimProperty {
    /// Property name, case preserved.
    pub name: String,
    /// Property value.
    pub value: CimValue,
}

/// A CIM instance.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CimInstance {
    /// Class name.
    pub classname: String,
    /// Object path, when the instance was received with one.
    pub path: Option<CimInstanceName>,
    properties: Vec<CimProperty>,
}

impl CimInstance {
    /// Creates an empty instance.
    #[must_use]
    pub fn new(classname: impl Into<String>) -> Self {
        Self {
            classname: classname.into(),
            path: None,
            properties: Vec::new(),
        }
    }

    /// Sets a property and returns the instance.
    #[must_use]
    pub fn with(mut self, name: &str, value: impl Into<CimValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Sets the object path and returns the instance.
    #[must_use]
    pub fn with_path(mut self, path: CimInstanceName) -> Self {
        self.path = Some(path);
        self
    }

    /// Adds or replaces a property.
    pub fn set(&mut self, name: &str, value: impl Into<CimValue>) {
        let value = value.into();
        if let Some(slot) =
            self.properties.iter_mut().find(|prop| prop.name.eq_ignore_ascii_case(name))
        {
            slot.value = value;
        } else {
            self.properties.push(CimProperty {
                name: name.to_string(),
                value,
            });
        }
    }

    /// Removes a property, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<CimValue> {
        let index = self.properties.iter().position(|prop| prop.name.eq_ignore_ascii_case(name))?;
        Some(self.properties.remove(index).value)
    }

    /// Returns all properties in received order.
    #[must_use]
    pub fn properties(&self) -> &[CimProperty] {
        &self.properties
    }

    /// Returns true when the property exists (including null).
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Returns a property value by case-insensitive name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CimValue> {
        self.properties
            .iter()
            .find(|prop| prop.name.eq_ignore_ascii_case(name))
            .map(|prop| &prop.value)
    }

    /// Returns a string property.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(CimValue::as_str)
    }

    /// Returns an integer property.
    #[must_use]
    pub fn get_u64(&self, name: &str) -> Option<u64> {
        self.get(name).and_then(CimValue::as_u64)
    }

    /// Returns a boolean property.
    #[must_use]
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(CimValue::as_bool)
    }

    /// Returns a reference property.
    #[must_use]
    pub fn get_ref(&self, name: &str) -> Option<&CimInstanceName> {
        self.get(name).and_then(CimValue::as_reference)
    }

    /// Returns an embedded instance property.
    #[must_use]
    pub fn get_instance(&self, name: &str) -> Option<&CimInstance> {
        self.get(name).and_then(CimValue::as_instance)
    }

    /// Returns a string array property; nulls read as empty.
    #[must_use]
    pub fn get_str_array(&self, name: &str) -> Option<Vec<&str>> {
        match self.get(name)? {
            CimValue::Array(_, items) => Some(items.iter().filter_map(CimValue::as_str).collect()),
            CimValue::Null(_) => Some(Vec::new()),
            _ => None,
        }
    }

    /// Returns an integer array property; nulls read as empty.
    #[must_use]
    pub fn get_u64_array(&self, name: &str) -> Option<Vec<u64>> {
        match self.get(name)? {
            CimValue::Array(_, items) => Some(items.iter().filter_map(CimValue::as_u64).collect()),
            CimValue::Null(_) => Some(Vec::new()),
            _ => None,
        }
    }

    /// Returns the object path or a protocol error.
    ///
    /// # Errors
    ///
    /// Returns [`WbemError::Protocol`] when the instance carries no path.
    pub fn require_path(&self) -> Result<&CimInstanceName, WbemError> {
        self.path
            .as_ref()
            .ok_or_else(|| WbemError::Protocol(format!("{} instance has no path", self.classname)))
    }

    /// Returns true when the class name matches case-insensitively.
    #[must_use]
    pub fn is_class(&self, classname: &str) -> bool {
        self.classname.eq_ignore_ascii_case(classname)
    }
}

// ============================================================================
// SECTION: Method Results
// ============================================================================

/// Result of an extrinsic method call.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodResult {
    /// Method return value.
    pub return_value: CimValue,
    /// Output parameters in received order.
    pub out_params: Vec<(String, CimValue)>,
}

impl MethodResult {
    /// Returns the integer return code.
    #[must_use]
    pub fn return_code(&self) -> Option<u64> {
        self.return_value.as_u64()
    }

    /// Returns an output parameter by case-insensitive name.
    #[must_use]
    pub fn out(&self, name: &str) -> Option<&CimValue> {
        self.out_params.iter().find(|(key, _)| key.eq_ignore_ascii_case(name)).map(|(_, v)| v)
    }

    /// Returns a reference output parameter.
    #[must_use]
    pub fn out_ref(&self, name: &str) -> Option<&CimInstanceName> {
        self.out(name).and_then(CimValue::as_reference)
    }

    /// Returns embedded instances from an output parameter.
    #[must_use]
    pub fn out_instances(&self, name: &str) -> Vec<&CimInstance> {
        match self.out(name) {
            Some(CimValue::Instance(instance)) => vec![instance.as_ref()],
            Some(CimValue::Array(_, items)) => items.iter().filter_map(CimValue::as_instance).collect(),
            _ => Vec::new(),
        }
    }
}
