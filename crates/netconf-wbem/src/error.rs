// crates/netconf-wbem/src/error.rs
// ============================================================================
// Module: WBEM Errors
// Description: Error and status types for CIM-XML operations.
// Purpose: Separate CIM status failures from transport and protocol faults.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Every fallible operation in this crate returns [`WbemError`]. CIM level
//! failures keep the numeric status code reported by the CIMOM so suites can
//! assert on the exact code a provider returned.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// SECTION: Status Codes
// ============================================================================

/// CIM status codes defined by DSP0200.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CimStatus {
    /// `CIM_ERR_FAILED`
    Failed,
    /// `CIM_ERR_ACCESS_DENIED`
    AccessDenied,
    /// `CIM_ERR_INVALID_NAMESPACE`
    InvalidNamespace,
    /// `CIM_ERR_INVALID_PARAMETER`
    InvalidParameter,
    /// `CIM_ERR_INVALID_CLASS`
    InvalidClass,
    /// `CIM_ERR_NOT_FOUND`
    NotFound,
    /// `CIM_ERR_NOT_SUPPORTED`
    NotSupported,
    /// `CIM_ERR_CLASS_HAS_CHILDREN`
    ClassHasChildren,
    /// `CIM_ERR_CLASS_HAS_INSTANCES`
    ClassHasInstances,
    /// `CIM_ERR_INVALID_SUPERCLASS`
    InvalidSuperclass,
    /// `CIM_ERR_ALREADY_EXISTS`
    AlreadyExists,
    /// `CIM_ERR_NO_SUCH_PROPERTY`
    NoSuchProperty,
    /// `CIM_ERR_TYPE_MISMATCH`
    TypeMismatch,
    /// `CIM_ERR_QUERY_LANGUAGE_NOT_SUPPORTED`
    QueryLanguageNotSupported,
    /// `CIM_ERR_INVALID_QUERY`
    InvalidQuery,
    /// `CIM_ERR_METHOD_NOT_AVAILABLE`
    MethodNotAvailable,
    /// `CIM_ERR_METHOD_NOT_FOUND`
    MethodNotFound,
}

impl CimStatus {
    /// Maps a numeric status code to a known status.
    #[must_use]
    pub const fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            1 => Self::Failed,
            2 => Self::AccessDenied,
            3 => Self::InvalidNamespace,
            4 => Self::InvalidParameter,
            5 => Self::InvalidClass,
            6 => Self::NotFound,
            7 => Self::NotSupported,
            8 => Self::ClassHasChildren,
            9 => Self::ClassHasInstances,
            10 => Self::InvalidSuperclass,
            11 => Self::AlreadyExists,
            12 => Self::NoSuchProperty,
            13 => Self::TypeMismatch,
            14 => Self::QueryLanguageNotSupported,
            15 => Self::InvalidQuery,
            16 => Self::MethodNotAvailable,
            17 => Self::MethodNotFound,
            _ => return None,
        })
    }

    /// Returns the numeric status code.
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::Failed => 1,
            Self::AccessDenied => 2,
            Self::InvalidNamespace => 3,
            Self::InvalidParameter => 4,
            Self::InvalidClass => 5,
            Self::NotFound => 6,
            Self::NotSupported => 7,
            Self::ClassHasChildren => 8,
            Self::ClassHasInstances => 9,
            Self::InvalidSuperclass => 10,
            Self::AlreadyExists => 11,
            Self::NoSuchProperty => 12,
            Self::TypeMismatch => 13,
            Self::QueryLanguageNotSupported => 14,
            Self::InvalidQuery => 15,
            Self::MethodNotAvailable => 16,
            Self::MethodNotFound => 17,
        }
    }

    /// Returns the DSP0200 symbolic name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Failed => "CIM_ERR_FAILED",
            Self::AccessDenied => "CIM_ERR_ACCESS_DENIED",
            Self::InvalidNamespace => "CIM_ERR_INVALID_NAMESPACE",
            Self::InvalidParameter => "CIM_ERR_INVALID_PARAMETER",
            Self::InvalidClass => "CIM_ERR_INVALID_CLASS",
            Self::NotFound => "CIM_ERR_NOT_FOUND",
            Self::NotSupported => "CIM_ERR_NOT_SUPPORTED",
            Self::ClassHasChildren => "CIM_ERR_CLASS_HAS_CHILDREN",
            Self::ClassHasInstances => "CIM_ERR_CLASS_HAS_INSTANCES",
            Self::InvalidSuperclass => "CIM_ERR_INVALID_SUPERCLASS",
            Self::AlreadyExists => "CIM_ERR_ALREADY_EXISTS",
            Self::NoSuchProperty => "CIM_ERR_NO_SUCH_PROPERTY",
            Self::TypeMismatch => "CIM_ERR_TYPE_MISMATCH",
            Self::QueryLanguageNotSupported => "CIM_ERR_QUERY_LANGUAGE_NOT_SUPPORTED",
            Self::InvalidQuery => "CIM_ERR_INVALID_QUERY",
            Self::MethodNotAvailable => "CIM_ERR_METHOD_NOT_AVAILABLE",
            Self::MethodNotFound => "CIM_ERR_METHOD_NOT_FOUND",
        }
    }
}

/// Returns the symbolic name for a raw code, or `UNKNOWN`.
fn status_name(code: u32) -> &'static str {
    CimStatus::from_code(code).map_or("UNKNOWN", CimStatus::as_str)
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// WBEM client, codec, and listener errors.
///
/// # Invariants
/// - [`WbemError::Cim`] is only produced from an `<ERROR>` element.
/// - String payloads may contain untrusted CIMOM text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WbemError {
    /// The CIMOM answered with a CIM status error.
    #[error("cim error {code} ({}): {description}", status_name(*.code))]
    Cim {
        /// Numeric CIM status code.
        code: u32,
        /// Description text reported by the CIMOM.
        description: String,
    },
    /// Non-success HTTP status or a `CIMError` header.
    #[error("http error: {0}")]
    Http(String),
    /// Connection or I/O failure.
    #[error("transport error: {0}")]
    Transport(String),
    /// Malformed or unexpected CIM-XML.
    #[error("cim-xml protocol error: {0}")]
    Protocol(String),
    /// A wait elapsed without a result.
    #[error("{0}")]
    Timeout(String),
    /// Unsupported or malformed connection target.
    #[error("invalid target: {0}")]
    Target(String),
    /// Indication listener failure.
    #[error("listener error: {0}")]
    Listener(String),
}

impl WbemError {
    /// Returns the CIM status when this is a CIM level error.
    #[must_use]
    pub const fn cim_status(&self) -> Option<CimStatus> {
        match self {
            Self::Cim {
                code, ..
            } => CimStatus::from_code(*code),
            _ => None,
        }
    }
}
