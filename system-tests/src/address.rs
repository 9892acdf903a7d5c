// system-tests/src/address.rs
// ============================================================================
// Module: Address Conversions
// Description: Bus-side address encodings to the text form used over CIM.
// Purpose: Compare network manager settings with CIM property values.
// Dependencies: std
// ============================================================================

//! ## Overview
//! The network manager bus API carries IPv4 addresses as `u32` in network
//! byte order read as a little-endian integer, IPv6 addresses as 16 raw
//! bytes, and MAC addresses as 6 raw bytes. The provider exposes all of them
//! as strings. IPv6 text is the uncompressed lowercase form
//! (`2001:0db8:0000:...`), matching what the suites pass in.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Write;
use std::net::Ipv4Addr;
use std::net::Ipv6Addr;

// ============================================================================
// SECTION: Conversions
// ============================================================================

/// Formats a bus-encoded IPv4 address as dotted quad.
#[must_use]
pub fn int_to_ipv4(ip: u32) -> String {
    Ipv4Addr::from(ip.to_le_bytes()).to_string()
}

/// Formats bus-encoded IPv6 bytes as eight uncompressed hex groups.
///
/// Bytes are paired in order; a trailing odd byte forms a short group.
#[must_use]
pub fn bytes_to_ipv6(bytes: &[u8]) -> String {
    let mut text = String::with_capacity(bytes.len() * 3);
    for (index, pair) in bytes.chunks(2).enumerate() {
        if index > 0 {
            text.push(':');
        }
        for byte in pair {
            let _ = write!(text, "{byte:02x}");
        }
    }
    text
}

/// Formats MAC bytes as upper-case colon separated hex.
#[must_use]
pub fn bytes_to_mac(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02X}")).collect::<Vec<_>>().join(":")
}

/// Returns the dotted IPv4 netmask for a prefix length, clamped to 32.
#[must_use]
pub fn prefix_to_netmask(prefix: u8) -> String {
    let prefix = u32::from(prefix.min(32));
    let mask = u32::MAX.checked_shl(32 - prefix).unwrap_or(0);
    Ipv4Addr::from(mask).to_string()
}

/// Returns true for a parseable dotted IPv4 address.
#[must_use]
pub fn is_ipv4(text: &str) -> bool {
    text.parse::<Ipv4Addr>().is_ok()
}

/// Returns true for a parseable IPv6 address.
#[must_use]
pub fn is_ipv6(text: &str) -> bool {
    text.parse::<Ipv6Addr>().is_ok()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
