// crates/netconf-wbem/src/datetime.rs
// ============================================================================
// Module: CIM Datetime
// Description: CIM datetime values (timestamps and intervals).
// Purpose: Parse and format the fixed 25 character CIM datetime form.
// Dependencies: time
// ============================================================================

//! ## Overview
//! CIM encodes both points in time and intervals as 25 character strings.
//! Intervals read `ddddddddhhmmss.mmmmmm:000`; timestamps read
//! `yyyymmddhhmmss.mmmmmm+UUU` where `UUU` is the UTC offset in minutes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use time::Date;
use time::Month;
use time::OffsetDateTime;
use time::PrimitiveDateTime;
use time::Time;
use time::UtcOffset;

use crate::error::WbemError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Length of every CIM datetime string.
const CIM_DATETIME_LEN: usize = 25;
/// Seconds per day.
const SECS_PER_DAY: u64 = 86_400;
/// Largest day count an interval can carry.
const MAX_INTERVAL_DAYS: u64 = 99_999_999;

// ============================================================================
// SECTION: Types
// ============================================================================

/// A CIM datetime value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CimDateTime {
    /// Elapsed time with microsecond precision.
    Interval(Duration),
    /// Point in time with a UTC offset.
    Timestamp(OffsetDateTime),
}

impl CimDateTime {
    /// Parses the 25 character CIM datetime form.
    ///
    /// # Errors
    ///
    /// Returns [`WbemError::Protocol`] for malformed input.
    pub fn parse(raw: &str) -> Result<Self, WbemError> {
        let bytes = raw.as_bytes();
        if bytes.len() != CIM_DATETIME_LEN || bytes[14] != b'.' {
            return Err(invalid(raw));
        }
        match bytes[21] {
            b':' => parse_interval(raw),
            b'+' | b'-' => parse_timestamp(raw),
            _ => Err(invalid(raw)),
        }
    }

    /// Builds an interval value.
    #[must_use]
    pub const fn interval(duration: Duration) -> Self {
        Self::Interval(duration)
    }

    /// Returns true for interval values.
    #[must_use]
    pub const fn is_interval(&self) -> bool {
        matches!(self, Self::Interval(_))
    }

    /// Returns the elapsed time of an interval value.
    #[must_use]
    pub const fn as_interval(&self) -> Option<Duration> {
        match self {
            Self::Interval(duration) => Some(*duration),
            Self::Timestamp(_) => None,
        }
    }

    /// Returns the point in time of a timestamp value.
    #[must_use]
    pub const fn as_timestamp(&self) -> Option<OffsetDateTime> {
        match self {
            Self::Timestamp(value) => Some(*value),
            Self::Interval(_) => None,
        }
    }
}

impl fmt::Display for CimDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interval(duration) => {
                let total = duration.as_secs();
                let days = (total / SECS_PER_DAY).min(MAX_INTERVAL_DAYS);
                let rest = total % SECS_PER_DAY;
                write!(
                    f,
                    "{days:08}{:02}{:02}{:02}.{:06}:000",
                    rest / 3600,
                    (rest % 3600) / 60,
                    rest % 60,
                    duration.subsec_micros()
                )
            }
            Self::Timestamp(value) => {
                let offset = value.offset().whole_minutes();
                let sign = if offset < 0 { '-' } else { '+' };
                write!(
                    f,
                    "{:04}{:02}{:02}{:02}{:02}{:02}.{:06}{sign}{:03}",
                    value.year(),
                    u8::from(value.month()),
                    value.day(),
                    value.hour(),
                    value.minute(),
                    value.second(),
                    value.microsecond(),
                    offset.unsigned_abs()
                )
            }
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds the protocol error for a malformed datetime.
fn invalid(raw: &str) -> WbemError {
    WbemError::Protocol(format!("invalid cim datetime: \"{raw}\""))
}

/// Parses an ASCII decimal field.
fn field(raw: &str, start: usize, end: usize) -> Result<u64, WbemError> {
    let slice = raw.get(start .. end).ok_or_else(|| invalid(raw))?;
    if !slice.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(invalid(raw));
    }
    slice.parse().map_err(|_| invalid(raw))
}

/// Narrows a parsed field into a smaller integer.
fn narrow<T: TryFrom<u64>>(raw: &str, value: u64) -> Result<T, WbemError> {
    T::try_from(value).map_err(|_| invalid(raw))
}

/// Parses `ddddddddhhmmss.mmmmmm:000`.
fn parse_interval(raw: &str) -> Result<CimDateTime, WbemError> {
    let days = field(raw, 0, 8)?;
    let hours = field(raw, 8, 10)?;
    let minutes = field(raw, 10, 12)?;
    let seconds = field(raw, 12, 14)?;
    let micros = field(raw, 15, 21)?;
    if hours > 23 || minutes > 59 || seconds > 59 || raw.get(22 ..) != Some("000") {
        return Err(invalid(raw));
    }
    let secs = days * SECS_PER_DAY + hours * 3600 + minutes * 60 + seconds;
    let nanos: u32 = narrow(raw, micros * 1000)?;
    Ok(CimDateTime::Interval(Duration::new(secs, nanos)))
}

/// Parses `yyyymmddhhmmss.mmmmmm+UUU`.
fn parse_timestamp(raw: &str) -> Result<CimDateTime, WbemError> {
    let year: i32 = narrow(raw, field(raw, 0, 4)?)?;
    let month: u8 = narrow(raw, field(raw, 4, 6)?)?;
    let day: u8 = narrow(raw, field(raw, 6, 8)?)?;
    let hour: u8 = narrow(raw, field(raw, 8, 10)?)?;
    let minute: u8 = narrow(raw, field(raw, 10, 12)?)?;
    let second: u8 = narrow(raw, field(raw, 12, 14)?)?;
    let micro: u32 = narrow(raw, field(raw, 15, 21)?)?;
    let offset_minutes: i32 = narrow(raw, field(raw, 22, 25)?)?;
    let signed = if raw.as_bytes()[21] == b'-' { -offset_minutes } else { offset_minutes };

    let month = Month::try_from(month).map_err(|_| invalid(raw))?;
    let date = Date::from_calendar_date(year, month, day).map_err(|_| invalid(raw))?;
    let clock = Time::from_hms_micro(hour, minute, second, micro).map_err(|_| invalid(raw))?;
    let offset = UtcOffset::from_whole_seconds(signed * 60).map_err(|_| invalid(raw))?;
    Ok(CimDateTime::Timestamp(PrimitiveDateTime::new(date, clock).assume_offset(offset)))
}
