//! Record timestamps.
//!
//! [`NanoTime`] is the calendar form stored in both record versions
//! (year + day-of-year + time of day). [`BTime`] is the raw v2 header
//! layout with 0.0001 s fractions. Everything downstream of the decoder
//! works in integer microseconds since the UTC epoch; see
//! [`NanoTime::to_epoch_micros`].

use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Timelike};

use super::{MseedError, Result};

/// Nanosecond-precision timestamp (year + day-of-year + time).
///
/// For v2 the sub-second part is limited to 0.1 ms, or 1 µs once a
/// blockette 1001 offset has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NanoTime {
    pub year: u16,
    pub day: u16,        // 1-366
    pub hour: u8,        // 0-23
    pub minute: u8,      // 0-59
    pub second: u8,      // 0-60 (60 for leap second)
    pub nanosecond: u32, // 0-999_999_999
}

impl NanoTime {
    /// 1970-001 00:00:00.000000000.
    pub fn epoch() -> Self {
        Self {
            year: 1970,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
            nanosecond: 0,
        }
    }

    /// Converts the 0.0001-second fractional field to nanoseconds.
    pub fn from_btime(bt: &BTime) -> Self {
        Self {
            year: bt.year,
            day: bt.day,
            hour: bt.hour,
            minute: bt.minute,
            second: bt.second,
            nanosecond: bt.fract as u32 * 100_000,
        }
    }

    /// Nanosecond precision is truncated to 0.0001-second units.
    pub fn to_btime(self) -> BTime {
        BTime {
            year: self.year,
            day: self.day,
            hour: self.hour,
            minute: self.minute,
            second: self.second,
            fract: (self.nanosecond / 100_000) as u16,
        }
    }

    /// Microseconds since 1970-01-01T00:00:00Z, rounded to the nearest
    /// microsecond.
    ///
    /// A leap second (`second == 60`) lands on the first second of the
    /// following minute.
    pub fn to_epoch_micros(&self) -> Result<i64> {
        if self.hour > 23 || self.minute > 59 || self.second > 60 || self.nanosecond > 999_999_999
        {
            return Err(MseedError::InvalidTime(self.to_string()));
        }
        let midnight = NaiveDate::from_yo_opt(self.year as i32, self.day as u32)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .ok_or_else(|| MseedError::InvalidTime(self.to_string()))?
            .and_utc()
            .timestamp();
        let seconds = midnight
            + self.hour as i64 * 3600
            + self.minute as i64 * 60
            + self.second as i64;
        Ok(seconds * 1_000_000 + (self.nanosecond as i64 + 500) / 1000)
    }

    /// Calendar form of an epoch time given in microseconds.
    pub fn from_epoch_micros(micros: i64) -> Result<Self> {
        let utc = DateTime::from_timestamp_micros(micros)
            .ok_or_else(|| MseedError::InvalidTime(format!("{micros} us")))?;
        let year = u16::try_from(utc.year())
            .map_err(|_| MseedError::InvalidTime(format!("year {}", utc.year())))?;
        Ok(Self {
            year,
            day: utc.ordinal() as u16,
            hour: utc.hour() as u8,
            minute: utc.minute() as u8,
            second: utc.second() as u8,
            nanosecond: utc.nanosecond(),
        })
    }
}

impl Default for NanoTime {
    fn default() -> Self {
        Self::epoch()
    }
}

impl fmt::Display for NanoTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:03} {:02}:{:02}:{:02}.{:09}",
            self.year, self.day, self.hour, self.minute, self.second, self.nanosecond
        )
    }
}

impl From<BTime> for NanoTime {
    fn from(bt: BTime) -> Self {
        Self::from_btime(&bt)
    }
}

/// BTIME timestamp (10 bytes in the v2 fixed header).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BTime {
    pub year: u16,
    pub day: u16,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub fract: u16, // 0.0001 second units
}

impl fmt::Display for BTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:03} {:02}:{:02}:{:02}.{:04}",
            self.year, self.day, self.hour, self.minute, self.second, self.fract
        )
    }
}
