//! Channel identity plus a time window.

use crate::{Result, WaveError};

/// Strip whitespace and upper-case a SEED code.
pub(crate) fn normalize_code(code: &str) -> String {
    code.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

fn required_code(field: &str, code: &str) -> Result<String> {
    let code = normalize_code(code);
    if code.is_empty() {
        return Err(WaveError::InvalidArgument(format!("{field} is empty")));
    }
    Ok(code)
}

/// Seconds to microseconds, rounded to the nearest microsecond.
pub(crate) fn seconds_to_micros(seconds: f64) -> Result<i64> {
    let micros = (seconds * 1e6).round();
    if !micros.is_finite() || micros.abs() >= i64::MAX as f64 {
        return Err(WaveError::InvalidArgument(format!(
            "time {seconds} s is out of range"
        )));
    }
    Ok(micros as i64)
}

/// A request for one channel over `[start, end]`, times in microseconds
/// since the UTC epoch.
///
/// Requests compare and hash field by field, so identical requests in a
/// batch are fetched once.
///
/// ```
/// use waveserver::Request;
///
/// let request = Request::new("uu", "FORK", "hhz", 0, 10_000_000)
///     .unwrap()
///     .with_location_code("01")
///     .unwrap();
/// assert_eq!(request.network(), "UU");
/// assert_eq!(request.location_code(), Some("01"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Request {
    network: String,
    station: String,
    channel: String,
    location_code: Option<String>,
    start_time: i64,
    end_time: i64,
}

impl Request {
    pub fn new(
        network: &str,
        station: &str,
        channel: &str,
        start_time: i64,
        end_time: i64,
    ) -> Result<Self> {
        if start_time >= end_time {
            return Err(WaveError::InvalidArgument(format!(
                "start time {start_time} must be less than end time {end_time}"
            )));
        }
        if end_time.checked_sub(start_time).is_none() {
            return Err(WaveError::InvalidArgument(format!(
                "window {start_time}..{end_time} is too long"
            )));
        }
        Ok(Self {
            network: required_code("network", network)?,
            station: required_code("station", station)?,
            channel: required_code("channel", channel)?,
            location_code: None,
            start_time,
            end_time,
        })
    }

    /// Like [`Request::new`] with bounds in (fractional) seconds.
    pub fn from_seconds(
        network: &str,
        station: &str,
        channel: &str,
        start_time: f64,
        end_time: f64,
    ) -> Result<Self> {
        Self::new(
            network,
            station,
            channel,
            seconds_to_micros(start_time)?,
            seconds_to_micros(end_time)?,
        )
    }

    pub fn with_location_code(mut self, location_code: &str) -> Result<Self> {
        self.location_code = Some(required_code("location code", location_code)?);
        Ok(self)
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn station(&self) -> &str {
        &self.station
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn location_code(&self) -> Option<&str> {
        self.location_code.as_deref()
    }

    pub fn start_time(&self) -> i64 {
        self.start_time
    }

    pub fn end_time(&self) -> i64 {
        self.end_time
    }

    /// Window length in microseconds. Never overflows; [`Request::new`]
    /// rejects windows longer than `i64::MAX`.
    pub fn duration(&self) -> i64 {
        self.end_time - self.start_time
    }
}
