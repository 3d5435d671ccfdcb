//! Decoded record type shared by both format versions.

use std::fmt;

use super::Result;
use super::sid::SourceId;
use super::time::NanoTime;
use super::types::{ByteOrder, EncodingFormat, FormatVersion};

/// A decoded miniSEED record (v2 or v3).
///
/// v2 records get `source_id` synthesized from their SEED codes; v3
/// records get their SEED codes split out of the source identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct MseedRecord {
    pub format_version: FormatVersion,

    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
    pub source_id: SourceId,

    /// Start of the first sample, with any header time correction applied.
    pub start_time: NanoTime,
    /// Samples per second. Zero for records without a time series.
    pub sample_rate: f64,
    pub encoding: EncodingFormat,
    pub samples: Samples,

    // v2 only
    pub sequence_number: String,
    pub quality: char,
    pub byte_order: ByteOrder,
    pub record_length: u32,

    // v3 only
    pub flags: u8,
    pub publication_version: u8,
    pub extra_headers: String,
    pub crc: u32,
}

impl MseedRecord {
    /// Empty v2 record: big-endian, 512 bytes, INT32.
    pub fn new() -> Self {
        Self {
            format_version: FormatVersion::V2,
            network: String::new(),
            station: String::new(),
            location: String::new(),
            channel: String::new(),
            source_id: SourceId::from_nslc("", "", "", ""),
            start_time: NanoTime::epoch(),
            sample_rate: 1.0,
            encoding: EncodingFormat::Int32,
            samples: Samples::Int(Vec::new()),
            sequence_number: "000001".into(),
            quality: 'D',
            byte_order: ByteOrder::Big,
            record_length: 512,
            flags: 0,
            publication_version: 1,
            extra_headers: String::new(),
            crc: 0,
        }
    }

    /// Empty v3 record. Its length is fixed when it is encoded.
    pub fn new_v3() -> Self {
        Self {
            format_version: FormatVersion::V3,
            byte_order: ByteOrder::Little,
            record_length: 0,
            sequence_number: "000000".into(),
            ..Self::new()
        }
    }

    /// Set the SEED codes and the matching source identifier.
    pub fn with_nslc(mut self, network: &str, station: &str, location: &str, channel: &str) -> Self {
        self.network = network.into();
        self.station = station.into();
        self.location = location.into();
        self.channel = channel.into();
        self.source_id = SourceId::from_nslc(network, station, location, channel);
        self
    }

    pub fn with_start_time(mut self, time: NanoTime) -> Self {
        self.start_time = time;
        self
    }

    pub fn with_sample_rate(mut self, rate: f64) -> Self {
        self.sample_rate = rate;
        self
    }

    /// Set the samples; the encoding follows the sample type.
    pub fn with_samples(mut self, samples: Samples) -> Self {
        self.encoding = samples.natural_encoding();
        self.samples = samples;
        self
    }

    pub fn with_record_length(mut self, len: u32) -> Self {
        self.record_length = len;
        self
    }

    /// Start time in microseconds since the UTC epoch.
    pub fn start_micros(&self) -> Result<i64> {
        self.start_time.to_epoch_micros()
    }

    /// `NET.STA.LOC.CHA`
    pub fn nslc(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            self.network, self.station, self.location, self.channel
        )
    }
}

impl Default for MseedRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MseedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} | {} Hz | {} samples ({}) [{}]",
            self.nslc(),
            self.start_time,
            self.sample_rate,
            self.samples.len(),
            self.encoding,
            self.format_version,
        )
    }
}

/// Decoded payload.
///
/// Steim and 16-bit payloads widen to `Int`. `Text` holds the raw bytes of
/// log channels, which carry no time series.
#[derive(Debug, Clone, PartialEq)]
pub enum Samples {
    Int(Vec<i32>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Text(Vec<u8>),
}

impl Samples {
    pub fn len(&self) -> usize {
        match self {
            Samples::Int(v) => v.len(),
            Samples::Float(v) => v.len(),
            Samples::Double(v) => v.len(),
            Samples::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Uncompressed encoding that stores these samples without loss.
    pub fn natural_encoding(&self) -> EncodingFormat {
        match self {
            Samples::Int(_) => EncodingFormat::Int32,
            Samples::Float(_) => EncodingFormat::Float32,
            Samples::Double(_) => EncodingFormat::Float64,
            Samples::Text(_) => EncodingFormat::Text,
        }
    }
}
