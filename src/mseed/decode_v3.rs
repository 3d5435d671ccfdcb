//! Decode miniSEED v3 records.
//!
//! A v3 record is a 40-byte little-endian fixed header, the source
//! identifier, optional JSON extra headers, then the payload. The CRC-32C
//! in the header is verified before anything else is trusted.

use super::crc;
use super::decode::decode_payload;
use super::record::MseedRecord;
use super::sid::SourceId;
use super::time::NanoTime;
use super::types::{ByteOrder, EncodingFormat, FormatVersion};
use super::{MseedError, Result};

pub(crate) const V3_HEADER_SIZE: usize = 40;

fn le_u16(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

fn le_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

fn check_header(data: &[u8]) -> Result<()> {
    if data.len() < V3_HEADER_SIZE {
        return Err(MseedError::RecordTooShort {
            expected: V3_HEADER_SIZE,
            actual: data.len(),
        });
    }
    if &data[0..3] != b"MS\x03" {
        return Err(MseedError::InvalidV3Header(
            "missing 'MS' magic or version != 3".into(),
        ));
    }
    Ok(())
}

/// Total record length from the fixed header.
pub(crate) fn peek_v3_record_length(data: &[u8]) -> Result<usize> {
    check_header(data)?;
    let sid_length = data[33] as usize;
    let extra_length = le_u16(data, 34) as usize;
    let data_length = le_u32(data, 36) as usize;
    Ok(V3_HEADER_SIZE + sid_length + extra_length + data_length)
}

/// Decode a single miniSEED v3 record from raw bytes.
pub fn decode_v3(data: &[u8]) -> Result<MseedRecord> {
    let total_length = peek_v3_record_length(data)?;
    if data.len() < total_length {
        return Err(MseedError::RecordTooShort {
            expected: total_length,
            actual: data.len(),
        });
    }
    let record = &data[..total_length];

    let (stored, computed) = crc::stored_and_computed(record)
        .ok_or_else(|| MseedError::InvalidV3Header("no CRC".into()))?;
    if stored != computed {
        return Err(MseedError::CrcMismatch { stored, computed });
    }

    let flags = record[3];
    let start_time = NanoTime {
        nanosecond: le_u32(record, 4),
        year: le_u16(record, 8),
        day: le_u16(record, 10),
        hour: record[12],
        minute: record[13],
        second: record[14],
    };
    let encoding_code = record[15];
    let raw_rate = f64::from_le_bytes([
        record[16], record[17], record[18], record[19], record[20], record[21], record[22],
        record[23],
    ]);
    // Negative values are sampling periods in seconds.
    let sample_rate = if raw_rate < 0.0 { -1.0 / raw_rate } else { raw_rate };
    let num_samples = le_u32(record, 24) as usize;
    let publication_version = record[32];
    let sid_length = record[33] as usize;
    let extra_length = le_u16(record, 34) as usize;

    let sid_end = V3_HEADER_SIZE + sid_length;
    let sid = std::str::from_utf8(&record[V3_HEADER_SIZE..sid_end])
        .map_err(|_| MseedError::InvalidV3Header("invalid UTF-8 in SID".into()))?;
    let source_id = SourceId::parse(sid);
    let (network, station, location, channel) = source_id.to_nslc()?;

    let extra_end = sid_end + extra_length;
    let extra_headers = std::str::from_utf8(&record[sid_end..extra_end])
        .map_err(|_| MseedError::InvalidV3Header("invalid UTF-8 in extra headers".into()))?
        .to_string();

    let encoding = EncodingFormat::from_code(encoding_code)?;
    // Steim frames stay big-endian in v3; everything else is little-endian.
    let byte_order = if encoding.is_steim() {
        ByteOrder::Big
    } else {
        ByteOrder::Little
    };
    let samples = decode_payload(&record[extra_end..], encoding, num_samples, byte_order)?;

    Ok(MseedRecord {
        format_version: FormatVersion::V3,
        network,
        station,
        location,
        channel,
        source_id,
        start_time,
        sample_rate,
        encoding,
        samples,
        sequence_number: "000000".into(),
        quality: 'D',
        byte_order,
        record_length: total_length as u32,
        flags,
        publication_version,
        extra_headers,
        crc: stored,
    })
}
