//! Decode miniSEED records from raw bytes.
//!
//! [`decode()`] detects the format version and parses one record into an
//! [`MseedRecord`]. v2 parsing lives here; v3 in [`super::decode_v3`].
//! For multi-record buffers, see [`MseedReader`](super::MseedReader).

use super::decode_v3::{decode_v3, peek_v3_record_length};
use super::record::{MseedRecord, Samples};
use super::sid::SourceId;
use super::steim;
use super::time::{BTime, NanoTime};
use super::types::{ByteOrder, EncodingFormat, FormatVersion};
use super::{MseedError, Result};

const V2_HEADER_SIZE: usize = 48;

/// Activity flag bit 1: the header time correction is already included in
/// the start time.
const TIME_CORRECTION_APPLIED: u8 = 0x02;

/// Record lengths of 2^7..=2^20 bytes are accepted.
const RECORD_LENGTH_POWERS: std::ops::RangeInclusive<u8> = 7..=20;

/// Decode a single miniSEED record (v2 or v3) from raw bytes.
pub fn decode(data: &[u8]) -> Result<MseedRecord> {
    match detect_format(data)? {
        FormatVersion::V2 => decode_v2(data),
        FormatVersion::V3 => decode_v3(data),
    }
}

/// Length in bytes of the record at the start of `data`, read from the
/// header without touching the payload.
pub fn record_length(data: &[u8]) -> Result<usize> {
    match detect_format(data)? {
        FormatVersion::V2 => {
            let header = V2Header::parse(data)?;
            Ok(find_blockettes(data, &header)?.record_length)
        }
        FormatVersion::V3 => peek_v3_record_length(data),
    }
}

fn detect_format(data: &[u8]) -> Result<FormatVersion> {
    if data.len() >= 3 && data[0] == b'M' && data[1] == b'S' && data[2] == 3 {
        return Ok(FormatVersion::V3);
    }
    if data.len() >= V2_HEADER_SIZE && is_v2_header(data) {
        return Ok(FormatVersion::V2);
    }
    if data.len() < V2_HEADER_SIZE {
        return Err(MseedError::RecordTooShort {
            expected: V2_HEADER_SIZE,
            actual: data.len(),
        });
    }
    Err(MseedError::UnrecognizedFormat)
}

/// Sequence number of digits, spaces or NULs followed by a quality code.
fn is_v2_header(data: &[u8]) -> bool {
    data[0..6]
        .iter()
        .all(|&b| b.is_ascii_digit() || b == b' ' || b == 0)
        && matches!(data[6], b'D' | b'R' | b'Q' | b'M')
}

/// Byte-order aware field access into a v2 header.
struct Fields<'a> {
    data: &'a [u8],
    order: ByteOrder,
}

impl Fields<'_> {
    fn u16(&self, at: usize) -> u16 {
        let bytes = [self.data[at], self.data[at + 1]];
        match self.order {
            ByteOrder::Big => u16::from_be_bytes(bytes),
            ByteOrder::Little => u16::from_le_bytes(bytes),
        }
    }

    fn i16(&self, at: usize) -> i16 {
        self.u16(at) as i16
    }

    fn u32(&self, at: usize) -> u32 {
        let bytes = [
            self.data[at],
            self.data[at + 1],
            self.data[at + 2],
            self.data[at + 3],
        ];
        match self.order {
            ByteOrder::Big => u32::from_be_bytes(bytes),
            ByteOrder::Little => u32::from_le_bytes(bytes),
        }
    }
}

fn plausible_date(year: u16, day: u16) -> bool {
    (1900..=2100).contains(&year) && (1..=366).contains(&day)
}

/// The parts of the 48-byte fixed header needed before the payload.
struct V2Header {
    header_order: ByteOrder,
    start_time: BTime,
    num_samples: usize,
    sample_rate: f64,
    activity_flags: u8,
    time_correction: i32,
    data_offset: usize,
    first_blockette: usize,
}

impl V2Header {
    fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < V2_HEADER_SIZE {
            return Err(MseedError::RecordTooShort {
                expected: V2_HEADER_SIZE,
                actual: data.len(),
            });
        }
        // Headers are big-endian unless the year only makes sense swapped.
        let header_order = [ByteOrder::Big, ByteOrder::Little]
            .into_iter()
            .find(|&order| {
                let f = Fields { data, order };
                plausible_date(f.u16(20), f.u16(22))
            })
            .ok_or(MseedError::InvalidHeader)?;
        let f = Fields {
            data,
            order: header_order,
        };

        let start_time = BTime {
            year: f.u16(20),
            day: f.u16(22),
            hour: data[24],
            minute: data[25],
            second: data[26],
            fract: f.u16(28),
        };

        Ok(Self {
            header_order,
            start_time,
            num_samples: f.u16(30) as usize,
            sample_rate: sample_rate_from_factors(f.i16(32), f.i16(34)),
            activity_flags: data[36],
            time_correction: f.u32(40) as i32,
            data_offset: f.u16(44) as usize,
            first_blockette: f.u16(46) as usize,
        })
    }
}

/// SEED factor/multiplier convention: positive values multiply, negative
/// values divide.
fn sample_rate_from_factors(factor: i16, multiplier: i16) -> f64 {
    if factor == 0 || multiplier == 0 {
        return 0.0;
    }
    let f = factor as f64;
    let m = multiplier as f64;
    match (factor > 0, multiplier > 0) {
        (true, true) => f * m,
        (true, false) => -f / m,
        (false, true) => -m / f,
        (false, false) => 1.0 / (f * m),
    }
}

/// What the blockette chain contributes to a v2 record.
struct Blockettes {
    encoding_code: u8,
    payload_order: ByteOrder,
    record_length: usize,
    /// Blockette 100.
    actual_sample_rate: Option<f64>,
    /// Blockette 1001, in microseconds.
    microsecond_offset: i8,
}

fn find_blockettes(data: &[u8], header: &V2Header) -> Result<Blockettes> {
    let f = Fields {
        data,
        order: header.header_order,
    };
    let mut b1000 = None;
    let mut actual_sample_rate = None;
    let mut microsecond_offset = 0i8;

    let mut offset = header.first_blockette;
    let mut visited = 0;
    while offset != 0 {
        // Offsets must move forward; a chain pointing back is corrupt.
        if offset < V2_HEADER_SIZE || offset + 4 > data.len() || visited > 64 {
            break;
        }
        visited += 1;
        let blockette_type = f.u16(offset);
        let next_offset = f.u16(offset + 2) as usize;

        match blockette_type {
            1000 if offset + 8 <= data.len() => {
                b1000 = Some((data[offset + 4], data[offset + 5], data[offset + 6]));
            }
            1001 if offset + 8 <= data.len() => {
                microsecond_offset = data[offset + 5] as i8;
            }
            100 if offset + 8 <= data.len() => {
                let rate = f32::from_bits(f.u32(offset + 4)) as f64;
                if rate.is_finite() && rate > 0.0 {
                    actual_sample_rate = Some(rate);
                }
            }
            _ => {}
        }

        if next_offset != 0 && next_offset <= offset {
            break;
        }
        offset = next_offset;
    }

    let (encoding_code, word_order, power) = b1000.ok_or(MseedError::MissingBlockette1000)?;
    if !RECORD_LENGTH_POWERS.contains(&power) {
        return Err(MseedError::InvalidHeader);
    }
    Ok(Blockettes {
        encoding_code,
        payload_order: if word_order == 0 {
            ByteOrder::Little
        } else {
            ByteOrder::Big
        },
        record_length: 1usize << power,
        actual_sample_rate,
        microsecond_offset,
    })
}

fn ascii_field(bytes: &[u8]) -> Result<String> {
    Ok(std::str::from_utf8(bytes)
        .map_err(|_| MseedError::InvalidHeader)?
        .trim_matches(|c: char| c == ' ' || c == '\0')
        .to_string())
}

/// Decode a single miniSEED v2 record from raw bytes.
pub fn decode_v2(data: &[u8]) -> Result<MseedRecord> {
    let header = V2Header::parse(data)?;
    let blockettes = find_blockettes(data, &header)?;

    let record_length = blockettes.record_length;
    if data.len() < record_length {
        return Err(MseedError::RecordTooShort {
            expected: record_length,
            actual: data.len(),
        });
    }
    if header.data_offset > record_length {
        return Err(MseedError::InvalidHeader);
    }

    let sequence_number = ascii_field(&data[0..6])?;
    let quality = data[6] as char;
    let station = ascii_field(&data[8..13])?;
    let location = ascii_field(&data[13..15])?;
    let channel = ascii_field(&data[15..18])?;
    let network = ascii_field(&data[18..20])?;

    let mut start_time = NanoTime::from_btime(&header.start_time);
    let mut shift_micros = blockettes.microsecond_offset as i64;
    if header.activity_flags & TIME_CORRECTION_APPLIED == 0 {
        shift_micros += header.time_correction as i64 * 100;
    }
    if shift_micros != 0 {
        start_time = NanoTime::from_epoch_micros(start_time.to_epoch_micros()? + shift_micros)?;
    }

    let sample_rate = blockettes
        .actual_sample_rate
        .unwrap_or(header.sample_rate);

    let encoding = EncodingFormat::from_code(blockettes.encoding_code)?;
    let payload = if header.data_offset == 0 {
        &[][..]
    } else {
        &data[header.data_offset..record_length]
    };
    let samples = decode_payload(
        payload,
        encoding,
        header.num_samples,
        blockettes.payload_order,
    )?;

    Ok(MseedRecord {
        format_version: FormatVersion::V2,
        source_id: SourceId::from_nslc(&network, &station, &location, &channel),
        network,
        station,
        location,
        channel,
        start_time,
        sample_rate,
        encoding,
        samples,
        sequence_number,
        quality,
        byte_order: blockettes.payload_order,
        record_length: record_length as u32,
        flags: header.activity_flags,
        publication_version: 0,
        extra_headers: String::new(),
        crc: 0,
    })
}

/// Decode a record payload into samples.
///
/// For TEXT the sample count is a byte count; when it is zero the payload
/// is returned up to its trailing NUL padding.
pub(crate) fn decode_payload(
    data: &[u8],
    encoding: EncodingFormat,
    num_samples: usize,
    byte_order: ByteOrder,
) -> Result<Samples> {
    match encoding {
        EncodingFormat::Text => {
            let end = if num_samples > 0 {
                num_samples.min(data.len())
            } else {
                data.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1)
            };
            Ok(Samples::Text(data[..end].to_vec()))
        }
        EncodingFormat::Int16 => Ok(Samples::Int(fixed_width(
            data,
            num_samples,
            byte_order,
            |b: [u8; 2], order| match order {
                ByteOrder::Big => i16::from_be_bytes(b) as i32,
                ByteOrder::Little => i16::from_le_bytes(b) as i32,
            },
        )?)),
        EncodingFormat::Int32 => Ok(Samples::Int(fixed_width(
            data,
            num_samples,
            byte_order,
            |b: [u8; 4], order| match order {
                ByteOrder::Big => i32::from_be_bytes(b),
                ByteOrder::Little => i32::from_le_bytes(b),
            },
        )?)),
        EncodingFormat::Float32 => Ok(Samples::Float(fixed_width(
            data,
            num_samples,
            byte_order,
            |b: [u8; 4], order| match order {
                ByteOrder::Big => f32::from_be_bytes(b),
                ByteOrder::Little => f32::from_le_bytes(b),
            },
        )?)),
        EncodingFormat::Float64 => Ok(Samples::Double(fixed_width(
            data,
            num_samples,
            byte_order,
            |b: [u8; 8], order| match order {
                ByteOrder::Big => f64::from_be_bytes(b),
                ByteOrder::Little => f64::from_le_bytes(b),
            },
        )?)),
        EncodingFormat::Steim1 => Ok(Samples::Int(steim::decode_steim1(
            data,
            num_samples,
            byte_order,
        )?)),
        EncodingFormat::Steim2 => Ok(Samples::Int(steim::decode_steim2(
            data,
            num_samples,
            byte_order,
        )?)),
    }
}

fn fixed_width<T, const N: usize>(
    data: &[u8],
    num_samples: usize,
    byte_order: ByteOrder,
    read: impl Fn([u8; N], ByteOrder) -> T,
) -> Result<Vec<T>> {
    let needed = num_samples.saturating_mul(N);
    if data.len() < needed {
        return Err(MseedError::RecordTooShort {
            expected: needed,
            actual: data.len(),
        });
    }
    Ok(data[..needed]
        .chunks_exact(N)
        .map(|chunk| {
            let mut bytes = [0u8; N];
            bytes.copy_from_slice(chunk);
            read(bytes, byte_order)
        })
        .collect())
}
