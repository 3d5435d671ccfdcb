//! Write [`MseedRecord`]s as miniSEED bytes.
//!
//! Only uncompressed encodings are written. This is enough to produce
//! fixtures for the decoder and the acquisition layer.

use super::crc;
use super::decode_v3::V3_HEADER_SIZE;
use super::record::{MseedRecord, Samples};
use super::time::NanoTime;
use super::types::{ByteOrder, EncodingFormat, FormatVersion};
use super::{MseedError, Result};

/// Blockette 1000 sits right after the fixed header; the payload starts at
/// 64, which leaves room for one more 8-byte blockette.
const V2_BLOCKETTE_1000: usize = 48;
const V2_DATA_OFFSET: usize = 64;

/// Encode a record in its own format version.
pub fn encode(record: &MseedRecord) -> Result<Vec<u8>> {
    match record.format_version {
        FormatVersion::V2 => encode_v2(record),
        FormatVersion::V3 => encode_v3(record),
    }
}

fn encode_v2(record: &MseedRecord) -> Result<Vec<u8>> {
    let rec_len = record.record_length as usize;
    if !rec_len.is_power_of_two() || rec_len < 128 {
        return Err(MseedError::EncodeError(format!(
            "record length {rec_len} is not a power of 2 >= 128"
        )));
    }
    let num_samples = u16::try_from(record.samples.len())
        .map_err(|_| MseedError::EncodeError("too many samples for a v2 record".into()))?;
    let payload = encode_payload(&record.samples, record.encoding, record.byte_order)?;
    if V2_DATA_OFFSET + payload.len() > rec_len {
        return Err(MseedError::EncodeError(format!(
            "{} payload bytes exceed the {} available",
            payload.len(),
            rec_len - V2_DATA_OFFSET
        )));
    }

    let mut buf = vec![0u8; rec_len];
    write_padded(&mut buf[0..6], &record.sequence_number, b'0');
    buf[6] = record.quality as u8;
    buf[7] = b' ';
    write_padded(&mut buf[8..13], &record.station, b' ');
    write_padded(&mut buf[13..15], &record.location, b' ');
    write_padded(&mut buf[15..18], &record.channel, b' ');
    write_padded(&mut buf[18..20], &record.network, b' ');
    write_btime(&mut buf[20..30], &record.start_time);
    buf[30..32].copy_from_slice(&num_samples.to_be_bytes());

    let (factor, multiplier) = rate_factors(record.sample_rate, record.encoding)?;
    buf[32..34].copy_from_slice(&factor.to_be_bytes());
    buf[34..36].copy_from_slice(&multiplier.to_be_bytes());
    buf[39] = 1;
    buf[44..46].copy_from_slice(&(V2_DATA_OFFSET as u16).to_be_bytes());
    buf[46..48].copy_from_slice(&(V2_BLOCKETTE_1000 as u16).to_be_bytes());

    let b = V2_BLOCKETTE_1000;
    buf[b..b + 2].copy_from_slice(&1000u16.to_be_bytes());
    buf[b + 2..b + 4].copy_from_slice(&0u16.to_be_bytes());
    buf[b + 4] = record.encoding.to_code();
    buf[b + 5] = match record.byte_order {
        ByteOrder::Big => 1,
        ByteOrder::Little => 0,
    };
    buf[b + 6] = rec_len.trailing_zeros() as u8;

    buf[V2_DATA_OFFSET..V2_DATA_OFFSET + payload.len()].copy_from_slice(&payload);
    Ok(buf)
}

fn encode_v3(record: &MseedRecord) -> Result<Vec<u8>> {
    let encoding = record.encoding;
    if encoding.is_steim() {
        return Err(MseedError::EncodeError(format!(
            "{encoding} encoding is not supported"
        )));
    }
    let payload = encode_payload(&record.samples, encoding, ByteOrder::Little)?;

    let sid = record.source_id.as_str().as_bytes();
    let sid_len = u8::try_from(sid.len())
        .map_err(|_| MseedError::EncodeError(format!("SID is {} bytes (max 255)", sid.len())))?;
    let extra = record.extra_headers.as_bytes();
    let extra_len = u16::try_from(extra.len()).map_err(|_| {
        MseedError::EncodeError(format!("extra headers are {} bytes", extra.len()))
    })?;

    let mut buf = Vec::with_capacity(V3_HEADER_SIZE + sid.len() + extra.len() + payload.len());
    buf.extend_from_slice(b"MS\x03");
    buf.push(record.flags);
    let t = &record.start_time;
    buf.extend_from_slice(&t.nanosecond.to_le_bytes());
    buf.extend_from_slice(&t.year.to_le_bytes());
    buf.extend_from_slice(&t.day.to_le_bytes());
    buf.extend_from_slice(&[t.hour, t.minute, t.second, encoding.to_code()]);
    buf.extend_from_slice(&record.sample_rate.to_le_bytes());
    buf.extend_from_slice(&(record.samples.len() as u32).to_le_bytes());
    buf.extend_from_slice(&[0; 4]);
    buf.push(record.publication_version);
    buf.push(sid_len);
    buf.extend_from_slice(&extra_len.to_le_bytes());
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(sid);
    buf.extend_from_slice(extra);
    buf.extend_from_slice(&payload);

    crc::write_record_crc(&mut buf);
    Ok(buf)
}

fn write_padded(dest: &mut [u8], src: &str, pad: u8) {
    let bytes = src.as_bytes();
    for (i, slot) in dest.iter_mut().enumerate() {
        *slot = bytes.get(i).copied().unwrap_or(pad);
    }
}

fn write_btime(dest: &mut [u8], time: &NanoTime) {
    let bt = time.to_btime();
    dest[0..2].copy_from_slice(&bt.year.to_be_bytes());
    dest[2..4].copy_from_slice(&bt.day.to_be_bytes());
    dest[4] = bt.hour;
    dest[5] = bt.minute;
    dest[6] = bt.second;
    dest[7] = 0;
    dest[8..10].copy_from_slice(&bt.fract.to_be_bytes());
}

/// Factor/multiplier pair for a whole-number rate or period.
fn rate_factors(rate: f64, encoding: EncodingFormat) -> Result<(i16, i16)> {
    if encoding == EncodingFormat::Text && rate == 0.0 {
        return Ok((0, 0));
    }
    if rate.is_nan() || rate <= 0.0 {
        return Err(MseedError::EncodeError("sample rate must be positive".into()));
    }
    let (value, sign) = if rate >= 1.0 { (rate, 1) } else { (1.0 / rate, -1) };
    if value.fract().abs() > 1e-9 || value > i16::MAX as f64 {
        return Err(MseedError::EncodeError(format!(
            "sample rate {rate} has no factor/multiplier form"
        )));
    }
    Ok((sign * value.round() as i16, 1))
}

fn encode_payload(
    samples: &Samples,
    encoding: EncodingFormat,
    byte_order: ByteOrder,
) -> Result<Vec<u8>> {
    fn put<const N: usize>(
        out: &mut Vec<u8>,
        order: ByteOrder,
        be: [u8; N],
        le: [u8; N],
    ) {
        match order {
            ByteOrder::Big => out.extend_from_slice(&be),
            ByteOrder::Little => out.extend_from_slice(&le),
        }
    }

    let mut out = Vec::new();
    match (encoding, samples) {
        (EncodingFormat::Text, Samples::Text(bytes)) => out.extend_from_slice(bytes),
        (EncodingFormat::Int16, Samples::Int(values)) => {
            for &v in values {
                let v = i16::try_from(v).map_err(|_| {
                    MseedError::EncodeError(format!("{v} does not fit in INT16"))
                })?;
                put(&mut out, byte_order, v.to_be_bytes(), v.to_le_bytes());
            }
        }
        (EncodingFormat::Int32, Samples::Int(values)) => {
            for &v in values {
                put(&mut out, byte_order, v.to_be_bytes(), v.to_le_bytes());
            }
        }
        (EncodingFormat::Float32, Samples::Float(values)) => {
            for &v in values {
                put(&mut out, byte_order, v.to_be_bytes(), v.to_le_bytes());
            }
        }
        (EncodingFormat::Float64, Samples::Double(values)) => {
            for &v in values {
                put(&mut out, byte_order, v.to_be_bytes(), v.to_le_bytes());
            }
        }
        (encoding, _) => {
            return Err(MseedError::EncodeError(format!(
                "cannot write these samples as {encoding}"
            )));
        }
    }
    Ok(out)
}
