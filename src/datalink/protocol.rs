//! DataLink wire framing.
//!
//! Every message, in either direction, is `"DL"`, one byte holding the
//! header length, the ASCII header, then an optional payload. When a payload
//! follows, its size is the last field of the header.

use std::io::{Read, Write};
use std::str::FromStr;

use crate::{Result, WaveError};

pub const PREAMBLE: &[u8; 2] = b"DL";

/// Largest payload accepted from a server.
pub const MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Write one frame and flush.
pub fn write_frame<W: Write>(writer: &mut W, header: &str, payload: &[u8]) -> Result<()> {
    let header_len = u8::try_from(header.len())
        .map_err(|_| WaveError::Protocol(format!("header too long ({} bytes)", header.len())))?;
    let mut frame = Vec::with_capacity(3 + header.len() + payload.len());
    frame.extend_from_slice(PREAMBLE);
    frame.push(header_len);
    frame.extend_from_slice(header.as_bytes());
    frame.extend_from_slice(payload);
    writer.write_all(&frame)?;
    writer.flush()?;
    Ok(())
}

/// A data packet delivered while streaming. Times are microseconds since
/// the epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub stream_id: String,
    pub packet_id: u64,
    pub packet_time: i64,
    pub data_start: i64,
    pub data_end: i64,
    pub data: Vec<u8>,
}

/// A message from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Server identification, the full header.
    Id(String),
    Ok { value: i64, message: String },
    Error { value: i64, message: String },
    Info { kind: String, payload: Vec<u8> },
    Packet(Packet),
    EndStream,
}

impl Reply {
    /// Read exactly one frame.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut lead = [0u8; 3];
        reader.read_exact(&mut lead)?;
        if &lead[..2] != PREAMBLE {
            return Err(WaveError::Protocol(format!(
                "bad preamble {:02x}{:02x}",
                lead[0], lead[1]
            )));
        }
        let mut raw = vec![0u8; usize::from(lead[2])];
        reader.read_exact(&mut raw)?;
        let header = String::from_utf8(raw)
            .map_err(|_| WaveError::Protocol("header is not ASCII".into()))?;
        let fields: Vec<&str> = header.split_ascii_whitespace().collect();

        match fields.first().copied() {
            Some("ID") => Ok(Reply::Id(header.clone())),
            Some("ENDSTREAM") => Ok(Reply::EndStream),
            Some(kind @ ("OK" | "ERROR")) => {
                expect_fields(&fields, 3, &header)?;
                let value = field(&fields, 1, &header)?;
                let payload = read_payload(reader, field(&fields, 2, &header)?)?;
                let message = String::from_utf8_lossy(&payload).into_owned();
                if kind == "OK" {
                    Ok(Reply::Ok { value, message })
                } else {
                    Ok(Reply::Error { value, message })
                }
            }
            Some("INFO") => {
                expect_fields(&fields, 3, &header)?;
                let payload = read_payload(reader, field(&fields, 2, &header)?)?;
                Ok(Reply::Info {
                    kind: fields[1].to_string(),
                    payload,
                })
            }
            Some("PACKET") => {
                expect_fields(&fields, 7, &header)?;
                let data = read_payload(reader, field(&fields, 6, &header)?)?;
                Ok(Reply::Packet(Packet {
                    stream_id: fields[1].to_string(),
                    packet_id: field(&fields, 2, &header)?,
                    packet_time: field(&fields, 3, &header)?,
                    data_start: field(&fields, 4, &header)?,
                    data_end: field(&fields, 5, &header)?,
                    data,
                }))
            }
            _ => Err(WaveError::Protocol(format!("unexpected reply '{header}'"))),
        }
    }
}

fn expect_fields(fields: &[&str], count: usize, header: &str) -> Result<()> {
    if fields.len() == count {
        Ok(())
    } else {
        Err(WaveError::Protocol(format!(
            "expected {count} fields in '{header}'"
        )))
    }
}

fn field<T: FromStr>(fields: &[&str], index: usize, header: &str) -> Result<T> {
    fields[index]
        .parse()
        .map_err(|_| WaveError::Protocol(format!("bad field {index} in '{header}'")))
}

fn read_payload<R: Read>(reader: &mut R, size: usize) -> Result<Vec<u8>> {
    if size > MAX_PAYLOAD {
        return Err(WaveError::Protocol(format!("payload of {size} bytes too large")));
    }
    let mut payload = vec![0u8; size];
    reader.read_exact(&mut payload)?;
    Ok(payload)
}
