//! Iterator over back-to-back records in a byte slice.

use super::decode::{decode, record_length};
use super::record::MseedRecord;
use super::{MIN_RECORD_LENGTH, Result};

/// Iterator over concatenated miniSEED records (v2 and v3 may be mixed).
///
/// Iteration ends when fewer than [`MIN_RECORD_LENGTH`] bytes remain or the
/// last record is truncated. A record with an unsupported sample encoding
/// is reported and stepped over; any other error is reported once and ends
/// iteration.
///
/// # Example
///
/// ```
/// use waveserver::mseed::{encode, MseedReader, MseedRecord, Samples};
///
/// let record = MseedRecord::new()
///     .with_nslc("XX", "TEST", "00", "BHZ")
///     .with_samples(Samples::Int(vec![1, 2, 3]));
/// let data = encode(&record).unwrap();
///
/// let records: Vec<_> = MseedReader::new(&data)
///     .collect::<Result<Vec<_>, _>>()
///     .unwrap();
/// assert_eq!(records.len(), 1);
/// ```
pub struct MseedReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> MseedReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Bytes consumed so far.
    pub fn offset(&self) -> usize {
        self.offset
    }

    fn stop(&mut self) {
        self.offset = self.data.len();
    }
}

impl Iterator for MseedReader<'_> {
    type Item = Result<MseedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let remaining = &self.data[self.offset..];
        if remaining.len() < MIN_RECORD_LENGTH {
            return None;
        }

        let length = match record_length(remaining) {
            Ok(length) => length,
            Err(e) => {
                self.stop();
                return Some(Err(e));
            }
        };
        if remaining.len() < length {
            log::debug!(
                "truncated record at offset {}: {} of {} bytes",
                self.offset,
                remaining.len(),
                length
            );
            self.stop();
            return None;
        }

        match decode(&remaining[..length]) {
            Ok(record) => {
                self.offset += length;
                Some(Ok(record))
            }
            Err(e) if e.is_unsupported_encoding() => {
                self.offset += length;
                Some(Err(e))
            }
            Err(e) => {
                self.stop();
                Some(Err(e))
            }
        }
    }
}
