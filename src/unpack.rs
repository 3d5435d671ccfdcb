//! Turn a buffer of back-to-back miniSEED records into a [`Waveform`].

use crate::mseed::{MseedError, MseedReader, MseedRecord, Samples};
use crate::segment::{Segment, SegmentData};
use crate::waveform::Waveform;
use crate::{Result, WaveError};

/// Decode every record in `data` into one segment each.
///
/// The first decoded record names the waveform. Records that cannot become
/// a segment (text payloads, unsupported encodings, zero sampling rates)
/// are skipped with a warning; a malformed record ends decoding without an
/// error. Segments are not merged.
pub fn unpack(data: &[u8]) -> Result<Waveform> {
    let mut waveform = Waveform::new();
    let mut named = false;

    for item in MseedReader::new(data) {
        let record = match item {
            Ok(record) => record,
            Err(e) if e.is_unsupported_encoding() => {
                log::warn!("skipping record: {e}");
                continue;
            }
            Err(e) => {
                log::debug!("stopping decode: {e}");
                break;
            }
        };

        if !named {
            stamp_identity(&mut waveform, &record)?;
            named = true;
        }

        let segment = match to_segment(&record) {
            Ok(Some(segment)) => segment,
            Ok(None) => {
                log::warn!("skipping {} text record", record.nslc());
                continue;
            }
            Err(e) => {
                log::warn!("skipping {} record: {e}", record.nslc());
                continue;
            }
        };
        if let Err(e) = waveform.add_segment(segment) {
            log::warn!("skipping {} segment: {e}", record.nslc());
        }
    }
    Ok(waveform)
}

fn stamp_identity(waveform: &mut Waveform, record: &MseedRecord) -> Result<()> {
    let invalid = |_| WaveError::Decode(MseedError::InvalidSourceId(record.nslc()));
    waveform.set_network(&record.network).map_err(invalid)?;
    waveform.set_station(&record.station).map_err(invalid)?;
    waveform.set_channel(&record.channel).map_err(invalid)?;
    waveform.set_location_code(&record.location);
    Ok(())
}

/// `None` for payloads that are not a time series.
fn to_segment(record: &MseedRecord) -> Result<Option<Segment>> {
    let data = match &record.samples {
        Samples::Int(v) => SegmentData::Integer32(v.clone()),
        Samples::Float(v) => SegmentData::Float(v.clone()),
        Samples::Double(v) => SegmentData::Double(v.clone()),
        Samples::Text(_) => return Ok(None),
    };
    let segment = Segment::from_parts(record.start_micros()?, record.sample_rate, data)?;
    Ok(Some(segment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mseed::{NanoTime, encode};

    fn record(second: u8, samples: Samples) -> MseedRecord {
        MseedRecord::new()
            .with_nslc("UU", "FORK", "", "HHZ")
            .with_start_time(NanoTime {
                year: 2024,
                day: 1,
                hour: 0,
                minute: 0,
                second,
                nanosecond: 0,
            })
            .with_sample_rate(100.0)
            .with_samples(samples)
    }

    const T0: i64 = 1_704_067_200_000_000;

    #[test]
    fn test_unpack_records_in_order() {
        let mut data = encode(&record(1, Samples::Int(vec![1; 100]))).unwrap();
        data.extend(encode(&record(0, Samples::Int(vec![2; 100]))).unwrap());

        let waveform = unpack(&data).unwrap();
        assert_eq!(waveform.network(), Some("UU"));
        assert_eq!(waveform.station(), Some("FORK"));
        assert_eq!(waveform.channel(), Some("HHZ"));
        assert_eq!(waveform.location_code(), Some("--"));
        assert_eq!(waveform.number_of_segments(), 2);
        assert_eq!(waveform.at(0).unwrap().start_time(), T0);
        assert_eq!(waveform.at(1).unwrap().start_time(), T0 + 1_000_000);
    }

    #[test]
    fn test_unsupported_encoding_is_skipped() {
        let mut bad = encode(&record(0, Samples::Int(vec![1; 10]))).unwrap();
        bad[52] = 19; // Steim-3
        let good = encode(&record(1, Samples::Double(vec![0.5; 10]))).unwrap();
        let mut data = good;
        data.extend(bad);

        let waveform = unpack(&data).unwrap();
        assert_eq!(waveform.number_of_segments(), 1);
        assert_eq!(
            waveform.at(0).unwrap().samples(),
            Some(&SegmentData::Double(vec![0.5; 10]))
        );
    }

    #[test]
    fn test_text_records_and_garbage() {
        let mut data = encode(&record(0, Samples::Text(b"log line".to_vec()))).unwrap();
        data.extend(encode(&record(1, Samples::Float(vec![1.0; 4]))).unwrap());
        data.extend([0xFF; 700]);
        data.extend(encode(&record(9, Samples::Float(vec![1.0; 4]))).unwrap());

        let waveform = unpack(&data).unwrap();
        assert_eq!(waveform.number_of_segments(), 1);
        assert_eq!(waveform.channel(), Some("HHZ"));
    }

    #[test]
    fn test_oversized_steim_count_ends_decoding() {
        let good = encode(&record(0, Samples::Int(vec![3; 100]))).unwrap();
        let mut bad = encode(
            &MseedRecord::new_v3()
                .with_nslc("UU", "FORK", "", "HHZ")
                .with_sample_rate(100.0)
                .with_samples(Samples::Int(vec![1; 100])),
        )
        .unwrap();
        bad[15] = 11; // Steim-2
        bad[24..28].copy_from_slice(&u32::MAX.to_le_bytes());
        crate::mseed::crc::write_record_crc(&mut bad).unwrap();

        let mut data = good;
        data.extend(bad);
        let waveform = unpack(&data).unwrap();
        assert_eq!(waveform.number_of_segments(), 1);
        assert_eq!(waveform.number_of_samples(), 100);
    }

    #[test]
    fn test_empty_buffer() {
        let waveform = unpack(&[]).unwrap();
        assert!(waveform.is_empty());
        assert_eq!(waveform.network(), None);
    }

    #[test]
    fn test_unnamed_record_is_an_error() {
        let data = encode(&record(0, Samples::Int(vec![1])).with_nslc("", "FORK", "", "HHZ"))
            .unwrap();
        assert!(matches!(unpack(&data), Err(WaveError::Decode(_))));
    }
}
