//! Compile-time smoke test: verify top-level re-exports work.

use waveserver::mseed::{self, EncodingFormat, MseedError, MseedRecord, NanoTime, Samples};
use waveserver::{
    Client, CompletenessPolicy, DataLinkClient, DataType, FdsnClient, GAP_TOLERANCE_FACTOR,
    MergeOutcome, MergePolicy, MultiClient, Request, Result, SAMPLING_PERIOD_TOLERANCE, Segment,
    SegmentData, WaveError, WaveServerConfig, Waveform, unpack,
};

#[test]
fn top_level_imports_compile() {
    let _: fn(&[u8]) -> Result<Waveform> = unpack;
    let _: fn(&[u8]) -> mseed::Result<MseedRecord> = mseed::decode;
    let _: fn(&Waveform, &Request, f64) -> f64 = waveserver::percent_complete;
    let _: Option<&dyn Client> = None::<&FdsnClient>.map(|c| c as &dyn Client);
    let _: Option<DataLinkClient> = None;
    let _: Option<MseedError> = None;
    let _enc = EncodingFormat::Steim2;
    let _dt = DataType::Double;

    assert_eq!(GAP_TOLERANCE_FACTOR, CompletenessPolicy::default().gap_tolerance_factor);
    assert_eq!(SAMPLING_PERIOD_TOLERANCE, MergePolicy::default().sampling_period_tolerance);
    assert!(WaveServerConfig::default().sources.is_empty());
}

#[test]
fn decode_assemble_and_serialize() {
    let mut data = Vec::new();
    for second in [2u8, 0, 1] {
        let record = MseedRecord::new()
            .with_nslc("UU", "FORK", "", "HHZ")
            .with_start_time(NanoTime {
                year: 2024,
                day: 1,
                hour: 0,
                minute: 0,
                second,
                nanosecond: 0,
            })
            .with_sample_rate(10.0)
            .with_samples(Samples::Float(vec![f32::from(second); 10]));
        data.extend(mseed::encode(&record).unwrap());
    }

    let mut waveform = unpack(&data).unwrap();
    assert_eq!(waveform.number_of_segments(), 3);
    assert!(matches!(
        waveform.merge_segments(),
        MergeOutcome::Merged { before: 3, after: 1 }
    ));

    let segment: &Segment = waveform.at(0).unwrap();
    assert_eq!(segment.data_type(), Some(DataType::Float));
    let values: Vec<f32> = segment.data().unwrap();
    assert_eq!(values.len(), 30);
    assert_eq!(values[..10], [0.0; 10]);
    assert_eq!(values[10], 1.0);

    let json: serde_json::Value = serde_json::to_value(&waveform).unwrap();
    assert_eq!(json["network"], "UU");
    assert_eq!(json["locationCode"], "--");
    assert_eq!(json["segments"].as_array().unwrap().len(), 1);

    let back: Waveform = serde_json::from_value(json).unwrap();
    assert_eq!(back, waveform);
}

#[test]
fn errors_classify() {
    let err = Request::new("UU", "FORK", "HHZ", 10, 10).unwrap_err();
    assert!(err.is_precondition());
    assert!(WaveError::Transport("timed out".into()).is_transport());

    let mut segment = Segment::new();
    segment.set_data(SegmentData::Integer32(vec![1, 2, 3]));
    assert!(segment.end_time().is_err());
    assert_eq!(MultiClient::new().client_type(), "MultiClient");
}
