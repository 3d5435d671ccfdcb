//! Seismic waveform acquisition.
//!
//! Fetches miniSEED from FDSN web services and DataLink ring servers,
//! decodes it into time-ordered [`Segment`]s, joins contiguous segments, and
//! picks the most complete answer across several prioritized sources.
//!
//! # Assembling a waveform
//!
//! ```
//! use waveserver::mseed::{self, MseedRecord, NanoTime, Samples};
//! use waveserver::unpack;
//!
//! let record = |second, value| {
//!     MseedRecord::new()
//!         .with_nslc("UU", "FORK", "01", "HHZ")
//!         .with_start_time(NanoTime { year: 2024, day: 1, hour: 0, minute: 0, second, nanosecond: 0 })
//!         .with_sample_rate(100.0)
//!         .with_samples(Samples::Int(vec![value; 100]))
//! };
//! let mut data = mseed::encode(&record(0, 1)).unwrap();
//! data.extend(mseed::encode(&record(1, 2)).unwrap());
//!
//! let mut waveform = unpack(&data).unwrap();
//! assert_eq!(waveform.number_of_segments(), 2);
//! waveform.merge_segments();
//! assert_eq!(waveform.number_of_segments(), 1);
//! assert_eq!(waveform.number_of_samples(), 200);
//! ```
//!
//! # Asking several sources
//!
//! ```no_run
//! use waveserver::{Client, MultiClient, Request, WaveServerConfig};
//!
//! let config = WaveServerConfig::from_path("waveserver.json").unwrap();
//! let multi = MultiClient::from_config(&config);
//! let request = Request::from_seconds("UU", "FORK", "HHZ", 1_700_000_000.0, 1_700_000_600.0).unwrap();
//! let waveform = multi.get_data(&request).unwrap();
//! println!("{}", serde_json::to_string(&waveform).unwrap());
//! ```

pub mod mseed;

mod client;
mod config;
pub mod datalink;
mod error;
mod fdsn;
mod multi_client;
mod request;
mod segment;
mod unpack;
mod waveform;

pub use client::Client;
pub use config::{DataLinkConfig, FdsnConfig, SourceConfig, SourceKind, WaveServerConfig};
pub use datalink::{DataLinkClient, DataLinkConnection};
pub use error::{Result, WaveError};
pub use fdsn::FdsnClient;
pub use multi_client::{
    CompletenessPolicy, DEFAULT_ACCEPTANCE_THRESHOLD, GAP_TOLERANCE_FACTOR, MultiClient,
    percent_complete,
};
pub use request::Request;
pub use segment::{DataType, Sample, Segment, SegmentData};
pub use unpack::unpack;
pub use waveform::{
    BLANK_LOCATION_CODE, MergeOutcome, MergePolicy, SAMPLING_PERIOD_FACTOR,
    SAMPLING_PERIOD_TOLERANCE, Waveform,
};
