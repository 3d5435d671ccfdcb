//! miniSEED v2/v3 codec.
//!
//! # Decoding
//!
//! ```
//! use waveserver::mseed::{self, MseedRecord, Samples};
//!
//! let record = MseedRecord::new()
//!     .with_nslc("IU", "ANMO", "00", "BHZ")
//!     .with_sample_rate(20.0)
//!     .with_samples(Samples::Int(vec![1, -2, 3]));
//! let bytes = mseed::encode(&record).unwrap();
//!
//! let decoded = mseed::decode(&bytes).unwrap();
//! assert_eq!(decoded.nslc(), "IU.ANMO.00.BHZ");
//! assert_eq!(decoded.samples, Samples::Int(vec![1, -2, 3]));
//! ```
//!
//! Supported payloads: INT16, INT32, FLOAT32, FLOAT64, Steim-1, Steim-2 and
//! TEXT. Records are written uncompressed only.

pub(crate) mod crc;
mod decode;
mod decode_v3;
mod encode;
mod error;
mod reader;
mod record;
mod sid;
mod steim;
mod time;
mod types;

pub use decode::{decode, record_length};
pub use decode_v3::decode_v3;
pub use encode::encode;
pub use error::{MseedError, Result};
pub use reader::MseedReader;
pub use record::{MseedRecord, Samples};
pub use sid::SourceId;
pub use time::{BTime, NanoTime};
pub use types::{ByteOrder, EncodingFormat, FormatVersion};

/// Smallest buffer that can hold a record header (the v3 fixed header).
pub const MIN_RECORD_LENGTH: usize = 40;
