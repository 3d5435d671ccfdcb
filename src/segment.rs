//! A contiguous, regularly sampled run of samples.

use serde::de::{self, Deserializer};
use serde::ser::{self, SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::from_value;

use crate::request::seconds_to_micros;
use crate::{Result, WaveError};

/// Storage type of a segment's samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Integer32,
    Float,
    Integer64,
    Double,
}

/// Samples of exactly one numeric type.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentData {
    Integer32(Vec<i32>),
    Float(Vec<f32>),
    Integer64(Vec<i64>),
    Double(Vec<f64>),
}

impl SegmentData {
    pub fn len(&self) -> usize {
        match self {
            Self::Integer32(v) => v.len(),
            Self::Float(v) => v.len(),
            Self::Integer64(v) => v.len(),
            Self::Double(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Self::Integer32(_) => DataType::Integer32,
            Self::Float(_) => DataType::Float,
            Self::Integer64(_) => DataType::Integer64,
            Self::Double(_) => DataType::Double,
        }
    }

    /// Append `other` if it holds the same type.
    fn extend_from(&mut self, other: &SegmentData) -> Result<()> {
        match (self, other) {
            (Self::Integer32(a), Self::Integer32(b)) => a.extend_from_slice(b),
            (Self::Float(a), Self::Float(b)) => a.extend_from_slice(b),
            (Self::Integer64(a), Self::Integer64(b)) => a.extend_from_slice(b),
            (Self::Double(a), Self::Double(b)) => a.extend_from_slice(b),
            (a, b) => {
                return Err(WaveError::InvalidArgument(format!(
                    "cannot append {:?} samples to {:?} samples",
                    b.data_type(),
                    a.data_type()
                )));
            }
        }
        Ok(())
    }
}

/// Numeric types samples can be read out as.
pub trait Sample: Copy {
    fn collect_from(data: &SegmentData) -> Vec<Self>;
}

macro_rules! sample_type {
    ($($t:ty => $variant:ident),* $(,)?) => {$(
        impl Sample for $t {
            #[allow(clippy::unnecessary_cast)]
            fn collect_from(data: &SegmentData) -> Vec<Self> {
                match data {
                    SegmentData::Integer32(v) => v.iter().map(|&x| x as $t).collect(),
                    SegmentData::Float(v) => v.iter().map(|&x| x as $t).collect(),
                    SegmentData::Integer64(v) => v.iter().map(|&x| x as $t).collect(),
                    SegmentData::Double(v) => v.iter().map(|&x| x as $t).collect(),
                }
            }
        }

        impl From<Vec<$t>> for SegmentData {
            fn from(v: Vec<$t>) -> Self {
                SegmentData::$variant(v)
            }
        }

        impl From<&[$t]> for SegmentData {
            fn from(v: &[$t]) -> Self {
                SegmentData::$variant(v.to_vec())
            }
        }
    )*};
}

sample_type!(i32 => Integer32, f32 => Float, i64 => Integer64, f64 => Double);

/// Samples plus the start time (µs since the epoch) of the first one and a
/// sampling rate. The end time is the time of the last sample:
/// `start + round((N - 1) / rate * 1e6)`.
///
/// ```
/// use waveserver::Segment;
///
/// let mut segment = Segment::new();
/// segment.set_start_time(1_000_000);
/// segment.set_sampling_rate(100.0).unwrap();
/// segment.set_data(vec![1i32, 2, 3]);
/// assert_eq!(segment.end_time().unwrap(), 1_020_000);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segment {
    start_time: i64,
    /// `None` when the last sample falls outside the `i64` range.
    end_time: Option<i64>,
    sampling_rate: Option<f64>,
    data: Option<SegmentData>,
}

impl Segment {
    pub fn new() -> Self {
        Self::default()
    }

    /// A segment with every field set.
    pub fn from_parts(
        start_time: i64,
        sampling_rate: f64,
        data: impl Into<SegmentData>,
    ) -> Result<Self> {
        let mut segment = Self::new();
        segment.set_start_time(start_time);
        segment.set_sampling_rate(sampling_rate)?;
        segment.set_data(data);
        segment.end_time()?;
        Ok(segment)
    }

    pub fn set_start_time(&mut self, start_time: i64) {
        self.start_time = start_time;
        self.update_end_time();
    }

    /// Start time in seconds, rounded to the nearest microsecond.
    pub fn set_start_time_seconds(&mut self, seconds: f64) -> Result<()> {
        self.set_start_time(seconds_to_micros(seconds)?);
        Ok(())
    }

    pub fn start_time(&self) -> i64 {
        self.start_time
    }

    pub fn set_sampling_rate(&mut self, rate: f64) -> Result<()> {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(WaveError::InvalidArgument(format!(
                "sampling rate {rate} must be positive"
            )));
        }
        self.sampling_rate = Some(rate);
        self.update_end_time();
        Ok(())
    }

    pub fn sampling_rate(&self) -> Result<f64> {
        self.sampling_rate.ok_or(WaveError::NotSet("sampling rate"))
    }

    /// Seconds between samples.
    pub fn sampling_period(&self) -> Result<f64> {
        Ok(1.0 / self.sampling_rate()?)
    }

    /// Replace the samples, whatever type they had before.
    pub fn set_data(&mut self, data: impl Into<SegmentData>) {
        self.data = Some(data.into());
        self.update_end_time();
    }

    pub fn data_type(&self) -> Option<DataType> {
        self.data.as_ref().map(SegmentData::data_type)
    }

    pub fn samples(&self) -> Option<&SegmentData> {
        self.data.as_ref()
    }

    /// The samples converted to `T`.
    pub fn data<T: Sample>(&self) -> Result<Vec<T>> {
        self.data
            .as_ref()
            .map(T::collect_from)
            .ok_or(WaveError::NotSet("data"))
    }

    /// Like [`Segment::data`], reusing the caller's buffer.
    pub fn copy_data_into<T: Sample>(&self, out: &mut Vec<T>) -> Result<()> {
        *out = self.data()?;
        Ok(())
    }

    pub fn number_of_samples(&self) -> usize {
        self.data.as_ref().map_or(0, SegmentData::len)
    }

    /// Time of the last sample.
    pub fn end_time(&self) -> Result<i64> {
        self.sampling_rate()?;
        self.end_time.ok_or_else(|| {
            WaveError::InvalidArgument(format!(
                "{} samples from {} us run past the end of time",
                self.number_of_samples(),
                self.start_time
            ))
        })
    }

    pub(crate) fn append(&mut self, other: &Segment) -> Result<()> {
        let (Some(data), Some(more)) = (self.data.as_mut(), other.data.as_ref()) else {
            return Err(WaveError::NotSet("data"));
        };
        data.extend_from(more)?;
        self.update_end_time();
        Ok(())
    }

    fn update_end_time(&mut self) {
        let n = self.number_of_samples();
        let span = match self.sampling_rate {
            // Saturates on overflow, which checked_add then rejects.
            Some(rate) if n > 0 => ((n - 1) as f64 / rate * 1e6).round() as i64,
            _ => 0,
        };
        self.end_time = self.start_time.checked_add(span);
    }
}

impl Serialize for Segment {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let rate = self
            .sampling_rate
            .ok_or_else(|| <S::Error as ser::Error>::custom("sampling rate not set"))?;
        let data = self
            .data
            .as_ref()
            .ok_or_else(|| <S::Error as ser::Error>::custom("data not set"))?;
        let mut s = serializer.serialize_struct("Segment", 4)?;
        s.serialize_field("startTimeMuS", &self.start_time)?;
        s.serialize_field("samplingRateHZ", &rate)?;
        s.serialize_field("dataType", &data.data_type())?;
        match data {
            SegmentData::Integer32(v) => s.serialize_field("data", v)?,
            SegmentData::Float(v) => s.serialize_field("data", v)?,
            SegmentData::Integer64(v) => s.serialize_field("data", v)?,
            SegmentData::Double(v) => s.serialize_field("data", v)?,
        }
        s.end()
    }
}

#[derive(Deserialize)]
struct RawSegment {
    #[serde(rename = "startTimeMuS")]
    start_time: i64,
    #[serde(rename = "samplingRateHZ")]
    sampling_rate: f64,
    #[serde(rename = "dataType")]
    data_type: DataType,
    data: serde_json::Value,
}

impl<'de> Deserialize<'de> for Segment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = RawSegment::deserialize(deserializer)?;
        let data = match raw.data_type {
            DataType::Integer32 => from_value::<Vec<i32>>(raw.data).map(SegmentData::from),
            DataType::Float => from_value::<Vec<f32>>(raw.data).map(SegmentData::from),
            DataType::Integer64 => from_value::<Vec<i64>>(raw.data).map(SegmentData::from),
            DataType::Double => from_value::<Vec<f64>>(raw.data).map(SegmentData::from),
        }
        .map_err(<D::Error as de::Error>::custom)?;
        Segment::from_parts(raw.start_time, raw.sampling_rate, data).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_time_formula() {
        for (rate, n, expected) in [
            (100.0, 100, 990_000),
            (1.0, 11, 10_000_000),
            (40.0, 1, 0),
            (3.0, 2, 333_333),
            (3.0, 3, 666_667),
            (0.1, 2, 10_000_000),
        ] {
            let segment = Segment::from_parts(0, rate, vec![0i32; n]).unwrap();
            assert_eq!(segment.end_time().unwrap(), expected, "rate {rate}, n {n}");
        }
        let segment = Segment::from_parts(5_000_000, 200.0, vec![0.0f64; 201]).unwrap();
        assert_eq!(segment.end_time().unwrap(), 6_000_000);
    }

    #[test]
    fn test_end_time_out_of_range() {
        let err = Segment::from_parts(i64::MAX - 10, 1.0, vec![1i32, 2]).unwrap_err();
        assert!(err.is_precondition());
        assert!(Segment::from_parts(i64::MAX - 10, 1e6, vec![1i32, 2]).is_ok());

        let mut segment = Segment::new();
        segment.set_start_time(1);
        segment.set_sampling_rate(1e-300).unwrap();
        segment.set_data(vec![0i32; 3]);
        assert!(segment.end_time().is_err());

        let json = format!(
            r#"{{"startTimeMuS": {}, "samplingRateHZ": 1.0, "dataType": "integer32", "data": [1, 2]}}"#,
            i64::MAX - 10
        );
        assert!(serde_json::from_str::<Segment>(&json).is_err());
    }

    #[test]
    fn test_end_time_tracks_every_setter() {
        let mut segment = Segment::new();
        segment.set_data(vec![1i32, 2, 3, 4, 5]);
        assert!(matches!(segment.end_time(), Err(WaveError::NotSet("sampling rate"))));
        segment.set_sampling_rate(2.0).unwrap();
        assert_eq!(segment.end_time().unwrap(), 2_000_000);
        segment.set_start_time_seconds(1.5).unwrap();
        assert_eq!(segment.end_time().unwrap(), 3_500_000);
        segment.set_data(vec![1.0f32]);
        assert_eq!(segment.end_time().unwrap(), 1_500_000);
        assert_eq!(segment.data_type(), Some(DataType::Float));
    }

    #[test]
    fn test_invalid_rate() {
        let mut segment = Segment::new();
        for rate in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(segment.set_sampling_rate(rate).unwrap_err().is_precondition());
        }
        assert!(matches!(segment.sampling_rate(), Err(WaveError::NotSet(_))));
    }

    #[test]
    fn test_data_conversion() {
        let segment = Segment::from_parts(0, 1.0, &[1i64, -2, 3][..]).unwrap();
        assert_eq!(segment.data::<f64>().unwrap(), vec![1.0, -2.0, 3.0]);
        assert_eq!(segment.data::<i32>().unwrap(), vec![1, -2, 3]);

        let mut out = vec![99.0f32];
        segment.copy_data_into(&mut out).unwrap();
        assert_eq!(out, vec![1.0, -2.0, 3.0]);

        assert!(matches!(Segment::new().data::<i32>(), Err(WaveError::NotSet("data"))));
        assert_eq!(Segment::new().number_of_samples(), 0);
    }

    #[test]
    fn test_append_requires_same_type() {
        let mut a = Segment::from_parts(0, 1.0, vec![1i32, 2]).unwrap();
        let b = Segment::from_parts(2_000_000, 1.0, vec![3i32]).unwrap();
        a.append(&b).unwrap();
        assert_eq!(a.data::<i32>().unwrap(), vec![1, 2, 3]);
        assert_eq!(a.end_time().unwrap(), 2_000_000);

        let c = Segment::from_parts(3_000_000, 1.0, vec![4.0f64]).unwrap();
        assert!(a.append(&c).is_err());
        assert_eq!(a.number_of_samples(), 3);
    }

    #[test]
    fn test_json_shape() {
        let segment = Segment::from_parts(1_000_000, 100.0, vec![1i32, 2]).unwrap();
        let value = serde_json::to_value(&segment).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "startTimeMuS": 1_000_000,
                "samplingRateHZ": 100.0,
                "dataType": "integer32",
                "data": [1, 2]
            })
        );
        let back: Segment = serde_json::from_value(value).unwrap();
        assert_eq!(back, segment);
    }

    #[test]
    fn test_json_requires_rate_and_data() {
        let mut segment = Segment::new();
        assert!(serde_json::to_string(&segment).is_err());
        segment.set_sampling_rate(1.0).unwrap();
        assert!(serde_json::to_string(&segment).is_err());

        let bad = serde_json::json!({
            "startTimeMuS": 0,
            "samplingRateHZ": 1.0,
            "dataType": "integer32",
            "data": [1.5]
        });
        assert!(serde_json::from_value::<Segment>(bad).is_err());
    }
}
