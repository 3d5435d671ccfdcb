//! Time-ordered segments for one channel, with a verified merge.

use serde::de::{self, Deserializer};
use serde::ser::{self, SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};

use crate::request::{Request, normalize_code};
use crate::segment::Segment;
use crate::{Result, WaveError};

/// Largest difference (seconds) between two sampling periods that still
/// counts as the same rate when merging.
pub const SAMPLING_PERIOD_TOLERANCE: f64 = 0.0002;

/// Default jitter allowance, as a fraction of a sampling period, for the
/// gap between two segments that are merged.
pub const SAMPLING_PERIOD_FACTOR: f64 = 0.5;

/// Location code stored when an empty one is set.
pub const BLANK_LOCATION_CODE: &str = "--";

/// When two neighbouring segments are joined by [`Waveform::merge_segments_with`].
///
/// With `gap = next.start - (tail.end + tail.period)` in seconds, the next
/// segment is appended to the tail when both hold the same data type, their
/// periods differ by less than `sampling_period_tolerance`, and
/// `gap < tail.period * sampling_period_factor`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergePolicy {
    pub sampling_period_factor: f64,
    pub sampling_period_tolerance: f64,
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self {
            sampling_period_factor: SAMPLING_PERIOD_FACTOR,
            sampling_period_tolerance: SAMPLING_PERIOD_TOLERANCE,
        }
    }
}

/// What a merge did to the waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Fewer than two segments.
    NothingToMerge,
    /// The merged list replaced the old one (`before == after` when every
    /// boundary was a real gap).
    Merged { before: usize, after: usize },
    /// The merged list failed verification; the waveform is unchanged.
    Rejected,
}

/// Segments of one channel, kept in non-decreasing start-time order.
///
/// ```
/// use waveserver::{MergeOutcome, Segment, Waveform};
///
/// let mut waveform = Waveform::new();
/// waveform.set_network("UU").unwrap();
/// waveform.add_segment(Segment::from_parts(1_000_000, 100.0, vec![0i32; 100]).unwrap()).unwrap();
/// waveform.add_segment(Segment::from_parts(0, 100.0, vec![0i32; 100]).unwrap()).unwrap();
/// assert_eq!(waveform.at(0).unwrap().start_time(), 0);
///
/// let outcome = waveform.merge_segments();
/// assert_eq!(outcome, MergeOutcome::Merged { before: 2, after: 1 });
/// assert_eq!(waveform.at(0).unwrap().number_of_samples(), 200);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Waveform {
    network: Option<String>,
    station: Option<String>,
    channel: Option<String>,
    location_code: Option<String>,
    segments: Vec<Segment>,
    start_time: i64,
    end_time: i64,
}

fn required_code(field: &str, code: &str) -> Result<String> {
    let code = normalize_code(code);
    if code.is_empty() {
        return Err(WaveError::InvalidArgument(format!("{field} is empty")));
    }
    Ok(code)
}

impl Waveform {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty waveform carrying the request's channel identity.
    pub fn for_request(request: &Request) -> Self {
        let mut waveform = Self::new();
        waveform.backfill_identity(request);
        waveform
    }

    /// Copy identity fields from `request` into those not yet set.
    pub fn backfill_identity(&mut self, request: &Request) {
        if self.network.is_none() {
            self.network = Some(request.network().to_string());
        }
        if self.station.is_none() {
            self.station = Some(request.station().to_string());
        }
        if self.channel.is_none() {
            self.channel = Some(request.channel().to_string());
        }
        if self.location_code.is_none() {
            self.location_code = request.location_code().map(str::to_string);
        }
    }

    pub fn set_network(&mut self, network: &str) -> Result<()> {
        self.network = Some(required_code("network", network)?);
        Ok(())
    }

    pub fn set_station(&mut self, station: &str) -> Result<()> {
        self.station = Some(required_code("station", station)?);
        Ok(())
    }

    pub fn set_channel(&mut self, channel: &str) -> Result<()> {
        self.channel = Some(required_code("channel", channel)?);
        Ok(())
    }

    /// An empty (or blank) code is stored as `--`.
    pub fn set_location_code(&mut self, location_code: &str) {
        let code = normalize_code(location_code);
        self.location_code = Some(if code.is_empty() {
            BLANK_LOCATION_CODE.to_string()
        } else {
            code
        });
    }

    pub fn network(&self) -> Option<&str> {
        self.network.as_deref()
    }

    pub fn station(&self) -> Option<&str> {
        self.station.as_deref()
    }

    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    pub fn location_code(&self) -> Option<&str> {
        self.location_code.as_deref()
    }

    /// Insert a segment, keeping start-time order.
    ///
    /// Fails when the segment has no sampling rate, no samples, or an end
    /// time past `i64::MAX`.
    pub fn add_segment(&mut self, segment: Segment) -> Result<()> {
        if segment.sampling_rate().is_err() {
            return Err(WaveError::InvalidArgument(
                "segment sampling rate not set".into(),
            ));
        }
        if segment.number_of_samples() == 0 {
            return Err(WaveError::InvalidArgument("segment has no samples".into()));
        }
        segment.end_time()?;
        let in_order = self.segments.is_empty() || segment.start_time() > self.end_time;
        self.segments.push(segment);
        if !in_order {
            self.segments.sort_by_key(Segment::start_time);
        }
        self.update_bounds();
        Ok(())
    }

    /// Merge with [`MergePolicy::default`].
    pub fn merge_segments(&mut self) -> MergeOutcome {
        self.merge(&MergePolicy::default())
    }

    /// Join neighbouring segments per `policy`, then swap the result in only
    /// if it starts at the same time and holds the same number of samples.
    pub fn merge_segments_with(&mut self, policy: &MergePolicy) -> Result<MergeOutcome> {
        if self.segments.len() < 2 {
            return Ok(MergeOutcome::NothingToMerge);
        }
        let factor = policy.sampling_period_factor;
        if factor.is_nan() || factor < 0.0 {
            return Err(WaveError::InvalidArgument(format!(
                "sampling period factor {factor} must be non-negative"
            )));
        }
        Ok(self.merge(policy))
    }

    fn merge(&mut self, policy: &MergePolicy) -> MergeOutcome {
        let Some((first, rest)) = self.segments.split_first() else {
            return MergeOutcome::NothingToMerge;
        };
        if rest.is_empty() {
            return MergeOutcome::NothingToMerge;
        }

        let mut merged = vec![first.clone()];
        for next in rest {
            // `merged` is never empty.
            let tail = merged.len() - 1;
            if joins(&merged[tail], next, policy) && merged[tail].append(next).is_ok() {
                continue;
            }
            log::debug!(
                "gap before segment at {} us; not merging",
                next.start_time()
            );
            merged.push(next.clone());
        }
        self.commit_merge(merged)
    }

    /// Verify a merged segment list against the current one and swap it in.
    pub(crate) fn commit_merge(&mut self, mut merged: Vec<Segment>) -> MergeOutcome {
        let before = self.segments.len();
        merged.sort_by_key(Segment::start_time);

        let samples_before: usize = self.segments.iter().map(Segment::number_of_samples).sum();
        let samples_after: usize = merged.iter().map(Segment::number_of_samples).sum();
        let start_before = self.segments.first().map(Segment::start_time);
        let start_after = merged.first().map(Segment::start_time);

        if start_before != start_after || samples_before != samples_after {
            log::warn!(
                "merge failed verification (start {:?} -> {:?}, samples {} -> {}); keeping {} segments",
                start_before,
                start_after,
                samples_before,
                samples_after,
                before
            );
            return MergeOutcome::Rejected;
        }

        self.segments = merged;
        self.update_bounds();
        let after = self.segments.len();
        log::debug!("merged {before} segments into {after}");
        MergeOutcome::Merged { before, after }
    }

    fn update_bounds(&mut self) {
        if let (Some(front), Some(back)) = (self.segments.first(), self.segments.last()) {
            self.start_time = front.start_time();
            self.end_time = back.end_time().unwrap_or(back.start_time());
        }
    }

    pub fn number_of_segments(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn at(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.segments.iter()
    }

    /// Samples across all segments.
    pub fn number_of_samples(&self) -> usize {
        self.segments.iter().map(Segment::number_of_samples).sum()
    }

    /// Start of the first segment.
    pub fn start_time(&self) -> Option<i64> {
        (!self.segments.is_empty()).then_some(self.start_time)
    }

    /// End of the last segment.
    pub fn end_time(&self) -> Option<i64> {
        (!self.segments.is_empty()).then_some(self.end_time)
    }
}

fn joins(tail: &Segment, next: &Segment, policy: &MergePolicy) -> bool {
    let (Ok(p0), Ok(p1), Ok(tail_end)) = (
        tail.sampling_period(),
        next.sampling_period(),
        tail.end_time(),
    ) else {
        return false;
    };
    if tail.data_type() != next.data_type() {
        return false;
    }
    if (p0 - p1).abs() >= policy.sampling_period_tolerance {
        return false;
    }
    let gap = next.start_time() as f64 * 1e-6 - (tail_end as f64 * 1e-6 + p0);
    gap < p0 * policy.sampling_period_factor
}

impl<'a> IntoIterator for &'a Waveform {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}

impl Serialize for Waveform {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let missing = |field| <S::Error as ser::Error>::custom(format!("{field} not set"));
        let network = self.network.as_deref().ok_or_else(|| missing("network"))?;
        let station = self.station.as_deref().ok_or_else(|| missing("station"))?;
        let channel = self.channel.as_deref().ok_or_else(|| missing("channel"))?;

        let mut s = serializer.serialize_struct("Waveform", 5)?;
        s.serialize_field("network", network)?;
        s.serialize_field("station", station)?;
        s.serialize_field("channel", channel)?;
        s.serialize_field("locationCode", &self.location_code)?;
        if self.segments.is_empty() {
            s.serialize_field("segments", &None::<Vec<Segment>>)?;
        } else {
            s.serialize_field("segments", &self.segments)?;
        }
        s.end()
    }
}

#[derive(Deserialize)]
struct RawWaveform {
    network: String,
    station: String,
    channel: String,
    #[serde(rename = "locationCode", default)]
    location_code: Option<String>,
    #[serde(default)]
    segments: Option<Vec<Segment>>,
}

impl<'de> Deserialize<'de> for Waveform {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = RawWaveform::deserialize(deserializer)?;
        let build = || -> Result<Waveform> {
            let mut waveform = Waveform::new();
            waveform.set_network(&raw.network)?;
            waveform.set_station(&raw.station)?;
            waveform.set_channel(&raw.channel)?;
            if let Some(code) = &raw.location_code {
                waveform.set_location_code(code);
            }
            for segment in raw.segments.iter().flatten() {
                waveform.add_segment(segment.clone())?;
            }
            Ok(waveform)
        };
        build().map_err(de::Error::custom)
    }
}
