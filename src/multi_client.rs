//! Prioritized fan-out over several sources.
//!
//! Sources are asked in priority order. The first answer that covers enough
//! of the requested window wins; otherwise the most complete answer seen is
//! returned.

use std::cmp::Reverse;

use crate::Result;
use crate::client::Client;
use crate::config::{SourceKind, WaveServerConfig};
use crate::datalink::DataLinkClient;
use crate::fdsn::FdsnClient;
use crate::request::Request;
use crate::waveform::Waveform;

/// Completeness, in percent, at which an answer is accepted without asking
/// lower-priority sources.
pub const DEFAULT_ACCEPTANCE_THRESHOLD: f64 = 90.0;

/// An inner gap counts as missing data once it exceeds this many sampling
/// periods of the segment before it.
pub const GAP_TOLERANCE_FACTOR: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletenessPolicy {
    pub acceptance_threshold: f64,
    pub gap_tolerance_factor: f64,
}

impl Default for CompletenessPolicy {
    fn default() -> Self {
        Self {
            acceptance_threshold: DEFAULT_ACCEPTANCE_THRESHOLD,
            gap_tolerance_factor: GAP_TOLERANCE_FACTOR,
        }
    }
}

/// How much of the request's window `waveform` covers, in percent.
///
/// Segments are expected in time order. Overlapping or out-of-window data can
/// push the score outside `[0, 100]`; it is not clamped.
pub fn percent_complete(waveform: &Waveform, request: &Request, gap_tolerance_factor: f64) -> f64 {
    if waveform.is_empty() {
        return 0.0;
    }
    let (start, end) = (request.start_time(), request.end_time());
    let requested = request.duration();
    if requested == 0 {
        return 100.0;
    }

    let spans: Result<Vec<(i64, i64, f64)>> = waveform
        .iter()
        .map(|s| Ok((s.start_time(), s.end_time()?, s.sampling_period()?)))
        .collect();
    let Ok(spans) = spans else {
        return 0.0;
    };

    let mut missing: i64 = 0;
    if let &[(first_start, last_end, _)] = spans.as_slice() {
        if first_start > start {
            missing = missing.saturating_add(first_start.saturating_sub(start));
        }
        if last_end < end {
            missing = missing.saturating_add(end.saturating_sub(last_end));
        }
    } else {
        let Some(first) = spans.iter().position(|&(_, e, _)| e >= start) else {
            return 0.0;
        };
        if spans[first].0 >= start {
            missing = missing.saturating_add(spans[first].0.saturating_sub(start));
        }
        let Some(last) = (first..spans.len()).rev().find(|&i| spans[i].0 <= end) else {
            return 0.0;
        };
        if spans[last].1 <= end {
            missing = missing.saturating_add(end.saturating_sub(spans[last].1));
        }
        for pair in spans[first..=last].windows(2) {
            let (_, end0, period0) = pair[0];
            let gap = pair[1].0.saturating_sub(end0);
            if gap as f64 * 1e-6 > gap_tolerance_factor * period0 {
                log::debug!("gap of {gap} us counts as missing");
                missing = missing.saturating_add(gap);
            }
        }
    }
    100.0 * (1.0 - missing as f64 / requested as f64)
}

/// Sources in descending priority order.
///
/// ```
/// use waveserver::{Client, MultiClient, Request};
///
/// let multi = MultiClient::new();
/// let request = Request::new("UU", "FORK", "HHZ", 0, 60_000_000).unwrap();
/// let waveform = multi.get_data(&request).unwrap();
/// assert!(waveform.is_empty());
/// assert_eq!(waveform.station(), Some("FORK"));
/// ```
#[derive(Default)]
pub struct MultiClient {
    clients: Vec<(i32, Box<dyn Client>)>,
    policy: CompletenessPolicy,
}

impl MultiClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, policy: CompletenessPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Build every configured source. A source that cannot be built is
    /// logged and left out.
    pub fn from_config(config: &WaveServerConfig) -> Self {
        let mut multi = Self::new().with_policy(config.policy());
        for source in &config.sources {
            let built: Result<Box<dyn Client>> = match &source.kind {
                SourceKind::Fdsn(fdsn) => {
                    FdsnClient::from_config(fdsn).map(|c| Box::new(c) as Box<dyn Client>)
                }
                SourceKind::DataLink(datalink) => {
                    DataLinkClient::from_config(datalink).map(|c| Box::new(c) as Box<dyn Client>)
                }
            };
            match built {
                Ok(client) => multi.insert(client, source.priority),
                Err(e) => log::warn!("skipping source {:?}: {e}", source.kind),
            }
        }
        multi
    }

    /// Add a source. Sources of equal priority keep insertion order.
    pub fn insert(&mut self, client: Box<dyn Client>, priority: i32) {
        self.clients.push((priority, client));
        self.clients.sort_by_key(|&(priority, _)| Reverse(priority));
    }

    pub fn policy(&self) -> CompletenessPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// `(priority, client type)` in the order sources are tried.
    pub fn sources(&self) -> impl Iterator<Item = (i32, &str)> {
        self.clients
            .iter()
            .map(|(priority, client)| (*priority, client.client_type()))
    }
}

impl Client for MultiClient {
    /// Never fails: with no usable answer the result is an empty waveform
    /// named after the request.
    fn get_data(&self, request: &Request) -> Result<Waveform> {
        let mut best: Option<(f64, Waveform)> = None;
        for (_, client) in &self.clients {
            let mut waveform = match client.get_data(request) {
                Ok(waveform) => waveform,
                Err(e) => {
                    log::warn!("failed to request data from {}: {e}", client.client_type());
                    continue;
                }
            };
            waveform.backfill_identity(request);

            let completeness =
                percent_complete(&waveform, request, self.policy.gap_tolerance_factor);
            log::debug!("{} returned {completeness:.1}% complete", client.client_type());
            if completeness >= self.policy.acceptance_threshold {
                return Ok(waveform);
            }
            let best_so_far = best.as_ref().map_or(0.0, |(score, _)| *score);
            if completeness > best_so_far {
                best = Some((completeness, waveform));
            }
        }
        Ok(best.map_or_else(|| Waveform::for_request(request), |(_, waveform)| waveform))
    }

    fn client_type(&self) -> &str {
        "MultiClient"
    }
}
