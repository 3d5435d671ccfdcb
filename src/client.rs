//! The interface every waveform source implements.

use std::collections::HashMap;

use crate::Result;
use crate::request::Request;
use crate::waveform::Waveform;

/// A source of waveforms.
///
/// Only [`Client::get_data`] is required; batches come for free.
pub trait Client: Send + Sync {
    /// Fetch one channel window.
    fn get_data(&self, request: &Request) -> Result<Waveform>;

    /// Short name of the source kind, e.g. `"FDSN"`.
    fn client_type(&self) -> &str;

    /// Fetch many windows, one result per request in input order.
    ///
    /// Identical requests are fetched once and their result is cloned. A
    /// failed fetch is logged and replaced by an empty waveform carrying the
    /// request's identity.
    fn get_data_batch(&self, requests: &[Request]) -> Vec<Waveform> {
        let mut fetched: HashMap<&Request, usize> = HashMap::with_capacity(requests.len());
        let mut results: Vec<Waveform> = Vec::with_capacity(requests.len());
        for request in requests {
            if let Some(&index) = fetched.get(request) {
                log::debug!("duplicate request for {}.{}", request.network(), request.station());
                let copy = results[index].clone();
                results.push(copy);
                continue;
            }
            let waveform = match self.get_data(request) {
                Ok(waveform) => waveform,
                Err(e) => {
                    log::warn!(
                        "{} failed for {}.{}.{}: {e}",
                        self.client_type(),
                        request.network(),
                        request.station(),
                        request.channel()
                    );
                    Waveform::for_request(request)
                }
            };
            fetched.insert(request, results.len());
            results.push(waveform);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WaveError;
    use crate::segment::Segment;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
    }

    impl Client for Counting {
        fn get_data(&self, request: &Request) -> Result<Waveform> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if request.station() == "FAIL" {
                return Err(WaveError::Transport("connection refused".into()));
            }
            let mut waveform = Waveform::for_request(request);
            waveform.add_segment(Segment::from_parts(request.start_time(), 1.0, vec![n as i32])?)?;
            Ok(waveform)
        }

        fn client_type(&self) -> &str {
            "counting"
        }
    }

    fn request(station: &str) -> Request {
        Request::new("UU", station, "HHZ", 0, 10_000_000).unwrap()
    }

    #[test]
    fn test_batch_deduplicates() {
        let client = Counting {
            calls: AtomicUsize::new(0),
        };
        let r = request("FORK");
        let results = client.get_data_batch(&[r.clone(), r.clone(), r]);
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|w| w == &results[0]));
    }

    #[test]
    fn test_batch_keeps_order_and_isolates_failures() {
        let client = Counting {
            calls: AtomicUsize::new(0),
        };
        let requests = [request("A"), request("FAIL"), request("B"), request("A")];
        let results = client.get_data_batch(&requests);
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);

        let stations: Vec<_> = results.iter().map(|w| w.station().unwrap()).collect();
        assert_eq!(stations, ["A", "FAIL", "B", "A"]);
        assert!(results[1].is_empty());
        assert_eq!(results[1].network(), Some("UU"));
        assert_eq!(results[0], results[3]);
        assert_ne!(results[0], results[2]);
    }
}
