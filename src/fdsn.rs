//! FDSN web service (dataselect) client.

use std::time::Duration;

use chrono::DateTime;
use reqwest::StatusCode;
use reqwest::blocking::Client as HttpClient;
use reqwest::redirect::Policy;

use crate::client::Client;
use crate::config::FdsnConfig;
use crate::request::Request;
use crate::unpack::unpack;
use crate::waveform::{BLANK_LOCATION_CODE, Waveform};
use crate::{Result, WaveError};

const CLIENT_TYPE: &str = "FDSN";
const MAX_REDIRECTS: usize = 10;

/// Fetches miniSEED from an FDSN dataselect endpoint, one blocking GET per
/// request.
///
/// ```no_run
/// use waveserver::{Client, FdsnClient, Request};
///
/// let client = FdsnClient::new("https://service.iris.edu").unwrap();
/// let request = Request::from_seconds("UU", "FORK", "HHZ", 1_700_000_000.0, 1_700_000_060.0).unwrap();
/// let waveform = client.get_data(&request).unwrap();
/// println!("{} segments", waveform.number_of_segments());
/// ```
#[derive(Debug, Clone)]
pub struct FdsnClient {
    base_url: String,
    service: String,
    version: u32,
    http: HttpClient,
}

impl FdsnClient {
    /// Client for `url` with default service, version and timeout.
    pub fn new(url: &str) -> Result<Self> {
        Self::from_config(&FdsnConfig {
            url: url.to_string(),
            ..FdsnConfig::default()
        })
    }

    pub fn from_config(config: &FdsnConfig) -> Result<Self> {
        let url = config.url.trim();
        if url.is_empty() {
            return Err(WaveError::InvalidArgument("URL is empty".into()));
        }
        let base_url = if url.ends_with('/') {
            url.to_string()
        } else {
            format!("{url}/")
        };
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(Policy::limited(MAX_REDIRECTS))
            .build()?;
        Ok(Self {
            base_url,
            service: config.service.clone(),
            version: config.version,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The dataselect query for `request`.
    pub fn query_url(&self, request: &Request) -> Result<String> {
        Ok(format!(
            "{}{}/dataselect/{}/query?network={}&station={}&channel={}&location={}&starttime={}&endtime={}&nodata=404",
            self.base_url,
            self.service,
            self.version,
            request.network(),
            request.station(),
            request.channel(),
            request.location_code().unwrap_or(BLANK_LOCATION_CODE),
            format_time(request.start_time())?,
            format_time(request.end_time())?,
        ))
    }
}

/// `YYYY-MM-DDTHH:MM:SS`, plus `.ffffff` when there is a fractional part.
fn format_time(micros: i64) -> Result<String> {
    let time = DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| WaveError::InvalidArgument(format!("time {micros} us is out of range")))?;
    let mut formatted = time.format("%Y-%m-%dT%H:%M:%S").to_string();
    let fraction = time.timestamp_subsec_micros();
    if fraction != 0 {
        formatted.push_str(&format!(".{fraction:06}"));
    }
    Ok(formatted)
}

impl Client for FdsnClient {
    fn get_data(&self, request: &Request) -> Result<Waveform> {
        let url = self.query_url(request)?;
        log::debug!("performing FDSN query: {url}");

        let response = self
            .http
            .get(&url)
            .send()
            .map_err(|e| WaveError::Transport(format!("request failed with: {e}")))?;
        let status = response.status();
        if status == StatusCode::NO_CONTENT || status == StatusCode::NOT_FOUND {
            log::debug!("no data ({status}): {url}");
            return Ok(Waveform::for_request(request));
        }
        if !status.is_success() {
            return Err(WaveError::Transport(format!(
                "request failed with: HTTP {status}"
            )));
        }
        let body = response
            .bytes()
            .map_err(|e| WaveError::Transport(format!("reading response failed with: {e}")))?;

        let mut waveform = unpack(&body)?;
        waveform.merge_segments();
        if waveform.is_empty() {
            waveform.backfill_identity(request);
        } else {
            log::info!("success: {url}");
        }
        Ok(waveform)
    }

    fn client_type(&self) -> &str {
        CLIENT_TYPE
    }
}
