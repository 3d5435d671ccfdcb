//! Source configuration, loaded from JSON.
//!
//! ```
//! use waveserver::WaveServerConfig;
//!
//! let config = WaveServerConfig::from_json_str(r#"{
//!     "sources": [
//!         { "type": "datalink", "priority": 10, "address": "ring.example.org:16000" },
//!         { "type": "fdsn", "priority": 1 }
//!     ]
//! }"#).unwrap();
//! assert_eq!(config.sources.len(), 2);
//! assert_eq!(config.acceptance_threshold, 90.0);
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::multi_client::{CompletenessPolicy, DEFAULT_ACCEPTANCE_THRESHOLD, GAP_TOLERANCE_FACTOR};
use crate::{Result, WaveError};

/// FDSN dataselect endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FdsnConfig {
    pub url: String,
    pub service: String,
    pub version: u32,
    pub timeout_secs: u64,
}

impl Default for FdsnConfig {
    fn default() -> Self {
        Self {
            url: "https://service.iris.edu/".into(),
            service: "fdsnws".into(),
            version: 1,
            timeout_secs: 120,
        }
    }
}

/// DataLink ring server. `address` is `host:port` and has no default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataLinkConfig {
    pub address: String,
    #[serde(default = "default_client_name")]
    pub client_name: String,
    #[serde(default = "default_datalink_timeout")]
    pub timeout_secs: u64,
    /// How far before the window start streaming begins.
    #[serde(default = "default_lookback")]
    pub lookback_secs: u64,
}

fn default_client_name() -> String {
    "waveserver".into()
}

fn default_datalink_timeout() -> u64 {
    5
}

fn default_lookback() -> u64 {
    10
}

impl Default for DataLinkConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            client_name: default_client_name(),
            timeout_secs: default_datalink_timeout(),
            lookback_secs: default_lookback(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceKind {
    Fdsn(FdsnConfig),
    #[serde(rename = "datalink")]
    DataLink(DataLinkConfig),
}

/// One upstream and its priority; higher is tried first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub priority: i32,
    #[serde(flatten)]
    pub kind: SourceKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveServerConfig {
    #[serde(default = "default_acceptance_threshold")]
    pub acceptance_threshold: f64,
    #[serde(default = "default_gap_tolerance_factor")]
    pub gap_tolerance_factor: f64,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

fn default_acceptance_threshold() -> f64 {
    DEFAULT_ACCEPTANCE_THRESHOLD
}

fn default_gap_tolerance_factor() -> f64 {
    GAP_TOLERANCE_FACTOR
}

impl Default for WaveServerConfig {
    fn default() -> Self {
        Self {
            acceptance_threshold: DEFAULT_ACCEPTANCE_THRESHOLD,
            gap_tolerance_factor: GAP_TOLERANCE_FACTOR,
            sources: Vec::new(),
        }
    }
}

impl WaveServerConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn policy(&self) -> CompletenessPolicy {
        CompletenessPolicy {
            acceptance_threshold: self.acceptance_threshold,
            gap_tolerance_factor: self.gap_tolerance_factor,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.acceptance_threshold.is_finite() {
            return Err(WaveError::Config(format!(
                "invalid acceptance_threshold: {}",
                self.acceptance_threshold
            )));
        }
        if !self.gap_tolerance_factor.is_finite() || self.gap_tolerance_factor < 0.0 {
            return Err(WaveError::Config(format!(
                "invalid gap_tolerance_factor: {}. Must be non-negative",
                self.gap_tolerance_factor
            )));
        }
        for source in &self.sources {
            match &source.kind {
                SourceKind::Fdsn(fdsn) if fdsn.url.trim().is_empty() => {
                    return Err(WaveError::Config("fdsn source has an empty url".into()));
                }
                SourceKind::DataLink(datalink) if datalink.address.trim().is_empty() => {
                    return Err(WaveError::Config(
                        "datalink source has an empty address".into(),
                    ));
                }
                _ => {}
            }
        }
        Ok(())
    }
}
