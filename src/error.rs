//! Error types for waveform acquisition and assembly.

use thiserror::Error;

use crate::mseed::MseedError;

#[derive(Debug, Error)]
pub enum WaveError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("stream {0} is not offered by the server")]
    UnknownStream(String),

    #[error("{0} not set")]
    NotSet(&'static str),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("decode error: {0}")]
    Decode(#[from] MseedError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl WaveError {
    /// Caller or input errors. Retrying the same call cannot succeed.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_) | Self::UnknownStream(_) | Self::NotSet(_)
        )
    }

    /// Upstream failures a caller can recover from by trying another source.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Http(_) | Self::Io(_) | Self::Protocol(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, WaveError>;
