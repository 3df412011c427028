// src/error.rs
use thiserror::Error;

use crate::notify::TransmitError;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, TrendError>;

#[derive(Debug, Error)]
pub enum TrendError {
    #[error("source {source_id} fetch failed: {reason}")]
    SourceFetch { source_id: String, reason: String },

    #[error("parse error at {location}: {reason}")]
    Parse { location: String, reason: String },

    #[error("channel {channel} transmit failed")]
    ChannelTransmit {
        channel: String,
        #[source]
        source: TransmitError,
    },

    #[error("configuration: {0}")]
    Configuration(String),

    #[error("consistency: {0}")]
    Consistency(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

impl TrendError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn parse(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            location: location.into(),
            reason: reason.into(),
        }
    }
}
