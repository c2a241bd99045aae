use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors generated in `sentiment-data`.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Error)]
pub enum DataError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("request rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("trade fetch failed after {attempts} attempts: {reason}")]
    TransientFetch { attempts: u32, reason: String },

    #[error("invalid interval: {0}")]
    InvalidInterval(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("invalid trade window: start {start} is not before end {end}")]
    InvalidWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl DataError {
    /// Determine if a failed page request may succeed when re-sent unchanged.
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_transient(&self) -> bool {
        match self {
            DataError::Http(_) | DataError::Parse(_) => true,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for DataError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            Self::Parse(value.to_string())
        } else {
            Self::Http(value.to_string())
        }
    }
}
