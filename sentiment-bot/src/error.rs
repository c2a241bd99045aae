use crate::subscriber::SubscriberId;
use sentiment_data::error::DataError;
use thiserror::Error;

/// All errors generated in `sentiment-bot`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BotError {
    #[error("{0}")]
    Data(#[from] DataError),

    #[error("no saved signal for {0}, save a signal first")]
    NoSubscription(SubscriberId),

    #[error("connection is not identified, send a hello command first")]
    NotIdentified,

    #[error("subscription store: {0}")]
    Store(String),

    #[error("protocol: {0}")]
    Protocol(String),

    #[error("server: {0}")]
    Server(String),
}

impl From<serde_json::Error> for BotError {
    fn from(value: serde_json::Error) -> Self {
        Self::Protocol(value.to_string())
    }
}
