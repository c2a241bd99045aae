use thiserror::Error;

/// All errors generated in `sentiment-client`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("invalid server url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unknown command /{0}, type /help for the list of commands")]
    UnknownCommand(String),

    #[error("usage: {0}")]
    Usage(&'static str),
}
