use crate::subscriber::SubscriberId;
use chrono::{DateTime, Utc};
use sentiment_data::score::SentimentResult;
use serde::{Deserialize, Serialize};

/// Client -> server command, JSON tagged by `type`.
///
/// eg/ `{"type": "set_signal", "symbol": "BTCUSDT", "timeframe": "4h"}`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Bind the connection to a subscriber.
    Hello { subscriber: SubscriberId },
    /// One-shot analysis of a free-form query, eg/ "BTCUSDT 1 day".
    Analyze { query: String },
    SetSignal { symbol: String, timeframe: String },
    ResendSignal,
    EnableLoop { interval: String },
    LoopStatus,
    StopLoop,
}

impl ClientCommand {
    pub fn name(&self) -> &'static str {
        match self {
            ClientCommand::Hello { .. } => "hello",
            ClientCommand::Analyze { .. } => "analyze",
            ClientCommand::SetSignal { .. } => "set_signal",
            ClientCommand::ResendSignal => "resend_signal",
            ClientCommand::EnableLoop { .. } => "enable_loop",
            ClientCommand::LoopStatus => "loop_status",
            ClientCommand::StopLoop => "stop_loop",
        }
    }
}

/// Server -> client message, JSON tagged by `type`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        message: String,
        timestamp: DateTime<Utc>,
    },
    /// Response to a single command.
    Reply {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<SentimentResult>,
    },
    /// Unsolicited recurring job delivery.
    Notification {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<SentimentResult>,
    },
    Error { text: String },
}

impl ServerMessage {
    pub fn welcome() -> Self {
        Self::Welcome {
            message: "Connected to sentiment bot, send hello to identify".to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn reply(text: impl Into<String>) -> Self {
        Self::Reply {
            text: text.into(),
            result: None,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::Error { text: text.into() }
    }

    pub fn text(&self) -> &str {
        match self {
            ServerMessage::Welcome { message, .. } => message,
            ServerMessage::Reply { text, .. }
            | ServerMessage::Notification { text, .. }
            | ServerMessage::Error { text } => text,
        }
    }
}
