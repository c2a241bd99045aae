use sentiment_data::config::SentimentConfig;
use std::{net::SocketAddr, path::PathBuf};

pub const DEFAULT_DATA_FILE: &str = "data/user_data.json";

/// Runtime configuration of the chat bot server.
#[derive(Debug, Clone, PartialEq)]
pub struct BotConfig {
    /// WebSocket listen address (env: `WS_ADDR`).
    pub ws_addr: SocketAddr,
    /// Subscription store location (env: `DATA_FILE`).
    pub data_file: PathBuf,
    pub sentiment: SentimentConfig,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            ws_addr: default_ws_addr(),
            data_file: PathBuf::from(DEFAULT_DATA_FILE),
            sentiment: SentimentConfig::default(),
        }
    }
}

impl BotConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            ws_addr: lookup("WS_ADDR")
                .and_then(|addr| addr.trim().parse().ok())
                .unwrap_or_else(default_ws_addr),
            data_file: lookup("DATA_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_FILE)),
            sentiment: SentimentConfig::from_lookup(&lookup),
        }
    }
}

fn default_ws_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 9001))
}
