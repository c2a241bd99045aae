/// Sentiment Client - terminal access to the sentiment bot
///
/// - [`websocket`]: reconnecting WebSocket client speaking the bot's JSON protocol
/// - [`command`]: parsing of terminal input lines into bot commands
pub mod command;
pub mod error;
pub mod websocket;

// Re-export commonly used types for convenience
pub use command::{HELP, Input, parse_line};
pub use error::ClientError;
pub use websocket::{ChatClient, ChatClientConfig, ChatHandle, ConnectionStatus};
