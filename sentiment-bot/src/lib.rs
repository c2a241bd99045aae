/// Sentiment Bot - chat commands & recurring sentiment notifications
///
/// Serves sentiment analysis to chat subscribers over WebSocket:
/// - [`handler`]: one-shot analysis, saved signals & loop management commands
/// - [`scheduler`]: recurring per-subscriber analysis jobs
/// - [`store`]: JSON file persisted subscriber signals
/// - [`server`]: the WebSocket chat server
///
/// The library also includes:
/// - The JSON command protocol shared with chat clients
/// - A session registry delivering notifications to connected subscribers
pub mod config;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod scheduler;
pub mod server;
pub mod session;
pub mod store;
pub mod subscriber;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-export commonly used types for convenience
pub use config::BotConfig;
pub use error::BotError;
pub use handler::CommandHandler;
pub use protocol::{ClientCommand, ServerMessage};
pub use scheduler::{
    Delivery, LoopInfo, LoopStatus, Notifier, RecurringJobScheduler,
    timer::{Timer, TimerHandle, TokioTimer},
};
pub use server::ChatServer;
pub use session::SessionRegistry;
pub use store::{Subscription, SubscriptionStore};
pub use subscriber::SubscriberId;
