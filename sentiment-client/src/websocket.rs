/// WebSocket client for chatting with the sentiment bot
///
/// Provides automatic reconnection, re-identification and heartbeat
use crate::error::ClientError;
use futures::{SinkExt, StreamExt};
use sentiment_bot::{
    protocol::{ClientCommand, ServerMessage},
    subscriber::SubscriberId,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use url::Url;

/// WebSocket client configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ChatClientConfig {
    /// WebSocket server URL
    pub url: String,
    /// Subscriber identified with on every connect
    pub subscriber: SubscriberId,
    /// Ping interval to keep connection alive
    pub ping_interval: Duration,
    /// Reconnection delay after disconnect
    pub reconnect_delay: Duration,
    /// Maximum channel buffer size for server messages
    pub channel_buffer_size: usize,
}

impl Default for ChatClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:9001".to_string(),
            subscriber: SubscriberId::new("local"),
            ping_interval: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(2),
            channel_buffer_size: 100,
        }
    }
}

impl ChatClientConfig {
    /// Create a new configuration with custom URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Configuration from `WS_URL` & `SUBSCRIBER_ID` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(url) = lookup("WS_URL") {
            config.url = url;
        }
        if let Some(subscriber) = lookup("SUBSCRIBER_ID").map(SubscriberId::new) {
            if !subscriber.as_str().is_empty() {
                config.subscriber = subscriber;
            }
        }
        config
    }

    pub fn with_subscriber(mut self, subscriber: impl Into<SubscriberId>) -> Self {
        self.subscriber = subscriber.into();
        self
    }

    /// Set ping interval
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Set reconnect delay
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set channel buffer size
    pub fn with_channel_buffer_size(mut self, size: usize) -> Self {
        self.channel_buffer_size = size;
        self
    }

    /// Parse & validate the server URL, which must use the `ws` or `wss` scheme.
    pub fn validate_url(&self) -> Result<Url, ClientError> {
        let invalid = |reason: String| ClientError::InvalidUrl {
            url: self.url.clone(),
            reason,
        };

        let url = Url::parse(&self.url).map_err(|error| invalid(error.to_string()))?;
        match url.scheme() {
            "ws" | "wss" => Ok(url),
            scheme => Err(invalid(format!("unsupported scheme {scheme}"))),
        }
    }
}

/// Connection status updates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Reconnecting,
}

/// Channels of a started [`ChatClient`].
#[derive(Debug)]
pub struct ChatHandle {
    /// Commands to send; buffered while disconnected. Dropping it stops the client.
    pub commands: mpsc::Sender<ClientCommand>,
    pub messages: mpsc::Receiver<ServerMessage>,
    pub status: mpsc::Receiver<ConnectionStatus>,
}

/// WebSocket chat client
#[derive(Debug)]
pub struct ChatClient {
    config: ChatClientConfig,
}

impl ChatClient {
    pub fn new(config: ChatClientConfig) -> Result<Self, ClientError> {
        config.validate_url()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChatClientConfig {
        &self.config
    }

    /// Start the WebSocket client connection loop
    pub fn start(self) -> ChatHandle {
        let (command_tx, command_rx) = mpsc::channel(self.config.channel_buffer_size);
        let (message_tx, message_rx) = mpsc::channel(self.config.channel_buffer_size);
        let (status_tx, status_rx) = mpsc::channel(10);

        tokio::spawn(run_websocket_loop(
            self.config,
            command_rx,
            message_tx,
            status_tx,
        ));

        ChatHandle {
            commands: command_tx,
            messages: message_rx,
            status: status_rx,
        }
    }
}

/// Why a single connection ended.
enum Disconnect {
    /// Connection lost, reconnect
    Lost,
    /// Command sender or message receiver dropped, stop the client
    Shutdown,
}

/// Main WebSocket connection loop with auto-reconnect
async fn run_websocket_loop(
    config: ChatClientConfig,
    mut command_rx: mpsc::Receiver<ClientCommand>,
    message_tx: mpsc::Sender<ServerMessage>,
    status_tx: mpsc::Sender<ConnectionStatus>,
) {
    info!(url = %config.url, subscriber = %config.subscriber, "starting chat client");

    loop {
        let _ = status_tx.send(ConnectionStatus::Reconnecting).await;

        match connect_async(config.url.as_str()).await {
            Ok((ws_stream, _)) => {
                info!(url = %config.url, "connected to chat server");
                let _ = status_tx.send(ConnectionStatus::Connected).await;

                let disconnect =
                    run_connection(ws_stream, &config, &mut command_rx, &message_tx).await;
                let _ = status_tx.send(ConnectionStatus::Disconnected).await;

                if let Disconnect::Shutdown = disconnect {
                    info!("chat client stopped");
                    return;
                }
                warn!("connection closed, will reconnect...");
            }
            Err(error) => {
                error!(url = %config.url, %error, "failed to connect");
                let _ = status_tx.send(ConnectionStatus::Disconnected).await;
            }
        }

        debug!(delay = ?config.reconnect_delay, "waiting before reconnecting");
        tokio::time::sleep(config.reconnect_delay).await;
    }
}

async fn run_connection<S>(
    ws_stream: S,
    config: &ChatClientConfig,
    command_rx: &mut mpsc::Receiver<ClientCommand>,
    message_tx: &mpsc::Sender<ServerMessage>,
) -> Disconnect
where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
        + futures::Sink<Message>
        + Unpin,
{
    let (mut write, mut read) = ws_stream.split();

    // Identify on every (re)connect
    let hello = ClientCommand::Hello {
        subscriber: config.subscriber.clone(),
    };
    if !send_command(&mut write, &hello).await {
        return Disconnect::Lost;
    }

    let mut ping = tokio::time::interval(config.ping_interval);
    ping.tick().await;

    loop {
        tokio::select! {
            message = read.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ServerMessage>(text.as_str()) {
                        Ok(message) => {
                            if message_tx.send(message).await.is_err() {
                                warn!("message receiver dropped, stopping client");
                                return Disconnect::Shutdown;
                            }
                        }
                        Err(error) => {
                            error!(%error, "failed to parse server message");
                            debug!(raw = %text.as_str(), "unparsable server message");
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("server closed connection");
                    return Disconnect::Lost;
                }
                Some(Ok(_)) => {}
                Some(Err(error)) => {
                    error!(%error, "WebSocket error");
                    return Disconnect::Lost;
                }
            },
            command = command_rx.recv() => match command {
                Some(command) => {
                    if !send_command(&mut write, &command).await {
                        warn!(command = command.name(), "failed to send command");
                        return Disconnect::Lost;
                    }
                }
                None => {
                    let _ = write.close().await;
                    return Disconnect::Shutdown;
                }
            },
            _ = ping.tick() => {
                if write.send(Message::Ping(Vec::new().into())).await.is_err() {
                    debug!("failed to send ping, connection likely dead");
                    return Disconnect::Lost;
                }
            }
        }
    }
}

/// Serialise & send `command`, returning false if the connection is unusable.
async fn send_command<W>(write: &mut W, command: &ClientCommand) -> bool
where
    W: futures::Sink<Message> + Unpin,
{
    match serde_json::to_string(command) {
        Ok(json) => write.send(Message::Text(json.into())).await.is_ok(),
        Err(error) => {
            error!(%error, command = command.name(), "failed to serialise command");
            false
        }
    }
}
