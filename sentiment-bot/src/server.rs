use crate::{
    error::BotError,
    handler::CommandHandler,
    protocol::{ClientCommand, ServerMessage},
    session::{SessionId, SessionRegistry},
    subscriber::SubscriberId,
};
use futures::{SinkExt, Stream, StreamExt};
use std::{net::SocketAddr, sync::Arc};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::mpsc,
};
use tokio_tungstenite::{
    accept_async,
    tungstenite::{Error as WsError, Message},
};
use tracing::{debug, error, info, warn};

/// Capacity of each connection's outbound message buffer.
pub const OUTBOUND_BUFFER: usize = 64;

/// WebSocket server accepting chat connections.
#[derive(Debug)]
pub struct ChatServer {
    handler: CommandHandler,
    sessions: Arc<SessionRegistry>,
}

impl ChatServer {
    pub fn new(handler: CommandHandler, sessions: Arc<SessionRegistry>) -> Self {
        Self { handler, sessions }
    }

    /// Bind `addr` and serve connections until the task is dropped.
    pub async fn run(&self, addr: SocketAddr) -> Result<(), BotError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|error| BotError::Server(format!("failed to bind {addr}: {error}")))?;

        info!(%addr, "WebSocket server bound");
        self.serve(listener).await
    }

    /// Serve connections accepted by `listener`.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), BotError> {
        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    info!(%peer_addr, "new WebSocket connection");
                    tokio::spawn(handle_client(
                        stream,
                        peer_addr,
                        self.handler.clone(),
                        self.sessions.clone(),
                    ));
                }
                Err(error) => warn!(%error, "failed to accept connection"),
            }
        }
    }
}

/// Handle an individual WebSocket client connection.
async fn handle_client(
    stream: TcpStream,
    peer_addr: SocketAddr,
    handler: CommandHandler,
    sessions: Arc<SessionRegistry>,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(error) => {
            error!(%peer_addr, %error, "WebSocket handshake failed");
            return;
        }
    };

    debug!(%peer_addr, "WebSocket handshake completed");

    let (mut ws_sender, ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(OUTBOUND_BUFFER);
    let _ = tx.send(ServerMessage::welcome()).await;

    // Forward replies & notifications to this client
    let mut send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(error) => {
                    warn!(%peer_addr, %error, "failed to serialise server message");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let mut connection = Connection {
        peer_addr,
        tx,
        handler,
        sessions,
        binding: None,
    };

    tokio::select! {
        _ = &mut send_task => {
            debug!(%peer_addr, "send task completed");
        }
        _ = connection.receive(ws_receiver) => {
            debug!(%peer_addr, "receive loop completed");
        }
    }

    send_task.abort();
    info!(
        %peer_addr,
        subscriber = ?connection.binding.as_ref().map(|(subscriber, _)| subscriber),
        "WebSocket connection closed"
    );
}

/// Per-connection state: the subscriber the connection is bound to by `hello`, if any.
///
/// Dropping the connection unregisters its session.
struct Connection {
    peer_addr: SocketAddr,
    tx: mpsc::Sender<ServerMessage>,
    handler: CommandHandler,
    sessions: Arc<SessionRegistry>,
    binding: Option<(SubscriberId, SessionId)>,
}

impl Connection {
    async fn receive<S>(&mut self, mut ws_receiver: S)
    where
        S: Stream<Item = Result<Message, WsError>> + Unpin,
    {
        while let Some(message) = ws_receiver.next().await {
            match message {
                Ok(Message::Text(text)) => self.on_text(text.as_str()).await,
                Ok(Message::Close(_)) => break,
                Ok(Message::Ping(_)) => debug!(peer_addr = %self.peer_addr, "received ping"),
                Ok(_) => {}
                Err(error) => {
                    warn!(peer_addr = %self.peer_addr, %error, "WebSocket error");
                    break;
                }
            }
        }
    }

    async fn on_text(&mut self, text: &str) {
        let command = match serde_json::from_str::<ClientCommand>(text) {
            Ok(command) => command,
            Err(error) => {
                debug!(peer_addr = %self.peer_addr, %error, "invalid command");
                self.send(ServerMessage::error(BotError::from(error).to_string()))
                    .await;
                return;
            }
        };

        if let ClientCommand::Hello { subscriber } = &command {
            if let Err(error) = self.bind(subscriber) {
                self.send(ServerMessage::error(error.to_string())).await;
                return;
            }
        }

        let Some((subscriber, _)) = &self.binding else {
            self.send(ServerMessage::error(BotError::NotIdentified.to_string()))
                .await;
            return;
        };

        // Commands may be slow (eg/ analysis), so each runs on its own task
        let subscriber = subscriber.clone();
        let handler = self.handler.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let message = handler
                .handle(&subscriber, command)
                .await
                .unwrap_or_else(|error| ServerMessage::error(error.to_string()));
            let _ = tx.send(message).await;
        });
    }

    /// Bind the connection to `subscriber`, replacing any previous binding.
    fn bind(&mut self, subscriber: &SubscriberId) -> Result<(), BotError> {
        let subscriber = SubscriberId::new(subscriber.as_str());
        if subscriber.as_str().is_empty() {
            return Err(BotError::Protocol(
                "hello requires a non-empty subscriber".to_string(),
            ));
        }

        self.unbind();
        let session = self.sessions.register(subscriber.clone(), self.tx.clone());
        info!(peer_addr = %self.peer_addr, %subscriber, "connection identified");
        self.binding = Some((subscriber, session));
        Ok(())
    }

    fn unbind(&mut self) {
        if let Some((subscriber, session)) = self.binding.take() {
            self.sessions.unregister(&subscriber, session);
        }
    }

    async fn send(&self, message: ServerMessage) {
        let _ = self.tx.send(message).await;
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.unbind();
    }
}
