use crate::{
    protocol::ServerMessage,
    scheduler::{Delivery, Notifier},
    subscriber::SubscriberId,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

/// Unique identifier of a connected session.
pub type SessionId = u64;

#[derive(Debug)]
struct Session {
    id: SessionId,
    tx: mpsc::Sender<ServerMessage>,
}

/// Connected sessions of every subscriber.
///
/// A subscriber may be connected from several sessions at once, each receiving every
/// notification. Notifications for a subscriber with no sessions are dropped.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    next_id: AtomicU64,
    sessions: Mutex<HashMap<SubscriberId, Vec<Session>>>,
}

impl SessionRegistry {
    pub fn register(
        &self,
        subscriber: SubscriberId,
        tx: mpsc::Sender<ServerMessage>,
    ) -> SessionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut sessions = self.sessions.lock();
        let subscriber_sessions = sessions.entry(subscriber.clone()).or_default();
        subscriber_sessions.push(Session { id, tx });

        debug!(%subscriber, session = id, sessions = subscriber_sessions.len(), "registered session");
        id
    }

    pub fn unregister(&self, subscriber: &SubscriberId, session: SessionId) {
        let mut sessions = self.sessions.lock();
        if let Some(subscriber_sessions) = sessions.get_mut(subscriber) {
            subscriber_sessions.retain(|existing| existing.id != session);
            if subscriber_sessions.is_empty() {
                sessions.remove(subscriber);
            }
        }

        debug!(%subscriber, session, "unregistered session");
    }

    pub fn session_count(&self, subscriber: &SubscriberId) -> usize {
        self.sessions
            .lock()
            .get(subscriber)
            .map_or(0, |sessions| sessions.len())
    }

    /// Send `message` to every session of `subscriber`, returning the number of sessions reached.
    ///
    /// Closed sessions are removed.
    pub fn send(&self, subscriber: &SubscriberId, message: ServerMessage) -> usize {
        let mut sessions = self.sessions.lock();
        let Some(subscriber_sessions) = sessions.get_mut(subscriber) else {
            return 0;
        };

        let mut delivered = 0;
        subscriber_sessions.retain(|session| match session.tx.try_send(message.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                warn!(%subscriber, session = session.id, "session outbound buffer full, dropping message");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });

        if subscriber_sessions.is_empty() {
            sessions.remove(subscriber);
        }

        delivered
    }
}

#[async_trait]
impl Notifier for SessionRegistry {
    async fn notify(&self, subscriber: &SubscriberId, delivery: Delivery) {
        let message = ServerMessage::Notification {
            text: delivery.render(),
            result: delivery.result().copied(),
        };

        match self.send(subscriber, message) {
            0 => info!(%subscriber, "subscriber offline, dropping notification"),
            sessions => debug!(%subscriber, sessions, "delivered notification"),
        }
    }
}
