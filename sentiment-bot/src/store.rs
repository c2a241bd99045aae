use crate::{error::BotError, subscriber::SubscriberId};
use parking_lot::Mutex;
use sentiment_data::{
    error::DataError,
    query::{SentimentQuery, parse_symbol},
    timeframe::Timeframe,
    trade::Symbol,
};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};
use tracing::{info, warn};

/// Saved signal of a subscriber: the symbol & lookback analysed on request or on a loop.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Subscription {
    pub symbol: Symbol,
    pub timeframe: SmolStr,
}

impl Subscription {
    /// Validate and normalise a symbol & timeframe pair.
    pub fn parse(symbol: &str, timeframe: &str) -> Result<Self, DataError> {
        let symbol = parse_symbol(symbol)?;
        let timeframe = timeframe.parse::<Timeframe>()?;
        Ok(Self {
            symbol,
            timeframe: SmolStr::new(timeframe.label()),
        })
    }

    pub fn query(&self, whale_threshold: f64) -> Result<SentimentQuery, DataError> {
        SentimentQuery::parse(&format!("{self}"), whale_threshold)
    }
}

impl std::fmt::Display for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.symbol, self.timeframe)
    }
}

/// JSON file backed mapping of [`SubscriberId`] to [`Subscription`].
///
/// The whole mapping is rewritten on every change.
#[derive(Debug)]
pub struct SubscriptionStore {
    path: PathBuf,
    subscriptions: Mutex<BTreeMap<SubscriberId, Subscription>>,
}

impl SubscriptionStore {
    /// Load the store from `path`. A missing or unreadable file yields an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let subscriptions = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(subscriptions) => subscriptions,
                Err(error) => {
                    warn!(path = %path.display(), %error, "corrupt subscription store, starting empty");
                    BTreeMap::new()
                }
            },
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(error) => {
                warn!(path = %path.display(), %error, "failed to read subscription store, starting empty");
                BTreeMap::new()
            }
        };

        info!(
            path = %path.display(),
            subscriptions = subscriptions.len(),
            "loaded subscription store"
        );

        Self {
            path,
            subscriptions: Mutex::new(subscriptions),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, subscriber: &SubscriberId) -> Option<Subscription> {
        self.subscriptions.lock().get(subscriber).cloned()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert or replace the subscription of `subscriber` and persist the store.
    ///
    /// The in-memory store is only updated once the write succeeded.
    pub fn set(&self, subscriber: SubscriberId, subscription: Subscription) -> Result<(), BotError> {
        let mut subscriptions = self.subscriptions.lock();
        let mut updated = subscriptions.clone();
        updated.insert(subscriber, subscription);

        self.save(&updated)?;
        *subscriptions = updated;
        Ok(())
    }

    /// Remove the subscription of `subscriber`, persisting the store if one existed.
    pub fn remove(&self, subscriber: &SubscriberId) -> Result<Option<Subscription>, BotError> {
        let mut subscriptions = self.subscriptions.lock();
        if !subscriptions.contains_key(subscriber) {
            return Ok(None);
        }

        let mut updated = subscriptions.clone();
        let removed = updated.remove(subscriber);

        self.save(&updated)?;
        *subscriptions = updated;
        Ok(removed)
    }

    fn save(&self, subscriptions: &BTreeMap<SubscriberId, Subscription>) -> Result<(), BotError> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|error| {
                BotError::Store(format!("failed to create {}: {error}", parent.display()))
            })?;
        }

        let contents = serde_json::to_string_pretty(subscriptions)
            .map_err(|error| BotError::Store(error.to_string()))?;

        std::fs::write(&self.path, contents).map_err(|error| {
            BotError::Store(format!("failed to write {}: {error}", self.path.display()))
        })
    }
}
