use crate::{
    error::BotError,
    protocol::{ClientCommand, ServerMessage},
    scheduler::RecurringJobScheduler,
    store::{Subscription, SubscriptionStore},
    subscriber::SubscriberId,
};
use chrono::Utc;
use sentiment_data::{
    pipeline::SentimentAnalyzer, query::SentimentQuery, report::SentimentReport,
    timeframe::Timeframe,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Executes [`ClientCommand`]s on behalf of an identified subscriber.
#[derive(Clone)]
pub struct CommandHandler {
    analyzer: Arc<dyn SentimentAnalyzer>,
    store: Arc<SubscriptionStore>,
    scheduler: Arc<RecurringJobScheduler>,
    whale_threshold: f64,
}

impl std::fmt::Debug for CommandHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHandler")
            .field("store", &self.store)
            .field("scheduler", &self.scheduler)
            .field("whale_threshold", &self.whale_threshold)
            .finish_non_exhaustive()
    }
}

impl CommandHandler {
    pub fn new(
        analyzer: Arc<dyn SentimentAnalyzer>,
        store: Arc<SubscriptionStore>,
        scheduler: Arc<RecurringJobScheduler>,
        whale_threshold: f64,
    ) -> Self {
        Self {
            analyzer,
            store,
            scheduler,
            whale_threshold,
        }
    }

    pub fn scheduler(&self) -> &Arc<RecurringJobScheduler> {
        &self.scheduler
    }

    pub async fn handle(
        &self,
        subscriber: &SubscriberId,
        command: ClientCommand,
    ) -> Result<ServerMessage, BotError> {
        debug!(%subscriber, command = command.name(), "handling command");

        match command {
            // The connection is bound by the server, this only summarises the subscriber state
            ClientCommand::Hello { .. } => {
                let signal = self
                    .store
                    .get(subscriber)
                    .map(|subscription| format!("Saved signal: {subscription}"))
                    .unwrap_or_else(|| "No saved signal.".to_string());
                Ok(ServerMessage::reply(format!(
                    "Identified as {subscriber}. {signal}"
                )))
            }
            ClientCommand::Analyze { query } => {
                let query = SentimentQuery::parse(&query, self.whale_threshold)?;
                self.analyze(query).await
            }
            ClientCommand::SetSignal { symbol, timeframe } => {
                let subscription = Subscription::parse(&symbol, &timeframe)?;
                let text = format!("Saved signal: {subscription}");
                self.store.set(subscriber.clone(), subscription)?;

                info!(%subscriber, "saved signal");
                Ok(ServerMessage::reply(text))
            }
            ClientCommand::ResendSignal => {
                let query = self.saved_query(subscriber)?;
                self.analyze(query).await
            }
            ClientCommand::EnableLoop { interval } => {
                let query = self.saved_query(subscriber)?;
                let interval = interval.parse::<Timeframe>()?;
                let info = self.scheduler.enable(subscriber.clone(), query, interval)?;

                Ok(ServerMessage::reply(format!(
                    "Loop enabled!\nSymbol: {} ({})\nInterval: Every {}\nNext run: {}",
                    info.query.symbol,
                    info.query.lookback,
                    info.interval,
                    info.next_run.format("%Y-%m-%d %H:%M:%S UTC")
                )))
            }
            ClientCommand::LoopStatus => Ok(ServerMessage::reply(
                self.scheduler.status(subscriber).render(Utc::now()),
            )),
            ClientCommand::StopLoop => Ok(ServerMessage::reply(
                match self.scheduler.stop(subscriber) {
                    Some(_) => "Loop stopped.",
                    None => "No loop is running.",
                },
            )),
        }
    }

    async fn analyze(&self, query: SentimentQuery) -> Result<ServerMessage, BotError> {
        let result = self.analyzer.analyze(&query).await?;
        Ok(ServerMessage::Reply {
            text: SentimentReport::new(&query, result).to_string(),
            result: Some(result),
        })
    }

    fn saved_query(&self, subscriber: &SubscriberId) -> Result<SentimentQuery, BotError> {
        let subscription = self
            .store
            .get(subscriber)
            .ok_or_else(|| BotError::NoSubscription(subscriber.clone()))?;
        Ok(subscription.query(self.whale_threshold)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakeAnalyzer, ManualTimer, RecordingNotifier};
    use sentiment_data::{error::DataError, trade::Symbol};
    use std::time::Duration;

    struct Harness {
        handler: CommandHandler,
        analyzer: Arc<FakeAnalyzer>,
        timer: Arc<ManualTimer>,
        store: Arc<SubscriptionStore>,
        _dir: tempfile::TempDir,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SubscriptionStore::load(dir.path().join("user_data.json")));
        let analyzer = Arc::new(FakeAnalyzer::default());
        let timer = Arc::new(ManualTimer::default());
        let scheduler = Arc::new(RecurringJobScheduler::new(
            timer.clone(),
            analyzer.clone(),
            Arc::new(RecordingNotifier::default()),
        ));

        Harness {
            handler: CommandHandler::new(analyzer.clone(), store.clone(), scheduler, 100_000.0),
            analyzer,
            timer,
            store,
            _dir: dir,
        }
    }

    fn set_signal(symbol: &str, timeframe: &str) -> ClientCommand {
        ClientCommand::SetSignal {
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
        }
    }

    #[tokio::test]
    async fn test_analyze() {
        let Harness {
            handler, analyzer, ..
        } = harness();
        let subscriber = SubscriberId::new("42");

        let reply = handler
            .handle(
                &subscriber,
                ClientCommand::Analyze {
                    query: "ltcusdt 10 hours".to_string(),
                },
            )
            .await
            .unwrap();

        let ServerMessage::Reply { text, result } = reply else {
            panic!("expected reply");
        };
        assert!(text.starts_with("LTCUSDT sentiment over the last 10h"));
        assert_eq!(result, Some(analyzer.result));

        let (query, _) = analyzer.calls().remove(0);
        assert_eq!(query.symbol, Symbol::new("LTCUSDT"));
        assert_eq!(query.lookback.seconds(), 36_000);
        assert_eq!(query.whale_threshold, 100_000.0);
    }

    #[tokio::test]
    async fn test_analyze_invalid_query() {
        let Harness {
            handler, analyzer, ..
        } = harness();

        let actual = handler
            .handle(
                &SubscriberId::new("42"),
                ClientCommand::Analyze {
                    query: "BTC-USDT".to_string(),
                },
            )
            .await;

        assert!(matches!(
            actual,
            Err(BotError::Data(DataError::InvalidQuery(_)))
        ));
        assert_eq!(analyzer.call_count(), 0);
    }

    #[tokio::test]
    async fn test_signal_commands() {
        let Harness {
            handler,
            analyzer,
            store,
            ..
        } = harness();
        let subscriber = SubscriberId::new("42");

        let actual = handler.handle(&subscriber, ClientCommand::ResendSignal).await;
        assert_eq!(actual, Err(BotError::NoSubscription(subscriber.clone())));

        let actual = handler
            .handle(&subscriber, set_signal("btcusdt", "4 hours"))
            .await
            .unwrap();
        assert_eq!(actual, ServerMessage::reply("Saved signal: BTCUSDT 4h"));
        assert_eq!(
            store.get(&subscriber),
            Some(Subscription::parse("BTCUSDT", "4h").unwrap())
        );

        let actual = handler
            .handle(&subscriber, ClientCommand::ResendSignal)
            .await
            .unwrap();
        assert!(actual.text().starts_with("BTCUSDT sentiment over the last 4h"));
        assert_eq!(analyzer.call_count(), 1);

        let actual = handler.handle(&subscriber, set_signal("BTCUSDT", "sometime")).await;
        assert!(matches!(actual, Err(BotError::Data(_))));
        assert_eq!(store.get(&subscriber).unwrap().timeframe, "4h");
    }

    #[tokio::test]
    async fn test_loop_commands() {
        let Harness { handler, timer, .. } = harness();
        let subscriber = SubscriberId::new("42");

        let actual = handler
            .handle(
                &subscriber,
                ClientCommand::EnableLoop {
                    interval: "15m".to_string(),
                },
            )
            .await;
        assert_eq!(actual, Err(BotError::NoSubscription(subscriber.clone())));

        handler
            .handle(&subscriber, set_signal("ETHUSDT", "1d"))
            .await
            .unwrap();

        let actual = handler
            .handle(
                &subscriber,
                ClientCommand::EnableLoop {
                    interval: "0m".to_string(),
                },
            )
            .await;
        assert!(matches!(actual, Err(BotError::Data(_))));
        assert_eq!(timer.len(), 0);

        let actual = handler
            .handle(
                &subscriber,
                ClientCommand::EnableLoop {
                    interval: "15m".to_string(),
                },
            )
            .await
            .unwrap();
        assert!(
            actual
                .text()
                .starts_with("Loop enabled!\nSymbol: ETHUSDT (1d)\nInterval: Every 15m\nNext run: ")
        );
        assert_eq!(timer.period(0), Duration::from_secs(900));

        let actual = handler
            .handle(&subscriber, ClientCommand::LoopStatus)
            .await
            .unwrap();
        assert!(actual.text().starts_with("Loop Status: ACTIVE"));

        let actual = handler
            .handle(&subscriber, ClientCommand::StopLoop)
            .await
            .unwrap();
        assert_eq!(actual, ServerMessage::reply("Loop stopped."));
        assert!(timer.is_cancelled(0));

        let actual = handler
            .handle(&subscriber, ClientCommand::StopLoop)
            .await
            .unwrap();
        assert_eq!(actual, ServerMessage::reply("No loop is running."));

        let actual = handler
            .handle(&subscriber, ClientCommand::LoopStatus)
            .await
            .unwrap();
        assert!(actual.text().starts_with("Loop Status: INACTIVE"));
    }

    #[tokio::test]
    async fn test_hello_reports_saved_signal() {
        let Harness { handler, .. } = harness();
        let subscriber = SubscriberId::new("42");
        let hello = ClientCommand::Hello {
            subscriber: subscriber.clone(),
        };

        let actual = handler.handle(&subscriber, hello.clone()).await.unwrap();
        assert_eq!(actual, ServerMessage::reply("Identified as 42. No saved signal."));

        handler
            .handle(&subscriber, set_signal("SOLUSDT", "1h"))
            .await
            .unwrap();
        let actual = handler.handle(&subscriber, hello).await.unwrap();
        assert_eq!(
            actual,
            ServerMessage::reply("Identified as 42. Saved signal: SOLUSDT 1h")
        );
    }
}
