use crate::{error::BotError, subscriber::SubscriberId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::Mutex;
use sentiment_data::{
    error::DataError,
    pipeline::SentimentAnalyzer,
    query::SentimentQuery,
    report::SentimentReport,
    score::SentimentResult,
    timeframe::{Timeframe, format_time_until},
};
use std::{
    collections::HashMap,
    fmt::Write,
    panic::AssertUnwindSafe,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};
use tracing::{error, info, warn};

/// [`Timer`](timer::Timer) abstraction & tokio implementation driving recurring jobs.
pub mod timer;

use timer::{Timer, TimerHandle, TimerTask};

/// Outcome of a single recurring job firing, delivered to the subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Result {
        query: SentimentQuery,
        result: SentimentResult,
    },
    Failure {
        query: SentimentQuery,
        reason: String,
    },
}

impl Delivery {
    pub fn result(&self) -> Option<&SentimentResult> {
        match self {
            Delivery::Result { result, .. } => Some(result),
            Delivery::Failure { .. } => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Delivery::Failure { .. })
    }

    /// Human readable text of the delivery.
    pub fn render(&self) -> String {
        match self {
            Delivery::Result { query, result } => SentimentReport::new(query, *result).to_string(),
            Delivery::Failure { query, reason } => {
                format!("Error analysing {query}: {reason}")
            }
        }
    }
}

/// Channel delivering recurring job outcomes to subscribers.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, subscriber: &SubscriberId, delivery: Delivery);
}

/// Public view of an active recurring job.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopInfo {
    pub subscriber: SubscriberId,
    pub query: SentimentQuery,
    /// Interval between firings, as typed by the user.
    pub interval: Timeframe,
    pub next_run: DateTime<Utc>,
}

/// Recurring job state of a subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopStatus {
    Active(LoopInfo),
    Inactive,
}

impl LoopStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, LoopStatus::Active(_))
    }

    /// Human readable status, with the time remaining until the next run relative to `now`.
    pub fn render(&self, now: DateTime<Utc>) -> String {
        match self {
            LoopStatus::Active(info) => {
                let mut text = String::from("Loop Status: ACTIVE\n\n");
                let _ = writeln!(text, "Symbol: {} ({})", info.query.symbol, info.query.lookback);
                let _ = writeln!(text, "Interval: Every {}", info.interval);
                let _ = writeln!(text, "Next run: {}", info.next_run.format("%Y-%m-%d %H:%M:%S UTC"));
                let _ = write!(text, "Time until next: {}", format_time_until(info.next_run, now));
                text
            }
            LoopStatus::Inactive => {
                "Loop Status: INACTIVE\n\nNo loop is currently running.".to_string()
            }
        }
    }
}

#[derive(Debug)]
struct ActiveJob {
    info: LoopInfo,
    generation: u64,
    handle: TimerHandle,
}

type Jobs = Arc<Mutex<HashMap<SubscriberId, ActiveJob>>>;

/// Held by a firing while it runs. Outlives job generations so a replaced job's in-flight
/// firing and the new job's firings of the same subscriber never run concurrently.
type FiringGuard = Arc<tokio::sync::Mutex<()>>;

/// Runs the sentiment pipeline for each subscriber on a fixed interval.
///
/// Each subscriber has at most one job. A job fires immediately on [`enable`](Self::enable),
/// then once per interval, delivering every outcome (including failures) to the [`Notifier`].
pub struct RecurringJobScheduler {
    timer: Arc<dyn Timer>,
    analyzer: Arc<dyn SentimentAnalyzer>,
    notifier: Arc<dyn Notifier>,
    jobs: Jobs,
    guards: Mutex<HashMap<SubscriberId, FiringGuard>>,
    generation: AtomicU64,
}

impl std::fmt::Debug for RecurringJobScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecurringJobScheduler")
            .field("jobs", &self.jobs.lock().len())
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl RecurringJobScheduler {
    pub fn new(
        timer: Arc<dyn Timer>,
        analyzer: Arc<dyn SentimentAnalyzer>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            timer,
            analyzer,
            notifier,
            jobs: Arc::new(Mutex::new(HashMap::new())),
            guards: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Start (or replace) the recurring job of `subscriber`.
    ///
    /// Any existing job of the subscriber is cancelled first. The new job fires immediately.
    pub fn enable(
        &self,
        subscriber: SubscriberId,
        query: SentimentQuery,
        interval: Timeframe,
    ) -> Result<LoopInfo, BotError> {
        if interval.seconds() == 0 {
            return Err(DataError::InvalidInterval(format!(
                "interval {interval} must be greater than zero"
            ))
            .into());
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let info = LoopInfo {
            subscriber: subscriber.clone(),
            next_run: next_run(Utc::now(), &interval),
            query,
            interval,
        };

        let guard = self
            .guards
            .lock()
            .entry(subscriber.clone())
            .or_default()
            .clone();
        let task = self.firing_task(info.clone(), generation, guard);

        let mut jobs = self.jobs.lock();
        if let Some(replaced) = jobs.remove(&subscriber) {
            replaced.handle.cancel();
            info!(%subscriber, replaced = %replaced.info.query, "cancelled replaced recurring job");
        }

        let handle = self.timer.schedule_repeating(info.interval.duration(), task);
        jobs.insert(
            subscriber.clone(),
            ActiveJob {
                info: info.clone(),
                generation,
                handle,
            },
        );
        drop(jobs);

        info!(
            %subscriber,
            query = %info.query,
            interval = %info.interval,
            generation,
            "enabled recurring job"
        );

        Ok(info)
    }

    /// Stop the recurring job of `subscriber`, returning it if one was active.
    ///
    /// Pending firings are abandoned; a firing already in progress may complete.
    pub fn stop(&self, subscriber: &SubscriberId) -> Option<LoopInfo> {
        let stopped = self.jobs.lock().remove(subscriber)?;
        stopped.handle.cancel();

        info!(%subscriber, query = %stopped.info.query, "stopped recurring job");
        Some(stopped.info)
    }

    /// Stop every recurring job, eg/ on shutdown.
    pub fn stop_all(&self) -> usize {
        let stopped = self.jobs.lock().drain().collect::<Vec<_>>();
        let count = stopped.len();
        stopped.into_iter().for_each(|(_, job)| job.handle.cancel());

        info!(count, "stopped all recurring jobs");
        count
    }

    pub fn status(&self, subscriber: &SubscriberId) -> LoopStatus {
        self.jobs
            .lock()
            .get(subscriber)
            .map(|job| LoopStatus::Active(job.info.clone()))
            .unwrap_or(LoopStatus::Inactive)
    }

    pub fn active_jobs(&self) -> usize {
        self.jobs.lock().len()
    }

    /// Build the task run by the timer on every firing of a job.
    fn firing_task(&self, info: LoopInfo, generation: u64, guard: FiringGuard) -> TimerTask {
        let analyzer = self.analyzer.clone();
        let notifier = self.notifier.clone();
        let jobs = self.jobs.clone();

        Box::new(move || {
            let analyzer = analyzer.clone();
            let notifier = notifier.clone();
            let jobs = jobs.clone();
            let guard = guard.clone();
            let LoopInfo {
                subscriber,
                query,
                interval,
                ..
            } = info.clone();

            async move {
                let _running = guard.lock().await;

                let outcome = AssertUnwindSafe(analyzer.analyze(&query))
                    .catch_unwind()
                    .await;

                let delivery = match outcome {
                    Ok(Ok(result)) => Delivery::Result { query, result },
                    Ok(Err(error)) => {
                        warn!(%subscriber, %query, %error, "recurring analysis failed");
                        Delivery::Failure {
                            query,
                            reason: error.to_string(),
                        }
                    }
                    Err(_) => {
                        error!(%subscriber, %query, "recurring analysis panicked");
                        Delivery::Failure {
                            query,
                            reason: "analysis aborted unexpectedly".to_string(),
                        }
                    }
                };

                notifier.notify(&subscriber, delivery).await;

                // A replaced or stopped job must not touch the current job's state
                if let Some(job) = jobs.lock().get_mut(&subscriber) {
                    if job.generation == generation {
                        job.info.next_run = next_run(Utc::now(), &interval);
                    }
                }
            }
            .boxed()
        })
    }
}

fn next_run(now: DateTime<Utc>, interval: &Timeframe) -> DateTime<Utc> {
    i64::try_from(interval.seconds())
        .ok()
        .and_then(chrono::TimeDelta::try_seconds)
        .and_then(|interval| now.checked_add_signed(interval))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
