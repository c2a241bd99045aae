use crate::{
    scheduler::{
        Delivery, Notifier,
        timer::{Timer, TimerHandle, TimerTask},
    },
    subscriber::SubscriberId,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use sentiment_data::{
    error::DataError, pipeline::SentimentAnalyzer, query::SentimentQuery, score::SentimentResult,
    score::score,
};
use std::{
    collections::VecDeque,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};
use tokio::{sync::mpsc, time::Instant};

#[derive(Debug)]
pub enum Outcome {
    Fail(DataError),
    Panic,
}

/// [`SentimentAnalyzer`] recording every call.
///
/// Calls succeed with `result` unless an [`Outcome`] is queued (or `fail_all` is set).
#[derive(Debug)]
pub struct FakeAnalyzer {
    pub result: SentimentResult,
    pub delay: Duration,
    pub fail_all: bool,
    outcomes: Mutex<VecDeque<Outcome>>,
    calls: Mutex<Vec<(SentimentQuery, Instant)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for FakeAnalyzer {
    fn default() -> Self {
        Self {
            result: score(120.0, 80.0, 50.0, 10.0),
            delay: Duration::ZERO,
            fail_all: false,
            outcomes: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }
}

impl FakeAnalyzer {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Self::default()
        }
    }

    pub fn with_outcomes(self, outcomes: impl IntoIterator<Item = Outcome>) -> Self {
        self.outcomes.lock().extend(outcomes);
        self
    }

    pub fn calls(&self) -> Vec<(SentimentQuery, Instant)> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SentimentAnalyzer for FakeAnalyzer {
    async fn analyze(&self, query: &SentimentQuery) -> Result<SentimentResult, DataError> {
        self.calls.lock().push((query.clone(), Instant::now()));

        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let outcome = self.outcomes.lock().pop_front();
        match outcome {
            Some(Outcome::Fail(error)) => Err(error),
            Some(Outcome::Panic) => panic!("analyzer panicked"),
            None if self.fail_all => Err(DataError::TransientFetch {
                attempts: 5,
                reason: "HTTP request failed: timeout".to_string(),
            }),
            None => Ok(self.result),
        }
    }
}

/// [`Notifier`] recording every delivery.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    deliveries: Mutex<Vec<(SubscriberId, Delivery)>>,
}

impl RecordingNotifier {
    pub fn deliveries(&self) -> Vec<(SubscriberId, Delivery)> {
        self.deliveries.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, subscriber: &SubscriberId, delivery: Delivery) {
        self.deliveries.lock().push((subscriber.clone(), delivery));
    }
}

struct ScheduledTask {
    period: Duration,
    task: TimerTask,
    shutdown_rx: mpsc::Receiver<()>,
    cancelled: bool,
}

/// [`Timer`] whose tasks only run when fired explicitly.
#[derive(Default)]
pub struct ManualTimer {
    tasks: Mutex<Vec<ScheduledTask>>,
}

impl ManualTimer {
    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn period(&self, index: usize) -> Duration {
        self.tasks.lock()[index].period
    }

    /// Run the task scheduled at `index` once, regardless of cancellation.
    pub async fn fire(&self, index: usize) {
        let run = {
            let mut tasks = self.tasks.lock();
            (tasks[index].task)()
        };
        run.await
    }

    pub fn is_cancelled(&self, index: usize) -> bool {
        let mut tasks = self.tasks.lock();
        let scheduled = &mut tasks[index];
        if !scheduled.cancelled {
            scheduled.cancelled = !matches!(
                scheduled.shutdown_rx.try_recv(),
                Err(mpsc::error::TryRecvError::Empty)
            );
        }
        scheduled.cancelled
    }
}

impl Timer for ManualTimer {
    fn schedule_repeating(&self, period: Duration, task: TimerTask) -> TimerHandle {
        let (handle, shutdown_rx) = TimerHandle::new();
        self.tasks.lock().push(ScheduledTask {
            period,
            task,
            shutdown_rx,
            cancelled: false,
        });
        handle
    }
}
