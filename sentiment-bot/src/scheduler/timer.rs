use futures::future::BoxFuture;
use std::time::Duration;
use tokio::{
    sync::mpsc,
    time::{MissedTickBehavior, interval},
};
use tracing::debug;

/// Shortest period a repeating task may be scheduled with.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Repeating unit of work driven by a [`Timer`].
pub type TimerTask = Box<dyn FnMut() -> BoxFuture<'static, ()> + Send>;

/// Schedules repeating tasks.
///
/// A scheduled task runs immediately, then once per `period`. Consecutive runs of the same task
/// never overlap: the next run is only awaited once the previous run has completed.
pub trait Timer: Send + Sync {
    fn schedule_repeating(&self, period: Duration, task: TimerTask) -> TimerHandle;
}

/// Cancellation handle of a scheduled task.
///
/// Cancelling (or dropping) the handle abandons any pending run. A run already in progress is
/// allowed to complete.
#[derive(Debug)]
pub struct TimerHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl TimerHandle {
    /// Construct a new [`TimerHandle`] and the shutdown receiver its [`Timer`] must observe.
    ///
    /// The receiver yields (or closes) once the handle is cancelled or dropped.
    pub fn new() -> (Self, mpsc::Receiver<()>) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        (Self { shutdown_tx }, shutdown_rx)
    }

    pub fn cancel(self) {
        let _ = self.shutdown_tx.try_send(());
    }
}

/// [`Timer`] running each task on its own tokio task.
#[derive(Debug, Copy, Clone, Default)]
pub struct TokioTimer;

impl Timer for TokioTimer {
    fn schedule_repeating(&self, period: Duration, mut task: TimerTask) -> TimerHandle {
        let (handle, mut shutdown_rx) = TimerHandle::new();
        let period = period.max(MIN_PERIOD);

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;

                    _ = shutdown_rx.recv() => {
                        debug!(?period, "repeating task cancelled");
                        break;
                    }
                    _ = ticker.tick() => task().await,
                }
            }
        });

        handle
    }
}
