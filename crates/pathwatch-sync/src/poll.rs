//! The poll scheduler: a fixed-interval tick source.
//!
//! The scheduler is the reliable half of the synchronizer. It ticks on a
//! fixed wall-clock interval regardless of push-channel health, and it
//! is fully stoppable: once [`PollHandle::stop`] returns, the timer task
//! has ended and its sender is dropped, so no further tick can arrive.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Shortest interval the scheduler will run at.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// One timer tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTick {
    /// 1-based tick number since the scheduler started.
    pub sequence: u64,
}

/// Starts fixed-interval tick sources.
#[derive(Debug, Clone, Copy, Default)]
pub struct PollScheduler;

impl PollScheduler {
    /// Tick every `interval` until the returned handle is stopped or
    /// `parent` is cancelled.
    ///
    /// The first tick fires one full interval after start. Ticks that
    /// cannot be delivered because the previous one is still queued are
    /// coalesced, and ticks missed while the runtime was busy are delayed
    /// rather than fired in a burst.
    pub fn start(
        interval: Duration,
        ticks: mpsc::Sender<PollTick>,
        parent: &CancellationToken,
    ) -> PollHandle {
        let period = interval.max(MIN_INTERVAL);
        let cancel = parent.child_token();
        let task = tokio::spawn(run_timer(period, ticks, cancel.clone()));
        PollHandle {
            cancel,
            task: Some(task),
            interval: period,
        }
    }
}

/// A running poll scheduler.
#[derive(Debug)]
pub struct PollHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    interval: Duration,
}

impl PollHandle {
    /// The effective tick interval.
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Stop the timer and wait for its task to end.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if e.is_panic() {
                    warn!(error = %e, "poll timer panicked");
                }
            }
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_timer(period: Duration, ticks: mpsc::Sender<PollTick>, cancel: CancellationToken) {
    let first = Instant::now().checked_add(period).unwrap_or_else(Instant::now);
    let mut timer = tokio::time::interval_at(first, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut sequence: u64 = 0;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = timer.tick() => {
                sequence = sequence.wrapping_add(1);
                match ticks.try_send(PollTick { sequence }) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        debug!(sequence, "previous poll tick still queued, coalescing");
                    }
                    Err(TrySendError::Closed(_)) => break,
                }
            }
        }
    }
    debug!(ticks = sequence, "poll timer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_tick_after_one_interval() {
        let (tx, mut rx) = mpsc::channel(4);
        let start = Instant::now();
        let handle = PollScheduler::start(Duration::from_secs(30), tx, &CancellationToken::new());

        let tick = rx.recv().await;
        assert_eq!(tick, Some(PollTick { sequence: 1 }));
        assert_eq!(start.elapsed(), Duration::from_secs(30));

        let tick = rx.recv().await;
        assert_eq!(tick, Some(PollTick { sequence: 2 }));
        assert_eq!(start.elapsed(), Duration::from_secs(60));

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn no_tick_after_stop() {
        let (tx, mut rx) = mpsc::channel(4);
        let handle = PollScheduler::start(Duration::from_millis(100), tx, &CancellationToken::new());

        assert!(rx.recv().await.is_some());
        handle.stop().await;

        // Drain anything queued before the stop, then the channel must be
        // closed: the timer task is gone and so is its sender.
        while rx.try_recv().is_ok() {}
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn parent_cancellation_stops_timer() {
        let parent = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel(4);
        let _handle = PollScheduler::start(Duration::from_millis(100), tx, &parent);

        parent.cancel();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_is_clamped() {
        let (tx, mut rx) = mpsc::channel(4);
        let handle = PollScheduler::start(Duration::ZERO, tx, &CancellationToken::new());
        assert_eq!(handle.interval(), MIN_INTERVAL);
        assert!(rx.recv().await.is_some());
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn slow_consumer_gets_coalesced_ticks() {
        let (tx, mut rx) = mpsc::channel(1);
        let handle = PollScheduler::start(Duration::from_millis(10), tx, &CancellationToken::new());

        tokio::time::sleep(Duration::from_millis(55)).await;
        // Only one tick fits in the queue no matter how many fired.
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
        handle.stop().await;
    }
}
