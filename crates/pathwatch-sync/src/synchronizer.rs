//! The synchronizer: one live snapshot fed by polling and push signals.
//!
//! A [`Synchronizer`] owns a [`SnapshotStore`], a [`FetchChannel`], an
//! optional [`PollScheduler`] and an optional [`PushSource`]. It wires
//! every tick, push signal and manual refresh to a fresh fetch, and only
//! lets fetches of the current generation reach the store.
//!
//! # Lifecycle
//!
//! ```text
//! Inactive --activate--> Activating --first commit--> Active
//!    ^                                                  |
//!    +------------- Deactivating <----deactivate--------+
//! ```
//!
//! Activation advances the generation, marks the store as loading,
//! issues the immediate fetch and starts the timer and the push
//! connection without waiting for that fetch. Deactivation advances the
//! generation first, so nothing still in flight can commit, then stops
//! the timer, closes the push connection and aborts outstanding fetches,
//! in that order, before returning. Both transitions are idempotent.
//!
//! A failed fetch is committed as an error state and changes nothing
//! else: the timer keeps ticking and the push connection stays open.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::fetch::{Fetch, FetchChannel, FetchOutcome};
use crate::poll::{PollHandle, PollScheduler, PollTick};
use crate::push::{PushHandle, PushSignal, PushSource};
use crate::snapshot::{Snapshot, SnapshotReader, SnapshotStore};

/// Capacity of each trigger queue. A full queue means a fetch is already
/// about to be issued, so extra triggers are coalesced.
const TRIGGER_CAPACITY: usize = 8;

/// Lifecycle state of a [`Synchronizer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncState {
    /// Not running. No timer, no connection, no fetches.
    Inactive,
    /// Started; no fetch of this generation has committed yet.
    Activating,
    /// Running with at least one committed fetch.
    Active,
    /// Tearing down.
    Deactivating,
}

/// What caused a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The immediate fetch issued on activation.
    Activation,
    /// A poll timer tick.
    Poll,
    /// A recognized push frame.
    Push,
    /// An explicit [`Synchronizer::refresh`].
    Manual,
}

/// State shared between the synchronizer, its driver and its fetch tasks.
struct Shared<F: Fetch> {
    name: String,
    store: SnapshotStore<F::Output>,
    channel: FetchChannel<F>,
    state: watch::Sender<SyncState>,
}

/// Everything a running activation owns.
struct Running {
    generation: u64,
    cancel: CancellationToken,
    poll: Option<PollHandle>,
    push: Option<PushHandle>,
    driver: Option<JoinHandle<()>>,
    refresh: mpsc::Sender<()>,
}

impl Running {
    /// Stop the timer, close the connection, then wait for the driver to
    /// abort its in-flight fetches.
    async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(poll) = self.poll.take() {
            poll.stop().await;
        }
        if let Some(push) = self.push.take() {
            push.close().await;
        }
        if let Some(driver) = self.driver.take() {
            if let Err(e) = driver.await {
                if e.is_panic() {
                    warn!(error = %e, "synchronizer driver panicked");
                }
            }
        }
    }
}

impl Drop for Running {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Keeps one snapshot fresh from a fetcher, a timer and a push source.
///
/// Generic over the fetch strategy `F`; the snapshot value type is
/// `F::Output`. Build one with [`SynchronizerBuilder`].
pub struct Synchronizer<F: Fetch> {
    shared: Arc<Shared<F>>,
    poll_interval: Option<Duration>,
    push: Option<Arc<dyn PushSource>>,
    lifecycle: Mutex<Option<Running>>,
}

impl<F> Synchronizer<F>
where
    F: Fetch,
    F::Output: Clone + Sync,
{
    /// Start building a synchronizer around `fetcher`.
    pub fn builder(fetcher: F) -> SynchronizerBuilder<F> {
        SynchronizerBuilder::new(fetcher)
    }

    /// Name used in logs.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Clone the current snapshot.
    pub fn snapshot(&self) -> Snapshot<F::Output> {
        self.shared.store.read()
    }

    /// Open a read-only handle for the display layer.
    pub fn reader(&self) -> SnapshotReader<F::Output> {
        self.shared.store.reader()
    }

    /// The current lifecycle state.
    pub fn state(&self) -> SyncState {
        *self.shared.state.borrow()
    }

    /// Watch lifecycle transitions.
    pub fn watch_state(&self) -> watch::Receiver<SyncState> {
        self.shared.state.subscribe()
    }

    /// The current generation.
    pub fn generation(&self) -> u64 {
        self.shared.store.generation()
    }

    /// The configured poll interval, if polling is enabled.
    pub const fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval
    }

    /// Whether a push source is configured.
    pub fn has_push(&self) -> bool {
        self.push.is_some()
    }

    /// Start synchronizing. Does nothing if already active.
    pub async fn activate(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.is_some() {
            debug!(view = %self.shared.name, "activate ignored, already active");
            return;
        }

        self.shared.state.send_replace(SyncState::Activating);
        let generation = self.shared.store.advance_generation();
        self.shared.store.begin_load();

        let cancel = CancellationToken::new();

        let (poll, ticks) = self
            .poll_interval
            .map(|every| {
                let (tx, rx) = mpsc::channel(TRIGGER_CAPACITY);
                (PollScheduler::start(every, tx, &cancel), rx)
            })
            .unzip();

        let (push, signals) = self
            .push
            .as_ref()
            .map(|source| {
                let (tx, rx) = mpsc::channel(TRIGGER_CAPACITY);
                (PushHandle::open(source.as_ref(), tx, &cancel), rx)
            })
            .unzip();

        let (refresh, refresh_rx) = mpsc::channel(TRIGGER_CAPACITY);

        let driver = tokio::spawn(drive(
            Arc::clone(&self.shared),
            generation,
            cancel.clone(),
            Triggers {
                ticks,
                signals,
                refresh: refresh_rx,
            },
        ));

        info!(
            view = %self.shared.name,
            generation,
            poll_ms = self.poll_interval.map(|d| d.as_millis()),
            push = self.push.is_some(),
            "synchronizer activated"
        );

        *lifecycle = Some(Running {
            generation,
            cancel,
            poll,
            push,
            driver: Some(driver),
            refresh,
        });
    }

    /// Stop synchronizing and wait until every timer, connection and fetch
    /// owned by the current activation is gone. Does nothing if inactive.
    pub async fn deactivate(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        let Some(running) = lifecycle.take() else {
            debug!(view = %self.shared.name, "deactivate ignored, already inactive");
            return;
        };

        self.shared.state.send_replace(SyncState::Deactivating);
        let retired = running.generation;
        let generation = self.shared.store.advance_generation();
        running.shutdown().await;
        self.shared.state.send_replace(SyncState::Inactive);

        info!(
            view = %self.shared.name,
            retired_generation = retired,
            generation,
            "synchronizer deactivated"
        );
    }

    /// Issue an out-of-band fetch through the normal commit path.
    ///
    /// Returns `false` if the synchronizer is inactive or a refresh is
    /// already queued.
    pub async fn refresh(&self) -> bool {
        let lifecycle = self.lifecycle.lock().await;
        lifecycle
            .as_ref()
            .is_some_and(|running| running.refresh.try_send(()).is_ok())
    }
}

impl<F: Fetch> std::fmt::Debug for Synchronizer<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer")
            .field("name", &self.shared.name)
            .field("state", &*self.shared.state.borrow())
            .field("poll_interval", &self.poll_interval)
            .field("push", &self.push.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Synchronizer`].
pub struct SynchronizerBuilder<F> {
    fetcher: F,
    name: String,
    poll_interval: Option<Duration>,
    push: Option<Arc<dyn PushSource>>,
}

impl<F> SynchronizerBuilder<F> {
    /// Start from a fetch strategy. No polling, no push.
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            name: String::from("snapshot"),
            poll_interval: None,
            push: None,
        }
    }

    /// Name used in logs.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Poll every `every`. A zero interval disables polling.
    #[must_use]
    pub fn poll_interval(mut self, every: Duration) -> Self {
        self.poll_interval = (!every.is_zero()).then_some(every);
        self
    }

    /// Re-fetch whenever `source` signals.
    #[must_use]
    pub fn push(mut self, source: impl PushSource) -> Self {
        self.push = Some(Arc::new(source));
        self
    }

    /// Build an inactive synchronizer.
    pub fn build(self) -> Synchronizer<F>
    where
        F: Fetch,
        F::Output: Clone + Sync,
    {
        let (state, _) = watch::channel(SyncState::Inactive);
        Synchronizer {
            shared: Arc::new(Shared {
                name: self.name,
                store: SnapshotStore::new(),
                channel: FetchChannel::new(self.fetcher),
                state,
            }),
            poll_interval: self.poll_interval,
            push: self.push,
            lifecycle: Mutex::new(None),
        }
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Trigger queues feeding one activation's driver.
struct Triggers {
    ticks: Option<mpsc::Receiver<PollTick>>,
    signals: Option<mpsc::Receiver<PushSignal>>,
    refresh: mpsc::Receiver<()>,
}

/// Receive from an optional queue. A missing queue never yields.
async fn recv_opt<M>(rx: &mut Option<mpsc::Receiver<M>>) -> Option<M> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Turn triggers into fetches until cancelled, then abort whatever is
/// still in flight.
async fn drive<F>(
    shared: Arc<Shared<F>>,
    generation: u64,
    cancel: CancellationToken,
    mut triggers: Triggers,
) where
    F: Fetch,
    F::Output: Clone + Sync,
{
    let mut in_flight = JoinSet::new();
    spawn_fetch(&shared, &mut in_flight, generation, &cancel, Trigger::Activation);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            tick = recv_opt(&mut triggers.ticks) => match tick {
                Some(tick) => {
                    debug!(view = %shared.name, tick = tick.sequence, "poll tick");
                    spawn_fetch(&shared, &mut in_flight, generation, &cancel, Trigger::Poll);
                }
                None => triggers.ticks = None,
            },
            signal = recv_opt(&mut triggers.signals) => match signal {
                Some(PushSignal) => {
                    spawn_fetch(&shared, &mut in_flight, generation, &cancel, Trigger::Push);
                }
                None => {
                    debug!(view = %shared.name, "push channel ended, continuing on polling");
                    triggers.signals = None;
                }
            },
            Some(()) = triggers.refresh.recv() => {
                spawn_fetch(&shared, &mut in_flight, generation, &cancel, Trigger::Manual);
            }
            Some(joined) = in_flight.join_next() => {
                if let Err(e) = joined {
                    if e.is_panic() {
                        warn!(view = %shared.name, error = %e, "fetch task panicked");
                    }
                }
            }
        }
    }

    let aborted = in_flight.len();
    in_flight.shutdown().await;
    debug!(view = %shared.name, generation, aborted, "driver stopped");
}

/// Issue one fetch tagged with `generation` and commit its outcome if it
/// is still current when it resolves.
fn spawn_fetch<F>(
    shared: &Arc<Shared<F>>,
    in_flight: &mut JoinSet<()>,
    generation: u64,
    cancel: &CancellationToken,
    trigger: Trigger,
) where
    F: Fetch,
    F::Output: Clone + Sync,
{
    let ticket = shared.store.ticket(generation);
    let shared = Arc::clone(shared);
    let cancel = cancel.child_token();
    debug!(view = %shared.name, ?trigger, seq = ticket.seq, "fetch issued");

    in_flight.spawn(async move {
        let fetched: Option<FetchOutcome<F::Output>> = shared.channel.fetch(&cancel).await;
        let Some(outcome) = fetched else {
            debug!(view = %shared.name, seq = ticket.seq, "fetch cancelled");
            return;
        };

        if let Err(e) = &outcome {
            warn!(view = %shared.name, ?trigger, kind = %e.kind(), error = %e, "fetch failed");
        }

        if shared.store.commit(ticket, outcome) {
            shared.state.send_if_modified(|state| {
                if *state == SyncState::Activating {
                    *state = SyncState::Active;
                    true
                } else {
                    false
                }
            });
        } else {
            debug!(view = %shared.name, ?trigger, seq = ticket.seq, "discarding stale fetch result");
        }
    });
}
