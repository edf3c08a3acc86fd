//! The snapshot store: latest known value plus its freshness.
//!
//! [`SnapshotStore`] is backed by a [`tokio::sync::watch`] channel, so
//! reads never block and every accepted commit wakes each
//! [`SnapshotReader`] exactly once. Mutation is crate-private: only the
//! synchronizer writes.
//!
//! # Commit ordering
//!
//! Every fetch is issued a [`Ticket`] carrying the generation that was
//! current when the fetch started and a per-store request sequence number.
//! A commit is accepted only when
//!
//! 1. the ticket's generation is still the current generation, and
//! 2. the ticket's sequence number is greater than that of the last
//!    accepted commit.
//!
//! Both checks and the write happen inside the watch channel's write lock,
//! so an advancing generation and a racing commit can never interleave.
//! Rule 2 means a slow fetch that resolves after a newer one is dropped
//! instead of overwriting the fresher value.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;

use crate::error::ErrorKind;
use crate::fetch::FetchOutcome;

/// Freshness of the snapshot. Exactly one holds at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapshotStatus {
    /// A load is in progress. Any previous value is still shown.
    Loading,
    /// The most recent accepted fetch succeeded.
    Ready,
    /// The most recent accepted fetch failed.
    Failed,
}

/// The displayable value and its freshness state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot<T> {
    /// Last successfully fetched value. Survives later loads and failures.
    pub value: Option<T>,
    /// Current freshness state.
    pub status: SnapshotStatus,
    /// Category of the most recent failure, cleared by the next success.
    pub last_error: Option<ErrorKind>,
    /// Number of accepted commits so far.
    pub revision: u64,
}

impl<T> Snapshot<T> {
    /// An empty snapshot waiting for its first load.
    pub const fn loading() -> Self {
        Self {
            value: None,
            status: SnapshotStatus::Loading,
            last_error: None,
            revision: 0,
        }
    }

    /// Whether a load is in progress.
    pub const fn is_loading(&self) -> bool {
        matches!(self.status, SnapshotStatus::Loading)
    }

    /// The error to show, if the most recent fetch failed.
    pub const fn error(&self) -> Option<ErrorKind> {
        match self.status {
            SnapshotStatus::Failed => self.last_error,
            SnapshotStatus::Loading | SnapshotStatus::Ready => None,
        }
    }

    /// Whether the most recent fetch failed and nothing was ever loaded.
    ///
    /// This is the only case where the display should replace the view
    /// with an error banner instead of showing stale data.
    pub const fn is_blank_failure(&self) -> bool {
        matches!(self.status, SnapshotStatus::Failed) && self.value.is_none()
    }
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self::loading()
    }
}

/// Identity of one fetch, captured when the fetch starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Ticket {
    /// Generation current at fetch start.
    pub(crate) generation: u64,
    /// Store-wide request sequence number.
    pub(crate) seq: u64,
}

/// Single-writer, multi-reader holder of the current [`Snapshot`].
#[derive(Debug)]
pub struct SnapshotStore<T> {
    tx: watch::Sender<Snapshot<T>>,
    generation: AtomicU64,
    next_seq: AtomicU64,
    committed_seq: AtomicU64,
}

impl<T: Clone> SnapshotStore<T> {
    /// Create a store holding an empty loading snapshot.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Snapshot::loading());
        Self {
            tx,
            generation: AtomicU64::new(0),
            next_seq: AtomicU64::new(0),
            committed_seq: AtomicU64::new(0),
        }
    }

    /// Clone the current snapshot. Never blocks on writers for longer than
    /// a clone.
    pub fn read(&self) -> Snapshot<T> {
        self.tx.borrow().clone()
    }

    /// Open a read-only handle for the display layer.
    pub fn reader(&self) -> SnapshotReader<T> {
        SnapshotReader {
            rx: self.tx.subscribe(),
        }
    }

    /// The current generation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Advance the generation, invalidating every outstanding ticket.
    ///
    /// Runs under the channel write lock so it is ordered against any
    /// concurrent [`commit`](Self::commit). Does not notify readers.
    pub(crate) fn advance_generation(&self) -> u64 {
        let mut advanced = 0;
        self.tx.send_if_modified(|_| {
            advanced = self
                .generation
                .fetch_add(1, Ordering::AcqRel)
                .wrapping_add(1);
            false
        });
        advanced
    }

    /// Issue a ticket for a fetch starting now under `generation`.
    pub(crate) fn ticket(&self, generation: u64) -> Ticket {
        let seq = self.next_seq.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
        Ticket { generation, seq }
    }

    /// Move to [`SnapshotStatus::Loading`], keeping any previous value.
    pub(crate) fn begin_load(&self) {
        self.tx.send_if_modified(|snapshot| {
            if snapshot.status == SnapshotStatus::Loading {
                return false;
            }
            snapshot.status = SnapshotStatus::Loading;
            true
        });
    }

    /// Apply a fetch outcome if its ticket is still current.
    ///
    /// Returns `true` when the outcome was accepted. Rejected outcomes
    /// leave the snapshot untouched and notify nobody.
    pub(crate) fn commit(&self, ticket: Ticket, outcome: FetchOutcome<T>) -> bool {
        self.tx.send_if_modified(|snapshot| {
            if ticket.generation != self.generation.load(Ordering::Acquire) {
                return false;
            }
            if ticket.seq <= self.committed_seq.load(Ordering::Acquire) {
                return false;
            }
            self.committed_seq.store(ticket.seq, Ordering::Release);

            match outcome {
                Ok(value) => {
                    snapshot.value = Some(value);
                    snapshot.status = SnapshotStatus::Ready;
                    snapshot.last_error = None;
                }
                Err(err) => {
                    snapshot.status = SnapshotStatus::Failed;
                    snapshot.last_error = Some(err.kind());
                }
            }
            snapshot.revision = snapshot.revision.wrapping_add(1);
            true
        })
    }
}

impl<T: Clone> Default for SnapshotStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of a [`SnapshotStore`] handed to the display layer.
#[derive(Debug, Clone)]
pub struct SnapshotReader<T> {
    rx: watch::Receiver<Snapshot<T>>,
}

impl<T: Clone> SnapshotReader<T> {
    /// Clone the current snapshot.
    pub fn read(&self) -> Snapshot<T> {
        self.rx.borrow().clone()
    }

    /// Wait for the next change and return the new snapshot.
    ///
    /// Returns `None` once the owning synchronizer has been dropped.
    pub async fn changed(&mut self) -> Option<Snapshot<T>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;

    fn active_store() -> (SnapshotStore<u32>, u64) {
        let store = SnapshotStore::new();
        let generation = store.advance_generation();
        (store, generation)
    }

    #[test]
    fn starts_loading_and_empty() {
        let store: SnapshotStore<u32> = SnapshotStore::new();
        let snap = store.read();
        assert!(snap.is_loading());
        assert_eq!(snap.value, None);
        assert_eq!(snap.revision, 0);
    }

    #[test]
    fn success_commit_becomes_ready() {
        let (store, generation) = active_store();
        assert!(store.commit(store.ticket(generation), Ok(5)));
        let snap = store.read();
        assert_eq!(snap.status, SnapshotStatus::Ready);
        assert_eq!(snap.value, Some(5));
        assert_eq!(snap.error(), None);
        assert_eq!(snap.revision, 1);
    }

    #[test]
    fn failure_keeps_previous_value() {
        let (store, generation) = active_store();
        store.commit(store.ticket(generation), Ok(5));
        store.commit(
            store.ticket(generation),
            Err(FetchError::Network("refused".to_owned())),
        );
        let snap = store.read();
        assert_eq!(snap.status, SnapshotStatus::Failed);
        assert_eq!(snap.value, Some(5));
        assert_eq!(snap.error(), Some(ErrorKind::Network));
        assert!(!snap.is_blank_failure());
    }

    #[test]
    fn failure_without_value_is_blank() {
        let (store, generation) = active_store();
        store.commit(
            store.ticket(generation),
            Err(FetchError::Unauthorized { status: 401 }),
        );
        assert!(store.read().is_blank_failure());
    }

    #[test]
    fn next_success_clears_error() {
        let (store, generation) = active_store();
        store.commit(
            store.ticket(generation),
            Err(FetchError::Decode("bad".to_owned())),
        );
        store.commit(store.ticket(generation), Ok(9));
        let snap = store.read();
        assert_eq!(snap.last_error, None);
        assert_eq!(snap.value, Some(9));
    }

    #[test]
    fn begin_load_keeps_value() {
        let (store, generation) = active_store();
        store.commit(store.ticket(generation), Ok(5));
        store.begin_load();
        let snap = store.read();
        assert!(snap.is_loading());
        assert_eq!(snap.value, Some(5));
    }

    #[test]
    fn stale_generation_is_rejected() {
        let (store, generation) = active_store();
        let ticket = store.ticket(generation);
        store.advance_generation();
        assert!(!store.commit(ticket, Ok(5)));
        assert_eq!(store.read().revision, 0);
        assert_eq!(store.read().value, None);
    }

    #[test]
    fn older_request_cannot_overwrite_newer() {
        let (store, generation) = active_store();
        let first = store.ticket(generation);
        let second = store.ticket(generation);
        assert!(store.commit(second, Ok(2)));
        assert!(!store.commit(first, Ok(1)));
        assert_eq!(store.read().value, Some(2));
        assert_eq!(store.read().revision, 1);
    }

    #[test]
    fn requests_resolving_in_order_both_commit() {
        let (store, generation) = active_store();
        let first = store.ticket(generation);
        let second = store.ticket(generation);
        assert!(store.commit(first, Ok(1)));
        assert!(store.commit(second, Ok(2)));
        assert_eq!(store.read().value, Some(2));
        assert_eq!(store.read().revision, 2);
    }

    #[tokio::test]
    async fn readers_are_notified_once_per_commit() {
        let (store, generation) = active_store();
        let mut reader = store.reader();

        store.commit(store.ticket(generation), Ok(5));
        let seen = reader.changed().await;
        assert_eq!(seen.and_then(|s| s.value), Some(5));

        // A rejected commit must not wake the reader.
        let stale = store.ticket(generation.wrapping_sub(1));
        store.commit(stale, Ok(6));
        let woke = tokio::time::timeout(std::time::Duration::from_millis(20), reader.changed()).await;
        assert!(woke.is_err());
    }

    #[tokio::test]
    async fn reader_ends_when_store_dropped() {
        let store: SnapshotStore<u32> = SnapshotStore::new();
        let mut reader = store.reader();
        drop(store);
        assert!(reader.changed().await.is_none());
    }
}
