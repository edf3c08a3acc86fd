//! Live snapshot synchronization over a fetch channel and a push channel.
//!
//! A [`Synchronizer`] keeps one [`Snapshot`] of remote state current while
//! it is active. Three things cause a fetch:
//!
//! - the **activation** itself, once, immediately
//! - the **poll timer** ([`PollScheduler`]), every interval
//! - a recognized frame on the **push channel** ([`PushSource`])
//!
//! The push channel is only an invalidation hint. Whatever triggers a
//! fetch, the value always comes from the fetch channel ([`Fetch`]) and
//! goes through one commit path that rejects results from a previous
//! activation and results overtaken by a newer request.
//!
//! # Modules
//!
//! - [`error`] -- Failure categories for fetches and push-side errors
//! - [`snapshot`] -- The snapshot store and its read handle
//! - [`fetch`] -- The fetch trait, cancellation wrapper and HTTP fetcher
//! - [`push`] -- Frame filtering and the event-stream push source
//! - [`poll`] -- The poll timer
//! - [`synchronizer`] -- Lifecycle and trigger wiring

pub mod error;
pub mod fetch;
pub mod poll;
pub mod push;
pub mod snapshot;
pub mod synchronizer;

pub use error::{ErrorKind, FetchError, FrameError, PushError};
pub use fetch::{
    Credential, Fetch, FetchChannel, FetchExt, FetchOutcome, HttpFetcher, HttpFetcherBuilder,
    Mapped, DEFAULT_REQUEST_TIMEOUT,
};
pub use poll::{PollHandle, PollScheduler, PollTick};
pub use push::{
    dispatch_frame, stream_url, FrameFilter, PushHandle, PushSignal, PushSource, WebSocketPush,
    DEFAULT_CONNECT_TIMEOUT,
};
pub use snapshot::{Snapshot, SnapshotReader, SnapshotStatus, SnapshotStore};
pub use synchronizer::{SyncState, Synchronizer, SynchronizerBuilder, Trigger};
