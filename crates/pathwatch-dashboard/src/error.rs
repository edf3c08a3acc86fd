//! Error types for the dashboard.

use pathwatch_sync::{FetchError, PushError};

/// Errors that can occur while setting up the dashboard.
///
/// Nothing here is raised once the views are running: fetch failures
/// land in the snapshots and push failures are logged.
#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    /// An environment variable is missing or malformed.
    #[error("configuration error: {0}")]
    Config(String),

    /// A view's HTTP client could not be built.
    #[error("failed to build fetcher: {0}")]
    Fetcher(#[from] FetchError),

    /// The push stream URL could not be derived from the base URL.
    #[error("invalid push stream: {0}")]
    Stream(#[from] PushError),
}
