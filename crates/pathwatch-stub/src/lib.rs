//! In-memory stub of the PATH monitoring backend.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **REST endpoints** for the four dashboard views (overview,
//!   self-reflection, ΞΘ analyzer, collapse feed), each behind the
//!   credential scheme the real backend uses
//! - **`WebSocket` endpoint** (`/ws/path/glyph`) broadcasting a
//!   [`StreamFrame`](pathwatch_types::StreamFrame) for every recorded
//!   collapse via [`tokio::sync::broadcast`]
//! - **Development hooks**: a synthetic collapse generator and
//!   `POST /api/stub/collapse`
//!
//! It exists for local development and for the dashboard's integration
//! tests, which inspect [`AppState`] directly to count requests, publish
//! frames and simulate outages.

pub mod config;
pub mod error;
pub mod generator;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use config::StubConfig;
pub use router::build_router;
pub use server::{serve, start_server, ServerConfig, ServerError};
pub use state::{AppState, BackendData, CollapseReport, Credentials, Endpoint};
