//! Terminal dashboard for the PATH monitoring backend.
//!
//! Four views (system health, collapse self-reflection, the temporal ΞΘ
//! analyzer and the collapse feed) are each kept live by one
//! [`Synchronizer`](pathwatch_sync::Synchronizer). The display only ever
//! reads snapshots; derived values are recomputed on every render.
//!
//! # Modules
//!
//! - [`config`] -- Environment configuration
//! - [`error`] -- Setup errors
//! - [`analytics`] -- Pure derived analytics (trend, threshold, color, formatting)
//! - [`views`] -- View synchronizers and view models
//! - [`render`] -- Plain-text rendering

pub mod analytics;
pub mod config;
pub mod error;
pub mod render;
pub mod views;

pub use config::DashboardConfig;
pub use error::DashboardError;
pub use render::Renderer;
pub use views::{Dashboard, Panel};
