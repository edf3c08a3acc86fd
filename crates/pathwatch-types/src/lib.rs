//! Shared wire types for the Pathwatch telemetry dashboard.
//!
//! This crate is the single source of truth for the JSON shapes served by
//! the PATH monitoring backend. The dashboard decodes them; the stub
//! backend encodes them.
//!
//! # Modules
//!
//! - [`enums`] -- Trend and collapse-result enumerations (tolerant of unknown values)
//! - [`structs`] -- Response bodies for each feature view
//! - [`paths`] -- Endpoint paths and push-frame discriminators

pub mod enums;
pub mod paths;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{lenient, CollapseResult, Trend};
pub use structs::{
    AnalyzerStatus, CollapseEvent, CollapseFeed, CollapseHistoryEntry, DashboardOverview,
    SelfReflection, StreamFrame, TriggerLogic, XiThetaResponse, XiThetaResult,
};
