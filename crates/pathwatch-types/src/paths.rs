//! Endpoint paths and push-frame discriminators of the PATH backend.
//!
//! Both the dashboard and the stub backend build their URLs and routes
//! from these constants so the two sides cannot drift apart.

/// System health overview (`X-API-Key` auth).
pub const OVERVIEW: &str = "/api/path/dashboard/overview";

/// Autonomous collapse self-reflection (bearer auth).
pub const SELF_REFLECTION: &str = "/api/path/self-reflection";

/// Temporal ΞΘ analyzer status (bearer auth).
pub const XI_THETA: &str = "/api/path/xi-theta";

/// Collapse event feed for one glyph stream (`X-API-Key` auth).
pub const COLLAPSE_FEED: &str = "/api/path/collapse-feed";

/// Event stream announcing new glyph collapses.
pub const GLYPH_STREAM: &str = "/ws/path/glyph";

/// Default glyph stream topic for the collapse feed.
pub const DEFAULT_FEED_TOPIC: &str = "Ψ_PATH_COLLAPSE";

/// `type` value announcing a new glyph collapse.
pub const GLYPH_COLLAPSE: &str = "glyph_collapse";

/// `event_type` value announcing a newly generated bundle.
pub const BUNDLE_GENERATED: &str = "path/bundle_generated";
