//! Axum router construction for the stub backend.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS middleware enabled so a browser dashboard can talk to it
//! during local development.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use pathwatch_types::paths;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the stub backend.
///
/// The router includes:
/// - `GET /ws/path/glyph` -- `WebSocket` glyph event stream
/// - `GET /api/path/dashboard/overview` -- system health
/// - `GET /api/path/self-reflection` -- collapse self-reflection
/// - `GET /api/path/xi-theta` -- ΞΘ analyzer status
/// - `GET /api/path/collapse-feed` -- collapse feed for a topic
/// - `POST /api/stub/collapse` -- record a collapse (development only)
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // WebSocket
        .route(paths::GLYPH_STREAM, get(ws::ws_glyph))
        // REST API
        .route(paths::OVERVIEW, get(handlers::get_overview))
        .route(paths::SELF_REFLECTION, get(handlers::get_self_reflection))
        .route(paths::XI_THETA, get(handlers::get_xi_theta))
        .route(paths::COLLAPSE_FEED, get(handlers::get_collapse_feed))
        // Development hooks
        .route("/api/stub/collapse", post(handlers::post_collapse))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
