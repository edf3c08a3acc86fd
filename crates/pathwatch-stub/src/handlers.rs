//! REST API endpoint handlers for the stub backend.
//!
//! All handlers read from the in-memory [`BackendData`] via the shared
//! [`AppState`], after checking the credential scheme the real backend
//! uses for that endpoint.
//!
//! # Endpoints
//!
//! | Method | Path | Auth | Description |
//! |--------|------|------|-------------|
//! | `GET` | `/api/path/dashboard/overview` | `X-API-Key` | System health |
//! | `GET` | `/api/path/self-reflection` | bearer | Collapse self-reflection |
//! | `GET` | `/api/path/xi-theta` | bearer | ΞΘ analyzer status |
//! | `GET` | `/api/path/collapse-feed?topic=` | `X-API-Key` | Collapse feed |
//! | `POST` | `/api/stub/collapse` | none | Record a collapse and announce it |
//!
//! [`BackendData`]: crate::state::BackendData

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use pathwatch_types::paths::DEFAULT_FEED_TOPIC;
use tracing::debug;

use crate::error::StubError;
use crate::state::{AppState, CollapseReport, Endpoint};

/// Header carrying the API key.
const API_KEY_HEADER: &str = "x-api-key";

// ---------------------------------------------------------------------------
// Query parameter structs
// ---------------------------------------------------------------------------

/// Query parameters for the `GET /api/path/collapse-feed` endpoint.
#[derive(Debug, serde::Deserialize)]
pub struct FeedQuery {
    /// Glyph stream topic. Defaults to the main collapse stream.
    pub topic: Option<String>,
}

// ---------------------------------------------------------------------------
// Credential checks
// ---------------------------------------------------------------------------

/// Compare a presented credential against the expected one.
fn check(expected: Option<&str>, presented: Option<&str>, scheme: &str) -> Result<(), StubError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    match presented {
        None => Err(StubError::MissingCredentials(scheme.to_owned())),
        Some(value) if value == expected => Ok(()),
        Some(_) => Err(StubError::InvalidCredentials(scheme.to_owned())),
    }
}

/// Require the configured `X-API-Key`, if any.
fn require_api_key(state: &AppState, headers: &HeaderMap) -> Result<(), StubError> {
    let presented = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok());
    check(state.credentials.api_key.as_deref(), presented, "api key")
}

/// Require the configured bearer token, if any.
fn require_bearer(state: &AppState, headers: &HeaderMap) -> Result<(), StubError> {
    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    check(state.credentials.auth_token.as_deref(), presented, "bearer token")
}

/// Fail with the simulated outage status, if one is active.
async fn check_outage(state: &AppState) -> Result<(), StubError> {
    let outage = state.data.read().await.outage;
    outage.map_or(Ok(()), |code| Err(StubError::Outage(code)))
}

// ---------------------------------------------------------------------------
// GET /api/path/dashboard/overview
// ---------------------------------------------------------------------------

/// Return the system health overview.
pub async fn get_overview(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, StubError> {
    state.requests.record(Endpoint::Overview);
    require_api_key(&state, &headers)?;
    check_outage(&state).await?;

    let data = state.data.read().await;
    Ok(Json(serde_json::to_value(&data.overview)?))
}

// ---------------------------------------------------------------------------
// GET /api/path/self-reflection
// ---------------------------------------------------------------------------

/// Return the collapse self-reflection with the recent history.
pub async fn get_self_reflection(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, StubError> {
    state.requests.record(Endpoint::SelfReflection);
    require_bearer(&state, &headers)?;
    check_outage(&state).await?;

    let data = state.data.read().await;
    Ok(Json(serde_json::to_value(&data.reflection)?))
}

// ---------------------------------------------------------------------------
// GET /api/path/xi-theta
// ---------------------------------------------------------------------------

/// Return the ΞΘ analyzer status envelope.
pub async fn get_xi_theta(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, StubError> {
    state.requests.record(Endpoint::XiTheta);
    require_bearer(&state, &headers)?;
    check_outage(&state).await?;

    let data = state.data.read().await;
    Ok(Json(serde_json::to_value(&data.xi_theta)?))
}

// ---------------------------------------------------------------------------
// GET /api/path/collapse-feed
// ---------------------------------------------------------------------------

/// Return the events of one glyph stream. Unknown topics are empty.
///
/// # Query Parameters
///
/// - `topic`: glyph stream name (default `Ψ_PATH_COLLAPSE`)
pub async fn get_collapse_feed(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<FeedQuery>,
) -> Result<impl IntoResponse, StubError> {
    state.requests.record(Endpoint::CollapseFeed);
    require_api_key(&state, &headers)?;
    check_outage(&state).await?;

    let topic = params.topic.as_deref().unwrap_or(DEFAULT_FEED_TOPIC);
    let data = state.data.read().await;
    let feed = data.feeds.get(topic).cloned().unwrap_or_default();
    debug!(topic, events = feed.events.len(), "serving collapse feed");
    Ok(Json(serde_json::to_value(&feed)?))
}

// ---------------------------------------------------------------------------
// POST /api/stub/collapse
// ---------------------------------------------------------------------------

/// Record a collapse and announce it on the glyph stream.
pub async fn post_collapse(
    State(state): State<Arc<AppState>>,
    Json(report): Json<CollapseReport>,
) -> impl IntoResponse {
    let delivered = state.record_collapse(&report).await;
    Json(serde_json::json!({
        "recorded": true,
        "delivered": delivered,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_scheme_accepts_anything() {
        assert!(check(None, None, "api key").is_ok());
        assert!(check(None, Some("whatever"), "api key").is_ok());
    }

    #[test]
    fn missing_and_wrong_credentials_differ() {
        assert!(matches!(
            check(Some("k"), None, "api key"),
            Err(StubError::MissingCredentials(_))
        ));
        assert!(matches!(
            check(Some("k"), Some("x"), "api key"),
            Err(StubError::InvalidCredentials(_))
        ));
        assert!(check(Some("k"), Some("k"), "api key").is_ok());
    }
}
