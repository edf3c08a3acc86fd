//! Shared application state for the stub backend.
//!
//! [`AppState`] holds the broadcast channel for stream frames, the
//! in-memory [`BackendData`] that the REST endpoints serve, the optional
//! credentials the endpoints enforce, and per-endpoint request counters
//! that tests use to observe how often a client fetched.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use pathwatch_types::paths::DEFAULT_FEED_TOPIC;
use pathwatch_types::{
    AnalyzerStatus, CollapseEvent, CollapseFeed, CollapseHistoryEntry, CollapseResult,
    DashboardOverview, SelfReflection, StreamFrame, Trend, TriggerLogic, XiThetaResponse,
    XiThetaResult,
};
use serde::Deserialize;
use tokio::sync::{broadcast, RwLock};

/// Capacity of the broadcast channel for stream frames.
///
/// If a subscriber falls behind by more than this many frames it will
/// receive a [`broadcast::error::RecvError::Lagged`] and skip to the
/// newest frame.
const BROADCAST_CAPACITY: usize = 256;

/// Number of history entries kept in the self-reflection response.
const HISTORY_LIMIT: usize = 10;

/// Number of Δψ samples kept in the analyzer window.
const DELTA_WINDOW: usize = 20;

/// Number of events kept per collapse-feed topic.
const FEED_LIMIT: usize = 50;

// ---------------------------------------------------------------------------
// Backend data
// ---------------------------------------------------------------------------

/// Everything the REST endpoints serve.
#[derive(Debug, Clone)]
pub struct BackendData {
    /// Body of the overview endpoint.
    pub overview: DashboardOverview,
    /// Body of the self-reflection endpoint.
    pub reflection: SelfReflection,
    /// Body of the ΞΘ endpoint.
    pub xi_theta: XiThetaResponse,
    /// Collapse feed events keyed by topic.
    pub feeds: BTreeMap<String, CollapseFeed>,
    /// When set, every data endpoint fails with this status code.
    pub outage: Option<u16>,
}

impl Default for BackendData {
    fn default() -> Self {
        Self {
            overview: DashboardOverview {
                glyph: String::from("ΞΔ"),
                status: String::from("coherent"),
                coherence_score: 0.912,
                drift_score: 0.041,
            },
            reflection: SelfReflection {
                recent_collapses: 0,
                success_count: 0,
                fail_count: 0,
                average_risk_score: 0.0,
                dynamic_threshold: 0.12,
                success_rate: 0.0,
                recent_trend: Trend::Unknown,
                history: Vec::new(),
            },
            xi_theta: XiThetaResponse {
                success: true,
                result: Some(XiThetaResult {
                    threshold: 0.12,
                    tace_available: true,
                    analyzer_status: Some(AnalyzerStatus {
                        window_size: 20,
                        samples_recorded: 0,
                        xi_theta_triggers: 0,
                        xi_theta_threshold: 0.12,
                        recent_deltas: Vec::new(),
                    }),
                    trigger_logic: TriggerLogic {
                        primary: String::from("Δψ > θ"),
                        oscillating: String::from("sign flips across 3 consecutive samples"),
                        diverging: String::from("|Δψ| grows across 3 consecutive samples"),
                    },
                }),
            },
            feeds: BTreeMap::new(),
            outage: None,
        }
    }
}

/// A collapse reported to the stub, e.g. by the synthetic generator or a
/// `POST /api/stub/collapse`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CollapseReport {
    /// Glyph produced by the collapse.
    pub glyph: String,
    /// Outcome of the collapse.
    pub result: CollapseResult,
    /// Risk score assigned to the collapse.
    #[serde(default)]
    pub risk_score: f64,
    /// μ component.
    #[serde(default)]
    pub mu: f64,
    /// Φ component.
    #[serde(default)]
    pub phi: f64,
    /// J component.
    #[serde(default)]
    pub j: f64,
    /// Δψ observed by the temporal analyzer.
    #[serde(default)]
    pub delta: f64,
}

impl BackendData {
    /// Fold a collapse into every endpoint body.
    ///
    /// `timestamp` is stored verbatim in the history and the default feed.
    pub fn record_collapse(&mut self, report: &CollapseReport, timestamp: &str) {
        let reflection = &mut self.reflection;
        let previous_rate = reflection.success_rate;

        reflection.recent_collapses = reflection.recent_collapses.saturating_add(1);
        match report.result {
            CollapseResult::Success => {
                reflection.success_count = reflection.success_count.saturating_add(1);
            }
            CollapseResult::Fail => {
                reflection.fail_count = reflection.fail_count.saturating_add(1);
            }
            CollapseResult::Unknown => {}
        }

        let decided = reflection.success_count.saturating_add(reflection.fail_count);
        if decided > 0 {
            reflection.success_rate = ratio(reflection.success_count, decided);
        }
        let samples = ratio(1, reflection.recent_collapses);
        reflection.average_risk_score +=
            (report.risk_score - reflection.average_risk_score) * samples;

        reflection.recent_trend = if reflection.recent_collapses < 2 {
            Trend::Unknown
        } else if reflection.success_rate > previous_rate {
            Trend::Improving
        } else if reflection.success_rate < previous_rate {
            Trend::Declining
        } else {
            Trend::Stable
        };

        reflection.history.insert(
            0,
            CollapseHistoryEntry {
                timestamp: timestamp.to_owned(),
                mu: report.mu,
                phi: report.phi,
                j: report.j,
                risk_score: report.risk_score,
                glyph: report.glyph.clone(),
                result: report.result,
            },
        );
        reflection.history.truncate(HISTORY_LIMIT);

        if let Some(analyzer) = self
            .xi_theta
            .result
            .as_mut()
            .and_then(|result| result.analyzer_status.as_mut())
        {
            analyzer.samples_recorded = analyzer.samples_recorded.saturating_add(1);
            if report.delta > analyzer.xi_theta_threshold {
                analyzer.xi_theta_triggers = analyzer.xi_theta_triggers.saturating_add(1);
            }
            analyzer.recent_deltas.push(report.delta);
            let excess = analyzer.recent_deltas.len().saturating_sub(DELTA_WINDOW);
            analyzer.recent_deltas.drain(..excess);
        }

        let feed = self.feeds.entry(DEFAULT_FEED_TOPIC.to_owned()).or_default();
        feed.events.insert(
            0,
            CollapseEvent {
                label: None,
                glyph: report.glyph.clone(),
                resonance_type: String::from("collapse"),
                subsystem: String::from("path"),
                timestamp: timestamp.to_owned(),
            },
        );
        feed.events.truncate(FEED_LIMIT);
    }
}

/// `part / whole` as a float. Counters stay far below 2^52.
#[allow(clippy::cast_precision_loss)]
fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64
}

// ---------------------------------------------------------------------------
// Credentials and counters
// ---------------------------------------------------------------------------

/// Credentials the stub enforces. `None` leaves that scheme open.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Expected `X-API-Key` value (overview and collapse feed).
    pub api_key: Option<String>,
    /// Expected bearer token (self-reflection and ΞΘ).
    pub auth_token: Option<String>,
}

/// Endpoints whose requests are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// `GET /api/path/dashboard/overview`.
    Overview,
    /// `GET /api/path/self-reflection`.
    SelfReflection,
    /// `GET /api/path/xi-theta`.
    XiTheta,
    /// `GET /api/path/collapse-feed`.
    CollapseFeed,
}

/// Live request counters, one per [`Endpoint`].
#[derive(Debug, Default)]
pub struct RequestCounters {
    overview: AtomicU64,
    self_reflection: AtomicU64,
    xi_theta: AtomicU64,
    collapse_feed: AtomicU64,
}

impl RequestCounters {
    const fn counter(&self, endpoint: Endpoint) -> &AtomicU64 {
        match endpoint {
            Endpoint::Overview => &self.overview,
            Endpoint::SelfReflection => &self.self_reflection,
            Endpoint::XiTheta => &self.xi_theta,
            Endpoint::CollapseFeed => &self.collapse_feed,
        }
    }

    /// Count one request.
    pub fn record(&self, endpoint: Endpoint) {
        self.counter(endpoint).fetch_add(1, Ordering::Relaxed);
    }

    /// Requests served so far for `endpoint`.
    pub fn get(&self, endpoint: Endpoint) -> u64 {
        self.counter(endpoint).load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
/// The broadcast sender pushes stream frames to every connected
/// `WebSocket` client. The data is a read-write lock protecting what
/// the REST endpoints serve.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast sender for stream frames.
    pub tx: broadcast::Sender<StreamFrame>,
    /// What the REST endpoints serve.
    pub data: Arc<RwLock<BackendData>>,
    /// Credentials enforced by the REST endpoints.
    pub credentials: Credentials,
    /// Per-endpoint request counters.
    pub requests: Arc<RequestCounters>,
}

impl AppState {
    /// Create a state with sample data and no credential checks.
    pub fn new() -> Self {
        Self::with_credentials(Credentials::default())
    }

    /// Create a state with sample data that enforces `credentials`.
    pub fn with_credentials(credentials: Credentials) -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            tx,
            data: Arc::new(RwLock::new(BackendData::default())),
            credentials,
            requests: Arc::new(RequestCounters::default()),
        }
    }

    /// Subscribe to the stream frame channel.
    pub fn subscribe(&self) -> broadcast::Receiver<StreamFrame> {
        self.tx.subscribe()
    }

    /// Publish a frame to all connected clients.
    ///
    /// Returns the number of receivers that got it. Returns 0 if no
    /// clients are connected (this is not an error).
    pub fn publish(&self, frame: &StreamFrame) -> usize {
        self.tx.send(frame.clone()).unwrap_or(0)
    }

    /// Number of connected stream clients.
    pub fn stream_clients(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Record a collapse now and announce it on the stream.
    pub async fn record_collapse(&self, report: &CollapseReport) -> usize {
        let timestamp = chrono::Utc::now().to_rfc3339();
        self.data.write().await.record_collapse(report, &timestamp);
        self.publish(&StreamFrame::glyph_collapse(report.glyph.clone()))
    }

    /// Start or end a simulated outage.
    pub async fn set_outage(&self, status: Option<u16>) {
        self.data.write().await.outage = status;
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn report(result: CollapseResult, delta: f64) -> CollapseReport {
        CollapseReport {
            glyph: String::from("Ψ"),
            result,
            risk_score: 0.5,
            mu: 0.1,
            phi: 0.2,
            j: 0.3,
            delta,
        }
    }

    #[test]
    fn collapse_updates_counts_and_history() {
        let mut data = BackendData::default();
        data.record_collapse(&report(CollapseResult::Success, 0.05), "2025-01-01T00:00:00Z");
        data.record_collapse(&report(CollapseResult::Fail, 0.2), "2025-01-01T00:01:00Z");

        assert_eq!(data.reflection.recent_collapses, 2);
        assert_eq!(data.reflection.success_count, 1);
        assert_eq!(data.reflection.fail_count, 1);
        assert!((data.reflection.success_rate - 0.5).abs() < 1e-9);
        assert_eq!(data.reflection.recent_trend, Trend::Declining);
        assert_eq!(
            data.reflection.history.first().map(|h| h.timestamp.as_str()),
            Some("2025-01-01T00:01:00Z")
        );
    }

    #[test]
    fn collapse_feeds_the_analyzer_window() {
        let mut data = BackendData::default();
        for _ in 0..25 {
            data.record_collapse(&report(CollapseResult::Success, 0.15), "t");
        }
        let analyzer = data
            .xi_theta
            .result
            .and_then(|r| r.analyzer_status)
            .unwrap();
        assert_eq!(analyzer.samples_recorded, 25);
        assert_eq!(analyzer.xi_theta_triggers, 25);
        assert_eq!(analyzer.recent_deltas.len(), DELTA_WINDOW);
        assert_eq!(data.reflection.history.len(), HISTORY_LIMIT);
    }

    #[test]
    fn counters_are_per_endpoint() {
        let counters = RequestCounters::default();
        counters.record(Endpoint::Overview);
        counters.record(Endpoint::Overview);
        counters.record(Endpoint::XiTheta);
        assert_eq!(counters.get(Endpoint::Overview), 2);
        assert_eq!(counters.get(Endpoint::XiTheta), 1);
        assert_eq!(counters.get(Endpoint::CollapseFeed), 0);
    }

    #[tokio::test]
    async fn publish_without_clients_is_not_an_error() {
        let state = AppState::new();
        assert_eq!(state.publish(&StreamFrame::bundle_generated()), 0);
        let mut rx = state.subscribe();
        assert_eq!(state.record_collapse(&report(CollapseResult::Success, 0.0)).await, 1);
        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.kind.as_deref(), Some("glyph_collapse"));
    }
}
