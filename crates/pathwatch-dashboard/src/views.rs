//! The four dashboard views and their view models.
//!
//! [`Dashboard`] builds one [`Synchronizer`] per view from the
//! configuration:
//!
//! | View | Endpoint | Auth | Poll | Push |
//! |------|----------|------|------|------|
//! | overview | `/api/path/dashboard/overview` | `X-API-Key` | 60s | - |
//! | self-reflection | `/api/path/self-reflection` | bearer + cookies | 30s | `/ws/path/glyph` |
//! | ΞΘ analyzer | `/api/path/xi-theta` | bearer + cookies | off | - |
//! | collapse feed | `/api/path/collapse-feed?topic=` | `X-API-Key` | off | - |
//!
//! View models ([`OverviewView`], [`ReflectionView`], [`XiThetaView`],
//! [`FeedView`]) are derived from a snapshot on every render and never
//! stored. [`Panel`] decides between the loading line, the full error
//! banner, and the data with its freshness markers.

use pathwatch_sync::{
    stream_url, Credential, ErrorKind, Fetch, FetchError, FetchExt, FetchOutcome, FrameFilter,
    HttpFetcher, Mapped, Snapshot, SnapshotStatus, Synchronizer, WebSocketPush,
};
use pathwatch_types::paths;
use pathwatch_types::{
    CollapseFeed, CollapseHistoryEntry, DashboardOverview, SelfReflection, XiThetaResponse,
    XiThetaResult,
};
use tracing::info;

use crate::analytics::{
    classify_threshold, coherence_bucket, fixed, percent, timestamp, trend_display, Color,
    ThresholdClass, TrendDisplay, SCORE_PLACES,
};
use crate::config::DashboardConfig;
use crate::error::DashboardError;

/// Shown when the reflection history is empty.
pub const EMPTY_HISTORY: &str = "No collapse history yet. PATH is waiting for traces to process.";

/// Shown when the analyzer has no Δψ observations.
pub const EMPTY_OBSERVATIONS: &str = "No Δψ observations yet. TACE analyzer needs more data.";

/// Shown when the collapse feed is empty.
pub const EMPTY_FEED: &str = "No collapse events on this stream yet.";

// ---------------------------------------------------------------------------
// Synchronizers
// ---------------------------------------------------------------------------

/// Unwraps the ΞΘ `success` envelope.
pub type XiThetaUnwrap = fn(XiThetaResponse) -> FetchOutcome<XiThetaResult>;

/// Synchronizer of the overview view.
pub type OverviewSync = Synchronizer<HttpFetcher<DashboardOverview>>;
/// Synchronizer of the self-reflection view.
pub type ReflectionSync = Synchronizer<HttpFetcher<SelfReflection>>;
/// Synchronizer of the ΞΘ analyzer view.
pub type XiThetaSync = Synchronizer<Mapped<HttpFetcher<XiThetaResponse>, XiThetaUnwrap, XiThetaResult>>;
/// Synchronizer of the collapse feed view.
pub type FeedSync = Synchronizer<HttpFetcher<CollapseFeed>>;

/// A `success: false` envelope, or one without a result, is a decode
/// failure: the body did not carry what the view needs.
pub fn unwrap_xi_theta(response: XiThetaResponse) -> FetchOutcome<XiThetaResult> {
    let success = response.success;
    response.into_result().ok_or_else(|| {
        FetchError::Decode(if success {
            String::from("ΞΘ response is missing its result")
        } else {
            String::from("ΞΘ analyzer reported failure")
        })
    })
}

/// The recognized frames of the glyph stream.
pub fn glyph_filter() -> FrameFilter {
    FrameFilter::new()
        .recognize("type", paths::GLYPH_COLLAPSE)
        .recognize("event_type", paths::BUNDLE_GENERATED)
}

/// All four views of the dashboard.
#[derive(Debug)]
pub struct Dashboard {
    /// System health overview.
    pub overview: OverviewSync,
    /// Collapse self-reflection.
    pub reflection: ReflectionSync,
    /// Temporal ΞΘ analyzer.
    pub xi_theta: XiThetaSync,
    /// Collapse feed of the configured topic.
    pub feed: FeedSync,
    topic: String,
}

impl Dashboard {
    /// Build every view from `config`. Nothing is activated yet.
    pub fn from_config(config: &DashboardConfig) -> Result<Self, DashboardError> {
        let base = config.api_base.as_str();
        let api_key = Credential::ApiKey(config.api_key.clone());
        let bearer = Credential::Bearer(config.auth_token.clone());

        let overview = Synchronizer::builder(
            HttpFetcher::builder(base, paths::OVERVIEW)
                .credential(api_key.clone())
                .timeout(config.request_timeout)
                .build()?,
        )
        .name("overview")
        .poll_interval(config.overview_poll)
        .build();

        let push = WebSocketPush::new(stream_url(base, paths::GLYPH_STREAM)?, glyph_filter())
            .with_connect_timeout(config.push_connect_timeout);
        let reflection = Synchronizer::builder(
            HttpFetcher::builder(base, paths::SELF_REFLECTION)
                .credential(bearer.clone())
                .timeout(config.request_timeout)
                .with_credentials(true)
                .build()?,
        )
        .name("self-reflection")
        .poll_interval(config.reflection_poll)
        .push(push)
        .build();

        let xi_theta = Synchronizer::builder(
            HttpFetcher::builder(base, paths::XI_THETA)
                .credential(bearer)
                .timeout(config.request_timeout)
                .with_credentials(true)
                .build()?
                .map_outcome(unwrap_xi_theta as XiThetaUnwrap),
        )
        .name("xi-theta")
        .poll_interval(config.xi_theta_poll)
        .build();

        let feed = Synchronizer::builder(
            HttpFetcher::builder(base, paths::COLLAPSE_FEED)
                .credential(api_key)
                .query("topic", config.glyph_stream.clone())
                .timeout(config.request_timeout)
                .build()?,
        )
        .name("collapse-feed")
        .build();

        log_wiring(&overview);
        log_wiring(&reflection);
        log_wiring(&xi_theta);
        log_wiring(&feed);

        Ok(Self {
            overview,
            reflection,
            xi_theta,
            feed,
            topic: config.glyph_stream.clone(),
        })
    }

    /// The collapse feed topic.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Activate every view.
    pub async fn activate_all(&self) {
        tokio::join!(
            self.overview.activate(),
            self.reflection.activate(),
            self.xi_theta.activate(),
            self.feed.activate(),
        );
        info!("all views active");
    }

    /// Deactivate every view and wait for their teardown.
    pub async fn deactivate_all(&self) {
        tokio::join!(
            self.overview.deactivate(),
            self.reflection.deactivate(),
            self.xi_theta.deactivate(),
            self.feed.deactivate(),
        );
        info!("all views inactive");
    }

    /// Ask every active view for an out-of-band fetch. Returns how many
    /// accepted.
    pub async fn refresh_all(&self) -> usize {
        let (a, b, c, d) = tokio::join!(
            self.overview.refresh(),
            self.reflection.refresh(),
            self.xi_theta.refresh(),
            self.feed.refresh(),
        );
        [a, b, c, d].into_iter().filter(|accepted| *accepted).count()
    }
}

fn log_wiring<F>(sync: &Synchronizer<F>)
where
    F: Fetch,
    F::Output: Clone + Sync,
{
    info!(
        view = sync.name(),
        poll_ms = sync.poll_interval().map(|every| every.as_millis()),
        push = sync.has_push(),
        "view wired"
    );
}

// ---------------------------------------------------------------------------
// Panel
// ---------------------------------------------------------------------------

/// What a view shows for a given snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum Panel<V> {
    /// Nothing loaded yet and a load is running.
    Loading,
    /// The latest fetch failed and nothing was ever loaded.
    Unavailable(ErrorKind),
    /// A value is available.
    Showing {
        /// The derived view model.
        view: V,
        /// A reload is in progress.
        refreshing: bool,
        /// The latest fetch failed; `view` is from an earlier success.
        stale: Option<ErrorKind>,
    },
}

impl<V> Panel<V> {
    /// Derive the panel for `snapshot`, building the view model with
    /// `derive` when a value is present.
    pub fn from_snapshot<T>(snapshot: &Snapshot<T>, derive: impl FnOnce(&T) -> V) -> Self {
        match (&snapshot.value, snapshot.status) {
            (Some(value), status) => Self::Showing {
                view: derive(value),
                refreshing: status == SnapshotStatus::Loading,
                stale: snapshot.error(),
            },
            (None, SnapshotStatus::Failed) => {
                Self::Unavailable(snapshot.last_error.unwrap_or(ErrorKind::Unknown))
            }
            (None, SnapshotStatus::Loading | SnapshotStatus::Ready) => Self::Loading,
        }
    }
}

/// Banner text for a failed view.
pub const fn error_message(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Network => "Failed to connect to PATH backend",
        ErrorKind::Unauthorized => "PATH backend rejected the credentials",
        ErrorKind::Decode => "PATH backend sent an unexpected response",
        ErrorKind::Unknown => "Failed to load data",
    }
}

// ---------------------------------------------------------------------------
// View models
// ---------------------------------------------------------------------------

/// Overview view model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverviewView {
    /// System glyph.
    pub glyph: String,
    /// Status label.
    pub status: String,
    /// Coherence score, 3 decimals.
    pub coherence: String,
    /// Coherence color bucket.
    pub coherence_color: Color,
    /// Drift score, 3 decimals.
    pub drift: String,
}

impl OverviewView {
    /// Derive from the overview body.
    pub fn derive(overview: &DashboardOverview) -> Self {
        Self {
            glyph: overview.glyph.clone(),
            status: overview.status.clone(),
            coherence: fixed(overview.coherence_score, 3),
            coherence_color: coherence_bucket(overview.coherence_score),
            drift: fixed(overview.drift_score, 3),
        }
    }
}

/// One history row of the self-reflection view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRow {
    /// Display timestamp.
    pub when: String,
    /// Collapse glyph.
    pub glyph: String,
    /// Uppercase outcome.
    pub outcome: String,
    /// Whether the collapse succeeded.
    pub success: bool,
    /// `μ=…, Φ=…, J=…` at 4 decimals.
    pub components: String,
    /// Risk score at 4 decimals.
    pub risk: String,
}

impl HistoryRow {
    fn derive(entry: &CollapseHistoryEntry) -> Self {
        Self {
            when: timestamp(&entry.timestamp),
            glyph: entry.glyph.clone(),
            outcome: entry.result.as_str().to_uppercase(),
            success: entry.result.is_success(),
            components: format!(
                "μ={}, Φ={}, J={}",
                fixed(entry.mu, SCORE_PLACES),
                fixed(entry.phi, SCORE_PLACES),
                fixed(entry.j, SCORE_PLACES)
            ),
            risk: fixed(entry.risk_score, SCORE_PLACES),
        }
    }
}

/// Self-reflection view model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectionView {
    /// Collapses in the window.
    pub recent_collapses: u64,
    /// Successful collapses.
    pub success_count: u64,
    /// Failed collapses.
    pub fail_count: u64,
    /// Success rate as a percentage, 1 decimal.
    pub success_rate: String,
    /// Mean risk, 4 decimals.
    pub average_risk: String,
    /// Ψ threshold, 4 decimals.
    pub threshold: String,
    /// Trend glyph, color and label.
    pub trend: TrendDisplay,
    /// Recent collapses, newest first.
    pub history: Vec<HistoryRow>,
}

impl ReflectionView {
    /// Derive from the self-reflection body.
    pub fn derive(reflection: &SelfReflection) -> Self {
        Self {
            recent_collapses: reflection.recent_collapses,
            success_count: reflection.success_count,
            fail_count: reflection.fail_count,
            success_rate: percent(reflection.success_rate),
            average_risk: fixed(reflection.average_risk_score, SCORE_PLACES),
            threshold: fixed(reflection.dynamic_threshold, SCORE_PLACES),
            trend: trend_display(reflection.recent_trend),
            history: reflection.history.iter().map(HistoryRow::derive).collect(),
        }
    }
}

/// One Δψ observation of the ΞΘ view.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Raw Δψ.
    pub delta: f64,
    /// Δψ at 4 decimals.
    pub delta_text: String,
    /// Crossing classification against the backend threshold.
    pub class: ThresholdClass,
}

/// ΞΘ analyzer view model.
#[derive(Debug, Clone, PartialEq)]
pub struct XiThetaView {
    /// Reflex threshold, 4 decimals.
    pub threshold: String,
    /// Triggers fired so far. Zero when the analyzer is not running.
    pub triggers: u64,
    /// Whether the TACE analyzer is available.
    pub analyzer_available: bool,
    /// Recent observations, oldest first.
    pub observations: Vec<Observation>,
}

impl XiThetaView {
    /// Derive from the unwrapped ΞΘ result. Every observation is
    /// classified against the threshold from the same response.
    pub fn derive(result: &XiThetaResult) -> Self {
        let threshold = result.threshold;
        let (triggers, deltas) = result
            .analyzer_status
            .as_ref()
            .map_or((0, &[][..]), |a| (a.xi_theta_triggers, a.recent_deltas.as_slice()));

        Self {
            threshold: fixed(threshold, SCORE_PLACES),
            triggers,
            analyzer_available: result.tace_available,
            observations: deltas
                .iter()
                .map(|&delta| Observation {
                    delta,
                    delta_text: fixed(delta, SCORE_PLACES),
                    class: classify_threshold(delta, threshold),
                })
                .collect(),
        }
    }
}

/// One collapse feed row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRow {
    /// Label, or the glyph when there is none.
    pub title: String,
    /// Event glyph.
    pub glyph: String,
    /// `resonance • subsystem`.
    pub detail: String,
    /// Display timestamp.
    pub when: String,
}

/// Collapse feed view model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedView {
    /// Feed rows in backend order.
    pub rows: Vec<FeedRow>,
}

impl FeedView {
    /// Derive from the feed body.
    pub fn derive(feed: &CollapseFeed) -> Self {
        Self {
            rows: feed
                .events
                .iter()
                .map(|event| FeedRow {
                    title: event
                        .label
                        .clone()
                        .filter(|label| !label.is_empty())
                        .unwrap_or_else(|| event.glyph.clone()),
                    glyph: event.glyph.clone(),
                    detail: format!("{} • {}", event.resonance_type, event.subsystem),
                    when: timestamp(&event.timestamp),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pathwatch_types::{AnalyzerStatus, CollapseEvent, CollapseResult, Trend, TriggerLogic};

    use super::*;

    fn xi_theta(threshold: f64, deltas: Vec<f64>) -> XiThetaResult {
        XiThetaResult {
            threshold,
            tace_available: true,
            analyzer_status: Some(AnalyzerStatus {
                window_size: 20,
                samples_recorded: 2,
                xi_theta_triggers: 1,
                xi_theta_threshold: threshold,
                recent_deltas: deltas,
            }),
            trigger_logic: TriggerLogic::default(),
        }
    }

    fn snapshot<T>(value: Option<T>, status: SnapshotStatus, error: Option<ErrorKind>) -> Snapshot<T> {
        Snapshot {
            value,
            status,
            last_error: error,
            revision: 1,
        }
    }

    #[test]
    fn observations_are_classified_against_response_threshold() {
        let view = XiThetaView::derive(&xi_theta(0.12, vec![0.15, 0.05]));
        assert_eq!(view.threshold, "0.1200");
        assert_eq!(view.triggers, 1);
        let classes: Vec<_> = view.observations.iter().map(|o| o.class).collect();
        assert_eq!(classes, [ThresholdClass::Exceeded, ThresholdClass::WithinBounds]);
        assert_eq!(view.observations.first().unwrap().delta_text, "0.1500");
    }

    #[test]
    fn missing_analyzer_has_no_observations() {
        let mut result = xi_theta(0.12, Vec::new());
        result.analyzer_status = None;
        let view = XiThetaView::derive(&result);
        assert_eq!(view.triggers, 0);
        assert!(view.observations.is_empty());
    }

    #[test]
    fn failed_envelope_is_decode_error() {
        let failed = XiThetaResponse {
            success: false,
            result: Some(xi_theta(0.12, Vec::new())),
        };
        assert_eq!(unwrap_xi_theta(failed).err().map(|e| e.kind()), Some(ErrorKind::Decode));

        let empty = XiThetaResponse {
            success: true,
            result: None,
        };
        assert_eq!(unwrap_xi_theta(empty).err().map(|e| e.kind()), Some(ErrorKind::Decode));
    }

    #[test]
    fn reflection_formatting() {
        let view = ReflectionView::derive(&SelfReflection {
            recent_collapses: 3,
            success_count: 2,
            fail_count: 1,
            average_risk_score: 0.25,
            dynamic_threshold: 0.12,
            success_rate: 0.6667,
            recent_trend: Trend::Improving,
            history: vec![CollapseHistoryEntry {
                timestamp: String::from("2025-01-02T03:04:05Z"),
                mu: 0.1,
                phi: 0.2,
                j: 0.3,
                risk_score: 0.4,
                glyph: String::from("Ψ"),
                result: CollapseResult::Fail,
            }],
        });
        assert_eq!(view.success_rate, "66.7%");
        assert_eq!(view.average_risk, "0.2500");
        assert_eq!(view.trend.glyph, "📈");
        let row = view.history.first().unwrap();
        assert_eq!(row.outcome, "FAIL");
        assert!(!row.success);
        assert_eq!(row.components, "μ=0.1000, Φ=0.2000, J=0.3000");
        assert_eq!(row.when, "2025-01-02 03:04:05 UTC");
    }

    #[test]
    fn overview_formatting() {
        let view = OverviewView::derive(&DashboardOverview {
            glyph: String::from("ΞΔ"),
            status: String::from("coherent"),
            coherence_score: 0.6,
            drift_score: 0.041_7,
        });
        assert_eq!(view.coherence, "0.600");
        assert_eq!(view.coherence_color, Color::Yellow);
        assert_eq!(view.drift, "0.042");
    }

    #[test]
    fn feed_falls_back_to_glyph() {
        let view = FeedView::derive(&CollapseFeed {
            events: vec![CollapseEvent {
                label: None,
                glyph: String::from("Φ"),
                resonance_type: String::from("collapse"),
                subsystem: String::from("path"),
                timestamp: String::from("later"),
            }],
        });
        let row = view.rows.first().unwrap();
        assert_eq!(row.title, "Φ");
        assert_eq!(row.detail, "collapse • path");
        assert_eq!(row.when, "later");
    }

    #[test]
    fn views_are_wired_per_endpoint() {
        let config = DashboardConfig::from_lookup(|name| match name {
            "PATH_API_BASE" => Some("http://127.0.0.1:8000".to_owned()),
            "REFLECTION_POLL_MS" => Some("1500".to_owned()),
            _ => None,
        })
        .unwrap();
        let dashboard = Dashboard::from_config(&config).unwrap();

        assert_eq!(dashboard.overview.name(), "overview");
        assert!(dashboard.overview.poll_interval().is_some());
        assert!(!dashboard.overview.has_push());

        assert_eq!(dashboard.reflection.name(), "self-reflection");
        assert_eq!(
            dashboard.reflection.poll_interval(),
            Some(std::time::Duration::from_millis(1500))
        );
        assert!(dashboard.reflection.has_push());

        assert_eq!(dashboard.xi_theta.poll_interval(), None);
        assert!(!dashboard.xi_theta.has_push());

        assert_eq!(dashboard.feed.name(), "collapse-feed");
        assert_eq!(dashboard.feed.poll_interval(), None);
        assert!(!dashboard.feed.has_push());
    }

    #[test]
    fn panel_states() {
        let loading: Snapshot<u32> = Snapshot::loading();
        assert_eq!(Panel::from_snapshot(&loading, |v| *v), Panel::Loading);

        let blank = snapshot::<u32>(None, SnapshotStatus::Failed, Some(ErrorKind::Network));
        assert_eq!(
            Panel::from_snapshot(&blank, |v| *v),
            Panel::Unavailable(ErrorKind::Network)
        );

        let stale = snapshot(Some(5), SnapshotStatus::Failed, Some(ErrorKind::Decode));
        assert_eq!(
            Panel::from_snapshot(&stale, |v| *v),
            Panel::Showing {
                view: 5,
                refreshing: false,
                stale: Some(ErrorKind::Decode)
            }
        );

        let reloading = snapshot(Some(5), SnapshotStatus::Loading, None);
        assert_eq!(
            Panel::from_snapshot(&reloading, |v| *v),
            Panel::Showing {
                view: 5,
                refreshing: true,
                stale: None
            }
        );
    }
}
