//! Plain-text rendering of the dashboard views.
//!
//! Every function takes a [`Panel`] and returns the lines to print.
//! Colors are ANSI escapes and can be switched off for logs and tests.

use pathwatch_sync::Snapshot;
use pathwatch_types::{CollapseFeed, DashboardOverview, SelfReflection, XiThetaResult};

use crate::analytics::Color;
use crate::views::{
    error_message, FeedView, OverviewView, Panel, ReflectionView, XiThetaView, EMPTY_FEED,
    EMPTY_HISTORY, EMPTY_OBSERVATIONS,
};

const RESET: &str = "\x1b[0m";

/// Renders views to text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    /// A renderer that emits ANSI colors when `color` is set.
    pub const fn new(color: bool) -> Self {
        Self { color }
    }

    fn paint(self, color: Color, text: &str) -> String {
        if self.color {
            format!("{}{text}{RESET}", color.ansi())
        } else {
            text.to_owned()
        }
    }

    /// Header, then the loading line, the error banner, or the body with
    /// its freshness markers.
    fn panel<V>(
        self,
        title: &str,
        loading: &str,
        panel: &Panel<V>,
        body: impl FnOnce(&V) -> Vec<String>,
    ) -> Vec<String> {
        let mut lines = vec![title.to_owned()];
        match panel {
            Panel::Loading => lines.push(self.paint(Color::Gray, loading)),
            Panel::Unavailable(kind) => {
                lines.push(self.paint(Color::Red, &format!("{} ({kind})", error_message(*kind))));
            }
            Panel::Showing {
                view,
                refreshing,
                stale,
            } => {
                if let Some(kind) = stale {
                    lines.push(self.paint(
                        Color::Red,
                        &format!("! last refresh failed ({kind}), showing previous data"),
                    ));
                }
                if *refreshing {
                    lines.push(self.paint(Color::Gray, "… refreshing"));
                }
                lines.extend(body(view));
            }
        }
        lines
    }

    /// Render the overview.
    pub fn overview(self, snapshot: &Snapshot<DashboardOverview>) -> Vec<String> {
        let panel = Panel::from_snapshot(snapshot, OverviewView::derive);
        self.panel("ΞΔ System Health", "Loading dashboard...", &panel, |v| {
            vec![
                format!("  Glyph: {}", v.glyph),
                format!("  Status: {}", v.status),
                format!("  Coherence Score: {}", self.paint(v.coherence_color, &v.coherence)),
                format!("  Drift Score: {}", v.drift),
            ]
        })
    }

    /// Render the self-reflection view.
    pub fn reflection(self, snapshot: &Snapshot<SelfReflection>) -> Vec<String> {
        let panel = Panel::from_snapshot(snapshot, ReflectionView::derive);
        self.panel("🧠 PATH Self-Reflection", "Loading PATH memory pulse...", &panel, |v| {
            let mut lines = vec![
                format!(
                    "  Recent Collapses: {}   Success Rate: {}",
                    v.recent_collapses,
                    self.paint(Color::Blue, &v.success_rate)
                ),
                format!(
                    "  Successful: {}   Failed: {}",
                    self.paint(Color::Green, &v.success_count.to_string()),
                    self.paint(Color::Red, &v.fail_count.to_string())
                ),
                format!(
                    "  Avg Risk Score: {}   Ψ Threshold: {}",
                    v.average_risk, v.threshold
                ),
                format!(
                    "  Trend: {}",
                    self.paint(v.trend.color, &format!("{} {}", v.trend.glyph, v.trend.label))
                ),
            ];
            if v.history.is_empty() {
                lines.push(format!("  {EMPTY_HISTORY}"));
            } else {
                lines.push(format!("  📝 Last {} Collapses", v.history.len()));
                for row in &v.history {
                    let color = if row.success { Color::Green } else { Color::Red };
                    lines.push(format!(
                        "    {}  [{}] {}  {}  Risk: {}",
                        row.when,
                        row.glyph,
                        self.paint(color, &row.outcome),
                        row.components,
                        row.risk
                    ));
                }
            }
            lines
        })
    }

    /// Render the ΞΘ analyzer view.
    pub fn xi_theta(self, snapshot: &Snapshot<XiThetaResult>) -> Vec<String> {
        let panel = Panel::from_snapshot(snapshot, XiThetaView::derive);
        self.panel(
            "ΞΘ Temporal Collapse Reflex",
            "Loading ΞΘ status from backend...",
            &panel,
            |v| {
                let mut lines = vec![format!(
                    "  ΞΘ Threshold: {}   Triggers: {}",
                    self.paint(Color::Blue, &v.threshold),
                    v.triggers
                )];
                if !v.analyzer_available {
                    lines.push(self.paint(Color::Yellow, "  TACE analyzer unavailable on the backend"));
                }
                if v.observations.is_empty() {
                    lines.push(format!("  {EMPTY_OBSERVATIONS}"));
                }
                for obs in &v.observations {
                    let color = if obs.class.is_alert() { Color::Red } else { Color::Gray };
                    lines.push(format!(
                        "    {}  Δψ: {}  {}",
                        self.paint(color, obs.class.glyph()),
                        obs.delta_text,
                        obs.class.cause()
                    ));
                }
                lines
            },
        )
    }

    /// Render the collapse feed.
    pub fn feed(self, topic: &str, snapshot: &Snapshot<CollapseFeed>) -> Vec<String> {
        let panel = Panel::from_snapshot(snapshot, FeedView::derive);
        let title = format!("🧠 Collapse Feed ({topic})");
        self.panel(&title, "Loading collapse feed...", &panel, |v| {
            if v.rows.is_empty() {
                return vec![format!("  {EMPTY_FEED}")];
            }
            v.rows
                .iter()
                .map(|row| format!("  {}  [{}]  {}  {}", row.title, row.glyph, row.detail, row.when))
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use pathwatch_sync::{ErrorKind, SnapshotStatus};

    use super::*;

    fn ready<T>(value: T) -> Snapshot<T> {
        Snapshot {
            value: Some(value),
            status: SnapshotStatus::Ready,
            last_error: None,
            revision: 1,
        }
    }

    fn overview() -> DashboardOverview {
        DashboardOverview {
            glyph: String::from("ΞΔ"),
            status: String::from("coherent"),
            coherence_score: 0.912,
            drift_score: 0.041,
        }
    }

    #[test]
    fn loading_line() {
        let lines = Renderer::new(false).overview(&Snapshot::loading());
        assert_eq!(lines, ["ΞΔ System Health", "Loading dashboard..."]);
    }

    #[test]
    fn blank_failure_shows_banner() {
        let snapshot: Snapshot<DashboardOverview> = Snapshot {
            value: None,
            status: SnapshotStatus::Failed,
            last_error: Some(ErrorKind::Unauthorized),
            revision: 1,
        };
        let lines = Renderer::new(false).overview(&snapshot);
        assert_eq!(
            lines.get(1).map(String::as_str),
            Some("PATH backend rejected the credentials (unauthorized)")
        );
    }

    #[test]
    fn stale_value_keeps_data_and_marks_error() {
        let mut snapshot = ready(overview());
        snapshot.status = SnapshotStatus::Failed;
        snapshot.last_error = Some(ErrorKind::Network);
        let lines = Renderer::new(false).overview(&snapshot);
        assert!(lines.iter().any(|l| l.contains("last refresh failed (network)")));
        assert!(lines.iter().any(|l| l.contains("Coherence Score: 0.912")));
    }

    #[test]
    fn colors_can_be_enabled() {
        let lines = Renderer::new(true).overview(&ready(overview()));
        assert!(lines.iter().any(|l| l.contains("\x1b[32m0.912\x1b[0m")));
    }

    #[test]
    fn empty_states() {
        let reflection = SelfReflection {
            recent_collapses: 0,
            success_count: 0,
            fail_count: 0,
            average_risk_score: 0.0,
            dynamic_threshold: 0.12,
            success_rate: 0.0,
            recent_trend: pathwatch_types::Trend::Unknown,
            history: Vec::new(),
        };
        let lines = Renderer::new(false).reflection(&ready(reflection));
        assert!(lines.iter().any(|l| l.contains(EMPTY_HISTORY)));

        let lines = Renderer::new(false).feed("Ψ_PATH_COLLAPSE", &ready(CollapseFeed::default()));
        assert_eq!(lines.first().map(String::as_str), Some("🧠 Collapse Feed (Ψ_PATH_COLLAPSE)"));
        assert!(lines.iter().any(|l| l.contains(EMPTY_FEED)));
    }

    #[test]
    fn xi_theta_marks_crossings() {
        let result = XiThetaResult {
            threshold: 0.12,
            tace_available: true,
            analyzer_status: Some(pathwatch_types::AnalyzerStatus {
                window_size: 20,
                samples_recorded: 2,
                xi_theta_triggers: 1,
                xi_theta_threshold: 0.12,
                recent_deltas: vec![0.15, 0.05],
            }),
            trigger_logic: pathwatch_types::TriggerLogic::default(),
        };
        let lines = Renderer::new(false).xi_theta(&ready(result.clone()));
        assert!(lines.iter().any(|l| l.contains("ΞΘ  Δψ: 0.1500  Threshold exceeded")));
        assert!(lines.iter().any(|l| l.contains("Ψ  Δψ: 0.0500  Within normal bounds")));
        assert!(!lines.iter().any(|l| l.contains("TACE analyzer unavailable")));

        let offline = XiThetaResult {
            tace_available: false,
            analyzer_status: None,
            ..result
        };
        let lines = Renderer::new(false).xi_theta(&ready(offline));
        assert!(lines.iter().any(|l| l.contains("TACE analyzer unavailable on the backend")));
        assert!(lines.iter().any(|l| l.contains(EMPTY_OBSERVATIONS)));
    }
}
