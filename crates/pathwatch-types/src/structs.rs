//! Response bodies served by the PATH backend.
//!
//! One struct per feature view plus the push-stream frame. Field names
//! match the backend's `snake_case` JSON exactly; the structs are rendered
//! almost verbatim by the dashboard.

use serde::{Deserialize, Serialize};

use crate::enums::{lenient, CollapseResult, Trend};

// ---------------------------------------------------------------------------
// Overview
// ---------------------------------------------------------------------------

/// System health summary from `GET /api/path/dashboard/overview`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardOverview {
    /// Current system glyph.
    pub glyph: String,
    /// Free-form status label.
    pub status: String,
    /// Coherence against the sealed anchor trace, 0.0 to 1.0.
    pub coherence_score: f64,
    /// Baseline drift score.
    pub drift_score: f64,
}

// ---------------------------------------------------------------------------
// Self-reflection
// ---------------------------------------------------------------------------

/// One entry of the recent collapse history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollapseHistoryEntry {
    /// Timestamp as sent by the backend (ISO 8601, timezone optional).
    pub timestamp: String,
    /// μ component.
    pub mu: f64,
    /// Φ component.
    pub phi: f64,
    /// J component.
    pub j: f64,
    /// Risk score assigned to the collapse.
    pub risk_score: f64,
    /// Glyph produced by the collapse.
    pub glyph: String,
    /// Outcome of the collapse.
    #[serde(default, deserialize_with = "lenient")]
    pub result: CollapseResult,
}

/// Autonomous learning reflection from `GET /api/path/self-reflection`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfReflection {
    /// Number of collapses in the reflection window.
    pub recent_collapses: u64,
    /// Successful collapses in the window.
    pub success_count: u64,
    /// Failed collapses in the window.
    pub fail_count: u64,
    /// Mean risk score across the window.
    pub average_risk_score: f64,
    /// Live-tuned Ψ threshold.
    pub dynamic_threshold: f64,
    /// Success ratio, 0.0 to 1.0.
    pub success_rate: f64,
    /// Direction of the success rate.
    #[serde(default, deserialize_with = "lenient")]
    pub recent_trend: Trend,
    /// Most recent collapses, newest first.
    #[serde(default)]
    pub history: Vec<CollapseHistoryEntry>,
}

// ---------------------------------------------------------------------------
// Temporal ΞΘ analyzer
// ---------------------------------------------------------------------------

/// Analyzer window statistics. Absent until the analyzer has started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerStatus {
    /// Number of samples the sliding window holds.
    pub window_size: u64,
    /// Samples recorded so far.
    pub samples_recorded: u64,
    /// Number of ΞΘ triggers fired.
    pub xi_theta_triggers: u64,
    /// Threshold the analyzer itself is using.
    pub xi_theta_threshold: f64,
    /// Most recent Δψ observations, oldest first.
    #[serde(default)]
    pub recent_deltas: Vec<f64>,
}

/// Human-readable description of the trigger rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerLogic {
    /// Primary trigger rule.
    #[serde(default)]
    pub primary: String,
    /// Rule for oscillating deltas.
    #[serde(default)]
    pub oscillating: String,
    /// Rule for diverging deltas.
    #[serde(default)]
    pub diverging: String,
}

/// Payload of a successful ΞΘ status response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XiThetaResult {
    /// Reflex threshold. Δψ above it counts as a crossing.
    pub threshold: f64,
    /// Whether the TACE analyzer is available on the backend.
    #[serde(default)]
    pub tace_available: bool,
    /// Analyzer window statistics, if the analyzer is running.
    #[serde(default)]
    pub analyzer_status: Option<AnalyzerStatus>,
    /// Trigger rule descriptions.
    #[serde(default)]
    pub trigger_logic: TriggerLogic,
}

/// Envelope returned by `GET /api/path/xi-theta`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XiThetaResponse {
    /// Whether the backend produced a result.
    pub success: bool,
    /// The result, present when `success` is true.
    #[serde(default)]
    pub result: Option<XiThetaResult>,
}

impl XiThetaResponse {
    /// Unwrap the envelope, yielding the result only when the backend
    /// reported success and actually sent one.
    pub fn into_result(self) -> Option<XiThetaResult> {
        if self.success { self.result } else { None }
    }
}

// ---------------------------------------------------------------------------
// Collapse feed
// ---------------------------------------------------------------------------

/// One event of a glyph stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollapseEvent {
    /// Optional display label; the glyph is shown when absent.
    #[serde(default)]
    pub label: Option<String>,
    /// Glyph emitted by the event.
    pub glyph: String,
    /// Resonance classification.
    pub resonance_type: String,
    /// Subsystem that emitted the event.
    pub subsystem: String,
    /// Timestamp as sent by the backend.
    pub timestamp: String,
}

/// Body of `GET /api/path/collapse-feed`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollapseFeed {
    /// Events of the requested topic. A missing array reads as empty.
    #[serde(default)]
    pub events: Vec<CollapseEvent>,
}

// ---------------------------------------------------------------------------
// Push stream
// ---------------------------------------------------------------------------

/// Text frame published on the glyph stream.
///
/// The backend is inconsistent about its discriminator: some frames carry
/// `type`, others `event_type`. Both are optional here and receivers must
/// never trust the remaining fields as data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFrame {
    /// Frame kind, e.g. `glyph_collapse`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Event kind, e.g. `path/bundle_generated`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    /// Glyph associated with the event, informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glyph: Option<String>,
}

impl StreamFrame {
    /// Frame announcing a glyph collapse.
    pub fn glyph_collapse(glyph: impl Into<String>) -> Self {
        Self {
            kind: Some(crate::paths::GLYPH_COLLAPSE.to_owned()),
            event_type: None,
            glyph: Some(glyph.into()),
        }
    }

    /// Frame announcing a generated bundle.
    pub fn bundle_generated() -> Self {
        Self {
            kind: None,
            event_type: Some(crate::paths::BUNDLE_GENERATED.to_owned()),
            glyph: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn reflection_decodes_with_unknown_trend_and_result() {
        let json = serde_json::json!({
            "recent_collapses": 3,
            "success_count": 2,
            "fail_count": 1,
            "average_risk_score": 0.25,
            "dynamic_threshold": 0.12,
            "success_rate": 0.6667,
            "recent_trend": "wobbling",
            "history": [{
                "timestamp": "2025-01-02T03:04:05",
                "mu": 0.1, "phi": 0.2, "j": 0.3,
                "risk_score": 0.4,
                "glyph": "Ψ",
                "result": "partial"
            }]
        });
        let reflection: SelfReflection = serde_json::from_value(json).unwrap();
        assert_eq!(reflection.recent_trend, Trend::Unknown);
        assert_eq!(reflection.history.len(), 1);
        assert_eq!(
            reflection.history.first().map(|h| h.result),
            Some(CollapseResult::Unknown)
        );
    }

    #[test]
    fn reflection_survives_non_string_trend_and_result() {
        let mut json = serde_json::json!({
            "recent_collapses": 1,
            "success_count": 1,
            "fail_count": 0,
            "average_risk_score": 0.2,
            "dynamic_threshold": 0.12,
            "success_rate": 1.0,
            "recent_trend": null,
            "history": [{
                "timestamp": "2025-01-02T03:04:05Z",
                "mu": 0.1, "phi": 0.2, "j": 0.3,
                "risk_score": 0.2,
                "glyph": "Ψ",
                "result": 7
            }]
        });
        let reflection: SelfReflection = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(reflection.recent_trend, Trend::Unknown);
        assert_eq!(
            reflection.history.first().map(|h| h.result),
            Some(CollapseResult::Unknown)
        );

        json["recent_trend"] = serde_json::json!(3);
        json["history"][0]["result"] = serde_json::json!(null);
        let reflection: SelfReflection = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(reflection.recent_trend, Trend::Unknown);
        assert_eq!(
            reflection.history.first().map(|h| h.result),
            Some(CollapseResult::Unknown)
        );

        json.as_object_mut().unwrap().remove("recent_trend");
        json["history"][0]["result"] = serde_json::json!("success");
        let reflection: SelfReflection = serde_json::from_value(json).unwrap();
        assert_eq!(reflection.recent_trend, Trend::Unknown);
        assert_eq!(
            reflection.history.first().map(|h| h.result),
            Some(CollapseResult::Success)
        );
    }

    #[test]
    fn reflection_missing_field_is_an_error() {
        let json = serde_json::json!({ "recent_collapses": 3 });
        assert!(serde_json::from_value::<SelfReflection>(json).is_err());
    }

    #[test]
    fn xi_theta_envelope_unwraps_only_on_success() {
        let ok: XiThetaResponse = serde_json::from_value(serde_json::json!({
            "success": true,
            "result": {
                "threshold": 0.12,
                "tace_available": true,
                "analyzer_status": null,
                "trigger_logic": { "primary": "Δψ > θ", "oscillating": "", "diverging": "" }
            }
        }))
        .unwrap();
        assert!(ok.into_result().is_some());

        let failed: XiThetaResponse =
            serde_json::from_value(serde_json::json!({ "success": false })).unwrap();
        assert!(failed.into_result().is_none());
    }

    #[test]
    fn collapse_feed_without_events_is_empty() {
        let feed: CollapseFeed = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(feed.events.is_empty());
    }

    #[test]
    fn stream_frame_uses_type_key() {
        let json = serde_json::to_value(StreamFrame::glyph_collapse("ΞΘ")).unwrap();
        assert_eq!(json["type"], "glyph_collapse");
        assert!(json.get("event_type").is_none());
    }
}
