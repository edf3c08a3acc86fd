//! Derived analytics: pure functions over snapshot values.
//!
//! Nothing computed here is ever stored. Views call these on every
//! render, so a new snapshot can never leave a stale derived field
//! behind.

use chrono::{DateTime, NaiveDateTime, Utc};
use pathwatch_types::Trend;

// ---------------------------------------------------------------------------
// Colors
// ---------------------------------------------------------------------------

/// Semantic color of a displayed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    /// Good.
    Green,
    /// Middling.
    Yellow,
    /// Bad.
    Red,
    /// Neutral emphasis.
    Blue,
    /// No information.
    Gray,
}

impl Color {
    /// Lowercase color name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Red => "red",
            Self::Blue => "blue",
            Self::Gray => "gray",
        }
    }

    /// ANSI foreground escape sequence.
    pub const fn ansi(self) -> &'static str {
        match self {
            Self::Green => "\x1b[32m",
            Self::Yellow => "\x1b[33m",
            Self::Red => "\x1b[31m",
            Self::Blue => "\x1b[34m",
            Self::Gray => "\x1b[90m",
        }
    }
}

/// Color bucket of a coherence score: `>= 0.8` green, `>= 0.5` yellow,
/// red otherwise.
pub fn coherence_bucket(score: f64) -> Color {
    if score >= 0.8 {
        Color::Green
    } else if score >= 0.5 {
        Color::Yellow
    } else {
        Color::Red
    }
}

// ---------------------------------------------------------------------------
// Trend
// ---------------------------------------------------------------------------

/// How a [`Trend`] is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendDisplay {
    /// Direction glyph.
    pub glyph: &'static str,
    /// Color of the trend label.
    pub color: Color,
    /// Lowercase label.
    pub label: &'static str,
}

/// Glyph, color and label for a trend. Unknown trends get a neutral
/// question mark.
pub const fn trend_display(trend: Trend) -> TrendDisplay {
    let (glyph, color) = match trend {
        Trend::Improving => ("📈", Color::Green),
        Trend::Declining => ("📉", Color::Red),
        Trend::Stable => ("➡️", Color::Blue),
        Trend::Unknown => ("❓", Color::Gray),
    };
    TrendDisplay {
        glyph,
        color,
        label: trend.as_str(),
    }
}

// ---------------------------------------------------------------------------
// Threshold crossing
// ---------------------------------------------------------------------------

/// Glyph shown for a Δψ above the threshold.
pub const ALERT_GLYPH: &str = "ΞΘ";

/// Glyph shown for a Δψ within bounds.
pub const NORMAL_GLYPH: &str = "Ψ";

/// Whether an observation crossed the reflex threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThresholdClass {
    /// `delta > threshold`.
    Exceeded,
    /// `delta <= threshold`.
    WithinBounds,
}

impl ThresholdClass {
    /// Display glyph.
    pub const fn glyph(self) -> &'static str {
        match self {
            Self::Exceeded => ALERT_GLYPH,
            Self::WithinBounds => NORMAL_GLYPH,
        }
    }

    /// Short cause text.
    pub const fn cause(self) -> &'static str {
        match self {
            Self::Exceeded => "Threshold exceeded",
            Self::WithinBounds => "Within normal bounds",
        }
    }

    /// Whether this is an alert.
    pub const fn is_alert(self) -> bool {
        matches!(self, Self::Exceeded)
    }
}

/// Classify `delta` against `threshold`. Strictly greater is exceeded;
/// equal is within bounds.
pub fn classify_threshold(delta: f64, threshold: f64) -> ThresholdClass {
    if delta > threshold {
        ThresholdClass::Exceeded
    } else {
        ThresholdClass::WithinBounds
    }
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// Decimal places used for scores unless a view says otherwise.
pub const SCORE_PLACES: usize = 4;

/// Format with exactly `places` decimals.
pub fn fixed(value: f64, places: usize) -> String {
    format!("{value:.places$}")
}

/// Format a 0-1 ratio as a percentage with one decimal.
pub fn percent(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

/// Render a backend timestamp for display.
///
/// RFC 3339 timestamps are shown in UTC. Timestamps without an offset are
/// shown as sent. Anything unparsable is returned verbatim.
pub fn timestamp(raw: &str) -> String {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed
            .with_timezone(&Utc)
            .format("%Y-%m-%d %H:%M:%S UTC")
            .to_string();
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map_or_else(
        |_| raw.to_owned(),
        |naive| naive.format("%Y-%m-%d %H:%M:%S").to_string(),
    )
}
