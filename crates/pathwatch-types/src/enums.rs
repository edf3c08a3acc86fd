//! Enumeration types carried in backend responses.
//!
//! Both enums deserialize unrecognized strings into an `Unknown` variant
//! instead of failing, so a backend that grows a new value never turns a
//! whole snapshot into a decode error. Fields holding them go through
//! [`lenient`], which extends that to `null` and non-string values.

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

/// Direction of the recent collapse success rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    /// Success rate is rising.
    Improving,
    /// Success rate is falling.
    Declining,
    /// No significant movement.
    Stable,
    /// Not enough data, or a value this build does not know.
    #[default]
    #[serde(other)]
    Unknown,
}

impl Trend {
    /// Lowercase wire name of the trend.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Improving => "improving",
            Self::Declining => "declining",
            Self::Stable => "stable",
            Self::Unknown => "unknown",
        }
    }
}

/// Outcome of a single recorded collapse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollapseResult {
    /// The collapse resolved as expected.
    Success,
    /// The collapse failed.
    Fail,
    /// Outcome not recorded.
    #[default]
    #[serde(other)]
    Unknown,
}

impl CollapseResult {
    /// Lowercase wire name of the result.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Fail => "fail",
            Self::Unknown => "unknown",
        }
    }

    /// Whether the collapse succeeded.
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Either a decodable value or anything else.
#[derive(Deserialize)]
#[serde(untagged)]
enum OrAnything<T> {
    Known(T),
    Other(IgnoredAny),
}

/// Deserialize `T`, falling back to `T::default()` for any JSON value that
/// does not decode as `T`, including `null`, numbers and objects.
///
/// Use with `#[serde(default, deserialize_with = "lenient")]`.
pub fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(match OrAnything::deserialize(deserializer)? {
        OrAnything::Known(value) => value,
        OrAnything::Other(IgnoredAny) => T::default(),
    })
}
