//! Configuration for the dashboard.
//!
//! All configuration is loaded once from environment variables at start
//! and is read-only afterwards. Credentials are not validated here: an
//! empty or wrong credential is sent as-is and the backend's rejection
//! shows up in the affected view as `unauthorized`.

use std::time::Duration;

use pathwatch_types::paths::DEFAULT_FEED_TOPIC;
use url::Url;

use crate::error::DashboardError;

/// Backend used when `PATH_API_BASE` is unset.
pub const DEFAULT_API_BASE: &str = "https://codex-engine-backend.onrender.com";

/// Complete dashboard configuration.
#[derive(Clone)]
pub struct DashboardConfig {
    /// Backend base URL, without a trailing slash.
    pub api_base: String,
    /// `X-API-Key` value for the overview and the collapse feed.
    pub api_key: String,
    /// Bearer token for the self-reflection and ΞΘ views.
    pub auth_token: String,
    /// Collapse feed topic.
    pub glyph_stream: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Push stream handshake timeout.
    pub push_connect_timeout: Duration,
    /// Overview poll interval. Zero disables polling.
    pub overview_poll: Duration,
    /// Self-reflection poll interval. Zero disables polling.
    pub reflection_poll: Duration,
    /// ΞΘ poll interval. Zero disables polling.
    pub xi_theta_poll: Duration,
}

impl std::fmt::Debug for DashboardConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardConfig")
            .field("api_base", &self.api_base)
            .field("api_key_set", &!self.api_key.is_empty())
            .field("auth_token_set", &!self.auth_token.is_empty())
            .field("glyph_stream", &self.glyph_stream)
            .field("request_timeout", &self.request_timeout)
            .field("push_connect_timeout", &self.push_connect_timeout)
            .field("overview_poll", &self.overview_poll)
            .field("reflection_poll", &self.reflection_poll)
            .field("xi_theta_poll", &self.xi_theta_poll)
            .finish()
    }
}

impl DashboardConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional variables:
    /// - `PATH_API_BASE` -- backend base URL (default [`DEFAULT_API_BASE`])
    /// - `PATH_API_KEY` -- `X-API-Key` for overview and feed (default empty)
    /// - `PATH_AUTH_TOKEN` -- bearer token for reflection and ΞΘ (default empty)
    /// - `PATH_GLYPH_STREAM` -- collapse feed topic (default `Ψ_PATH_COLLAPSE`)
    /// - `REQUEST_TIMEOUT_MS` -- per-request timeout (default 10000)
    /// - `PUSH_CONNECT_TIMEOUT_MS` -- stream handshake timeout (default 5000)
    /// - `OVERVIEW_POLL_MS` -- overview poll interval (default 60000)
    /// - `REFLECTION_POLL_MS` -- self-reflection poll interval (default 30000)
    /// - `XI_THETA_POLL_MS` -- ΞΘ poll interval (default 0, fetched once)
    pub fn from_env() -> Result<Self, DashboardError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup` instead of the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, DashboardError> {
        let api_base = lookup("PATH_API_BASE")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_owned());
        let api_base = api_base.trim_end_matches('/').to_owned();
        match Url::parse(&api_base) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(DashboardError::Config(format!(
                    "PATH_API_BASE must be http or https, got {}",
                    url.scheme()
                )));
            }
            Err(e) => {
                return Err(DashboardError::Config(format!("invalid PATH_API_BASE: {e}")));
            }
        }

        let millis = |name: &str, default: u64| -> Result<Duration, DashboardError> {
            lookup(name)
                .map_or(Ok(default), |v| v.trim().parse::<u64>())
                .map(Duration::from_millis)
                .map_err(|e| DashboardError::Config(format!("invalid {name}: {e}")))
        };

        Ok(Self {
            api_base,
            api_key: lookup("PATH_API_KEY").unwrap_or_default(),
            auth_token: lookup("PATH_AUTH_TOKEN").unwrap_or_default(),
            glyph_stream: lookup("PATH_GLYPH_STREAM")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_FEED_TOPIC.to_owned()),
            request_timeout: millis("REQUEST_TIMEOUT_MS", 10_000)?,
            push_connect_timeout: millis("PUSH_CONNECT_TIMEOUT_MS", 5_000)?,
            overview_poll: millis("OVERVIEW_POLL_MS", 60_000)?,
            reflection_poll: millis("REFLECTION_POLL_MS", 30_000)?,
            xi_theta_poll: millis("XI_THETA_POLL_MS", 0)?,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<DashboardConfig, DashboardError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        DashboardConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.api_key, "");
        assert_eq!(config.glyph_stream, "Ψ_PATH_COLLAPSE");
        assert_eq!(config.overview_poll, Duration::from_secs(60));
        assert_eq!(config.reflection_poll, Duration::from_secs(30));
        assert_eq!(config.xi_theta_poll, Duration::ZERO);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let config = load(&[("PATH_API_BASE", "http://127.0.0.1:8000/")]).unwrap();
        assert_eq!(config.api_base, "http://127.0.0.1:8000");
    }

    #[test]
    fn rejects_bad_base_urls() {
        assert!(matches!(
            load(&[("PATH_API_BASE", "not a url")]),
            Err(DashboardError::Config(_))
        ));
        assert!(matches!(
            load(&[("PATH_API_BASE", "ftp://backend")]),
            Err(DashboardError::Config(_))
        ));
    }

    #[test]
    fn rejects_non_numeric_intervals() {
        let err = load(&[("REFLECTION_POLL_MS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("REFLECTION_POLL_MS"));
    }

    #[test]
    fn debug_hides_secrets() {
        let config = load(&[("PATH_API_KEY", "k-secret"), ("PATH_AUTH_TOKEN", "t-secret")]).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("api_key_set: true"));
    }
}
