//! Configuration for the stub backend binary.
//!
//! All configuration is loaded from environment variables. Every
//! variable is optional.

use std::time::Duration;

use crate::server::{ServerConfig, ServerError};
use crate::state::Credentials;

/// Complete stub configuration.
#[derive(Debug, Clone, Default)]
pub struct StubConfig {
    /// Bind address.
    pub server: ServerConfig,
    /// Credentials the endpoints enforce.
    pub credentials: Credentials,
    /// Interval of the synthetic collapse generator, if enabled.
    pub push_interval: Option<Duration>,
}

impl StubConfig {
    /// Load configuration from environment variables.
    ///
    /// - `STUB_HOST` -- bind host (default `127.0.0.1`)
    /// - `STUB_PORT` -- bind port (default `8000`)
    /// - `STUB_API_KEY` -- required `X-API-Key` (default: not enforced)
    /// - `STUB_AUTH_TOKEN` -- required bearer token (default: not enforced)
    /// - `STUB_PUSH_INTERVAL_MS` -- synthetic collapse interval (default `15000`, `0` disables)
    pub fn from_env() -> Result<Self, ServerError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup` instead of the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ServerError> {
        let defaults = ServerConfig::default();
        let host = lookup("STUB_HOST").unwrap_or(defaults.host);

        let port: u16 = lookup("STUB_PORT")
            .map_or(Ok(defaults.port), |v| v.parse())
            .map_err(|e| ServerError::Config(format!("invalid STUB_PORT: {e}")))?;

        let push_interval_ms: u64 = lookup("STUB_PUSH_INTERVAL_MS")
            .unwrap_or_else(|| "15000".to_owned())
            .parse()
            .map_err(|e| ServerError::Config(format!("invalid STUB_PUSH_INTERVAL_MS: {e}")))?;

        let non_empty = |name: &str| lookup(name).filter(|v| !v.is_empty());

        Ok(Self {
            server: ServerConfig { host, port },
            credentials: Credentials {
                api_key: non_empty("STUB_API_KEY"),
                auth_token: non_empty("STUB_AUTH_TOKEN"),
            },
            push_interval: (push_interval_ms > 0).then(|| Duration::from_millis(push_interval_ms)),
        })
    }
}
