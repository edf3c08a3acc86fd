//! Stub PATH backend entry point.
//!
//! Serves the dashboard endpoints from memory and, unless disabled,
//! records a synthetic collapse every `STUB_PUSH_INTERVAL_MS` so that
//! connected dashboards see push-triggered refreshes.

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pathwatch_stub::generator::spawn_generator;
use pathwatch_stub::{start_server, AppState, StubConfig};

/// Application entry point.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the server cannot
/// bind.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("pathwatch-stub starting");

    let config = StubConfig::from_env()?;
    info!(
        host = config.server.host,
        port = config.server.port,
        api_key_enforced = config.credentials.api_key.is_some(),
        auth_token_enforced = config.credentials.auth_token.is_some(),
        push_interval_ms = config.push_interval.map(|d| d.as_millis()),
        "configuration loaded"
    );

    let state = Arc::new(AppState::with_credentials(config.credentials.clone()));

    let generator = config
        .push_interval
        .map(|every| spawn_generator(Arc::clone(&state), every));

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
        info!("shutdown requested");
    };

    let result = start_server(&config.server, state, shutdown).await;

    if let Some(generator) = generator {
        generator.abort();
    }

    result?;
    info!("pathwatch-stub stopped");
    Ok(())
}
