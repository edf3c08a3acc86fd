//! Dashboard entry point.
//!
//! Activates every view, prints a view whenever its snapshot changes, and
//! on Ctrl-C (or `q`) deactivates every view before exiting. Typing `r`
//! refreshes all views immediately.
//!
//! # Architecture
//!
//! ```text
//! poll timer --+
//! push stream -+--> Synchronizer --> SnapshotStore --> reader --> Renderer --> stdout
//! refresh -----+        |
//!                       +--> HttpFetcher (GET, one per trigger)
//! ```

use std::io::IsTerminal;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pathwatch_dashboard::{Dashboard, DashboardConfig, Renderer};

/// Application entry point.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or a view cannot be
/// built. Backend failures never end the process.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    info!("pathwatch starting");
    run().await?;
    info!("pathwatch stopped");
    Ok(())
}

/// Build, run and tear down the dashboard.
async fn run() -> anyhow::Result<()> {
    let config = DashboardConfig::from_env().context("loading configuration")?;
    info!(
        api_base = config.api_base,
        glyph_stream = config.glyph_stream,
        overview_poll_ms = config.overview_poll.as_millis(),
        reflection_poll_ms = config.reflection_poll.as_millis(),
        xi_theta_poll_ms = config.xi_theta_poll.as_millis(),
        "configuration loaded"
    );

    let dashboard = Dashboard::from_config(&config).context("building views")?;
    let renderer = Renderer::new(std::io::stdout().is_terminal());

    let mut overview = dashboard.overview.reader();
    let mut reflection = dashboard.reflection.reader();
    let mut xi_theta = dashboard.xi_theta.reader();
    let mut feed = dashboard.feed.reader();
    let mut commands = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    dashboard.activate_all().await;

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "failed to listen for Ctrl-C");
                }
                break;
            }
            Some(snapshot) = overview.changed() => print(&renderer.overview(&snapshot)),
            Some(snapshot) = reflection.changed() => print(&renderer.reflection(&snapshot)),
            Some(snapshot) = xi_theta.changed() => print(&renderer.xi_theta(&snapshot)),
            Some(snapshot) = feed.changed() => print(&renderer.feed(dashboard.topic(), &snapshot)),
            line = commands.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match line.trim() {
                    "r" | "refresh" => {
                        let accepted = dashboard.refresh_all().await;
                        info!(accepted, "manual refresh");
                    }
                    "q" | "quit" => break,
                    "" => {}
                    other => warn!(command = other, "unknown command (r = refresh, q = quit)"),
                },
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!(error = %e, "stdin closed");
                    stdin_open = false;
                }
            },
        }
    }

    info!("shutting down");
    dashboard.deactivate_all().await;
    Ok(())
}

/// Print one rendered view followed by a blank line.
fn print(lines: &[String]) {
    println!("{}\n", lines.join("\n"));
}
