mod bootstrap;
mod health;
mod webhook;

use std::time::Duration;

use anyhow::{Context, Result};
use concierge_core::config::{AppConfig, LoadOptions};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{info, warn};

fn init_logging(config: &AppConfig) {
    use concierge_core::config::LogFormat::*;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

async fn run() -> Result<()> {
    // Logging comes up before bootstrap so its events are visible.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener =
        TcpListener::bind(&address).await.with_context(|| format!("failed to bind {address}"))?;
    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);

    info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        address = %address,
        "concierge-server listening"
    );

    let stop = std::sync::Arc::new(Notify::new());
    let stop_signal = stop.clone();
    let router = app.router();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { stop_signal.notified().await })
            .await
    });

    tokio::select! {
        finished = &mut server => {
            finished.context("server task panicked")?.context("server stopped unexpectedly")?;
            return Ok(());
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for ctrl-c")?;
        }
    }

    info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        grace_secs = grace.as_secs(),
        "draining in-flight webhooks"
    );
    stop.notify_one();

    match tokio::time::timeout(grace, server).await {
        Ok(finished) => finished.context("server task panicked")??,
        Err(_) => warn!(
            event_name = "system.server.shutdown_timeout",
            correlation_id = "shutdown",
            "in-flight requests did not finish before the grace period"
        ),
    }
    app.db_pool.close().await;
    Ok(())
}
