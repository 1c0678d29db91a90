// src/main.rs

mod aggregator;
mod api;
mod classifier;
mod config;
mod error;
mod metrics;
mod notifier;
mod registry;
mod service;
mod types;

use anyhow::{Context, Result};
use api::AppState;
use service::AlertService;
use std::sync::Arc;
use tracing::info;
use types::Config;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::load_or_default("config.yaml")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!("ResQ Accident Alert Service Starting");
    config.log_summary();

    let service = Arc::new(AlertService::new(&config)?);
    info!("✓ Alert service ready");

    if config.alerting.reaper_enabled {
        service.spawn_reaper(config.alerting.reaper_interval_seconds);
        info!(
            "✓ Expiry reaper running every {}s",
            config.alerting.reaper_interval_seconds
        );
    }

    let state = Arc::new(AppState {
        service,
        location: config.location.clone(),
    });
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;
    info!("Listening on {}", config.server.bind_addr);

    axum::serve(listener, app)
        .await
        .context("HTTP server exited")?;

    Ok(())
}
