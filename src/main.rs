// =============================================================================
// Pulse Panel — Main Entry Point
// =============================================================================
//
// Multi-timeframe technical analysis for a Binance futures symbol: RSI(6/14/24),
// EMA(9/21) crossover and SMA(50) on the 5m, 15m and 1h charts.  Runs a refresh
// loop (manual or periodic) and optionally serves the latest snapshot over a
// small JSON API.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod analysis;
mod api;
mod app_state;
mod binance;
mod cache;
mod engine;
mod indicators;
mod market_data;
mod refresh;
mod report;
mod runtime_config;
mod types;

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::runtime_config::PanelConfig;
use crate::types::RefreshMode;

const DEFAULT_CONFIG_PATH: &str = "panel_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path =
        std::env::var("PANEL_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let mut config = PanelConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        PanelConfig::default()
    });
    config
        .apply_env_overrides()
        .context("invalid environment override")?;
    config.validate().context("invalid panel configuration")?;

    info!(
        symbol = %config.symbol,
        timeframes = ?config.timeframes,
        history_limit = config.history_limit,
        refresh_mode = %config.refresh_mode,
        "Pulse panel starting"
    );

    // ── 2. Build shared state ────────────────────────────────────────────
    let api_enabled = config.api_enabled;
    let bind_addr = config.bind_addr.clone();
    let refresh_mode = config.refresh_mode;
    let state = Arc::new(AppState::new(config)?);

    // ── 3. Start the API server ──────────────────────────────────────────
    if api_enabled {
        let listener = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .with_context(|| format!("failed to bind API server on {bind_addr}"))?;
        info!(addr = %bind_addr, "API server listening");

        let app = api::rest::router(state.clone());
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!(error = %e, "API server failed");
            }
        });
    }

    // ── 4. Refresh loop ──────────────────────────────────────────────────
    let refresh_state = state.clone();
    let refresh_task = tokio::spawn(refresh::run(refresh_state));

    // Manual mode without the API has nothing left to do after one cycle.
    if refresh_mode == RefreshMode::Manual && !api_enabled {
        refresh_task.await.context("refresh task panicked")?;
        return Ok(());
    }

    info!("Panel running. Press Ctrl+C to stop.");

    // ── 5. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received — stopping");
    refresh_task.abort();

    if let Err(e) = state.config.read().save(&config_path) {
        error!(error = %e, "Failed to save panel config on shutdown");
    }

    info!("Pulse panel shut down complete.");
    Ok(())
}
