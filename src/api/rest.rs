// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`.  The panel is read-mostly: clients poll
// the latest snapshot, trigger a manual refresh or switch the symbol.
//
// CORS is configured permissively so a local dashboard can poll the API.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::app_state::AppState;
use crate::binance::rate_limit::WeightSnapshot;
use crate::refresh::{cycle_limit, run_bounded_cycle};
use crate::report::render_snapshot;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/snapshot", get(snapshot))
        .route("/api/v1/snapshot/text", get(snapshot_text))
        .route("/api/v1/refresh", post(refresh))
        .route("/api/v1/config", get(config))
        .route("/api/v1/symbol", post(select_symbol))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    state_version: u64,
    server_time: i64,
    uptime_secs: u64,
    cached_series: usize,
    request_weight: WeightSnapshot,
    last_cycle_error: Option<String>,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let resp = HealthResponse {
        status: "ok",
        state_version: state.current_state_version(),
        server_time: chrono::Utc::now().timestamp_millis(),
        uptime_secs: state.uptime().as_secs(),
        cached_series: state.cache.len(),
        request_weight: state.client.weight_tracker().snapshot(),
        last_cycle_error: state.last_cycle_error.read().clone(),
    };
    Json(resp)
}

// =============================================================================
// Snapshot
// =============================================================================

async fn snapshot(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.latest_snapshot() {
        Some(snapshot) => Json(snapshot).into_response(),
        None => {
            let body = serde_json::json!({
                "snapshot": null,
                "message": "No data available yet",
            });
            Json(body).into_response()
        }
    }
}

async fn snapshot_text(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.latest_snapshot() {
        Some(snapshot) => render_snapshot(&snapshot),
        None => "No data available yet\n".to_string(),
    }
}

// =============================================================================
// Manual refresh
// =============================================================================

/// Runs one cycle under the same bound as the refresh loop; 504 on timeout.
async fn refresh(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    info!("manual refresh requested via API");
    match run_bounded_cycle(&state, cycle_limit(&state)).await {
        Some(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        None => {
            let body = serde_json::json!({
                "ok": false,
                "error": state.last_cycle_error.read().clone(),
            });
            (StatusCode::GATEWAY_TIMEOUT, Json(body)).into_response()
        }
    }
}

// =============================================================================
// Configuration
// =============================================================================

async fn config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let config = state.config.read().clone();
    Json(config)
}

#[derive(Deserialize)]
struct SymbolUpdate {
    symbol: String,
}

async fn select_symbol(
    State(state): State<Arc<AppState>>,
    Json(update): Json<SymbolUpdate>,
) -> impl IntoResponse {
    let result = state.config.write().select_symbol(&update.symbol);
    match result {
        Ok(()) => {
            let symbol = state.config.read().symbol.clone();
            info!(symbol = %symbol, "symbol changed via API");
            let body = serde_json::json!({ "ok": true, "symbol": symbol });
            (StatusCode::OK, Json(body))
        }
        Err(e) => {
            warn!(symbol = %update.symbol, error = %e, "rejected symbol change");
            let body = serde_json::json!({ "ok": false, "error": e.to_string() });
            (StatusCode::BAD_REQUEST, Json(body))
        }
    }
}
