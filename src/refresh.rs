// =============================================================================
// Refresh cycle — fetch, compute and publish one panel snapshot
// =============================================================================
//
// One cycle fetches every configured timeframe for the selected symbol
// concurrently, runs the indicator engine on each series independently and
// stores the resulting `PanelSnapshot` in `AppState`.  A timeframe whose fetch
// failed arrives as an empty series and is reported as "no data" without
// affecting the other timeframes.
//
// `Manual` mode runs a single cycle at startup (further cycles are triggered
// through the API).  `Periodic` mode repeats on a fixed interval; each cycle is
// bounded by that same interval.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::analysis::{PanelSnapshot, TimeframeAnalysis};
use crate::app_state::AppState;
use crate::cache::IndicatorCache;
use crate::engine::compute_indicators;
use crate::market_data::{Candle, SeriesKey};
use crate::report::render_snapshot;
use crate::types::{RefreshMode, Timeframe};

/// Run one refresh cycle and store the snapshot.
pub async fn run_cycle(state: &AppState) -> PanelSnapshot {
    let _cycle = state.refresh_lock.lock().await;

    let (symbol, timeframes, limit, cache_enabled) = {
        let cfg = state.config.read();
        (
            cfg.symbol.clone(),
            cfg.timeframes.clone(),
            cfg.history_limit,
            cfg.cache_enabled,
        )
    };

    let fetches = timeframes.iter().map(|&timeframe| {
        let client = &state.client;
        let symbol = symbol.as_str();
        async move { (timeframe, client.fetch_series(symbol, timeframe, limit).await) }
    });
    let fetched = join_all(fetches).await;

    let cache = cache_enabled.then_some(&state.cache);
    let snapshot = build_snapshot(&symbol, fetched, cache);

    info!(
        symbol = %snapshot.symbol,
        ready = snapshot.ready_count(),
        timeframes = snapshot.timeframes.len(),
        "refresh cycle complete"
    );

    state.store_snapshot(snapshot.clone());
    snapshot
}

/// Turn fetched series into a snapshot.  Pure apart from the optional cache.
pub fn build_snapshot(
    symbol: &str,
    fetched: Vec<(Timeframe, Vec<Candle>)>,
    cache: Option<&IndicatorCache>,
) -> PanelSnapshot {
    let timeframes = fetched
        .into_iter()
        .map(|(timeframe, candles)| {
            let series = match cache {
                Some(cache) => cache.get_or_compute(&SeriesKey::new(symbol, timeframe), &candles),
                None => compute_indicators(&candles),
            };
            TimeframeAnalysis::from_series(timeframe, candles.len(), &series)
        })
        .collect();

    PanelSnapshot {
        symbol: symbol.to_string(),
        timeframes,
        updated_at: Utc::now(),
    }
}

/// Upper bound for one cycle: the configured refresh interval.
pub fn cycle_limit(state: &AppState) -> Duration {
    Duration::from_secs(state.config.read().refresh_interval_secs)
}

/// Run one cycle bounded by `limit`, printing the report on success.  On
/// timeout the previous snapshot stays in place and the error is recorded.
pub async fn run_bounded_cycle(state: &AppState, limit: Duration) -> Option<PanelSnapshot> {
    match tokio::time::timeout(limit, run_cycle(state)).await {
        Ok(snapshot) => {
            println!("{}", render_snapshot(&snapshot));
            Some(snapshot)
        }
        Err(_) => {
            let limit_ms = limit.as_millis() as u64;
            warn!(limit_ms, "refresh cycle timed out");
            state.record_cycle_error(format!("refresh cycle exceeded {limit_ms}ms"));
            None
        }
    }
}

/// Drive refreshes according to the configured mode.  Returns after the single
/// cycle in `Manual` mode; loops forever in `Periodic` mode.
pub async fn run(state: Arc<AppState>) {
    let mode = state.config.read().refresh_mode;
    let period = cycle_limit(&state);

    match mode {
        RefreshMode::Manual => {
            info!("manual refresh mode — running a single cycle");
            run_bounded_cycle(&state, period).await;
        }
        RefreshMode::Periodic => {
            info!(interval_secs = period.as_secs(), "periodic refresh mode");
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                run_bounded_cycle(&state, period).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisStatus;
    use crate::runtime_config::PanelConfig;
    use crate::types::TrendSignal;

    fn rising(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let c = 100.0 + i as f64;
                Candle::new(i as i64 * 60_000, c, c + 1.0, c - 1.0, c, 1.0)
            })
            .collect()
    }

    #[test]
    fn failed_timeframe_does_not_blank_others() {
        let fetched = vec![
            (Timeframe::FiveMinutes, rising(100)),
            (Timeframe::FifteenMinutes, Vec::new()),
            (Timeframe::OneHour, rising(20)),
        ];
        let snapshot = build_snapshot("BTCUSDT", fetched, None);

        assert_eq!(snapshot.timeframes.len(), 3);
        assert_eq!(snapshot.ready_count(), 1);

        let five = snapshot.timeframe(Timeframe::FiveMinutes).unwrap();
        assert_eq!(five.status, AnalysisStatus::Ready);
        assert_eq!(five.latest.as_ref().unwrap().trend, TrendSignal::Bullish);

        let fifteen = snapshot.timeframe(Timeframe::FifteenMinutes).unwrap();
        assert_eq!(fifteen.status, AnalysisStatus::NoData);
        assert_eq!(fifteen.candles_in, 0);

        let hour = snapshot.timeframe(Timeframe::OneHour).unwrap();
        assert_eq!(hour.status, AnalysisStatus::NoData);
        assert_eq!(hour.candles_in, 20);
    }

    #[test]
    fn timeframe_order_preserved() {
        let fetched = vec![
            (Timeframe::OneHour, rising(60)),
            (Timeframe::FiveMinutes, rising(60)),
        ];
        let snapshot = build_snapshot("ETHUSDT", fetched, None);
        let order: Vec<_> = snapshot.timeframes.iter().map(|a| a.timeframe).collect();
        assert_eq!(order, vec![Timeframe::OneHour, Timeframe::FiveMinutes]);
    }

    #[test]
    fn cached_and_uncached_agree() {
        let cache = IndicatorCache::new();
        let fetched = || vec![(Timeframe::FiveMinutes, rising(90))];

        let plain = build_snapshot("BTCUSDT", fetched(), None);
        let cached = build_snapshot("BTCUSDT", fetched(), Some(&cache));
        let again = build_snapshot("BTCUSDT", fetched(), Some(&cache));

        assert_eq!(plain.timeframes, cached.timeframes);
        assert_eq!(cached.timeframes, again.timeframes);
        assert_eq!(cache.len(), 1);
    }

    /// Kline endpoint that answers only after `delay`.
    async fn slow_server(delay: Duration) -> String {
        use axum::{routing::get, Json, Router};

        let app = Router::new().route(
            "/fapi/v1/klines",
            get(move || async move {
                tokio::time::sleep(delay).await;
                Json(serde_json::json!([]))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn timed_out_cycle_keeps_previous_snapshot() {
        let config = PanelConfig {
            base_url: slow_server(Duration::from_secs(5)).await,
            timeframes: vec![Timeframe::FiveMinutes],
            ..PanelConfig::default()
        };
        let state = AppState::new(config).unwrap();

        let previous = build_snapshot("BTCUSDT", vec![(Timeframe::FiveMinutes, rising(60))], None);
        state.store_snapshot(previous.clone());
        let version = state.current_state_version();

        let result = run_bounded_cycle(&state, Duration::from_millis(100)).await;
        assert!(result.is_none());

        let error = state.last_cycle_error.read().clone().unwrap();
        assert!(error.contains("100ms"), "{error}");
        assert_eq!(state.latest_snapshot().unwrap(), previous);
        assert_eq!(state.current_state_version(), version);
    }

    #[test]
    fn cycle_limit_follows_refresh_interval() {
        let config = PanelConfig {
            refresh_interval_secs: 15,
            ..PanelConfig::default()
        };
        let state = AppState::new(config).unwrap();
        assert_eq!(cycle_limit(&state), Duration::from_secs(15));
    }
}
