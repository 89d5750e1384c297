// =============================================================================
// Central Application State — Pulse analysis panel
// =============================================================================
//
// Ties together configuration, the Binance client, the indicator cache and the
// latest panel snapshot.  Shared across the refresh loop and the API server
// via `Arc<AppState>`.
//
// Thread safety:
//   - Atomic counter for lock-free version tracking.
//   - parking_lot::RwLock for configuration and the latest snapshot; guards
//     are never held across an `.await`.
//   - tokio Mutex serialising refresh cycles (periodic loop vs. manual
//     trigger from the API).
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use parking_lot::RwLock;

use crate::analysis::PanelSnapshot;
use crate::binance::BinanceClient;
use crate::cache::IndicatorCache;
use crate::runtime_config::PanelConfig;

pub struct AppState {
    /// Incremented every time a new snapshot is stored.
    pub state_version: AtomicU64,

    pub config: Arc<RwLock<PanelConfig>>,
    pub client: BinanceClient,
    pub cache: IndicatorCache,

    pub latest: RwLock<Option<PanelSnapshot>>,
    pub last_cycle_error: RwLock<Option<String>>,

    /// Held for the duration of one refresh cycle.
    pub refresh_lock: tokio::sync::Mutex<()>,

    pub start_time: Instant,
}

impl AppState {
    /// Build the state from `config`.  Fails only if the HTTP client cannot be
    /// constructed.
    pub fn new(config: PanelConfig) -> Result<Self> {
        let client = BinanceClient::new(
            config.base_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )?;

        Ok(Self {
            state_version: AtomicU64::new(0),
            config: Arc::new(RwLock::new(config)),
            client,
            cache: IndicatorCache::new(),
            latest: RwLock::new(None),
            last_cycle_error: RwLock::new(None),
            refresh_lock: tokio::sync::Mutex::new(()),
            start_time: Instant::now(),
        })
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::Relaxed)
    }

    /// Replace the latest snapshot and bump the version.
    pub fn store_snapshot(&self, snapshot: PanelSnapshot) {
        *self.latest.write() = Some(snapshot);
        *self.last_cycle_error.write() = None;
        self.state_version.fetch_add(1, Ordering::Relaxed);
    }

    pub fn latest_snapshot(&self) -> Option<PanelSnapshot> {
        self.latest.read().clone()
    }

    pub fn record_cycle_error(&self, message: impl Into<String>) {
        *self.last_cycle_error.write() = Some(message.into());
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}
