// =============================================================================
// Request-weight tracker — monitors Binance futures API usage to avoid 429s
// =============================================================================
//
// The futures API budgets 2400 request weight per minute.  A klines call with
// limit < 100 costs 1, < 500 costs 2, <= 1000 costs 5 and above that 10.
//
// The tracker reads the `X-MBX-USED-WEIGHT-1M` response header after every
// request and keeps an atomic counter that any thread may query lock-free.
// Binance resets the counter at each wall-clock minute, so a value recorded
// in an earlier minute reads as 0.
// =============================================================================

use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Hard ceiling at which we refuse to send additional requests.
const WEIGHT_HARD_LIMIT: u32 = 2000;
/// Soft warning threshold.
const WEIGHT_WARN_THRESHOLD: u32 = 1600;

const WEIGHT_HEADER: &str = "X-MBX-USED-WEIGHT-1M";

/// Request weight of `GET /fapi/v1/klines` for a given `limit`.
pub fn klines_weight(limit: u32) -> u32 {
    match limit {
        0..=99 => 1,
        100..=499 => 2,
        500..=1000 => 5,
        _ => 10,
    }
}

/// Minutes since the UNIX epoch, the granularity of the weight window.
fn current_minute() -> i64 {
    Utc::now().timestamp_millis().div_euclid(60_000)
}

/// Thread-safe tracker backed by atomic counters.
pub struct WeightTracker {
    used_weight_1m: AtomicU32,
    /// Minute in which `used_weight_1m` was last reported.
    window_minute: AtomicI64,
}

/// Immutable snapshot of the current usage (suitable for the status API).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightSnapshot {
    pub used_weight_1m: u32,
    pub hard_limit: u32,
}

impl WeightTracker {
    pub fn new() -> Self {
        Self {
            used_weight_1m: AtomicU32::new(0),
            window_minute: AtomicI64::new(i64::MIN),
        }
    }

    // -------------------------------------------------------------------------
    // Header ingestion
    // -------------------------------------------------------------------------

    /// Update the counter from the HTTP response headers returned by Binance.
    pub fn update_from_headers(&self, headers: &reqwest::header::HeaderMap) {
        if let Some(w) = parse_weight_header(headers) {
            self.record_weight(w, current_minute());
        }
    }

    fn record_weight(&self, w: u32, minute: i64) {
        let prev = self.used_weight_at(minute);
        self.used_weight_1m.store(w, Ordering::Relaxed);
        self.window_minute.store(minute, Ordering::Relaxed);

        if w >= WEIGHT_WARN_THRESHOLD && prev < WEIGHT_WARN_THRESHOLD {
            warn!(
                used_weight = w,
                hard_limit = WEIGHT_HARD_LIMIT,
                "request weight crossed warning threshold"
            );
        }
        debug!(used_weight_1m = w, "request weight updated from header");
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    fn used_weight_at(&self, minute: i64) -> u32 {
        if self.window_minute.load(Ordering::Relaxed) == minute {
            self.used_weight_1m.load(Ordering::Relaxed)
        } else {
            0
        }
    }

    /// Return `true` if we can afford to spend `weight` more request weight
    /// without exceeding the hard limit.
    pub fn can_send_request(&self, weight: u32) -> bool {
        self.can_send_request_at(weight, current_minute())
    }

    fn can_send_request_at(&self, weight: u32, minute: i64) -> bool {
        let current = self.used_weight_at(minute);
        let allowed = current.saturating_add(weight) <= WEIGHT_HARD_LIMIT;
        if !allowed {
            warn!(
                current_weight = current,
                requested_weight = weight,
                hard_limit = WEIGHT_HARD_LIMIT,
                "request blocked — would exceed request weight budget"
            );
        }
        allowed
    }

    pub fn snapshot(&self) -> WeightSnapshot {
        WeightSnapshot {
            used_weight_1m: self.used_weight_at(current_minute()),
            hard_limit: WEIGHT_HARD_LIMIT,
        }
    }
}

fn parse_weight_header(headers: &reqwest::header::HeaderMap) -> Option<u32> {
    headers
        .get(WEIGHT_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u32>().ok())
}

impl Default for WeightTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WeightTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeightTracker")
            .field("used_weight_1m", &self.used_weight_1m.load(Ordering::Relaxed))
            .field("window_minute", &self.window_minute.load(Ordering::Relaxed))
            .finish()
    }
}
