use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use crate::engine::{compute_indicators, ExtendedSeries};
use crate::market_data::{Candle, SeriesKey};

// ---------------------------------------------------------------------------
// IndicatorCache -- memoises engine output per (symbol, timeframe)
// ---------------------------------------------------------------------------

/// Thread-safe memo of the last computed [`ExtendedSeries`] per series key.
///
/// An entry is reused only while the latest candle and the number of candles
/// are unchanged.  The latest kline is still forming, so a moved close on the
/// same timestamp forces a recompute just like a new candle does.
#[derive(Default)]
pub struct IndicatorCache {
    entries: RwLock<HashMap<SeriesKey, CacheEntry>>,
}

#[derive(Clone)]
struct CacheEntry {
    latest: Candle,
    candles: usize,
    series: ExtendedSeries,
}

impl IndicatorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the extended series for `candles`, computing it only when the
    /// cached entry for `key` is stale.  Empty input is never cached.
    pub fn get_or_compute(&self, key: &SeriesKey, candles: &[Candle]) -> ExtendedSeries {
        let Some(latest) = candles.last() else {
            return ExtendedSeries::default();
        };

        if let Some(entry) = self.entries.read().get(key) {
            if entry.latest == *latest && entry.candles == candles.len() {
                debug!(key = %key, "indicator cache hit");
                return entry.series.clone();
            }
        }

        let series = compute_indicators(candles);
        debug!(key = %key, rows = series.len(), "indicator cache miss — recomputed");
        self.entries.write().insert(
            key.clone(),
            CacheEntry {
                latest: *latest,
                candles: candles.len(),
                series: series.clone(),
            },
        );
        series
    }

    /// Number of cached series.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timeframe;

    fn candles(n: usize, last_close: f64) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let c = if i + 1 == n { last_close } else { 100.0 + i as f64 };
                Candle::new(i as i64 * 60_000, c, c + 1.0, c - 1.0, c, 5.0)
            })
            .collect()
    }

    #[test]
    fn hit_returns_same_series() {
        let cache = IndicatorCache::new();
        let key = SeriesKey::new("BTCUSDT", Timeframe::FiveMinutes);
        let input = candles(60, 170.0);

        let first = cache.get_or_compute(&key, &input);
        let second = cache.get_or_compute(&key, &input);
        assert_eq!(first, second);
        assert_eq!(first, compute_indicators(&input));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn new_candle_forces_recompute() {
        let cache = IndicatorCache::new();
        let key = SeriesKey::new("ETHUSDT", Timeframe::OneHour);

        let a = cache.get_or_compute(&key, &candles(60, 170.0));
        let b = cache.get_or_compute(&key, &candles(61, 171.0));
        assert_eq!(a.len() + 1, b.len());
    }

    #[test]
    fn updated_open_candle_forces_recompute() {
        let cache = IndicatorCache::new();
        let key = SeriesKey::new("BNBUSDT", Timeframe::FiveMinutes);

        let a = cache.get_or_compute(&key, &candles(60, 170.0));
        let b = cache.get_or_compute(&key, &candles(60, 140.0));
        assert_eq!(a.len(), b.len());
        assert_ne!(a.latest().unwrap().candle.close, b.latest().unwrap().candle.close);
        assert_eq!(b, compute_indicators(&candles(60, 140.0)));
    }

    #[test]
    fn keys_are_isolated() {
        let cache = IndicatorCache::new();
        let input = candles(55, 160.0);
        cache.get_or_compute(&SeriesKey::new("BTCUSDT", Timeframe::FiveMinutes), &input);
        cache.get_or_compute(&SeriesKey::new("BTCUSDT", Timeframe::OneHour), &input);
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn empty_input_not_cached() {
        let cache = IndicatorCache::new();
        let key = SeriesKey::new("SOLUSDT", Timeframe::FifteenMinutes);
        assert!(cache.get_or_compute(&key, &[]).is_empty());
        assert_eq!(cache.len(), 0);
    }
}
