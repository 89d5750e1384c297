use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::Timeframe;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single OHLCV candle from the Binance klines endpoint.
///
/// `timestamp` is the candle open time in milliseconds since the UNIX epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Check the OHLCV invariants: every field finite, `high >= low`, and the
    /// open/close body contained in the high/low range.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("volume", self.volume),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                anyhow::bail!("candle {}: {name} is not finite ({value})", self.timestamp);
            }
        }
        if self.high < self.low {
            anyhow::bail!(
                "candle {}: high {} below low {}",
                self.timestamp,
                self.high,
                self.low
            );
        }
        if self.high < self.open.max(self.close) || self.low > self.open.min(self.close) {
            anyhow::bail!(
                "candle {}: body [{}, {}] outside range [{}, {}]",
                self.timestamp,
                self.open,
                self.close,
                self.low,
                self.high
            );
        }
        Ok(())
    }
}

/// Composite key that identifies a unique candle series.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SeriesKey {
    pub symbol: String,
    pub timeframe: Timeframe,
}

impl SeriesKey {
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
        }
    }
}

impl std::fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.symbol, self.timeframe.interval_code())
    }
}

// ---------------------------------------------------------------------------
// Normalisation
// ---------------------------------------------------------------------------

/// Turn raw fetched candles into a valid OHLCV series: malformed candles are
/// dropped, the rest are ordered by timestamp and duplicate timestamps collapse
/// to the last one received.
pub fn normalize_series(raw: Vec<Candle>) -> Vec<Candle> {
    let received = raw.len();

    let mut candles: Vec<Candle> = raw
        .into_iter()
        .filter(|c| match c.validate() {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "dropping malformed candle");
                false
            }
        })
        .collect();

    // Stable sort keeps arrival order among equal timestamps, so the
    // dedup below can keep the latest arrival.
    candles.sort_by_key(|c| c.timestamp);
    let mut series: Vec<Candle> = Vec::with_capacity(candles.len());
    for candle in candles {
        match series.last_mut() {
            Some(last) if last.timestamp == candle.timestamp => *last = candle,
            _ => series.push(candle),
        }
    }

    if series.len() != received {
        warn!(received, kept = series.len(), "series normalisation removed candles");
    }
    series
}

/// Close prices of `candles`, oldest first.
pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
