// =============================================================================
// Indicator Engine — OHLCV series in, fully-populated indicator rows out
// =============================================================================
//
// For every candle the engine computes RSI(6/14/24), EMA(9), EMA(21) and
// SMA(50), then trims every row in which any indicator is still warming up.
// SMA(50) has the longest warm-up, so a series of `n` candles yields
// `max(0, n - 49)` rows.
//
// The engine is a pure function: no caching, no shared state, no errors.  Empty
// or short input simply produces an empty `ExtendedSeries`.
// =============================================================================

use serde::Serialize;

use crate::indicators::{ema_series, rsi_series, sma_series};
use crate::market_data::{closes, Candle};
use crate::types::TrendSignal;

pub const RSI_PERIODS: [usize; 3] = [6, 14, 24];
pub const EMA_FAST_SPAN: usize = 9;
pub const EMA_SLOW_SPAN: usize = 21;
pub const SMA_WINDOW: usize = 50;

/// Minimum number of candles for a non-empty result.
pub const MIN_HISTORY: usize = SMA_WINDOW;

/// A candle together with every indicator value at that candle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndicatorRow {
    #[serde(flatten)]
    pub candle: Candle,
    pub rsi_6: f64,
    pub rsi_14: f64,
    pub rsi_24: f64,
    pub ema_9: f64,
    pub ema_21: f64,
    pub sma_50: f64,
}

/// Indicator columns aligned with the candle series; `None` while warming up.
#[derive(Debug, Clone, Default)]
struct IndicatorColumns {
    rsi_6: Vec<Option<f64>>,
    rsi_14: Vec<Option<f64>>,
    rsi_24: Vec<Option<f64>>,
    ema_9: Vec<Option<f64>>,
    ema_21: Vec<Option<f64>>,
    sma_50: Vec<Option<f64>>,
}

impl IndicatorColumns {
    fn compute(closes: &[f64]) -> Self {
        let [p_short, p_mid, p_long] = RSI_PERIODS;
        Self {
            rsi_6: rsi_series(closes, p_short),
            rsi_14: rsi_series(closes, p_mid),
            rsi_24: rsi_series(closes, p_long),
            ema_9: ema_series(closes, EMA_FAST_SPAN),
            ema_21: ema_series(closes, EMA_SLOW_SPAN),
            sma_50: sma_series(closes, SMA_WINDOW),
        }
    }

    /// Row `i` if every column is defined there.
    fn row(&self, i: usize, candle: Candle) -> Option<IndicatorRow> {
        Some(IndicatorRow {
            candle,
            rsi_6: self.rsi_6[i]?,
            rsi_14: self.rsi_14[i]?,
            rsi_24: self.rsi_24[i]?,
            ema_9: self.ema_9[i]?,
            ema_21: self.ema_21[i]?,
            sma_50: self.sma_50[i]?,
        })
    }
}

/// Candles extended with indicator values, restricted to fully-defined rows.
/// Oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ExtendedSeries {
    rows: Vec<IndicatorRow>,
}

impl ExtendedSeries {
    /// Join `candles` with the indicator columns and drop every row with an
    /// undefined field.
    fn from_columns(candles: &[Candle], columns: &IndicatorColumns) -> Self {
        let rows = candles
            .iter()
            .enumerate()
            .filter_map(|(i, &candle)| columns.row(i, candle))
            .collect();
        Self { rows }
    }

    pub fn rows(&self) -> &[IndicatorRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Most recent row, if any.
    pub fn latest(&self) -> Option<&IndicatorRow> {
        self.rows.last()
    }

    /// Last `n` rows (or fewer when the series is shorter), oldest first.
    pub fn tail(&self, n: usize) -> &[IndicatorRow] {
        let start = self.rows.len().saturating_sub(n);
        &self.rows[start..]
    }

    /// Crossover label at the latest row.  `None` only for an empty series.
    pub fn trend(&self) -> Option<TrendSignal> {
        self.latest().map(trend_signal)
    }
}

/// Compute the extended indicator series for an OHLCV series.
///
/// `candles` must already satisfy the series invariants (ordered, unique
/// timestamps, finite values); see [`crate::market_data::normalize_series`].
pub fn compute_indicators(candles: &[Candle]) -> ExtendedSeries {
    if candles.len() < MIN_HISTORY {
        return ExtendedSeries::default();
    }
    let columns = IndicatorColumns::compute(&closes(candles));
    ExtendedSeries::from_columns(candles, &columns)
}

/// `Bullish` iff EMA(9) is strictly above EMA(21) at `row`.
pub fn trend_signal(row: &IndicatorRow) -> TrendSignal {
    if row.ema_9 > row.ema_21 {
        TrendSignal::Bullish
    } else {
        TrendSignal::Bearish
    }
}
