// =============================================================================
// Timeframe Analysis — what the panel shows for one (symbol, timeframe)
// =============================================================================
//
// Reads the latest rows of an extended indicator series and condenses them
// into a summary: last price, RSI readings, EMA(9)/EMA(21) cross label and a
// trailing chart window.  An empty series becomes an explicit `NoData` entry so
// consumers never index into missing rows.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::engine::{trend_signal, ExtendedSeries};
use crate::indicators::rsi_zone;
use crate::types::{Timeframe, TrendSignal};

/// Number of trailing rows exposed for charting.
pub const CHART_WINDOW: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Ready,
    NoData,
}

/// One chart sample: close with both EMAs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChartPoint {
    pub timestamp: i64,
    pub close: f64,
    pub ema_9: f64,
    pub ema_21: f64,
}

/// Latest readings derived from the last indicator row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestReadings {
    pub timestamp: i64,
    pub last_price: f64,
    pub rsi_6: f64,
    pub rsi_14: f64,
    pub rsi_24: f64,
    pub rsi_14_zone: &'static str,
    pub ema_9: f64,
    pub ema_21: f64,
    pub sma_50: f64,
    pub trend: TrendSignal,
}

/// Full snapshot of the analysis for a single timeframe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeframeAnalysis {
    pub timeframe: Timeframe,
    pub status: AnalysisStatus,
    /// `None` when `status` is `NoData`.
    pub latest: Option<LatestReadings>,
    pub chart: Vec<ChartPoint>,
    /// Candles received from the fetcher.
    pub candles_in: usize,
    /// Rows left after warm-up trimming.
    pub rows_out: usize,
}

impl TimeframeAnalysis {
    /// Summarise `series`, which was computed from `candles_in` candles.
    pub fn from_series(timeframe: Timeframe, candles_in: usize, series: &ExtendedSeries) -> Self {
        let Some(row) = series.latest() else {
            debug!(timeframe = %timeframe, candles_in, "no indicator rows — reporting no data");
            return Self::no_data(timeframe, candles_in);
        };

        let latest = LatestReadings {
            timestamp: row.candle.timestamp,
            last_price: row.candle.close,
            rsi_6: row.rsi_6,
            rsi_14: row.rsi_14,
            rsi_24: row.rsi_24,
            rsi_14_zone: rsi_zone(row.rsi_14),
            ema_9: row.ema_9,
            ema_21: row.ema_21,
            sma_50: row.sma_50,
            trend: trend_signal(row),
        };

        let chart = series
            .tail(CHART_WINDOW)
            .iter()
            .map(|r| ChartPoint {
                timestamp: r.candle.timestamp,
                close: r.candle.close,
                ema_9: r.ema_9,
                ema_21: r.ema_21,
            })
            .collect();

        Self {
            timeframe,
            status: AnalysisStatus::Ready,
            latest: Some(latest),
            chart,
            candles_in,
            rows_out: series.len(),
        }
    }

    pub fn no_data(timeframe: Timeframe, candles_in: usize) -> Self {
        Self {
            timeframe,
            status: AnalysisStatus::NoData,
            latest: None,
            chart: Vec::new(),
            candles_in,
            rows_out: 0,
        }
    }
}

/// Everything produced by one refresh cycle for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelSnapshot {
    pub symbol: String,
    pub timeframes: Vec<TimeframeAnalysis>,
    pub updated_at: DateTime<Utc>,
}

impl PanelSnapshot {
    pub fn timeframe(&self, timeframe: Timeframe) -> Option<&TimeframeAnalysis> {
        self.timeframes.iter().find(|a| a.timeframe == timeframe)
    }

    /// Number of timeframes that produced indicator rows.
    pub fn ready_count(&self) -> usize {
        self.timeframes
            .iter()
            .filter(|a| a.status == AnalysisStatus::Ready)
            .count()
    }
}
