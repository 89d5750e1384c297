// =============================================================================
// Shared types used across the Pulse analysis panel
// =============================================================================

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Chart timeframe the panel analyses.  Each variant maps to a Binance kline
/// interval code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "5min")]
    FiveMinutes,
    #[serde(rename = "15min")]
    FifteenMinutes,
    #[serde(rename = "1hour")]
    OneHour,
}

impl Timeframe {
    /// Every timeframe in display order (shortest first).
    pub const ALL: [Timeframe; 3] = [
        Timeframe::FiveMinutes,
        Timeframe::FifteenMinutes,
        Timeframe::OneHour,
    ];

    /// Human-facing label, e.g. `"15min"`.
    pub fn label(self) -> &'static str {
        match self {
            Self::FiveMinutes => "5min",
            Self::FifteenMinutes => "15min",
            Self::OneHour => "1hour",
        }
    }

    /// Binance kline interval code, e.g. `"15m"`.
    pub fn interval_code(self) -> &'static str {
        match self {
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::OneHour => "1h",
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Timeframe {
    type Err = anyhow::Error;

    /// Accepts either the label (`5min`) or the interval code (`5m`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|tf| tf.label().eq_ignore_ascii_case(s) || tf.interval_code() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown timeframe '{s}'"))
    }
}

/// EMA(9) / EMA(21) crossover label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendSignal {
    Bullish,
    Bearish,
}

impl std::fmt::Display for TrendSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => write!(f, "Bullish"),
            Self::Bearish => write!(f, "Bearish"),
        }
    }
}

/// How the panel refreshes: once on demand, or on a fixed interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefreshMode {
    Manual,
    Periodic,
}

impl Default for RefreshMode {
    fn default() -> Self {
        Self::Periodic
    }
}

impl std::fmt::Display for RefreshMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Manual => write!(f, "Manual"),
            Self::Periodic => write!(f, "Periodic"),
        }
    }
}

impl FromStr for RefreshMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manual" => Ok(Self::Manual),
            "periodic" | "auto" => Ok(Self::Periodic),
            other => anyhow::bail!("unknown refresh mode '{other}' (expected manual|periodic)"),
        }
    }
}
