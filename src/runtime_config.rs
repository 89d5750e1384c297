// =============================================================================
// Panel Configuration — symbol/timeframe selection, history and refresh mode
// =============================================================================
//
// Every tunable lives here.  Persistence uses an atomic tmp + rename pattern to
// prevent corruption on crash.  All fields carry a serde default so that adding
// new fields never breaks loading an older config file.
//
// Environment variables (loaded from `.env` by `dotenv` in main) override the
// file: PANEL_SYMBOL, PANEL_TIMEFRAMES, PANEL_LIMIT, PANEL_REFRESH,
// PANEL_REFRESH_SECS, PANEL_BIND_ADDR, PANEL_BASE_URL.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::binance::client::DEFAULT_BASE_URL;
use crate::types::{RefreshMode, Timeframe};

/// Largest `limit` accepted by `/fapi/v1/klines`.
pub const MAX_HISTORY_LIMIT: u32 = 1500;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_true() -> bool {
    true
}

fn default_symbol() -> String {
    "BTCUSDT".to_string()
}

fn default_symbols() -> Vec<String> {
    vec![
        "BTCUSDT".to_string(),
        "ETHUSDT".to_string(),
        "BNBUSDT".to_string(),
        "SOLUSDT".to_string(),
        "XRPUSDT".to_string(),
    ]
}

fn default_timeframes() -> Vec<Timeframe> {
    Timeframe::ALL.to_vec()
}

fn default_history_limit() -> u32 {
    100
}

fn default_refresh_interval_secs() -> u64 {
    60
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_bind_addr() -> String {
    "127.0.0.1:3001".to_string()
}

// =============================================================================
// PanelConfig
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelConfig {
    // --- Selection ----------------------------------------------------------

    /// Symbol currently shown on the panel.  Must be in `symbols`.
    #[serde(default = "default_symbol")]
    pub symbol: String,

    /// Allow-list of selectable symbols.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    /// Timeframes analysed on every refresh, in display order.
    #[serde(default = "default_timeframes")]
    pub timeframes: Vec<Timeframe>,

    /// Candles requested per timeframe.
    #[serde(default = "default_history_limit")]
    pub history_limit: u32,

    // --- Refresh ------------------------------------------------------------

    #[serde(default)]
    pub refresh_mode: RefreshMode,

    /// Interval between cycles in `Periodic` mode; also bounds one cycle.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    // --- Data source --------------------------------------------------------

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Reuse indicator results when no new candle has arrived.
    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    // --- API ----------------------------------------------------------------

    #[serde(default = "default_true")]
    pub api_enabled: bool,

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            symbols: default_symbols(),
            timeframes: default_timeframes(),
            history_limit: default_history_limit(),
            refresh_mode: RefreshMode::default(),
            refresh_interval_secs: default_refresh_interval_secs(),
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            cache_enabled: true,
            api_enabled: true,
            bind_addr: default_bind_addr(),
        }
    }
}

impl PanelConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read panel config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse panel config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbol = %config.symbol,
            refresh_mode = %config.refresh_mode,
            "panel config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise panel config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "panel config saved (atomic)");
        Ok(())
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides looked up through `get` (environment in production).
    pub fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(symbol) = get("PANEL_SYMBOL") {
            self.symbol = symbol.trim().to_uppercase();
        }
        if let Some(list) = get("PANEL_TIMEFRAMES") {
            // Comma-separated labels or interval codes, e.g. "5m,1h".
            self.timeframes = list
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(str::parse)
                .collect::<Result<Vec<Timeframe>>>()
                .context("invalid PANEL_TIMEFRAMES")?;
        }
        if let Some(limit) = get("PANEL_LIMIT") {
            self.history_limit = limit
                .trim()
                .parse()
                .with_context(|| format!("PANEL_LIMIT is not a number: {limit}"))?;
        }
        if let Some(mode) = get("PANEL_REFRESH") {
            self.refresh_mode = mode.parse()?;
        }
        if let Some(secs) = get("PANEL_REFRESH_SECS") {
            self.refresh_interval_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("PANEL_REFRESH_SECS is not a number: {secs}"))?;
        }
        if let Some(addr) = get("PANEL_BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Some(url) = get("PANEL_BASE_URL") {
            self.base_url = url;
        }
        Ok(())
    }

    /// Reject configurations the panel cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !self.symbols.iter().any(|s| s == &self.symbol) {
            anyhow::bail!(
                "symbol {} is not in the allow-list {:?}",
                self.symbol,
                self.symbols
            );
        }
        if self.timeframes.is_empty() {
            anyhow::bail!("at least one timeframe must be configured");
        }
        if !(1..=MAX_HISTORY_LIMIT).contains(&self.history_limit) {
            anyhow::bail!(
                "history_limit {} outside 1..={MAX_HISTORY_LIMIT}",
                self.history_limit
            );
        }
        if self.refresh_interval_secs == 0 {
            anyhow::bail!("refresh_interval_secs must be positive");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be positive");
        }
        Ok(())
    }

    /// Switch the displayed symbol, enforcing the allow-list.
    pub fn select_symbol(&mut self, symbol: &str) -> Result<()> {
        let symbol = symbol.trim().to_uppercase();
        if !self.symbols.contains(&symbol) {
            anyhow::bail!("symbol {symbol} is not in the allow-list");
        }
        self.symbol = symbol;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = PanelConfig::default();
        assert_eq!(cfg.symbol, "BTCUSDT");
        assert_eq!(cfg.symbols.len(), 5);
        assert_eq!(cfg.symbols[4], "XRPUSDT");
        assert_eq!(cfg.timeframes, Timeframe::ALL.to_vec());
        assert_eq!(cfg.history_limit, 100);
        assert_eq!(cfg.refresh_mode, RefreshMode::Periodic);
        assert_eq!(cfg.refresh_interval_secs, 60);
        assert_eq!(cfg.base_url, "https://fapi.binance.com");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: PanelConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.symbol, "BTCUSDT");
        assert_eq!(cfg.history_limit, 100);
        assert!(cfg.cache_enabled);
        assert!(cfg.api_enabled);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "symbol": "ETHUSDT", "refresh_mode": "Manual", "timeframes": ["1hour"] }"#;
        let cfg: PanelConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.symbol, "ETHUSDT");
        assert_eq!(cfg.refresh_mode, RefreshMode::Manual);
        assert_eq!(cfg.timeframes, vec![Timeframe::OneHour]);
        assert_eq!(cfg.refresh_interval_secs, 60);
    }

    #[test]
    fn validate_rejects_unknown_symbol() {
        let cfg = PanelConfig {
            symbol: "DOGEUSDT".into(),
            ..PanelConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_limit_out_of_range() {
        let mut cfg = PanelConfig::default();
        cfg.history_limit = 0;
        assert!(cfg.validate().is_err());
        cfg.history_limit = 1501;
        assert!(cfg.validate().is_err());
        cfg.history_limit = 1500;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_timeframes() {
        let mut cfg = PanelConfig::default();
        cfg.timeframes.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("PANEL_SYMBOL", "solusdt"),
            ("PANEL_TIMEFRAMES", "15min, 1h"),
            ("PANEL_LIMIT", "250"),
            ("PANEL_REFRESH", "manual"),
            ("PANEL_BIND_ADDR", "0.0.0.0:8080"),
        ]
        .into_iter()
        .collect();

        let mut cfg = PanelConfig::default();
        cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(cfg.symbol, "SOLUSDT");
        assert_eq!(cfg.timeframes, vec![Timeframe::FifteenMinutes, Timeframe::OneHour]);
        assert_eq!(cfg.history_limit, 250);
        assert_eq!(cfg.refresh_mode, RefreshMode::Manual);
        assert_eq!(cfg.bind_addr, "0.0.0.0:8080");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn bad_override_is_error() {
        let mut cfg = PanelConfig::default();
        let result = cfg.apply_overrides(|k| (k == "PANEL_LIMIT").then(|| "many".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn select_symbol_enforces_allow_list() {
        let mut cfg = PanelConfig::default();
        cfg.select_symbol("bnbusdt").unwrap();
        assert_eq!(cfg.symbol, "BNBUSDT");
        assert!(cfg.select_symbol("PEPEUSDT").is_err());
        assert_eq!(cfg.symbol, "BNBUSDT");
    }

    #[test]
    fn save_then_load() {
        let dir = std::env::temp_dir().join(format!("pulse-panel-cfg-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("panel_config.json");

        let mut cfg = PanelConfig::default();
        cfg.symbol = "XRPUSDT".into();
        cfg.history_limit = 500;
        cfg.save(&path).unwrap();

        let loaded = PanelConfig::load(&path).unwrap();
        assert_eq!(loaded.symbol, "XRPUSDT");
        assert_eq!(loaded.history_limit, 500);
        assert!(!path.with_extension("json.tmp").exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn load_missing_file_is_error() {
        assert!(PanelConfig::load("/definitely/not/here/panel_config.json").is_err());
    }
}
