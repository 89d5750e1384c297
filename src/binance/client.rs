// =============================================================================
// Binance Futures REST client — public market data only
// =============================================================================
//
// Fetches klines from `GET /fapi/v1/klines`, retrying transient failures with
// capped exponential backoff, and normalises them into an OHLCV series.
//
// `fetch_series` is the boundary the rest of the panel uses: any transport,
// API or parse failure is logged and turned into an empty series so a single
// bad timeframe never blanks the whole panel.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, instrument, warn};

use crate::binance::rate_limit::{klines_weight, WeightTracker};
use crate::binance::retry::RetryPolicy;
use crate::market_data::{normalize_series, Candle};
use crate::types::Timeframe;

/// Default futures REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://fapi.binance.com";

/// Binance REST client for public kline data.
#[derive(Clone)]
pub struct BinanceClient {
    base_url: String,
    client: reqwest::Client,
    retry: RetryPolicy,
    weight: Arc<WeightTracker>,
}

impl BinanceClient {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Create a new client against `base_url` with a per-request `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build reqwest client")?;

        debug!(base_url = %base_url, "BinanceClient initialised");

        Ok(Self {
            base_url,
            client,
            retry: RetryPolicy::default(),
            weight: Arc::new(WeightTracker::new()),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn weight_tracker(&self) -> &WeightTracker {
        &self.weight
    }

    // -------------------------------------------------------------------------
    // Public market data
    // -------------------------------------------------------------------------

    /// Fetch and normalise the OHLCV series for `symbol` / `timeframe`.
    ///
    /// Never fails: errors are logged and reported as an empty series, which
    /// the engine treats as "no data available".
    pub async fn fetch_series(&self, symbol: &str, timeframe: Timeframe, limit: u32) -> Vec<Candle> {
        match self.get_klines(symbol, timeframe.interval_code(), limit).await {
            Ok(raw) => normalize_series(raw),
            Err(e) => {
                warn!(
                    symbol,
                    timeframe = %timeframe,
                    error = %format!("{e:#}"),
                    "kline fetch failed — treating as no data"
                );
                Vec::new()
            }
        }
    }

    /// GET /fapi/v1/klines (public — no signature required).
    ///
    /// Retries on transport errors, 429 and 5xx according to the client's
    /// [`RetryPolicy`].
    #[instrument(skip(self), name = "binance::get_klines")]
    pub async fn get_klines(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Candle>> {
        let url = self.klines_url(symbol, interval, limit);
        let weight = klines_weight(limit);
        let mut attempt = 0;

        loop {
            if !self.weight.can_send_request(weight) {
                anyhow::bail!("request weight budget exhausted; skipping klines request");
            }

            let last_err = match self.client.get(&url).send().await {
                Ok(resp) => {
                    self.weight.update_from_headers(resp.headers());
                    let status = resp.status();

                    if status.is_success() {
                        let body: serde_json::Value = resp
                            .json()
                            .await
                            .context("failed to parse klines response")?;
                        let candles = parse_klines(&body)?;
                        debug!(symbol, interval, count = candles.len(), "klines fetched");
                        return Ok(candles);
                    }

                    let body = resp.text().await.unwrap_or_default();
                    let err = anyhow::anyhow!(
                        "Binance GET /fapi/v1/klines returned {}: {}",
                        status,
                        body
                    );
                    if !RetryPolicy::is_retryable_status(status) {
                        return Err(err);
                    }
                    err
                }
                Err(e) => {
                    let retryable = RetryPolicy::is_retryable_error(&e);
                    let err = anyhow::Error::new(e).context("GET /fapi/v1/klines request failed");
                    if !retryable {
                        return Err(err);
                    }
                    err
                }
            };

            attempt += 1;
            if attempt >= self.retry.max_attempts {
                return Err(last_err.context(format!("giving up after {attempt} attempts")));
            }

            let delay = self.retry.delay(attempt - 1);
            warn!(
                symbol,
                interval,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %last_err,
                "klines request failed — retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    fn klines_url(&self, symbol: &str, interval: &str, limit: u32) -> String {
        format!(
            "{}/fapi/v1/klines?symbol={}&interval={}&limit={}",
            self.base_url, symbol, interval, limit
        )
    }
}

impl std::fmt::Debug for BinanceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceClient")
            .field("base_url", &self.base_url)
            .field("retry", &self.retry)
            .field("weight", &self.weight)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Response parsing
// -----------------------------------------------------------------------------

/// Parse Binance's array-of-arrays klines payload.
///
/// Array indices:
///   [0] openTime, [1] open, [2] high, [3] low, [4] close, [5] volume,
///   [6] closeTime, [7] quoteAssetVolume, [8] numberOfTrades, ...
///
/// Entries with fewer than six elements are skipped with a warning; a field
/// that fails to parse is an error for the whole payload.
pub fn parse_klines(body: &serde_json::Value) -> Result<Vec<Candle>> {
    let raw = body.as_array().context("klines response is not an array")?;

    let mut candles = Vec::with_capacity(raw.len());
    for entry in raw {
        let arr = entry.as_array().context("kline entry is not an array")?;

        if arr.len() < 6 {
            warn!("skipping malformed kline entry with {} elements", arr.len());
            continue;
        }

        let timestamp = arr[0].as_i64().context("kline open time is not an integer")?;
        let open = parse_str_f64(&arr[1])?;
        let high = parse_str_f64(&arr[2])?;
        let low = parse_str_f64(&arr[3])?;
        let close = parse_str_f64(&arr[4])?;
        let volume = parse_str_f64(&arr[5])?;

        candles.push(Candle::new(timestamp, open, high, low, close, volume));
    }
    Ok(candles)
}

/// Parse a JSON value that may be either a string or a number into `f64`.
fn parse_str_f64(val: &serde_json::Value) -> Result<f64> {
    if let Some(s) = val.as_str() {
        s.parse::<f64>()
            .with_context(|| format!("failed to parse '{s}' as f64"))
    } else if let Some(n) = val.as_f64() {
        Ok(n)
    } else {
        anyhow::bail!("expected string or number, got: {val}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_binance_payload() {
        let body = json!([
            [1700000000000_i64, "37000.10", "37050.00", "36990.00", "37020.00", "123.456",
             1700000299999_i64, "4567890.12", 1500, "60.1", "2224455.66", "0"],
            [1700000300000_i64, "37020.00", "37080.00", "37000.00", "37075.50", "98.7",
             1700000599999_i64, "3650000.00", 1200, "40.0", "1480000.00", "0"]
        ]);
        let candles = parse_klines(&body).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].timestamp, 1_700_000_000_000);
        assert!((candles[0].open - 37000.10).abs() < 1e-9);
        assert!((candles[1].close - 37075.50).abs() < 1e-9);
        assert!((candles[1].volume - 98.7).abs() < 1e-9);
    }

    #[test]
    fn accepts_numeric_fields() {
        let body = json!([[0, 1.0, 2.0, 0.5, 1.5, 10]]);
        let candles = parse_klines(&body).unwrap();
        assert_eq!(candles[0], Candle::new(0, 1.0, 2.0, 0.5, 1.5, 10.0));
    }

    #[test]
    fn short_entries_skipped() {
        let body = json!([[0, "1", "2"], [60000, "1", "2", "0.5", "1.5", "3"]]);
        let candles = parse_klines(&body).unwrap();
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].timestamp, 60_000);
    }

    #[test]
    fn non_array_is_error() {
        let body = json!({ "code": -1121, "msg": "Invalid symbol." });
        assert!(parse_klines(&body).is_err());
    }

    #[test]
    fn unparseable_price_is_error() {
        let body = json!([[0, "abc", "2", "0.5", "1.5", "3"]]);
        assert!(parse_klines(&body).is_err());
    }

    #[test]
    fn url_uses_futures_endpoint() {
        let client = BinanceClient::new("https://fapi.binance.com/", Duration::from_secs(10)).unwrap();
        assert_eq!(client.base_url(), "https://fapi.binance.com");
        assert_eq!(
            client.klines_url("BTCUSDT", "5m", 100),
            "https://fapi.binance.com/fapi/v1/klines?symbol=BTCUSDT&interval=5m&limit=100"
        );
    }

    // ---- retry behaviour against a local server ---------------------------

    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};

    fn kline_payload() -> serde_json::Value {
        json!([[60000, "1", "2", "0.5", "1.5", "3"], [120000, "1.5", "2.5", "1", "2", "4"]])
    }

    /// Serve `/fapi/v1/klines`, answering `status` for the first `failures`
    /// hits and the kline payload afterwards.  Returns the base URL and hit count.
    async fn flaky_server(status: StatusCode, failures: usize) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/fapi/v1/klines",
            get(move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < failures {
                        (status, "unavailable").into_response()
                    } else {
                        Json(kline_payload()).into_response()
                    }
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), hits)
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(20),
        }
    }

    #[tokio::test]
    async fn server_errors_are_retried_until_success() {
        let (base, hits) = flaky_server(StatusCode::SERVICE_UNAVAILABLE, 2).await;
        let client = BinanceClient::new(base, Duration::from_secs(5))
            .unwrap()
            .with_retry(fast_retry());

        let candles = client.get_klines("BTCUSDT", "5m", 100).await.unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn rate_limited_requests_give_up_after_max_attempts() {
        let (base, hits) = flaky_server(StatusCode::TOO_MANY_REQUESTS, usize::MAX).await;
        let client = BinanceClient::new(base, Duration::from_secs(5))
            .unwrap()
            .with_retry(fast_retry());

        assert!(client.get_klines("BTCUSDT", "5m", 100).await.is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let (base, hits) = flaky_server(StatusCode::BAD_REQUEST, usize::MAX).await;
        let client = BinanceClient::new(base, Duration::from_secs(5))
            .unwrap()
            .with_retry(fast_retry());

        let err = client.get_klines("BTCUSDT", "5m", 100).await.unwrap_err();
        assert!(err.to_string().contains("400"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // The panel boundary turns the failure into an empty series.
        let series = client.fetch_series("BTCUSDT", Timeframe::FiveMinutes, 100).await;
        assert!(series.is_empty());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unreachable_host_yields_empty_series() {
        // Port 9 (discard) on localhost is closed in test environments.
        let client = BinanceClient::new("http://127.0.0.1:9", Duration::from_millis(500))
            .unwrap()
            .with_retry(RetryPolicy::none());
        let series = client.fetch_series("BTCUSDT", Timeframe::FiveMinutes, 100).await;
        assert!(series.is_empty());
    }
}
