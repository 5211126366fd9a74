//! Binance spot public market data.
//!
//! Endpoints used:
//! - `GET /api/v3/ticker/24hr`: market-wide rolling 24h statistics
//! - `GET /api/v3/klines`: OHLCV bars for one symbol and interval
//!
//! Auth: none. Numeric fields arrive as JSON strings.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::IgnoredAny;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::MarketData;
use crate::types::{Candle, CandleSeries, Ticker24h, Timeframe};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";
const TRANSPORT_NAME: &str = "binance";

/// Per-request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

// ---------------------------------------------------------------------------
// API response types (Binance JSON → Rust)
// ---------------------------------------------------------------------------

/// One row of `/api/v3/ticker/24hr`. Only the fields we need.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceTicker {
    symbol: String,
    price_change_percent: String,
    quote_volume: String,
    /// Present on feeds that expose taker flow; absent on the plain spot
    /// ticker, in which case flow is treated as zero.
    #[serde(default)]
    taker_buy_quote_volume: Option<String>,
}

impl BinanceTicker {
    fn into_ticker(self) -> Option<Ticker24h> {
        let quote_volume = self.quote_volume.parse::<f64>().ok()?;
        let price_change_percent = self.price_change_percent.parse::<f64>().ok()?;
        let taker_buy_quote_volume = match self.taker_buy_quote_volume {
            Some(v) => v.parse::<f64>().ok()?,
            None => 0.0,
        };
        Some(Ticker24h {
            symbol: self.symbol,
            quote_volume,
            price_change_percent,
            taker_buy_quote_volume,
        })
    }
}

/// One kline row:
/// `[openTime, open, high, low, close, volume, closeTime, quoteVolume,
///   trades, takerBuyBase, takerBuyQuote, ignore]`.
#[derive(Debug, Deserialize)]
struct BinanceKline(
    i64,
    String,
    String,
    String,
    String,
    String,
    IgnoredAny,
    IgnoredAny,
    IgnoredAny,
    IgnoredAny,
    IgnoredAny,
    IgnoredAny,
);

impl BinanceKline {
    fn into_candle(self) -> Result<Candle> {
        let field = |name: &str, raw: &str| -> Result<f64> {
            raw.parse::<f64>()
                .with_context(|| format!("Invalid kline {name}: {raw:?}"))
        };
        Ok(Candle {
            open_time: self.0,
            open: field("open", &self.1)?,
            high: field("high", &self.2)?,
            low: field("low", &self.3)?,
            close: field("close", &self.4)?,
            volume: field("volume", &self.5)?,
        })
    }
}

/// Converted snapshot plus counts of rows that need attention.
#[derive(Debug)]
struct TickerBatch {
    tickers: Vec<Ticker24h>,
    /// Rows dropped because a numeric field failed to parse.
    unparsed: usize,
    /// Rows without `takerBuyQuoteVolume`.
    missing_flow: usize,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Binance spot REST client.
pub struct BinanceClient {
    http: Client,
    base_url: String,
}

impl BinanceClient {
    /// Create a client against `base_url` (no trailing slash) with a
    /// per-request timeout.
    pub fn new(base_url: Option<String>, timeout_secs: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("CONFLUENCE/0.1.0 (market-scanner)")
            .build()
            .context("Failed to build HTTP client for Binance")?;

        let base_url = base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self { http, base_url })
    }

    pub fn tickers_url(&self) -> String {
        format!("{}/api/v3/ticker/24hr", self.base_url)
    }

    pub fn klines_url(&self, symbol: &str, timeframe: Timeframe, limit: u32) -> String {
        format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url,
            symbol.to_uppercase(),
            timeframe.as_str(),
            limit,
        )
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!(url = %url, "Binance request");

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .context("Binance API request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Binance API error {status}: {body}");
        }

        resp.json::<T>()
            .await
            .context("Failed to parse Binance response")
    }

    /// Convert raw ticker rows, skipping any that fail to parse.
    ///
    /// Rows without a taker-buy field are kept with zero flow, which no flow
    /// threshold accepts, so the batch counts them and warns once.
    fn convert_tickers(raw: Vec<BinanceTicker>) -> TickerBatch {
        let total = raw.len();
        let missing_flow = raw
            .iter()
            .filter(|t| t.taker_buy_quote_volume.is_none())
            .count();
        let tickers: Vec<Ticker24h> = raw
            .into_iter()
            .filter_map(|t| {
                let symbol = t.symbol.clone();
                let parsed = t.into_ticker();
                if parsed.is_none() {
                    debug!(symbol = %symbol, "Skipping unparseable ticker row");
                }
                parsed
            })
            .collect();
        let batch = TickerBatch {
            unparsed: total - tickers.len(),
            missing_flow,
            tickers,
        };
        if batch.unparsed > 0 {
            warn!(
                parsed = batch.tickers.len(),
                total,
                "Some ticker rows could not be parsed"
            );
        }
        if batch.missing_flow > 0 {
            warn!(
                missing = batch.missing_flow,
                total,
                "Ticker rows carry no taker-buy volume; flow checks cannot pass for them"
            );
        }
        batch
    }

    /// Convert raw kline rows. Any bad row fails the whole series.
    fn convert_klines(
        symbol: &str,
        timeframe: Timeframe,
        raw: Vec<BinanceKline>,
    ) -> Result<CandleSeries> {
        let candles = raw
            .into_iter()
            .map(BinanceKline::into_candle)
            .collect::<Result<Vec<_>>>()?;
        Ok(CandleSeries::new(symbol, timeframe, candles)?)
    }
}

// ---------------------------------------------------------------------------
// MarketData trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl MarketData for BinanceClient {
    async fn fetch_tickers(&self) -> Result<Vec<Ticker24h>> {
        let raw: Vec<BinanceTicker> = self.get_json(&self.tickers_url()).await?;
        Ok(Self::convert_tickers(raw).tickers)
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: u32,
    ) -> Result<CandleSeries> {
        let raw: Vec<BinanceKline> = self
            .get_json(&self.klines_url(symbol, timeframe, limit))
            .await
            .with_context(|| format!("klines {symbol} {timeframe}"))?;
        Self::convert_klines(symbol, timeframe, raw)
    }

    fn name(&self) -> &'static str {
        TRANSPORT_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
