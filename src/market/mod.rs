//! Market-data transport.
//!
//! Defines the `MarketData` trait consumed by the scanner and detectors,
//! and the Binance spot REST implementation.

pub mod binance;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{CandleSeries, Ticker24h, Timeframe};

/// Abstraction over a spot exchange's public market data.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Fetch the market-wide 24h ticker snapshot.
    async fn fetch_tickers(&self) -> Result<Vec<Ticker24h>>;

    /// Fetch the most recent `limit` bars for one symbol and interval,
    /// oldest first.
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: u32,
    ) -> Result<CandleSeries>;

    /// Transport name for logging.
    fn name(&self) -> &'static str;
}
