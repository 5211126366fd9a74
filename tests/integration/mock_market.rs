//! Mock market and notifier for integration testing.
//!
//! `MockMarket` serves a fixed ticker snapshot and one candle fixture per
//! timeframe, records every candle request, and can be told to fail the
//! snapshot or individual symbols. `RecordingNotifier` keeps every message.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use confluence::market::MarketData;
use confluence::notify::Notifier;
use confluence::types::{Candle, CandleSeries, Ticker24h, Timeframe};

/// Deterministic in-memory market data.
pub struct MockMarket {
    tickers: Vec<Ticker24h>,
    snapshot_error: Mutex<Option<String>>,
    failing_symbols: Mutex<HashSet<String>>,
    momentum_overrides: Mutex<HashMap<String, Vec<Candle>>>,
    calls: Arc<Mutex<Vec<(String, Timeframe)>>>,
}

impl MockMarket {
    pub fn new(tickers: Vec<Ticker24h>) -> Self {
        Self {
            tickers,
            snapshot_error: Mutex::new(None),
            failing_symbols: Mutex::new(HashSet::new()),
            momentum_overrides: Mutex::new(HashMap::new()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Make `fetch_tickers` fail until cleared.
    pub fn set_snapshot_error(&self, msg: &str) {
        *self.snapshot_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn clear_snapshot_error(&self) {
        *self.snapshot_error.lock().unwrap() = None;
    }

    /// Make every candle fetch for `symbol` fail.
    pub fn fail_symbol(&self, symbol: &str) {
        self.failing_symbols.lock().unwrap().insert(symbol.to_string());
    }

    /// Serve `bars` instead of the flat tape for `symbol`'s 3m fetches.
    pub fn set_momentum_bars(&self, symbol: &str, bars: Vec<Candle>) {
        self.momentum_overrides
            .lock()
            .unwrap()
            .insert(symbol.to_string(), bars);
    }

    /// Every candle request so far, in call order.
    pub fn calls(&self) -> Vec<(String, Timeframe)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn requested_symbols(&self) -> HashSet<String> {
        self.calls().into_iter().map(|(s, _)| s).collect()
    }

    pub fn count(&self, timeframe: Timeframe) -> usize {
        self.calls().iter().filter(|(_, tf)| *tf == timeframe).count()
    }

    /// 3m: flat tape, nothing for the momentum detectors.
    fn momentum_bars(limit: u32) -> Vec<Candle> {
        (0..limit as i64)
            .map(|i| Candle {
                open_time: i * Timeframe::ThreeMinutes.duration_ms(),
                open: 100.0,
                high: 100.2,
                low: 99.8,
                close: 100.0,
                volume: 100.0,
            })
            .collect()
    }

    /// 30m: flat bars ending in a hammer on fading volume.
    fn exhaustion_bars(limit: u32) -> Vec<Candle> {
        let n = limit.max(20) as i64;
        (0..n)
            .map(|i| {
                let open_time = i * Timeframe::ThirtyMinutes.duration_ms();
                if i == n - 1 {
                    Candle { open_time, open: 100.0, high: 101.0, low: 97.0, close: 100.5, volume: 80.0 }
                } else {
                    Candle { open_time, open: 100.0, high: 100.5, low: 99.5, close: 100.0, volume: 100.0 }
                }
            })
            .collect()
    }

    /// 15m: steady green climb with a volume pickup on the last bar.
    fn confirmation_bars(limit: u32) -> Vec<Candle> {
        let n = limit as i64;
        (0..n)
            .map(|i| {
                let close = 100.0 * 1.01f64.powi(i as i32);
                let open = close / 1.01;
                Candle {
                    open_time: i * Timeframe::FifteenMinutes.duration_ms(),
                    open,
                    high: close * 1.002,
                    low: open * 0.998,
                    close,
                    volume: if i == n - 1 { 150.0 } else { 100.0 },
                }
            })
            .collect()
    }
}

#[async_trait]
impl MarketData for MockMarket {
    async fn fetch_tickers(&self) -> Result<Vec<Ticker24h>> {
        if let Some(err) = self.snapshot_error.lock().unwrap().as_ref() {
            return Err(anyhow!("{}", err));
        }
        Ok(self.tickers.clone())
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: u32,
    ) -> Result<CandleSeries> {
        self.calls.lock().unwrap().push((symbol.to_string(), timeframe));

        if self.failing_symbols.lock().unwrap().contains(symbol) {
            return Err(anyhow!("HTTP 418 for {symbol}"));
        }

        let override_bars = self.momentum_overrides.lock().unwrap().get(symbol).cloned();
        let bars = match timeframe {
            Timeframe::ThreeMinutes => override_bars.unwrap_or_else(|| Self::momentum_bars(limit)),
            Timeframe::ThirtyMinutes => Self::exhaustion_bars(limit),
            Timeframe::FifteenMinutes => Self::confirmation_bars(limit),
        };
        Ok(CandleSeries::new(symbol, timeframe, bars)?)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Notifier that keeps every message, optionally failing each send.
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        self.messages.lock().unwrap().push(message.to_string());
        if self.fail {
            return Err(anyhow!("chat unreachable"));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// 3m bars from a close path; each bar opens at the previous close and the
/// last one trades 1.7x the usual volume.
fn bars_from_closes(closes: &[f64]) -> Vec<Candle> {
    let n = closes.len();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle {
                open_time: i as i64 * Timeframe::ThreeMinutes.duration_ms(),
                open,
                high: open.max(close) + 0.05,
                low: open.min(close) - 0.05,
                close,
                volume: if i == n - 1 { 170.0 } else { 100.0 },
            }
        })
        .collect()
}

/// Flat tape then a tight climb with shallow pullbacks: early-entry shape.
pub fn early_entry_bars() -> Vec<Candle> {
    let mut closes = vec![100.0; 186];
    let mut price = 100.0;
    for step in [
        0.3, -0.375, 0.3, 0.3, -0.375, 0.3, 0.3, -0.375, 0.3, 0.3, -0.375, 0.3, 0.3, 0.3,
    ] {
        price += step;
        closes.push(price);
    }
    bars_from_closes(&closes)
}

/// Slow slide under EMA200, then two closes back above it: breakout shape.
pub fn breakout_bars() -> Vec<Candle> {
    let mut closes = vec![100.0; 150];
    let mut price = 100.0;
    for _ in 0..48 {
        price -= 0.02;
        closes.push(price);
    }
    for jump in [0.9, 0.3] {
        price += jump;
        closes.push(price);
    }
    bars_from_closes(&closes)
}

/// Build a ticker with an explicit taker-buy share.
pub fn ticker(symbol: &str, quote_volume: f64, change: f64, buy_share: f64) -> Ticker24h {
    Ticker24h {
        symbol: symbol.to_string(),
        quote_volume,
        price_change_percent: change,
        taker_buy_quote_volume: quote_volume * buy_share,
    }
}
