//! Shared types for the CONFLUENCE scanner.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that market, detection,
//! and engine modules can depend on them without circular references.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Floor applied to ratio denominators that may legitimately reach zero.
pub const EPSILON: f64 = 1e-10;

// ---------------------------------------------------------------------------
// Timeframe
// ---------------------------------------------------------------------------

/// Candle interval used by the detectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    ThreeMinutes,
    FifteenMinutes,
    ThirtyMinutes,
}

impl Timeframe {
    /// Exchange interval string ("3m", "15m", "30m").
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::ThreeMinutes => "3m",
            Timeframe::FifteenMinutes => "15m",
            Timeframe::ThirtyMinutes => "30m",
        }
    }

    /// Bar duration in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        match self {
            Timeframe::ThreeMinutes => 3 * 60_000,
            Timeframe::FifteenMinutes => 15 * 60_000,
            Timeframe::ThirtyMinutes => 30 * 60_000,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Candles
// ---------------------------------------------------------------------------

/// One OHLCV bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bar open time, milliseconds since epoch.
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// High minus low.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Absolute distance between open and close.
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    /// Distance from the lower of open/close down to the low.
    pub fn lower_wick(&self) -> f64 {
        self.open.min(self.close) - self.low
    }

    pub fn is_green(&self) -> bool {
        self.close > self.open
    }
}

/// Time-ordered bars for one symbol and timeframe. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct CandleSeries {
    symbol: String,
    timeframe: Timeframe,
    candles: Vec<Candle>,
}

impl CandleSeries {
    /// Build a series, rejecting bars that are not strictly increasing in
    /// open time.
    pub fn new(
        symbol: impl Into<String>,
        timeframe: Timeframe,
        candles: Vec<Candle>,
    ) -> Result<Self, ScannerError> {
        let symbol = symbol.into();
        if let Some(pos) = candles
            .windows(2)
            .position(|w| w[1].open_time <= w[0].open_time)
        {
            return Err(ScannerError::MalformedSeries {
                symbol,
                timeframe,
                message: format!("bar {} is not after bar {}", pos + 1, pos),
            });
        }
        Ok(Self {
            symbol,
            timeframe,
            candles,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// The most recent bar.
    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.volume).collect()
    }
}

// ---------------------------------------------------------------------------
// Ticker
// ---------------------------------------------------------------------------

/// Rolling 24h statistics for one symbol. Fetched fresh every cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker24h {
    pub symbol: String,
    /// 24h traded volume in the quote asset.
    pub quote_volume: f64,
    /// 24h percent price change (signed).
    pub price_change_percent: f64,
    /// Portion of `quote_volume` attributable to taker buys.
    pub taker_buy_quote_volume: f64,
}

impl Ticker24h {
    /// Inferred taker-sell quote volume, never negative.
    pub fn taker_sell_quote_volume(&self) -> f64 {
        (self.quote_volume - self.taker_buy_quote_volume).max(0.0)
    }

    /// Taker buy / taker sell.
    pub fn buy_sell_ratio(&self) -> f64 {
        self.taker_buy_quote_volume / self.taker_sell_quote_volume().max(EPSILON)
    }

    /// Whether taker buying is at least `ratio` times taker selling.
    pub fn buyers_dominate(&self, ratio: f64) -> bool {
        self.taker_buy_quote_volume >= ratio * self.taker_sell_quote_volume()
    }
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

/// Alert rule. Each kind has its own cooldown namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertKind {
    EarlyEntry,
    ConfirmedBreakout,
    BottomReversal,
}

impl AlertKind {
    /// Short key used in logs and the cooldown registry.
    pub fn key(&self) -> &'static str {
        match self {
            AlertKind::EarlyEntry => "early",
            AlertKind::ConfirmedBreakout => "confirm",
            AlertKind::BottomReversal => "bottom",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertKind::EarlyEntry => write!(f, "Early Entry"),
            AlertKind::ConfirmedBreakout => write!(f, "Confirmed Breakout"),
            AlertKind::BottomReversal => write!(f, "Bottom Reversal"),
        }
    }
}

/// Indicator values that justified a fire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AlertEvidence {
    Momentum {
        price: f64,
        ema200: f64,
        rsi: f64,
        volume_strength: f64,
        macd_histogram: f64,
        bollinger_width: f64,
        flow_ratio: f64,
    },
    Reversal {
        price: f64,
        lower_wick_pct: f64,
        body_pct: f64,
        bollinger_width_30m: f64,
        ema9: f64,
        ema21: f64,
        macd_histogram: f64,
        flow_ratio: f64,
    },
}

/// A fired, deduplicated alert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEvent {
    pub kind: AlertKind,
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub evidence: AlertEvidence,
}

impl fmt::Display for AlertEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headline = match self.kind {
            AlertKind::EarlyEntry => "🟡 EARLY ENTRY (3m)",
            AlertKind::ConfirmedBreakout => "🟢 CONFIRMED BREAKOUT (3m)",
            AlertKind::BottomReversal => "🔵 BOTTOM REVERSAL (30m → 15m)",
        };
        writeln!(f, "<b>{headline}</b>")?;
        writeln!(f, "<b>{}</b>", self.symbol)?;
        match &self.evidence {
            AlertEvidence::Momentum {
                price,
                ema200,
                rsi,
                volume_strength,
                macd_histogram,
                bollinger_width,
                flow_ratio,
            } => {
                writeln!(f, "Price: {price:.6} | EMA200: {ema200:.6}")?;
                writeln!(f, "RSI: {rsi:.1} | Volume: {volume_strength:.0}%")?;
                writeln!(f, "MACD hist: {macd_histogram:.6} ↑")?;
                writeln!(f, "BB width: {bollinger_width:.2}%")?;
                writeln!(f, "Buy/Sell flow: {flow_ratio:.2}x")?;
            }
            AlertEvidence::Reversal {
                price,
                lower_wick_pct,
                body_pct,
                bollinger_width_30m,
                ema9,
                ema21,
                macd_histogram,
                flow_ratio,
            } => {
                writeln!(f, "Price: {price:.6}")?;
                writeln!(
                    f,
                    "30m wick: {lower_wick_pct:.0}% | body: {body_pct:.0}% | BB width: {bollinger_width_30m:.2}%"
                )?;
                writeln!(f, "15m EMA9 {ema9:.6} > EMA21 {ema21:.6}")?;
                writeln!(f, "15m MACD hist: {macd_histogram:.6} ↑")?;
                writeln!(f, "Buy/Sell flow: {flow_ratio:.2}x")?;
            }
        }
        write!(f, "{}", self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"))
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for CONFLUENCE.
///
/// None of these are fatal to the scan loop; each is logged and the affected
/// unit skipped for the current cycle.
#[derive(Debug, thiserror::Error)]
pub enum ScannerError {
    #[error("Ticker snapshot failed: {0}")]
    Snapshot(String),

    #[error("Candle fetch failed ({symbol} {timeframe}): {message}")]
    Fetch {
        symbol: String,
        timeframe: Timeframe,
        message: String,
    },

    #[error("Malformed candle series ({symbol} {timeframe}): {message}")]
    MalformedSeries {
        symbol: String,
        timeframe: Timeframe,
        message: String,
    },

    #[error("Notification failed: {0}")]
    Notify(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Scanner is shutting down")]
    Shutdown,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
