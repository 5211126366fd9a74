//! Two-stage bottom reversal.
//!
//! Stage A looks for selling exhaustion on the latest 30m bar (long lower
//! wick, small body, fading volume, sellers losing control, tight bands).
//! Only when it holds is the 15m series fetched for Stage B, which wants a
//! green micro-pivot break with short EMAs crossed up, volume returning and
//! MACD turning up.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::DetectionConfig;
use crate::engine::cooldown::CooldownRegistry;
use crate::indicators::{bollinger_width, ema_last, macd_turning_up, BOLLINGER_PERIOD};
use crate::market::MarketData;
use crate::types::{
    AlertEvent, AlertEvidence, AlertKind, CandleSeries, ScannerError, Ticker24h, Timeframe,
    EPSILON,
};

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

const MIN_LOWER_WICK_RATIO: f64 = 0.30;
const MAX_BODY_RATIO: f64 = 0.40;
const MAX_BOLLINGER_WIDTH_30M: f64 = 22.0;

/// Bars needed on each timeframe.
pub const MIN_EXHAUSTION_BARS: usize = BOLLINGER_PERIOD;
pub const MIN_CONFIRMATION_BARS: usize = 20;

// ---------------------------------------------------------------------------
// Stage A: 30m exhaustion
// ---------------------------------------------------------------------------

/// Measurements from a bar that passed Stage A.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Exhaustion {
    pub lower_wick_ratio: f64,
    pub body_ratio: f64,
    pub bollinger_width: f64,
    pub flow_ratio: f64,
}

pub fn exhaustion_stage(
    series: &CandleSeries,
    ticker: &Ticker24h,
    config: &DetectionConfig,
) -> Option<Exhaustion> {
    let bars = series.candles();
    let n = bars.len();
    if n < MIN_EXHAUSTION_BARS.max(4) {
        return None;
    }
    let last = &bars[n - 1];
    let range = last.range();
    if range <= EPSILON {
        return None;
    }
    let lower_wick_ratio = last.lower_wick() / range;
    let body_ratio = last.body() / range;
    let prior_peak_volume = bars[n - 4..n - 1]
        .iter()
        .map(|c| c.volume)
        .fold(f64::MIN, f64::max);
    let width = bollinger_width(&series.closes(), BOLLINGER_PERIOD);

    let holds = lower_wick_ratio >= MIN_LOWER_WICK_RATIO
        && body_ratio <= MAX_BODY_RATIO
        && last.volume <= prior_peak_volume
        && ticker.buyers_dominate(config.exhaustion_flow_ratio)
        && width <= MAX_BOLLINGER_WIDTH_30M;

    holds.then(|| Exhaustion {
        lower_wick_ratio,
        body_ratio,
        bollinger_width: width,
        flow_ratio: ticker.buy_sell_ratio(),
    })
}

// ---------------------------------------------------------------------------
// Stage B: 15m confirmation
// ---------------------------------------------------------------------------

/// Measurements from a series that passed Stage B.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Confirmation {
    pub close: f64,
    pub ema9: f64,
    pub ema21: f64,
    pub macd_histogram: f64,
}

pub fn confirmation_stage(series: &CandleSeries) -> Option<Confirmation> {
    let bars = series.candles();
    let n = bars.len();
    if n < MIN_CONFIRMATION_BARS {
        return None;
    }
    let last = &bars[n - 1];
    let closes = series.closes();

    let pivot = bars[n - 3].close.max(bars[n - 2].close);
    let recent_volume = bars[n - 5..n - 1].iter().map(|c| c.volume).sum::<f64>() / 4.0;
    let ema9 = ema_last(&closes, 9)?;
    let ema21 = ema_last(&closes, 21)?;
    let (macd_rising, macd_histogram) = macd_turning_up(&closes);

    let holds = last.is_green()
        && last.close > pivot
        && ema9 > ema21
        && last.volume >= recent_volume
        && macd_rising;

    holds.then_some(Confirmation {
        close: last.close,
        ema9,
        ema21,
        macd_histogram,
    })
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

/// Run both stages for one symbol.
///
/// `series_30m` is fetched by the caller. The 15m series is fetched here, and
/// only after Stage A holds.
pub async fn evaluate(
    symbol: &str,
    ticker: &Ticker24h,
    series_30m: &CandleSeries,
    market: &dyn MarketData,
    config: &DetectionConfig,
    cooldown: &CooldownRegistry,
    now: DateTime<Utc>,
) -> Result<Option<AlertEvent>, ScannerError> {
    let Some(exhaustion) = exhaustion_stage(series_30m, ticker, config) else {
        return Ok(None);
    };
    debug!(
        symbol,
        wick = exhaustion.lower_wick_ratio,
        body = exhaustion.body_ratio,
        "30m exhaustion found, checking 15m"
    );

    let series_15m = market
        .fetch_candles(symbol, Timeframe::FifteenMinutes, config.confirmation_candle_limit)
        .await
        .map_err(|e| ScannerError::Fetch {
            symbol: symbol.to_string(),
            timeframe: Timeframe::FifteenMinutes,
            message: format!("{e:#}"),
        })?;

    let Some(confirmation) = confirmation_stage(&series_15m) else {
        return Ok(None);
    };
    if !cooldown.can_alert_at(symbol, AlertKind::BottomReversal, now) {
        return Ok(None);
    }

    Ok(Some(AlertEvent {
        kind: AlertKind::BottomReversal,
        symbol: symbol.to_string(),
        timestamp: now,
        evidence: AlertEvidence::Reversal {
            price: confirmation.close,
            lower_wick_pct: exhaustion.lower_wick_ratio * 100.0,
            body_pct: exhaustion.body_ratio * 100.0,
            bollinger_width_30m: exhaustion.bollinger_width,
            ema9: confirmation.ema9,
            ema21: confirmation.ema21,
            macd_histogram: confirmation.macd_histogram,
            flow_ratio: exhaustion.flow_ratio,
        },
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
