//! Early entry on the 3m timeframe.
//!
//! Momentum building while volatility is still compressed: RSI in the upper
//! band but not overbought, a volume spike, MACD histogram turning up,
//! narrow Bollinger bands, price at or just under EMA200, and taker buyers
//! in control.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::DetectionConfig;
use crate::engine::cooldown::CooldownRegistry;
use crate::indicators::IndicatorSnapshot;
use crate::types::{AlertEvent, AlertEvidence, AlertKind, Ticker24h};

const RSI_MIN: f64 = 60.0;
const RSI_MAX: f64 = 70.0;
const MIN_VOLUME_STRENGTH: f64 = 140.0;
const MAX_BOLLINGER_WIDTH: f64 = 18.0;
/// Price may sit up to 1% under EMA200.
const EMA_TOLERANCE: f64 = 0.99;

/// All non-cooldown predicates.
pub fn qualifies(snap: &IndicatorSnapshot, ticker: &Ticker24h, config: &DetectionConfig) -> bool {
    (RSI_MIN..=RSI_MAX).contains(&snap.rsi)
        && snap.volume_strength >= MIN_VOLUME_STRENGTH
        && snap.macd_rising
        && snap.bollinger_width <= MAX_BOLLINGER_WIDTH
        && snap.close >= snap.ema200 * EMA_TOLERANCE
        && ticker.buyers_dominate(config.flow_dominance_ratio)
}

/// Evaluate the rule and, if it qualifies and the cooldown allows, return
/// the alert.
pub fn evaluate(
    symbol: &str,
    snap: &IndicatorSnapshot,
    ticker: &Ticker24h,
    config: &DetectionConfig,
    cooldown: &CooldownRegistry,
    now: DateTime<Utc>,
) -> Option<AlertEvent> {
    if !qualifies(snap, ticker, config) {
        return None;
    }
    if !cooldown.can_alert_at(symbol, AlertKind::EarlyEntry, now) {
        return None;
    }
    debug!(symbol, rsi = snap.rsi, vol = snap.volume_strength, "Early entry fired");
    Some(AlertEvent {
        kind: AlertKind::EarlyEntry,
        symbol: symbol.to_string(),
        timestamp: now,
        evidence: AlertEvidence::Momentum {
            price: snap.close,
            ema200: snap.ema200,
            rsi: snap.rsi,
            volume_strength: snap.volume_strength,
            macd_histogram: snap.macd_histogram,
            bollinger_width: snap.bollinger_width,
            flow_ratio: ticker.buy_sell_ratio(),
        },
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
