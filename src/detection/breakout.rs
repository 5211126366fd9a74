//! Confirmed breakout on the 3m timeframe.
//!
//! Two consecutive closes above EMA200 after a close below it, backed by
//! rising MACD, strong RSI, a volume surge and taker buyers in control.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::DetectionConfig;
use crate::engine::cooldown::CooldownRegistry;
use crate::indicators::IndicatorSnapshot;
use crate::types::{AlertEvent, AlertEvidence, AlertKind, Ticker24h};

const MIN_RSI: f64 = 65.0;
const MIN_VOLUME_STRENGTH: f64 = 150.0;

/// `close[n-2] < ema200 < close[n-1]` and `close[n] > ema200`, all measured
/// against the latest EMA200 value.
pub fn confirmed_cross(snap: &IndicatorSnapshot) -> bool {
    let [before, first, second] = snap.last_closes;
    before < snap.ema200 && first > snap.ema200 && second > snap.ema200
}

/// All non-cooldown predicates.
pub fn qualifies(snap: &IndicatorSnapshot, ticker: &Ticker24h, config: &DetectionConfig) -> bool {
    confirmed_cross(snap)
        && snap.macd_rising
        && snap.rsi > MIN_RSI
        && snap.volume_strength >= MIN_VOLUME_STRENGTH
        && ticker.buyers_dominate(config.flow_dominance_ratio)
}

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
    if !cooldown.can_alert_at(symbol, AlertKind::ConfirmedBreakout, now) {
        return None;
    }
    debug!(symbol, ema200 = snap.ema200, close = snap.close, "Breakout fired");
    Some(AlertEvent {
        kind: AlertKind::ConfirmedBreakout,
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
