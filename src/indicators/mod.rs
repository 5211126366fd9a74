//! Technical indicators.
//!
//! Pure functions over close/volume slices. None of them fail: when a series
//! is too short for the requested period they return a neutral value
//! (RSI 50, volume strength 100, Bollinger width 0) so that downstream
//! thresholds simply do not trigger.

use crate::types::{CandleSeries, EPSILON};

pub const RSI_PERIOD: usize = 14;
pub const BOLLINGER_PERIOD: usize = 20;

const MACD_FAST: usize = 12;
const MACD_SLOW: usize = 26;
const MACD_SIGNAL: usize = 9;

const VOLUME_FAST: usize = 9;
const VOLUME_SLOW: usize = 21;

/// Neutral values returned on insufficient history.
pub const NEUTRAL_RSI: f64 = 50.0;
pub const NEUTRAL_VOLUME_STRENGTH: f64 = 100.0;

// ---------------------------------------------------------------------------
// Moving averages
// ---------------------------------------------------------------------------

/// Exponential moving average with α = 2/(period+1).
///
/// The running value is seeded with the first observation, not with an SMA
/// of the first `period` bars, so early values lean towards `series[0]`.
/// Output has the same length as the input.
pub fn ema(series: &[f64], period: usize) -> Vec<f64> {
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(series.len());
    let mut iter = series.iter();
    let Some(&first) = iter.next() else {
        return out;
    };
    let mut value = first;
    out.push(value);
    for &x in iter {
        value = alpha * x + (1.0 - alpha) * value;
        out.push(value);
    }
    out
}

/// Latest EMA value, if the series is non-empty.
pub fn ema_last(series: &[f64], period: usize) -> Option<f64> {
    ema(series, period).last().copied()
}

/// Simple mean of the last `period` values.
fn sma_last(series: &[f64], period: usize) -> f64 {
    let window = &series[series.len().saturating_sub(period)..];
    if window.is_empty() {
        return 0.0;
    }
    window.iter().sum::<f64>() / window.len() as f64
}

// ---------------------------------------------------------------------------
// Oscillators
// ---------------------------------------------------------------------------

/// Relative strength index over the most recent `period` deltas.
///
/// Gains and losses are plain averages (no Wilder smoothing).
pub fn rsi(closes: &[f64], period: usize) -> f64 {
    if period == 0 || closes.len() < period + 1 {
        return NEUTRAL_RSI;
    }
    let window = &closes[closes.len() - (period + 1)..];
    let (gains, losses) = window
        .windows(2)
        .map(|w| w[1] - w[0])
        .fold((0.0, 0.0), |(g, l), d| {
            if d > 0.0 {
                (g + d, l)
            } else {
                (g, l - d)
            }
        });
    let avg_gain = gains / period as f64;
    let avg_loss = (losses / period as f64).max(EPSILON);
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

/// MACD(12, 26, 9) histogram direction.
///
/// Returns `(histogram rising vs previous bar, current histogram)`.
pub fn macd_turning_up(closes: &[f64]) -> (bool, f64) {
    if closes.len() < MACD_SLOW {
        return (false, 0.0);
    }
    let fast = ema(closes, MACD_FAST);
    let slow = ema(closes, MACD_SLOW);
    let macd: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
    let signal = ema(&macd, MACD_SIGNAL);
    let n = macd.len();
    let hist = macd[n - 1] - signal[n - 1];
    let prev = macd[n - 2] - signal[n - 2];
    (hist > prev, hist)
}

// ---------------------------------------------------------------------------
// Volume / volatility
// ---------------------------------------------------------------------------

/// Latest volume as a percentage of the mean of the 9- and 21-bar volume SMAs.
pub fn volume_strength(volumes: &[f64]) -> f64 {
    if volumes.len() < VOLUME_SLOW {
        return NEUTRAL_VOLUME_STRENGTH;
    }
    let baseline = (sma_last(volumes, VOLUME_FAST) + sma_last(volumes, VOLUME_SLOW)) / 2.0;
    let latest = volumes[volumes.len() - 1];
    latest / baseline.max(EPSILON) * 100.0
}

/// Bollinger band width in percent of the middle band (±2σ, population σ).
pub fn bollinger_width(closes: &[f64], period: usize) -> f64 {
    if period == 0 || closes.len() < period {
        return 0.0;
    }
    let window = &closes[closes.len() - period..];
    let mean = window.iter().sum::<f64>() / period as f64;
    let variance = window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / period as f64;
    let sd = variance.sqrt();
    let upper = mean + 2.0 * sd;
    let lower = mean - 2.0 * sd;
    (upper - lower) / mean.abs().max(EPSILON) * 100.0
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Indicator values for the latest bar of one series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorSnapshot {
    pub close: f64,
    pub ema200: f64,
    pub rsi: f64,
    pub macd_rising: bool,
    pub macd_histogram: f64,
    pub volume_strength: f64,
    pub bollinger_width: f64,
    /// `[close[n-2], close[n-1], close[n]]`
    pub last_closes: [f64; 3],
}

impl IndicatorSnapshot {
    /// Compute every momentum indicator for `series`.
    ///
    /// Returns `None` when fewer than three bars are available.
    pub fn from_series(series: &CandleSeries) -> Option<Self> {
        let closes = series.closes();
        let n = closes.len();
        if n < 3 {
            return None;
        }
        let volumes = series.volumes();
        let (macd_rising, macd_histogram) = macd_turning_up(&closes);
        Some(Self {
            close: closes[n - 1],
            ema200: ema_last(&closes, 200)?,
            rsi: rsi(&closes, RSI_PERIOD),
            macd_rising,
            macd_histogram,
            volume_strength: volume_strength(&volumes),
            bollinger_width: bollinger_width(&closes, BOLLINGER_PERIOD),
            last_closes: [closes[n - 3], closes[n - 2], closes[n - 1]],
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
