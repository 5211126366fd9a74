//! Alert detectors.
//!
//! Each detector is split into a pure qualification step (indicator and
//! order-flow predicates) and a single record-and-allow call on the
//! `CooldownRegistry`, made only once every other predicate holds.

pub mod bottom_reversal;
pub mod breakout;
pub mod early_entry;

// ---------------------------------------------------------------------------
// Configuration (defaults, overridden by config.toml at runtime)
// ---------------------------------------------------------------------------

/// Tunables shared by the detectors.
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    /// Taker-buy / taker-sell multiple required by the momentum detectors.
    pub flow_dominance_ratio: f64,
    /// Looser multiple used by the bottom-reversal exhaustion stage. Kept
    /// separate from `flow_dominance_ratio`: exhaustion only needs sellers
    /// to be weakening, not buyers to be in control.
    pub exhaustion_flow_ratio: f64,
    /// Bars requested for the 15m confirmation fetch.
    pub confirmation_candle_limit: u32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            flow_dominance_ratio: 1.05,
            exhaustion_flow_ratio: 0.85,
            confirmation_candle_limit: 150,
        }
    }
}
