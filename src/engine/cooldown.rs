//! Alert deduplication.
//!
//! Tracks the last successful fire per (symbol, alert kind). A detector asks
//! the registry for permission only after every other predicate has passed;
//! a granted permission records the fire in the same locked step.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::types::AlertKind;

/// Default window between two alerts of the same kind for the same symbol.
pub const DEFAULT_COOLDOWN_SECS: u64 = 900;

type Key = (String, AlertKind);

/// Shared, thread-safe cooldown store.
pub struct CooldownRegistry {
    window: Duration,
    last_fired: Mutex<HashMap<Key, DateTime<Utc>>>,
}

impl Default for CooldownRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN_SECS)
    }
}

impl CooldownRegistry {
    pub fn new(window_secs: u64) -> Self {
        Self {
            window: Duration::seconds(window_secs as i64),
            last_fired: Mutex::new(HashMap::new()),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<Key, DateTime<Utc>>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.last_fired
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record-and-allow using the wall clock.
    pub fn can_alert(&self, symbol: &str, kind: AlertKind) -> bool {
        self.can_alert_at(symbol, kind, Utc::now())
    }

    /// Record-and-allow at an explicit instant.
    ///
    /// Returns true and stores `now` when no fire is recorded for the key or
    /// the window has fully elapsed. Otherwise returns false and leaves the
    /// stored timestamp untouched.
    pub fn can_alert_at(&self, symbol: &str, kind: AlertKind, now: DateTime<Utc>) -> bool {
        let mut entries = self.entries();
        let key = (symbol.to_string(), kind);
        if let Some(last) = entries.get(&key) {
            if now - *last < self.window {
                debug!(symbol, kind = kind.key(), "Alert suppressed by cooldown");
                return false;
            }
        }
        entries.insert(key, now);
        true
    }

    /// Forget the last fire for one key.
    pub fn reset(&self, symbol: &str, kind: AlertKind) {
        self.entries().remove(&(symbol.to_string(), kind));
    }

    pub fn reset_all(&self) {
        self.entries().clear();
    }

    /// Drop entries whose window has elapsed. An expired entry allows the
    /// next alert exactly like a missing one, so this only reclaims memory.
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        let window = self.window;
        entries.retain(|_, last| now - *last < window);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
