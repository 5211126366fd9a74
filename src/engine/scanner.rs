//! Market scanner and per-cycle orchestrator.
//!
//! Each cycle fetches the market-wide 24h ticker snapshot, filters and ranks
//! symbols, then fans out two evaluation units per symbol:
//!
//! - **Momentum** (3m): one candle fetch shared by EarlyEntry and
//!   ConfirmedBreakout.
//! - **Reversal** (30m → 15m): BottomReversal, whose 15m fetch only happens
//!   when the 30m stage holds.
//!
//! Units run concurrently behind a semaphore. A failing unit is logged and
//! counted; it never aborts the cycle or its siblings.

use chrono::Utc;
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};

use crate::detection::{bottom_reversal, breakout, early_entry, DetectionConfig};
use crate::engine::cooldown::CooldownRegistry;
use crate::indicators::IndicatorSnapshot;
use crate::market::MarketData;
use crate::notify::Notifier;
use crate::types::{AlertEvent, CandleSeries, ScannerError, Ticker24h, Timeframe};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Symbol universe filter.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Required symbol suffix, e.g. "USDT".
    pub quote_asset: String,
    /// Any symbol containing one of these is skipped.
    pub excluded_patterns: Vec<String>,
    /// Minimum 24h quote volume.
    pub min_quote_volume: f64,
    /// Minimum |24h % change|.
    pub min_volatility_pct: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            quote_asset: "USDT".to_string(),
            excluded_patterns: [
                // Leveraged tokens
                "UPUSDT", "DOWNUSDT", "BULLUSDT", "BEARUSDT",
                // Stablecoins and fiat quoted against USDT
                "USDCUSDT", "BUSDUSDT", "TUSDUSDT", "FDUSDUSDT", "USDPUSDT", "DAIUSDT",
                "EURUSDT", "AEURUSDT", "EURIUSDT", "GBPUSDT",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            min_quote_volume: 5_000_000.0,
            min_volatility_pct: 2.0,
        }
    }
}

/// Everything the scanner needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub scan_interval_secs: u64,
    pub top_n: usize,
    pub max_concurrent_units: usize,
    /// 3m bars per fetch (EMA200 needs 200).
    pub momentum_candle_limit: u32,
    /// 30m bars per fetch.
    pub exhaustion_candle_limit: u32,
    pub filters: FilterConfig,
    pub detection: DetectionConfig,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: 30,
            top_n: 50,
            max_concurrent_units: 16,
            momentum_candle_limit: 200,
            exhaustion_candle_limit: 50,
            filters: FilterConfig::default(),
            detection: DetectionConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Candidate selection
// ---------------------------------------------------------------------------

/// Whether one ticker passes the universe filter.
pub fn is_candidate(ticker: &Ticker24h, filters: &FilterConfig) -> bool {
    let symbol = ticker.symbol.as_str();
    symbol.ends_with(&filters.quote_asset)
        && !filters
            .excluded_patterns
            .iter()
            .any(|p| symbol.contains(p.as_str()))
        && ticker.quote_volume >= filters.min_quote_volume
        && ticker.price_change_percent.abs() >= filters.min_volatility_pct
}

/// Filter, rank by 24h quote volume (descending) and keep the top `top_n`.
pub fn select_candidates(
    tickers: &[Ticker24h],
    filters: &FilterConfig,
    top_n: usize,
) -> Vec<Ticker24h> {
    let mut selected: Vec<Ticker24h> = tickers
        .iter()
        .filter(|t| is_candidate(t, filters))
        .cloned()
        .collect();
    selected.sort_by(|a, b| {
        b.quote_volume
            .partial_cmp(&a.quote_volume)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    selected.truncate(top_n);
    selected
}

// ---------------------------------------------------------------------------
// Cycle report
// ---------------------------------------------------------------------------

/// Which detectors a unit runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeframeGroup {
    /// 3m: EarlyEntry + ConfirmedBreakout.
    Momentum,
    /// 30m → 15m: BottomReversal.
    Reversal,
}

/// Result of one evaluation unit.
#[derive(Debug, Default)]
pub struct UnitOutcome {
    pub fired: Vec<AlertEvent>,
    pub delivery_failures: usize,
}

/// Summary of one scan cycle.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub cycle: u64,
    pub snapshot_failed: bool,
    pub tickers: usize,
    pub candidates: usize,
    pub units_ok: usize,
    pub units_failed: usize,
    /// Units that did not start because shutdown was requested.
    pub units_skipped: usize,
    pub alerts: Vec<AlertEvent>,
    pub delivery_failures: usize,
    pub cooldowns_evicted: usize,
    pub duration: Duration,
}

impl CycleReport {
    pub fn log(&self) {
        info!(
            cycle = self.cycle,
            snapshot_failed = self.snapshot_failed,
            tickers = self.tickers,
            candidates = self.candidates,
            units_ok = self.units_ok,
            units_failed = self.units_failed,
            units_skipped = self.units_skipped,
            alerts = self.alerts.len(),
            delivery_failures = self.delivery_failures,
            evicted = self.cooldowns_evicted,
            elapsed_ms = self.duration.as_millis() as u64,
            "Cycle complete"
        );
    }
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

/// Drives the scan → detect → notify loop.
pub struct Scanner {
    market: Arc<dyn MarketData>,
    notifier: Arc<dyn Notifier>,
    cooldown: Arc<CooldownRegistry>,
    config: ScannerConfig,
    gate: Semaphore,
}

impl Scanner {
    pub fn new(
        market: Arc<dyn MarketData>,
        notifier: Arc<dyn Notifier>,
        cooldown: Arc<CooldownRegistry>,
        config: ScannerConfig,
    ) -> Self {
        let gate = Semaphore::new(config.max_concurrent_units.max(1));
        Self {
            market,
            notifier,
            cooldown,
            config,
            gate,
        }
    }

    pub fn cooldown(&self) -> &CooldownRegistry {
        &self.cooldown
    }

    /// Run cycles until `shutdown` flips to true (or its sender is dropped).
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let interval = Duration::from_secs(self.config.scan_interval_secs);
        let mut cycle = 0u64;

        info!(
            market = self.market.name(),
            notifier = self.notifier.name(),
            interval_secs = self.config.scan_interval_secs,
            top_n = self.config.top_n,
            max_concurrent_units = self.config.max_concurrent_units,
            cooldown_secs = self.cooldown.window().num_seconds(),
            "Scanner started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }
            cycle += 1;
            let report = self.run_cycle(cycle, &shutdown).await;
            report.log();

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(cycles = cycle, "Scanner stopped");
    }

    /// One full cycle. Never fails: every error is logged and counted.
    pub async fn run_cycle(&self, cycle: u64, shutdown: &watch::Receiver<bool>) -> CycleReport {
        let started = Instant::now();
        let mut report = CycleReport {
            cycle,
            ..Default::default()
        };

        let tickers = match self.market.fetch_tickers().await {
            Ok(t) => t,
            Err(e) => {
                let err = ScannerError::Snapshot(format!("{e:#}"));
                warn!(error = %err, "Skipping cycle");
                report.snapshot_failed = true;
                report.duration = started.elapsed();
                return report;
            }
        };
        report.tickers = tickers.len();

        let candidates = select_candidates(&tickers, &self.config.filters, self.config.top_n);
        report.candidates = candidates.len();
        debug!(
            tickers = tickers.len(),
            candidates = candidates.len(),
            "Candidates selected"
        );

        let units = candidates.iter().flat_map(|t| {
            [
                (t, TimeframeGroup::Momentum),
                (t, TimeframeGroup::Reversal),
            ]
        });
        let results = join_all(
            units.map(|(ticker, group)| async move {
                (ticker, group, self.run_unit(ticker, group, shutdown).await)
            }),
        )
        .await;

        for (ticker, group, result) in results {
            match result {
                Ok(outcome) => {
                    report.units_ok += 1;
                    report.delivery_failures += outcome.delivery_failures;
                    report.alerts.extend(outcome.fired);
                }
                Err(ScannerError::Shutdown) => report.units_skipped += 1,
                Err(e) => {
                    report.units_failed += 1;
                    warn!(symbol = %ticker.symbol, group = ?group, error = %e, "Unit failed");
                }
            }
        }

        report.cooldowns_evicted = self.cooldown.evict_expired(Utc::now());
        report.duration = started.elapsed();
        report
    }

    /// Evaluate one (symbol, group) pair and deliver whatever fires.
    pub async fn run_unit(
        &self,
        ticker: &Ticker24h,
        group: TimeframeGroup,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<UnitOutcome, ScannerError> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| ScannerError::Shutdown)?;
        if *shutdown.borrow() {
            return Err(ScannerError::Shutdown);
        }

        let fired = match group {
            TimeframeGroup::Momentum => self.evaluate_momentum(ticker).await?,
            TimeframeGroup::Reversal => self
                .evaluate_reversal(ticker)
                .await?
                .into_iter()
                .collect::<Vec<_>>(),
        };

        let mut outcome = UnitOutcome::default();
        for alert in fired {
            if !self.deliver(&alert).await {
                outcome.delivery_failures += 1;
            }
            outcome.fired.push(alert);
        }
        Ok(outcome)
    }

    async fn fetch(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: u32,
    ) -> Result<CandleSeries, ScannerError> {
        self.market
            .fetch_candles(symbol, timeframe, limit)
            .await
            .map_err(|e| ScannerError::Fetch {
                symbol: symbol.to_string(),
                timeframe,
                message: format!("{e:#}"),
            })
    }

    async fn evaluate_momentum(&self, ticker: &Ticker24h) -> Result<Vec<AlertEvent>, ScannerError> {
        let symbol = ticker.symbol.as_str();
        let series = self
            .fetch(symbol, Timeframe::ThreeMinutes, self.config.momentum_candle_limit)
            .await?;
        let Some(snap) = IndicatorSnapshot::from_series(&series) else {
            debug!(
                symbol = series.symbol(),
                timeframe = %series.timeframe(),
                bars = series.len(),
                "Not enough history"
            );
            return Ok(Vec::new());
        };

        let now = Utc::now();
        let detection = &self.config.detection;
        Ok([
            early_entry::evaluate(symbol, &snap, ticker, detection, &self.cooldown, now),
            breakout::evaluate(symbol, &snap, ticker, detection, &self.cooldown, now),
        ]
        .into_iter()
        .flatten()
        .collect())
    }

    async fn evaluate_reversal(&self, ticker: &Ticker24h) -> Result<Option<AlertEvent>, ScannerError> {
        let symbol = ticker.symbol.as_str();
        let series = self
            .fetch(symbol, Timeframe::ThirtyMinutes, self.config.exhaustion_candle_limit)
            .await?;
        bottom_reversal::evaluate(
            symbol,
            ticker,
            &series,
            self.market.as_ref(),
            &self.config.detection,
            &self.cooldown,
            Utc::now(),
        )
        .await
    }

    /// Best-effort delivery. Returns false on failure; never retries.
    async fn deliver(&self, alert: &AlertEvent) -> bool {
        info!(symbol = %alert.symbol, kind = alert.kind.key(), "Alert fired");
        match self.notifier.send(&alert.to_string()).await {
            Ok(()) => true,
            Err(e) => {
                let err = ScannerError::Notify(format!("{e:#}"));
                warn!(
                    symbol = %alert.symbol,
                    notifier = self.notifier.name(),
                    error = %err,
                    "Alert delivery failed"
                );
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Shutdown
// ---------------------------------------------------------------------------

/// Spawn a listener that flips the returned receiver to true once `signal`
/// resolves.
///
/// If the signal cannot be listened for, the error is logged and the sender
/// is held until every receiver is gone, so the scanner keeps running.
pub fn shutdown_signal<F>(signal: F) -> watch::Receiver<bool>
where
    F: Future<Output = std::io::Result<()>> + Send + 'static,
{
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        match signal.await {
            Ok(()) => {
                info!("Shutdown signal received.");
                let _ = tx.send(true);
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for shutdown signal, scanner keeps running");
                tx.closed().await;
            }
        }
    });
    rx
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
