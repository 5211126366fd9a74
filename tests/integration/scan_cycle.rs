//! End-to-end scan cycles: filtering, fan-out, isolation and cooldowns.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use tokio::sync::watch;

    use confluence::engine::cooldown::CooldownRegistry;
    use confluence::engine::scanner::{Scanner, ScannerConfig};
    use confluence::types::{AlertKind, Timeframe};

    use crate::mock_market::{
        breakout_bars, early_entry_bars, ticker, MockMarket, RecordingNotifier,
    };

    fn universe() -> Vec<confluence::types::Ticker24h> {
        vec![
            ticker("DOGEUSDT", 120_000_000.0, -6.0, 0.48),
            ticker("SOLUSDT", 300_000_000.0, 4.0, 0.40),
            ticker("TINYUSDT", 1_000_000.0, 25.0, 0.60), // below volume floor
            ticker("USDCUSDT", 900_000_000.0, 3.0, 0.50), // stablecoin
            ticker("ETHBTC", 80_000_000.0, 5.0, 0.50),    // wrong quote
            ticker("CALMUSDT", 50_000_000.0, 0.4, 0.50),  // too quiet
        ]
    }

    fn build(
        market: Arc<MockMarket>,
        notifier: Arc<RecordingNotifier>,
        config: ScannerConfig,
    ) -> Scanner {
        Scanner::new(market, notifier, Arc::new(CooldownRegistry::default()), config)
    }

    #[tokio::test]
    async fn test_only_filtered_symbols_are_fetched() {
        let market = Arc::new(MockMarket::new(universe()));
        let notifier = Arc::new(RecordingNotifier::default());
        let scanner = build(market.clone(), notifier, ScannerConfig::default());

        let (_tx, rx) = watch::channel(false);
        let report = scanner.run_cycle(1, &rx).await;

        assert_eq!(report.tickers, 6);
        assert_eq!(report.candidates, 2);
        let symbols = market.requested_symbols();
        assert!(symbols.contains("DOGEUSDT"));
        assert!(symbols.contains("SOLUSDT"));
        assert_eq!(symbols.len(), 2);
        assert_eq!(market.count(Timeframe::ThreeMinutes), 2);
        assert_eq!(market.count(Timeframe::ThirtyMinutes), 2);
    }

    #[tokio::test]
    async fn test_top_n_keeps_highest_volume() {
        let market = Arc::new(MockMarket::new(universe()));
        let notifier = Arc::new(RecordingNotifier::default());
        let config = ScannerConfig {
            top_n: 1,
            ..ScannerConfig::default()
        };
        let scanner = build(market.clone(), notifier, config);

        let (_tx, rx) = watch::channel(false);
        scanner.run_cycle(1, &rx).await;

        assert_eq!(market.requested_symbols().into_iter().collect::<Vec<_>>(), vec!["SOLUSDT"]);
    }

    #[tokio::test]
    async fn test_snapshot_failure_then_recovery() {
        let market = Arc::new(MockMarket::new(universe()));
        let notifier = Arc::new(RecordingNotifier::default());
        let scanner = build(market.clone(), notifier, ScannerConfig::default());
        let (_tx, rx) = watch::channel(false);

        market.set_snapshot_error("502 Bad Gateway");
        let report = scanner.run_cycle(1, &rx).await;
        assert!(report.snapshot_failed);
        assert!(market.calls().is_empty());

        market.clear_snapshot_error();
        let report = scanner.run_cycle(2, &rx).await;
        assert!(!report.snapshot_failed);
        assert!(!market.calls().is_empty());
    }

    #[tokio::test]
    async fn test_bottom_reversal_fires_once_within_cooldown() {
        let market = Arc::new(MockMarket::new(universe()));
        let notifier = Arc::new(RecordingNotifier::default());
        let scanner = build(market.clone(), notifier.clone(), ScannerConfig::default());
        let (_tx, rx) = watch::channel(false);

        let first = scanner.run_cycle(1, &rx).await;
        // SOL sellers are in control (40/60), so only DOGE clears Stage A.
        assert_eq!(market.count(Timeframe::FifteenMinutes), 1);
        assert_eq!(first.alerts.len(), 1);
        assert_eq!(first.alerts[0].kind, AlertKind::BottomReversal);
        assert_eq!(first.alerts[0].symbol, "DOGEUSDT");
        assert_eq!(notifier.messages().len(), 1);
        assert!(notifier.messages()[0].contains("DOGEUSDT"));

        let second = scanner.run_cycle(2, &rx).await;
        assert!(second.alerts.is_empty());
        assert_eq!(notifier.messages().len(), 1);
        assert!(!scanner
            .cooldown()
            .can_alert("DOGEUSDT", AlertKind::BottomReversal));
    }

    #[tokio::test]
    async fn test_failing_symbol_does_not_block_others() {
        let market = Arc::new(MockMarket::new(universe()));
        market.fail_symbol("SOLUSDT");
        let notifier = Arc::new(RecordingNotifier::default());
        let scanner = build(market.clone(), notifier.clone(), ScannerConfig::default());
        let (_tx, rx) = watch::channel(false);

        let report = scanner.run_cycle(1, &rx).await;

        assert_eq!(report.units_failed, 2);
        assert_eq!(report.units_ok, 2);
        assert_eq!(report.alerts.len(), 1);
        assert_eq!(notifier.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_delivery_failure_is_counted_not_retried() {
        let market = Arc::new(MockMarket::new(universe()));
        let notifier = Arc::new(RecordingNotifier::failing());
        let scanner = build(market, notifier.clone(), ScannerConfig::default());
        let (_tx, rx) = watch::channel(false);

        let report = scanner.run_cycle(1, &rx).await;
        assert_eq!(report.alerts.len(), 1);
        assert_eq!(report.delivery_failures, 1);
        assert_eq!(notifier.messages().len(), 1);

        // Cooldown was recorded at emission, so the next cycle stays quiet.
        let report = scanner.run_cycle(2, &rx).await;
        assert!(report.alerts.is_empty());
        assert_eq!(notifier.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_single_unit_concurrency_still_completes() {
        let market = Arc::new(MockMarket::new(universe()));
        let notifier = Arc::new(RecordingNotifier::default());
        let config = ScannerConfig {
            max_concurrent_units: 1,
            ..ScannerConfig::default()
        };
        let scanner = build(market, notifier, config);
        let (_tx, rx) = watch::channel(false);

        let report = scanner.run_cycle(1, &rx).await;
        assert_eq!(report.units_ok, 4);
        assert_eq!(report.units_failed, 0);
    }

    #[tokio::test]
    async fn test_momentum_unit_fires_from_3m_series() {
        let market = Arc::new(MockMarket::new(vec![
            ticker("SOLUSDT", 300_000_000.0, 4.0, 0.60),
            ticker("ARBUSDT", 90_000_000.0, 7.0, 0.60),
        ]));
        market.set_momentum_bars("SOLUSDT", early_entry_bars());
        market.set_momentum_bars("ARBUSDT", breakout_bars());
        let notifier = Arc::new(RecordingNotifier::default());
        let scanner = build(market, notifier.clone(), ScannerConfig::default());
        let (_tx, rx) = watch::channel(false);

        let first = scanner.run_cycle(1, &rx).await;
        let momentum: Vec<_> = first
            .alerts
            .iter()
            .filter(|a| a.kind != AlertKind::BottomReversal)
            .map(|a| (a.symbol.as_str(), a.kind))
            .collect();
        assert_eq!(momentum.len(), 2);
        assert!(momentum.contains(&("SOLUSDT", AlertKind::EarlyEntry)));
        assert!(momentum.contains(&("ARBUSDT", AlertKind::ConfirmedBreakout)));
        assert_eq!(notifier.messages().len(), first.alerts.len());

        // Same tape next cycle: everything is inside its cooldown.
        let second = scanner.run_cycle(2, &rx).await;
        assert!(second.alerts.is_empty());
    }
}
