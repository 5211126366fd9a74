//! CONFLUENCE: multi-timeframe crypto signal scanner.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! wires the market-data transport, notifier and liveness endpoint, then
//! runs the scan loop until Ctrl+C.

use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info, warn};

use confluence::config;
use confluence::engine::cooldown::CooldownRegistry;
use confluence::engine::scanner::{shutdown_signal, Scanner};
use confluence::health;
use confluence::market::binance::BinanceClient;
use confluence::market::MarketData;
use confluence::notify::telegram::TelegramNotifier;
use confluence::notify::{LogNotifier, Notifier};

const BANNER: &str = r#"
   ___ ___  _  _ ___ _   _   _ ___ _  _  ___ ___
  / __/ _ \| \| | __| | | | | | __| \| |/ __| __|
 | (_| (_) | .` | _|| |_| |_| | _|| .` | (__| _|
  \___\___/|_|\_|_| |____\___/|___|_|\_|\___|___|

  Multi-timeframe signal scanner
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    init_logging();

    let mut cfg = config::AppConfig::load_or_default("config.toml")?;
    cfg.apply_env_overrides()?;

    println!("{BANNER}");
    info!(
        scan_interval_secs = cfg.scanner.scan_interval_secs,
        top_n = cfg.scanner.top_n,
        cooldown_secs = cfg.detection.cooldown_secs,
        "CONFLUENCE starting up"
    );

    // -- Initialise components -------------------------------------------

    let market: Arc<dyn MarketData> = Arc::new(BinanceClient::new(
        Some(cfg.market_data.base_url.clone()),
        cfg.market_data.request_timeout_secs,
    )?);

    let notifier: Arc<dyn Notifier> = match cfg.telegram_credentials() {
        Some(creds) => {
            info!(chat_id = %creds.chat_id, "Delivering alerts to Telegram");
            Arc::new(TelegramNotifier::new(
                creds.token,
                creds.chat_id,
                cfg.market_data.request_timeout_secs,
            )?)
        }
        None => {
            warn!("No Telegram credentials configured, alerts go to the log only");
            Arc::new(LogNotifier)
        }
    };

    let cooldown = Arc::new(CooldownRegistry::new(cfg.detection.cooldown_secs));

    if cfg.health.enabled {
        if let Err(e) = health::spawn_liveness(cfg.health.port).await {
            error!(error = %e, "Liveness endpoint unavailable, continuing without it");
        }
    }

    let scanner = Scanner::new(market, notifier, cooldown, cfg.scanner_config());

    // -- Main loop -------------------------------------------------------

    let shutdown_rx = shutdown_signal(tokio::signal::ctrl_c());

    info!("Entering main loop. Press Ctrl+C to stop.");
    scanner.run(shutdown_rx).await;

    info!("CONFLUENCE shut down cleanly.");
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("confluence=info"));

    let json_logging = std::env::var("CONFLUENCE_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
