//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs. Every
//! field has a default, so a missing file or a partial file is valid.
//! Secrets (the Telegram bot token) are referenced by env-var name in the
//! config and resolved at runtime.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::detection::DetectionConfig;
use crate::engine::scanner::{FilterConfig, ScannerConfig};
use crate::types::ScannerError;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub scanner: ScannerSection,
    pub filters: FiltersSection,
    pub detection: DetectionSection,
    pub market_data: MarketDataSection,
    pub notifier: NotifierSection,
    pub health: HealthSection,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScannerSection {
    pub scan_interval_secs: u64,
    pub top_n: usize,
    /// Evaluation units allowed in flight at once.
    pub max_concurrent_units: usize,
}

impl Default for ScannerSection {
    fn default() -> Self {
        Self {
            scan_interval_secs: 30,
            top_n: 50,
            max_concurrent_units: 16,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FiltersSection {
    pub quote_asset: String,
    /// Substrings that disqualify a symbol (leveraged tokens, stablecoin and
    /// alternate-quote pairs).
    pub excluded_patterns: Vec<String>,
    pub min_quote_volume: f64,
    pub min_volatility_pct: f64,
}

impl Default for FiltersSection {
    fn default() -> Self {
        let filters = FilterConfig::default();
        Self {
            quote_asset: filters.quote_asset,
            excluded_patterns: filters.excluded_patterns,
            min_quote_volume: filters.min_quote_volume,
            min_volatility_pct: filters.min_volatility_pct,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DetectionSection {
    pub cooldown_secs: u64,
    pub flow_dominance_ratio: f64,
    pub exhaustion_flow_ratio: f64,
    pub momentum_candle_limit: u32,
    pub exhaustion_candle_limit: u32,
    pub confirmation_candle_limit: u32,
}

impl Default for DetectionSection {
    fn default() -> Self {
        let detection = DetectionConfig::default();
        Self {
            cooldown_secs: 900,
            flow_dominance_ratio: detection.flow_dominance_ratio,
            exhaustion_flow_ratio: detection.exhaustion_flow_ratio,
            momentum_candle_limit: 200,
            exhaustion_candle_limit: 50,
            confirmation_candle_limit: detection.confirmation_candle_limit,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MarketDataSection {
    pub base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for MarketDataSection {
    fn default() -> Self {
        Self {
            base_url: crate::market::binance::DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: crate::market::binance::DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NotifierSection {
    pub telegram_bot_token_env: String,
    pub telegram_chat_id_env: String,
}

impl Default for NotifierSection {
    fn default() -> Self {
        Self {
            telegram_bot_token_env: "TELEGRAM_BOT_TOKEN".into(),
            telegram_chat_id_env: "TELEGRAM_CHAT_ID".into(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HealthSection {
    pub enabled: bool,
    pub port: u16,
}

impl Default for HealthSection {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8080,
        }
    }
}

/// Resolved Telegram credentials.
pub struct TelegramCredentials {
    pub token: SecretString,
    pub chat_id: String,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            info!(path, "No config file found, using defaults");
            Ok(Self::default())
        }
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply process-environment overrides (`PORT` for the liveness server).
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(port) = std::env::var("PORT") {
            self.health.port = port
                .parse()
                .with_context(|| format!("Invalid PORT value: {port}"))?;
        }
        Ok(())
    }

    /// Reject values that would make the scanner meaningless.
    pub fn validate(&self) -> Result<(), ScannerError> {
        let err = |msg: &str| Err(ScannerError::Config(msg.to_string()));
        if self.scanner.scan_interval_secs == 0 {
            return err("scanner.scan_interval_secs must be > 0");
        }
        if self.scanner.top_n == 0 {
            return err("scanner.top_n must be > 0");
        }
        if self.scanner.max_concurrent_units == 0 {
            return err("scanner.max_concurrent_units must be > 0");
        }
        if self.filters.quote_asset.is_empty() {
            return err("filters.quote_asset must not be empty");
        }
        if self.filters.min_quote_volume < 0.0 || self.filters.min_volatility_pct < 0.0 {
            return err("filters thresholds must be non-negative");
        }
        if self.detection.flow_dominance_ratio <= 0.0 || self.detection.exhaustion_flow_ratio <= 0.0 {
            return err("detection flow ratios must be > 0");
        }
        if self.detection.confirmation_candle_limit < 20 {
            return err("detection.confirmation_candle_limit must be >= 20");
        }
        if self.market_data.request_timeout_secs == 0 {
            return err("market_data.request_timeout_secs must be > 0");
        }
        Ok(())
    }

    /// Resolve Telegram credentials from the environment, if both are set.
    pub fn telegram_credentials(&self) -> Option<TelegramCredentials> {
        let token = Self::resolve_env(&self.notifier.telegram_bot_token_env).ok()?;
        let chat_id = Self::resolve_env(&self.notifier.telegram_chat_id_env).ok()?;
        if token.is_empty() || chat_id.is_empty() {
            return None;
        }
        Some(TelegramCredentials {
            token: SecretString::new(token),
            chat_id,
        })
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    // -- Component views ---------------------------------------------------

    pub fn scanner_config(&self) -> ScannerConfig {
        ScannerConfig {
            scan_interval_secs: self.scanner.scan_interval_secs,
            top_n: self.scanner.top_n,
            max_concurrent_units: self.scanner.max_concurrent_units,
            momentum_candle_limit: self.detection.momentum_candle_limit,
            exhaustion_candle_limit: self.detection.exhaustion_candle_limit,
            filters: FilterConfig {
                quote_asset: self.filters.quote_asset.clone(),
                excluded_patterns: self.filters.excluded_patterns.clone(),
                min_quote_volume: self.filters.min_quote_volume,
                min_volatility_pct: self.filters.min_volatility_pct,
            },
            detection: DetectionConfig {
                flow_dominance_ratio: self.detection.flow_dominance_ratio,
                exhaustion_flow_ratio: self.detection.exhaustion_flow_ratio,
                confirmation_candle_limit: self.detection.confirmation_candle_limit,
            },
        }
    }
}
