//! Alert delivery.
//!
//! Defines the `Notifier` trait and provides a Telegram implementation plus
//! a log-only fallback for when no chat credentials are configured.
//! Delivery is best effort: callers log failures and move on.

pub mod telegram;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

/// Abstraction over a text message sink.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one formatted message.
    async fn send(&self, message: &str) -> Result<()>;

    /// Sink name for logging.
    fn name(&self) -> &'static str;
}

/// Writes alerts to the log instead of a chat.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        info!(target: "confluence::alerts", "{message}");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
