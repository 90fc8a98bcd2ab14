//! Notifier trait for sending alerts

use async_trait::async_trait;

/// Trait for sending alert text to a chat relay
#[async_trait]
pub trait Notifier: Send + Sync + std::fmt::Debug {
    /// Get the notifier type name (e.g. "slack")
    fn type_name(&self) -> &str;

    /// Send one alert
    async fn notify(&self, message: &str) -> crate::Result<()>;
}

/// Send an alert without waiting on the outcome. Failures are logged and
/// dropped; alerts are best-effort.
pub async fn dispatch(notifier: &dyn Notifier, message: &str) {
    tracing::info!("Alert via '{}': {}", notifier.type_name(), message);
    if let Err(e) = notifier.notify(message).await {
        tracing::warn!(
            "Alert via '{}' failed: {}",
            notifier.type_name(),
            e
        );
    }
}

/// Notifier that only writes alerts to the log; used for dry runs
#[derive(Debug, Default)]
pub struct LogNotifier {
    prefix: String,
}

impl LogNotifier {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    fn type_name(&self) -> &str {
        "log"
    }

    async fn notify(&self, message: &str) -> crate::Result<()> {
        tracing::info!("[dry run] {}{}", self.prefix, message);
        Ok(())
    }
}
