//! Lookout - polling monitors with chat alerts
//!
//! Watches a status page for sites that stop checking in, a mailing-list
//! archive for new messages, or a set of servers for availability, and
//! relays what it finds to a chat channel.

pub mod archive;
pub mod backoff;
pub mod codec;
pub mod config;
pub mod detect;
pub mod driver;
pub mod error;
pub mod io;
pub mod mailing_list;
pub mod monitor;
pub mod notifier;
pub mod poller;
pub mod sites;
pub mod slack;
pub mod snapshot;
pub mod store;
pub mod updown;

pub use config::{load_config, Config};
pub use error::{LookoutError, Result};

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::{MonitorConfig, NotifierConfig};
use crate::driver::Driver;
use crate::io::{HttpClient, ReqwestHttpClient, DEFAULT_TIMEOUT};
use crate::mailing_list::MailingListMonitor;
use crate::monitor::Monitor;
use crate::notifier::{LogNotifier, Notifier};
use crate::sites::SiteLivenessMonitor;
use crate::slack::SlackNotifier;
use crate::updown::UpDownMonitor;

/// Builder for a lookout service.
///
/// Production HTTP and notifier implementations are created from the
/// config unless replacements are injected.
pub struct LookoutBuilder {
    config: Config,
    http: Option<Arc<dyn HttpClient>>,
    notifier: Option<Arc<dyn Notifier>>,
    monitor: Option<Box<dyn Monitor>>,
    cancel: Option<CancellationToken>,
}

impl LookoutBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            http: None,
            notifier: None,
            monitor: None,
            cancel: None,
        }
    }

    pub fn with_http_client(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_monitor(mut self, monitor: Box<dyn Monitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn with_cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub async fn build(self) -> Result<Lookout> {
        let accept_invalid_certs = match &self.config.monitor {
            MonitorConfig::UpDown(c) => c.accept_invalid_certs,
            _ => false,
        };
        // Certificate checks are only relaxed for the polled servers,
        // never for the chat relay
        let (http, relay_http): (Arc<dyn HttpClient>, Arc<dyn HttpClient>) = match self.http {
            Some(http) => (Arc::clone(&http), http),
            None => (
                Arc::new(ReqwestHttpClient::new(DEFAULT_TIMEOUT, accept_invalid_certs)?),
                Arc::new(ReqwestHttpClient::new(DEFAULT_TIMEOUT, false)?),
            ),
        };

        let notifier: Arc<dyn Notifier> = match self.notifier {
            Some(notifier) => notifier,
            None => match &self.config.notifier {
                NotifierConfig::Slack(slack) => {
                    if slack.token.is_empty() {
                        return Err(LookoutError::Config(
                            "Slack notifier has no token".to_string(),
                        ));
                    }
                    Arc::new(SlackNotifier::new(slack, relay_http))
                }
                NotifierConfig::Log(log) => Arc::new(LogNotifier::new(log.prefix.clone())),
            },
        };
        tracing::debug!("Alerts go to '{}' notifier", notifier.type_name());

        let monitor: Box<dyn Monitor> = match self.monitor {
            Some(monitor) => monitor,
            None => match &self.config.monitor {
                MonitorConfig::SiteLiveness(c) => {
                    Box::new(SiteLivenessMonitor::new(c, Arc::clone(&http), notifier))
                }
                MonitorConfig::MailingList(c) => {
                    Box::new(MailingListMonitor::new(c, Arc::clone(&http), notifier))
                }
                MonitorConfig::UpDown(c) => {
                    Box::new(UpDownMonitor::new(c, Arc::clone(&http), notifier))
                }
            },
        };

        let cancel = self.cancel.unwrap_or_default();
        Ok(Lookout {
            driver: Driver::new(monitor, cancel.clone()),
            cancel,
        })
    }
}

/// A built lookout service, ready to poll
pub struct Lookout {
    driver: Driver,
    cancel: CancellationToken,
}

impl Lookout {
    /// Poll until ctrl-c or until the cancellation token is triggered
    pub async fn start(mut self) -> Result<()> {
        let cancel_for_signal = self.cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutdown signal received");
                    cancel_for_signal.cancel();
                }
                Err(e) => tracing::error!("Failed to listen for ctrl-c: {}", e),
            }
        });

        tracing::debug!("Starting driver for '{}'", self.driver.monitor().name());
        self.driver.run().await;
        Ok(())
    }
}
