//! Up/down checker: plain availability of a fixed set of servers

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::backoff::FailureCounter;
use crate::config::UpDownConfig;
use crate::io::HttpClient;
use crate::monitor::{Cadence, Monitor};
use crate::notifier::Notifier;
use crate::poller::Poller;

#[derive(Debug)]
pub struct UpDownMonitor {
    name: String,
    delay: Duration,
    poller: Poller,
    servers: Vec<(String, FailureCounter)>,
    notifier: Arc<dyn Notifier>,
}

impl UpDownMonitor {
    pub fn new(config: &UpDownConfig, http: Arc<dyn HttpClient>, notifier: Arc<dyn Notifier>) -> Self {
        let servers = config
            .servers
            .iter()
            .map(|url| (url.clone(), FailureCounter::new(url.clone(), config.failure_threshold)))
            .collect();
        tracing::debug!(
            "Created UpDownMonitor '{}' for {} servers",
            config.name,
            config.servers.len()
        );

        Self {
            name: config.name.clone(),
            delay: Duration::from_secs(config.delay_seconds),
            poller: Poller::new(http, None),
            servers,
            notifier,
        }
    }

    /// Consecutive failures per server, in configured order
    pub fn failures(&self) -> Vec<(&str, u32)> {
        self.servers
            .iter()
            .map(|(url, counter)| (url.as_str(), counter.failures()))
            .collect()
    }
}

#[async_trait]
impl Monitor for UpDownMonitor {
    fn name(&self) -> &str {
        &self.name
    }

    fn cadence(&self) -> Cadence {
        Cadence::WallClock(self.delay)
    }

    async fn run_cycle(&mut self, _now: NaiveDateTime) -> crate::Result<()> {
        for (url, counter) in self.servers.iter_mut() {
            if self
                .poller
                .fetch_counted(url, counter, self.notifier.as_ref())
                .await?
                .is_some()
            {
                tracing::debug!("{} is up", url);
            }
        }
        Ok(())
    }
}
