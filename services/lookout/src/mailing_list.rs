//! Mailing-list monitor: relays every new archive message once

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::archive::{decode_group, parse_group, parse_index};
use crate::backoff::FailureCounter;
use crate::config::MailingListConfig;
use crate::detect::{messages_after_mark, select_groups};
use crate::io::HttpClient;
use crate::monitor::{Cadence, Monitor};
use crate::notifier::{dispatch, Notifier};
use crate::poller::Poller;
use crate::snapshot::Snapshot;

#[derive(Debug)]
pub struct MailingListMonitor {
    name: String,
    archive_url: String,
    snapshot_path: PathBuf,
    delay: Duration,
    subject_tag: Option<String>,
    poller: Poller,
    counter: FailureCounter,
    snapshot: Snapshot,
    /// Mark advanced in memory but not yet on disk
    dirty: bool,
    notifier: Arc<dyn Notifier>,
}

impl MailingListMonitor {
    pub fn new(
        config: &MailingListConfig,
        http: Arc<dyn HttpClient>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        tracing::debug!(
            "Created MailingListMonitor '{}' for {} (auth: {})",
            config.name,
            config.archive_url,
            config.auth.is_some()
        );

        Self {
            name: config.name.clone(),
            archive_url: config.archive_url.clone(),
            snapshot_path: config.snapshot_path.clone(),
            delay: Duration::from_secs(config.delay_seconds),
            subject_tag: config.subject_tag.clone(),
            poller: Poller::new(http, config.auth.clone()),
            counter: FailureCounter::new(config.source_label.clone(), config.failure_threshold),
            snapshot: Snapshot::load(&config.snapshot_path),
            dirty: false,
            notifier,
        }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    fn persist(&mut self) {
        if self.dirty {
            self.dirty = !self.snapshot.store(&self.snapshot_path);
        }
    }

    /// Relay the new messages of one month, advancing and persisting the
    /// mark after each one
    async fn scan_group(&mut self, link: &str) -> crate::Result<()> {
        tracing::info!("Analyzing {}", link);
        let url = Poller::join(&self.archive_url, link)?;
        let response = self.poller.fetch(&url).await?;
        let text = decode_group(link, &response.body)?;
        let messages = parse_group(&text, self.subject_tag.as_deref());

        let mark = self.snapshot.last_message().map(|(hash, _)| hash.to_string());
        let fresh = messages_after_mark(&messages, mark.as_deref());
        if fresh.is_empty() {
            tracing::info!("No new messages in {}", link);
            return Ok(());
        }

        for message in fresh {
            tracing::info!("Sending new message from {}", link);
            dispatch(self.notifier.as_ref(), &format!("```{}```", message.text)).await;
            self.snapshot.set_last_message(&message.hash, link);
            self.dirty = true;
            self.persist();
        }
        Ok(())
    }
}

#[async_trait]
impl Monitor for MailingListMonitor {
    fn name(&self) -> &str {
        &self.name
    }

    fn cadence(&self) -> Cadence {
        Cadence::FixedDelay(self.delay)
    }

    async fn run_cycle(&mut self, _now: NaiveDateTime) -> crate::Result<()> {
        self.persist();

        let index = match self
            .poller
            .fetch_counted(&self.archive_url, &mut self.counter, self.notifier.as_ref())
            .await?
        {
            Some(response) => response,
            None => return Ok(()),
        };

        let links = parse_index(&index.text());
        let mark_link = self.snapshot.last_message().map(|(_, link)| link.to_string());
        let groups = select_groups(&links, mark_link.as_deref());
        tracing::debug!("{} of {} months to scan", groups.len(), links.len());

        for link in &groups {
            self.scan_group(link).await?;
        }
        Ok(())
    }
}
