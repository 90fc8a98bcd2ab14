//! Site-liveness monitor for a pyglidein-style status page

use std::path::PathBuf;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use regex::Regex;

use crate::backoff::FailureCounter;
use crate::config::SiteLivenessConfig;
use crate::detect::{detect_sites, SiteObservation, StalenessPolicy};
use crate::io::HttpClient;
use crate::monitor::{Cadence, Monitor};
use crate::notifier::{dispatch, Notifier};
use crate::poller::Poller;
use crate::snapshot::Snapshot;
use crate::LookoutError;

/// Timestamp format of the `date` spans on the status page
pub const STATUS_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static CLIENTS_DIV: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<div[^>]*class\s*=\s*["'][^"']*\bclients\b[^"']*["'][^>]*>"#)
        .expect("valid clients pattern")
});

static UUID_OR_DATE_SPAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<span[^>]*class\s*=\s*["'](uuid|date)["'][^>]*>(.*?)</span>"#)
        .expect("valid span pattern")
});

/// Extract `(uuid, last check-in)` pairs from the `clients` section.
///
/// Each `uuid` span is paired with the `date` span that follows it. A
/// uuid without a readable date fails the whole page.
pub fn parse_status_page(html: &str) -> crate::Result<Vec<SiteObservation>> {
    let section = match CLIENTS_DIV.find(html) {
        Some(m) => &html[m.end()..],
        None => {
            return Err(LookoutError::Parse(
                "status page has no clients section".to_string(),
            ))
        }
    };

    let mut observations = Vec::new();
    let mut pending: Option<String> = None;

    for caps in UUID_OR_DATE_SPAN.captures_iter(section) {
        let text = caps[2].trim();
        if caps[1].eq_ignore_ascii_case("uuid") {
            if let Some(key) = pending.replace(text.to_string()) {
                return Err(LookoutError::Parse(format!("site {} has no date", key)));
            }
        } else if let Some(key) = pending.take() {
            let observed = NaiveDateTime::parse_from_str(text, STATUS_DATE_FORMAT).map_err(|e| {
                LookoutError::Parse(format!("site {} has bad date {:?}: {}", key, text, e))
            })?;
            observations.push(SiteObservation::new(key, observed));
        }
    }

    if let Some(key) = pending {
        return Err(LookoutError::Parse(format!("site {} has no date", key)));
    }

    Ok(observations)
}

/// Watches a status page and alerts when a site stops checking in
#[derive(Debug)]
pub struct SiteLivenessMonitor {
    name: String,
    url: String,
    snapshot_path: PathBuf,
    delay: Duration,
    policy: StalenessPolicy,
    poller: Poller,
    counter: FailureCounter,
    snapshot: Snapshot,
    /// In-memory state not yet on disk
    dirty: bool,
    notifier: Arc<dyn Notifier>,
}

impl SiteLivenessMonitor {
    pub fn new(
        config: &SiteLivenessConfig,
        http: Arc<dyn HttpClient>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let source = config
            .source_label
            .clone()
            .unwrap_or_else(|| config.url.clone());
        tracing::debug!(
            "Created SiteLivenessMonitor '{}' for {}",
            config.name,
            config.url
        );

        Self {
            name: config.name.clone(),
            url: config.url.clone(),
            snapshot_path: config.snapshot_path.clone(),
            delay: Duration::from_secs(config.delay_seconds),
            policy: StalenessPolicy::from_hours_and_days(config.cutoff_hours, config.retention_days),
            poller: Poller::new(http, None),
            counter: FailureCounter::new(source, config.failure_threshold),
            snapshot: Snapshot::load(&config.snapshot_path),
            dirty: false,
            notifier,
        }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Write the snapshot if it holds changes that are not on disk yet
    fn persist(&mut self) {
        if self.dirty {
            self.dirty = !self.snapshot.store(&self.snapshot_path);
        }
    }
}

#[async_trait]
impl Monitor for SiteLivenessMonitor {
    fn name(&self) -> &str {
        &self.name
    }

    fn cadence(&self) -> Cadence {
        Cadence::FixedDelay(self.delay)
    }

    async fn run_cycle(&mut self, now: NaiveDateTime) -> crate::Result<()> {
        // A write that failed last cycle is retried even if this one fails early
        self.persist();

        let response = match self
            .poller
            .fetch_counted(&self.url, &mut self.counter, self.notifier.as_ref())
            .await?
        {
            Some(response) => response,
            None => return Ok(()),
        };

        let observations = parse_status_page(&response.text())?;
        tracing::debug!("{} sites listed on {}", observations.len(), self.url);

        let detection = detect_sites(&mut self.snapshot, &observations, now, &self.policy);
        for alert in &detection.alerts {
            dispatch(self.notifier.as_ref(), alert).await;
        }
        self.dirty |= detection.changed;
        self.persist();
        Ok(())
    }
}
