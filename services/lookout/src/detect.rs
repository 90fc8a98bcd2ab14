//! Change detection: compare fresh observations with the snapshot
//!
//! Two shapes share this module. Site liveness tracks an `OK`/`FAILED`
//! status per key and alerts on `OK -> FAILED`. The message stream keeps a
//! high-water mark and reports every message after it.

use chrono::{NaiveDateTime, TimeDelta};

use crate::snapshot::{Record, SiteState, Snapshot};

/// Observations older than this are ignored entirely
pub const DEFAULT_RETENTION_DAYS: i64 = 30;

/// Time format used in alert text
pub const ALERT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Windows that decide whether an observation is stale or expired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessPolicy {
    pub cutoff: TimeDelta,
    pub retention: TimeDelta,
}

impl StalenessPolicy {
    pub fn new(cutoff: TimeDelta, retention: TimeDelta) -> Self {
        Self { cutoff, retention }
    }

    pub fn from_hours_and_days(cutoff_hours: i64, retention_days: i64) -> Self {
        Self::new(
            TimeDelta::hours(cutoff_hours),
            TimeDelta::days(retention_days),
        )
    }

    /// Observations before this instant are stale
    pub fn cutoff_at(&self, now: NaiveDateTime) -> NaiveDateTime {
        now - self.cutoff
    }

    /// Observations and records before this instant are expired
    pub fn horizon_at(&self, now: NaiveDateTime) -> NaiveDateTime {
        now - self.retention
    }
}

/// One entity reported by the source, with the time it last checked in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteObservation {
    pub key: String,
    pub observed: NaiveDateTime,
}

impl SiteObservation {
    pub fn new(key: impl Into<String>, observed: NaiveDateTime) -> Self {
        Self {
            key: key.into(),
            observed,
        }
    }
}

/// Result of comparing one batch against the snapshot
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Detection {
    pub alerts: Vec<String>,
    pub changed: bool,
}

/// Apply a batch of site observations to the snapshot.
///
/// Staleness is judged from the observed timestamp against `now`, and
/// only for keys present in the batch. A key that disappears from the
/// source keeps its last status indefinitely.
pub fn detect_sites(
    snapshot: &mut Snapshot,
    observations: &[SiteObservation],
    now: NaiveDateTime,
    policy: &StalenessPolicy,
) -> Detection {
    let cutoff = policy.cutoff_at(now);
    let horizon = policy.horizon_at(now);
    let mut detection = Detection::default();

    for obs in observations {
        if obs.observed < horizon {
            tracing::trace!("Ignoring expired observation of {}", obs.key);
            continue;
        }

        let current = match snapshot.get(&obs.key) {
            Some(Record::SiteStatus { last_seen, status }) if *last_seen >= horizon => {
                Some((*last_seen, *status))
            }
            _ => None,
        };

        let next = match current {
            None => {
                // First sighting is silent. A key that is already stale
                // starts out failed so it cannot alert on the next pass;
                // a site that is down when first seen therefore never
                // alerts until it recovers and goes stale again.
                let status = if obs.observed < cutoff {
                    SiteState::Failed
                } else {
                    SiteState::Ok
                };
                tracing::debug!("New site {} ({}) at {}", obs.key, status, obs.observed);
                Some(status)
            }
            Some((_, SiteState::Ok)) if obs.observed < cutoff => {
                let alert = format!(
                    "{} is down. last heard from at {}",
                    obs.key,
                    obs.observed.format(ALERT_TIME_FORMAT)
                );
                tracing::info!("{}", alert);
                detection.alerts.push(alert);
                Some(SiteState::Failed)
            }
            Some((_, SiteState::Failed)) if obs.observed > cutoff => {
                tracing::info!("{} is back, last heard from at {}", obs.key, obs.observed);
                Some(SiteState::Ok)
            }
            Some((last_seen, status)) if obs.observed > last_seen => Some(status),
            Some(_) => None,
        };

        if let Some(status) = next {
            snapshot.insert(
                obs.key.clone(),
                Record::SiteStatus {
                    last_seen: obs.observed,
                    status,
                },
            );
            detection.changed = true;
        }
    }

    detection
}

/// A normalised message from a stream, identified by its content hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub hash: String,
    pub text: String,
}

/// Pick the groups to scan, oldest first.
///
/// `links` is in source order, newest first. Scanning stops at the group
/// holding the mark, which is included; with no mark every group is
/// returned.
pub fn select_groups(links: &[String], mark_link: Option<&str>) -> Vec<String> {
    let mut selected = Vec::new();
    for link in links {
        selected.push(link.clone());
        if Some(link.as_str()) == mark_link {
            break;
        }
    }
    selected.reverse();
    selected
}

/// Messages strictly after the last occurrence of `mark_hash`, or all of
/// them when the mark is absent from this group
pub fn messages_after_mark<'a>(messages: &'a [Message], mark_hash: Option<&str>) -> &'a [Message] {
    match mark_hash.and_then(|hash| messages.iter().rposition(|m| m.hash == hash)) {
        Some(index) => &messages[index + 1..],
        None => messages,
    }
}
