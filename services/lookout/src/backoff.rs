//! Consecutive-failure counter for a polled source
//!
//! Fires a single "is down" alert on the failure that reaches the
//! threshold. Further failures in the same outage stay quiet; one success
//! resets the count without an alert.

/// Default number of consecutive poll failures before alerting
pub const DEFAULT_THRESHOLD: u32 = 5;

#[derive(Debug, Clone)]
pub struct FailureCounter {
    source: String,
    threshold: u32,
    failures: u32,
}

impl FailureCounter {
    pub fn new(source: impl Into<String>, threshold: u32) -> Self {
        Self {
            source: source.into(),
            threshold: threshold.max(1),
            failures: 0,
        }
    }

    /// Count a failed poll. Returns the alert text when this failure is the
    /// one that reaches the threshold.
    pub fn record_failure(&mut self) -> Option<String> {
        self.failures = self.failures.saturating_add(1);
        tracing::debug!(
            "{} has {} consecutive failures (threshold {})",
            self.source,
            self.failures,
            self.threshold
        );
        if self.failures == self.threshold {
            Some(format!("{} is down", self.source))
        } else {
            None
        }
    }

    pub fn record_success(&mut self) {
        if self.failures > 0 {
            tracing::info!(
                "{} recovered after {} failures",
                self.source,
                self.failures
            );
        }
        self.failures = 0;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}
