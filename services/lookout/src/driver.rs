//! Driver: runs one monitor's poll cycles until cancelled

use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::monitor::Monitor;

/// Drives a single monitor through poll cycles, one at a time
pub struct Driver {
    monitor: Box<dyn Monitor>,
    cancel: CancellationToken,
}

impl Driver {
    pub fn new(monitor: Box<dyn Monitor>, cancel: CancellationToken) -> Self {
        Self { monitor, cancel }
    }

    pub fn monitor(&self) -> &dyn Monitor {
        self.monitor.as_ref()
    }

    /// Run one cycle, logging a failed cycle instead of returning it
    pub async fn tick(&mut self) {
        let now = chrono::Utc::now().naive_utc();
        if let Err(e) = self.monitor.run_cycle(now).await {
            tracing::warn!("Cycle of '{}' aborted: {}", self.monitor.name(), e);
        }
    }

    /// Poll until the cancellation token is triggered. A cycle in
    /// progress always completes; only the sleep is cut short.
    pub async fn run(&mut self) {
        let name = self.monitor.name().to_string();
        tracing::info!("Monitor '{}' started", name);

        while !self.cancel.is_cancelled() {
            let started = Instant::now();
            self.tick().await;

            let sleep = self.monitor.cadence().sleep_for(started.elapsed());
            tracing::debug!("Monitor '{}' sleeping for {:?}", name, sleep);

            tokio::select! {
                _ = tokio::time::sleep(sleep) => {}
                _ = self.cancel.cancelled() => {
                    tracing::debug!("Polling loop for '{}' cancelled", name);
                    break;
                }
            }
        }

        tracing::info!("Monitor '{}' stopped", name);
    }
}
