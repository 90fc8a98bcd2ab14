//! Monitor trait and scheduling types

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;

/// How the driver spaces out cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Sleep the full delay after every cycle
    FixedDelay(Duration),
    /// Start cycles `delay` apart; time spent polling is subtracted
    WallClock(Duration),
}

impl Cadence {
    /// Time to sleep after a cycle that took `elapsed`
    pub fn sleep_for(&self, elapsed: Duration) -> Duration {
        match self {
            Cadence::FixedDelay(delay) => *delay,
            Cadence::WallClock(delay) => delay.saturating_sub(elapsed),
        }
    }
}

/// One polled source with its own snapshot and failure counter
#[async_trait]
pub trait Monitor: Send + std::fmt::Debug {
    /// Get the monitor name
    fn name(&self) -> &str;

    fn cadence(&self) -> Cadence;

    /// Run one poll cycle. `now` is the cycle start in UTC.
    ///
    /// Poll failures are handled inside the cycle; an `Err` means the
    /// rest of this cycle was skipped and is logged by the driver.
    async fn run_cycle(&mut self, now: NaiveDateTime) -> crate::Result<()>;
}
