//! Milestone-based transfer rate limiting.

use std::time::Duration;
use tokio::time::Instant;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// How many bytes the current tick may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allowance {
    /// The milestone has not been reached; wait until the given instant.
    Wait(Instant),
    /// Write as much as the socket accepts.
    Unlimited,
}

/// Paces outbound bytes to a target rate.
///
/// After each write the milestone moves forward by `written / rate` seconds,
/// measured from the later of the old milestone and the write time, so idle
/// periods never bank credit.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    /// Bytes per second; `0` disables pacing.
    rate: u64,
    milestone: Option<Instant>,
}

impl RateLimiter {
    pub fn new(rate: u64) -> Self {
        Self {
            rate,
            milestone: None,
        }
    }

    pub fn rate(&self) -> u64 {
        self.rate
    }

    /// Earliest instant at which more bytes may be written.
    pub fn milestone(&self) -> Option<Instant> {
        self.milestone
    }

    pub fn allowance(&self, now: Instant) -> Allowance {
        match self.milestone {
            Some(milestone) if self.rate > 0 && now < milestone => Allowance::Wait(milestone),
            _ => Allowance::Unlimited,
        }
    }

    /// Account for `written` bytes sent at `now`.
    pub fn record(&mut self, now: Instant, written: usize) {
        if self.rate == 0 || written == 0 {
            return;
        }

        let base = match self.milestone {
            Some(milestone) if milestone > now => milestone,
            _ => now,
        };
        self.milestone = Some(base + self.pace(written));
    }

    fn pace(&self, written: usize) -> Duration {
        let nanos = (written as u128).saturating_mul(NANOS_PER_SEC) / u128::from(self.rate);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}
