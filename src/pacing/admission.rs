//! Transfer admission over fixed, back-to-back intervals.
//!
//! # Classification
//! An interval is `Idle` when no input was pending at its start and `Busy`
//! otherwise. The class is decided once per interval; the start counter
//! resets exactly at each boundary.

use std::time::Duration;
use tokio::time::Instant;

use crate::config::AdmissionConfig;

/// Classification of the current admission interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Idle,
    Busy,
}

impl Period {
    fn classify(pending: bool) -> Self {
        if pending {
            Period::Busy
        } else {
            Period::Idle
        }
    }
}

/// Caps how many transactions start per admission interval.
#[derive(Debug, Clone)]
pub struct AdmissionController {
    interval: Duration,
    idle_limit: u32,
    busy_limit: u32,
    window_start: Instant,
    period: Period,
    started: u32,
}

impl AdmissionController {
    /// Open the first interval at `now`, classified by `pending`.
    pub fn new(config: &AdmissionConfig, now: Instant, pending: bool) -> Self {
        Self {
            interval: config.interval(),
            idle_limit: config.idle_limit,
            busy_limit: config.busy_limit,
            window_start: now,
            period: Period::classify(pending),
            started: 0,
        }
    }

    pub fn period(&self) -> Period {
        self.period
    }

    /// Transactions started in the current interval.
    pub fn started(&self) -> u32 {
        self.started
    }

    pub fn limit(&self) -> u32 {
        match self.period {
            Period::Idle => self.idle_limit,
            Period::Busy => self.busy_limit,
        }
    }

    /// Start of the next interval.
    pub fn next_boundary(&self) -> Instant {
        self.window_start + self.interval
    }

    /// Move to the interval containing `now`, reclassifying on rollover.
    ///
    /// Returns `true` when a boundary was crossed.
    pub fn roll(&mut self, now: Instant, pending: bool) -> bool {
        if now < self.next_boundary() {
            return false;
        }

        let elapsed = now.duration_since(self.window_start).as_nanos();
        let into_window = elapsed % self.interval.as_nanos().max(1);
        self.window_start = now - Duration::from_nanos(into_window as u64);
        self.period = Period::classify(pending);

        tracing::debug!(
            period = ?self.period,
            previous_started = self.started,
            limit = self.limit(),
            "Admission interval rolled over"
        );
        self.started = 0;
        true
    }

    /// Whether another transaction may start now, without counting it.
    pub fn has_capacity(&mut self, now: Instant, pending: bool) -> bool {
        self.roll(now, pending);
        self.started < self.limit()
    }

    /// Count a transaction start if the current interval permits it.
    pub fn admit(&mut self, now: Instant, pending: bool) -> bool {
        if !self.has_capacity(now, pending) {
            return false;
        }
        self.started += 1;
        true
    }
}
