//! Retry accounting.
//!
//! # Responsibilities
//! - Count consecutive failures of the current transaction (connect failures
//!   and mid-transaction socket errors alike)
//! - Report exhaustion once the configured limit is reached
//!
//! # Design Decisions
//! - The count survives across reconnects; only a completed or abandoned
//!   transaction resets it, so repeated mid-transaction failures converge
//!   on the limit

/// Outcome of recording one failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again; `failures` consecutive failures so far.
    Retry { failures: u32 },
    /// The limit was reached; the transaction must be abandoned.
    Exhausted,
}

/// Bounded consecutive-failure counter.
#[derive(Debug, Clone)]
pub struct RetryBudget {
    limit: u32,
    used: u32,
}

impl RetryBudget {
    pub fn new(limit: u32) -> Self {
        Self { limit, used: 0 }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Failures recorded since the last reset.
    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn record_failure(&mut self) -> RetryDecision {
        self.used = self.used.saturating_add(1);
        if self.used >= self.limit {
            RetryDecision::Exhausted
        } else {
            RetryDecision::Retry { failures: self.used }
        }
    }

    pub fn reset(&mut self) {
        self.used = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausts_at_limit() {
        let mut budget = RetryBudget::new(3);
        assert_eq!(budget.record_failure(), RetryDecision::Retry { failures: 1 });
        assert_eq!(budget.record_failure(), RetryDecision::Retry { failures: 2 });
        assert_eq!(budget.record_failure(), RetryDecision::Exhausted);
        assert_eq!(budget.used(), 3);

        budget.reset();
        assert_eq!(budget.used(), 0);
    }

    #[test]
    fn limit_of_one_exhausts_immediately() {
        let mut budget = RetryBudget::new(1);
        assert_eq!(budget.record_failure(), RetryDecision::Exhausted);
    }
}
