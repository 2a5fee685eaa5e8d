//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Connect or socket failure:
//!     → retries.rs (count the failure, decide retry vs. exhausted)
//!     → backoff.rs (delay before the next connect attempt)
//!     → on exhaustion the session rolls back and waits for admission
//! ```
//!
//! # Design Decisions
//! - Failures are never fatal once serving has started
//! - Jittered backoff keeps an unreachable collector from being hammered
//! - A connect has its own timeout so a silent peer cannot stall retries

pub mod backoff;
pub mod retries;

pub use backoff::BackoffPolicy;
pub use retries::{RetryBudget, RetryDecision};
