//! Pacing subsystem.
//!
//! # Data Flow
//! ```text
//! Reactor iteration:
//!     → admission.rs (may a new transaction start in this interval?)
//!     → rate.rs (may the socket be written in this tick?)
//!     → earliest of (next boundary, milestone) bounds the reactor wait
//! ```
//!
//! # Design Decisions
//! - Both controllers take the current instant as an argument; neither reads
//!   the clock itself
//! - Admission windows are fixed and back-to-back, not sliding
//! - Rate pacing never banks credit across idle periods

pub mod admission;
pub mod rate;

pub use admission::{AdmissionController, Period};
pub use rate::{Allowance, RateLimiter};
