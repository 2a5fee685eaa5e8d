//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Apply flags → Discover device id → Validate → Resolve → Build session
//!
//! Shutdown (shutdown.rs):
//!     Stop flag raised → serve loop exits at its next iteration
//!
//! Signals (signals.rs):
//!     SIGINT/SIGTERM/SIGQUIT → Raise stop flag
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, network last
//! - Stop is cooperative: the session checks the flag once per iteration

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{Shutdown, StopSignal};
