//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! session, connection manager, startup
//!     → tracing events with structured fields
//!     → logging.rs (EnvFilter + fmt layer on stderr)
//! ```
//!
//! # Design Decisions
//! - Stdout is never written, so the pipe can sit in a shell pipeline
//! - Totals are returned as a ServeReport and logged on exit

pub mod logging;

pub use logging::{init, log_config};
