//! HTTP pipe library.
//!
//! Reads a byte stream and forwards it to an HTTP collector as a sequence of
//! paced POST transactions, within a fixed memory budget.

pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod pacing;
pub mod pipe;
pub mod resilience;

pub use config::schema::PipeConfig;
pub use error::PipeError;
pub use lifecycle::{Shutdown, StopSignal};
pub use pipe::{ServeReport, Session};
