//! HTTP framing subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound body (maybe compressed)
//!     → header.rs (request line + fields + Content-Length, cached prefix)
//!     → written head-then-body by the session
//!     → response.rs (status, declared length, keep-alive)
//!     → body discarded by the session
//! ```
//!
//! # Design Decisions
//! - Header rendering sits behind a trait so deployments can supply their own fields
//! - Only the response head is parsed; bodies are counted, never stored

pub mod header;
pub mod response;

pub use header::{HeaderError, HeaderGenerator, PostHeader, COMPRESSION_FIELD, DEVICE_FIELD};
pub use response::{ResponseError, ResponseHead, MAX_HEAD_LEN};
