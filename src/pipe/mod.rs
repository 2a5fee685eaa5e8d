//! The pipe engine.
//!
//! # Data Flow
//! ```text
//! buffer.rs       fixed-capacity byte buffers with read/write cursors
//! compression.rs  optional zlib stage into the scratch buffer
//! transaction.rs  request/response state for one POST
//! session.rs      the reactor: input, admission, pacing, connection, recovery
//! ```

pub mod buffer;
pub mod compression;
pub mod session;
pub mod transaction;

pub use buffer::{BufferError, ByteBuffer};
pub use compression::{CompressError, Compressor};
pub use session::{ServeReport, Session};
pub use transaction::{BodySource, Flow, Phase, ResponseStep, Transaction};
