//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Destination URL
//!     → destination.rs (host, port, path)
//!     → connector.rs (open a stream, with timeout)
//!     → connection.rs (retry budget, backoff, reuse policy, one I/O op per tick)
//!     → handed to the transaction state machine
//!
//! Connection States:
//!     Idle → Connecting → Open → Idle
//!                 ↘ Waiting (backoff) ↗
//! ```
//!
//! # Design Decisions
//! - Exactly one connection at a time
//! - Connect attempts are parked futures, so unrelated wake-ups never restart them
//! - The stream type is abstract so tests can run over in-memory pipes

pub mod connection;
pub mod connector;
pub mod destination;

pub use connection::{ConnectionId, ConnectionManager, LinkEvent, SocketOp};
pub use connector::{ConnectFuture, Connector, TcpConnector};
pub use destination::{Destination, DestinationError};
