//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → command-line overrides (units.rs parses sizes, rates, intervals)
//!     → validation.rs (semantic checks)
//!     → PipeConfig (validated, immutable)
//!     → passed by value into the session at construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once the session starts
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod units;
pub mod validation;

pub use loader::ConfigError;
pub use schema::AdmissionConfig;
pub use schema::BufferConfig;
pub use schema::CompressionConfig;
pub use schema::ConnectionConfig;
pub use schema::ObservabilityConfig;
pub use schema::PipeConfig;
pub use schema::RetryConfig;
pub use schema::TransferConfig;
pub use schema::UnknownLengthPolicy;
