//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (interval > 0, level <= 9, limits > 0)
//! - Check the destination URL is usable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: PipeConfig → Result<(), Vec<ValidationError>>
//! - Runs before the session is constructed; nothing here is re-checked later

use thiserror::Error;

use crate::config::schema::{PipeConfig, UnknownLengthPolicy};
use crate::net::destination::{Destination, DestinationError};

/// Smallest header buffer that can hold a request line and the fixed fields.
pub const MIN_HEADER_CAPACITY: usize = 256;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing destination, expected a URL")]
    MissingDestination,

    #[error("invalid destination: {0}")]
    Destination(#[from] DestinationError),

    #[error("buffer capacity must be greater than zero")]
    ZeroBufferCapacity,

    #[error("header capacity {0} is below the minimum of {MIN_HEADER_CAPACITY} bytes")]
    HeaderCapacityTooSmall(usize),

    #[error("admission interval must be at least one second")]
    ZeroInterval,

    #[error("{0} transfer limit must be greater than zero")]
    ZeroTransferLimit(&'static str),

    #[error("compression level {0} is out of range (0-9)")]
    CompressionLevel(u32),

    #[error("connect retry count must be greater than zero")]
    ZeroRetries,

    #[error("connect timeout must be greater than zero")]
    ZeroConnectTimeout,

    #[error("unknown-length timeout must be greater than zero")]
    ZeroUnknownLengthTimeout,
}

/// Check every semantic constraint, collecting all violations.
pub fn validate_config(config: &PipeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.destination.trim().is_empty() {
        errors.push(ValidationError::MissingDestination);
    } else if let Err(e) = Destination::parse(&config.destination) {
        errors.push(e.into());
    }

    if config.buffer.capacity == 0 {
        errors.push(ValidationError::ZeroBufferCapacity);
    }
    if config.buffer.header_capacity < MIN_HEADER_CAPACITY {
        errors.push(ValidationError::HeaderCapacityTooSmall(
            config.buffer.header_capacity,
        ));
    }

    if config.admission.interval_secs == 0 {
        errors.push(ValidationError::ZeroInterval);
    }
    if config.admission.idle_limit == 0 {
        errors.push(ValidationError::ZeroTransferLimit("idle"));
    }
    if config.admission.busy_limit == 0 {
        errors.push(ValidationError::ZeroTransferLimit("busy"));
    }

    if config.compression.level > 9 {
        errors.push(ValidationError::CompressionLevel(config.compression.level));
    }

    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::ZeroRetries);
    }
    if config.connection.connect_timeout_secs == 0 {
        errors.push(ValidationError::ZeroConnectTimeout);
    }
    if config.connection.unknown_length == UnknownLengthPolicy::Timeout
        && config.connection.unknown_length_timeout_secs == 0
    {
        errors.push(ValidationError::ZeroUnknownLengthTimeout);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
