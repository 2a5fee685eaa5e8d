//! Top-level error type.

use std::io;

use thiserror::Error;

use crate::config::ConfigError;
use crate::http::HeaderError;
use crate::net::DestinationError;
use crate::pipe::{BufferError, CompressError};

/// Errors that stop the pipe from starting or from making progress.
///
/// Network failures never surface here once serving has begun; they are
/// retried or rolled back inside the session.
#[derive(Debug, Error)]
pub enum PipeError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid destination: {0}")]
    Destination(#[from] DestinationError),

    #[error("cannot resolve {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("header error: {0}")]
    Header(#[from] HeaderError),

    #[error("rendered header needs {needed} bytes but the header buffer holds {capacity}")]
    HeaderTooLarge { needed: usize, capacity: usize },

    #[error("buffer error: {0}")]
    Buffer(#[from] BufferError),

    #[error("compression error: {0}")]
    Compression(#[from] CompressError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
