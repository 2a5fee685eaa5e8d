//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once, in the binary
//! - Pick the filter: `RUST_LOG`, else the configured level
//! - Log the effective configuration when verbose
//!
//! # Design Decisions
//! - Recoverable network conditions log at debug/info, so they are silent by default
//! - Verbose raises only this crate's target to debug

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{ObservabilityConfig, PipeConfig};

/// Filter directive derived from the config, used when `RUST_LOG` is unset.
pub fn default_directive(config: &ObservabilityConfig) -> String {
    if config.verbose {
        format!("{},http_pipe=debug", config.log_level)
    } else {
        config.log_level.clone()
    }
}

/// Install the global subscriber. Later calls are ignored.
pub fn init(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Log every effective setting at debug.
pub fn log_config(config: &PipeConfig) {
    tracing::debug!(
        destination = %config.destination,
        device_id = config.device_id.as_deref().unwrap_or(""),
        short_transaction = !config.connection.persistent,
        compression_level = config.compression.level,
        buffer_size = config.buffer.capacity,
        header_capacity = config.buffer.header_capacity,
        transfer_rate = config.transfer.rate,
        connect_retry = config.retries.max_attempts,
        interval_secs = config.admission.interval_secs,
        idle_limit = config.admission.idle_limit,
        busy_limit = config.admission.busy_limit,
        unknown_length = ?config.connection.unknown_length,
        "Configuration loaded"
    );
}
