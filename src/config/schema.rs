//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the pipe.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the pipe.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PipeConfig {
    /// Destination URL (e.g., "http://collector:8080/ingest").
    pub destination: String,

    /// Device identifier sent with every request. Discovered when absent.
    pub device_id: Option<String>,

    /// Buffer budget.
    pub buffer: BufferConfig,

    /// Outbound pacing.
    pub transfer: TransferConfig,

    /// Transaction admission limits.
    pub admission: AdmissionConfig,

    /// Connect retry configuration.
    pub retries: RetryConfig,

    /// Connection reuse and response handling.
    pub connection: ConnectionConfig,

    /// Payload compression.
    pub compression: CompressionConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Buffer sizes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Capacity of the input and outbound buffers in bytes.
    pub capacity: usize,

    /// Capacity of the rendered request header in bytes.
    pub header_capacity: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: 1024 * 1024,
            header_capacity: 2048,
        }
    }
}

/// Outbound rate configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Target rate in bytes per second (0 = unlimited).
    pub rate: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        // 100 Kbit/s
        Self { rate: 12_500 }
    }
}

/// Admission interval and per-class limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Interval length in seconds; also the maximum reactor wait.
    pub interval_secs: u64,

    /// Transactions per interval when no input was pending at its start.
    pub idle_limit: u32,

    /// Transactions per interval when input was pending at its start.
    pub busy_limit: u32,
}

impl AdmissionConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            idle_limit: 1,
            busy_limit: 3,
        }
    }
}

/// Connect retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Consecutive failures that exhaust a transaction.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 5000,
        }
    }
}

/// What to do with a response that declares no usable length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnknownLengthPolicy {
    /// Discard until the peer closes the connection.
    #[default]
    UntilClose,
    /// Discard until the peer closes or the timeout elapses, then close.
    Timeout,
}

/// Connection behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Reuse one connection across transactions.
    pub persistent: bool,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Handling of responses without a usable Content-Length.
    pub unknown_length: UnknownLengthPolicy,

    /// Deadline for `UnknownLengthPolicy::Timeout`, in seconds.
    pub unknown_length_timeout_secs: u64,
}

impl ConnectionConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Deadline applied to unknown-length bodies, if any.
    pub fn unknown_length_timeout(&self) -> Option<Duration> {
        match self.unknown_length {
            UnknownLengthPolicy::UntilClose => None,
            UnknownLengthPolicy::Timeout => {
                Some(Duration::from_secs(self.unknown_length_timeout_secs))
            }
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            persistent: true,
            connect_timeout_secs: 10,
            unknown_length: UnknownLengthPolicy::UntilClose,
            unknown_length_timeout_secs: 10,
        }
    }
}

/// Payload compression.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CompressionConfig {
    /// zlib level 1-9; 0 disables compression.
    pub level: u32,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log recoverable conditions and the effective configuration.
    pub verbose: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            verbose: false,
        }
    }
}
