//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::PipeConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Read a TOML configuration file without validating it.
///
/// Command-line overrides are applied after loading, so validation is a
/// separate step (see [`validate`]).
pub fn load_config(path: &Path) -> Result<PipeConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Deserialize a TOML document.
pub fn parse_config(content: &str) -> Result<PipeConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Run semantic validation, wrapping failures in [`ConfigError`].
pub fn validate(config: &PipeConfig) -> Result<(), ConfigError> {
    validate_config(config).map_err(ConfigError::Validation)
}
