//! Configuration parsing and validation for tether
//!
//! Supports TOML configuration with:
//! - Versioned schema
//! - Confinement window, countdown, and access-window modes
//! - Interaction-block flags and emergency-exit settings
//! - Validation with clear error messages
//!
//! Malformed persisted configuration never brings the engine down: callers
//! that cannot surface a parse error use [`load_config_or_disabled`], which
//! degrades to `enabled = false`.

mod policy;
mod schema;
mod validation;

pub use policy::*;
pub use schema::*;
pub use validation::*;

use std::path::Path;
use thiserror::Error;
use tracing::warn;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<ValidationError> },

    #[error("Unsupported config version: {0}")]
    UnsupportedVersion(u32),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Current supported config version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

/// Load and validate configuration from a TOML file
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<ConfinementPolicy> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Load configuration, degrading to the disabled policy on any failure.
///
/// A config file that cannot be read, parsed, or validated yields
/// `ConfinementPolicy::disabled()` with a warning, never an error.
pub fn load_config_or_disabled(path: impl AsRef<Path>) -> ConfinementPolicy {
    match load_config(path.as_ref()) {
        Ok(policy) => policy,
        Err(e) => {
            warn!(
                path = %path.as_ref().display(),
                error = %e,
                "Unusable configuration, confinement disabled"
            );
            ConfinementPolicy::disabled()
        }
    }
}

/// Parse and validate configuration from a TOML string
pub fn parse_config(content: &str) -> ConfigResult<ConfinementPolicy> {
    let raw: RawConfig = toml::from_str(content)?;

    if raw.config_version != CURRENT_CONFIG_VERSION {
        return Err(ConfigError::UnsupportedVersion(raw.config_version));
    }

    let errors = validate_config(&raw);
    if !errors.is_empty() {
        return Err(ConfigError::ValidationFailed { errors });
    }

    Ok(ConfinementPolicy::from_raw(raw))
}
