//! Default paths for tether components
//!
//! Paths are user-writable by default (no root required):
//! - Config: `$XDG_CONFIG_HOME/tether/config.toml` or `~/.config/tether/config.toml`
//! - State: `$XDG_STATE_HOME/tether` or `~/.local/state/tether`

use std::path::PathBuf;

/// Environment variable for overriding the config file path
pub const TETHER_CONFIG_ENV: &str = "TETHER_CONFIG";

/// Application subdirectory name
const APP_DIR: &str = "tether";

/// Get the default config file path.
///
/// Order of precedence:
/// 1. `$TETHER_CONFIG` environment variable (if set)
/// 2. `$XDG_CONFIG_HOME/tether/config.toml` (if XDG_CONFIG_HOME is set)
/// 3. `~/.config/tether/config.toml` (fallback)
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(TETHER_CONFIG_ENV) {
        return PathBuf::from(path);
    }

    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join("config.toml");
    }

    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home)
        .join(".config")
        .join(APP_DIR)
        .join("config.toml")
}

/// Get the default state directory (logs, alarm re-arm bookkeeping).
///
/// Order of precedence:
/// 1. `$XDG_STATE_HOME/tether` (if XDG_STATE_HOME is set)
/// 2. `~/.local/state/tether` (fallback)
pub fn default_state_dir() -> PathBuf {
    if let Ok(state_home) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(state_home).join(APP_DIR);
    }

    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home)
        .join(".local")
        .join("state")
        .join(APP_DIR)
}
