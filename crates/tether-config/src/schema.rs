//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Master switch; everything below is inert when false
    #[serde(default)]
    pub enabled: bool,

    /// Deadline mode: "fixed_window", "countdown", "access_window"
    pub mode: Option<String>,

    /// Enforcement strength: "basic", "standard", "maximum"
    pub protection_tier: Option<String>,

    /// Confinement window (fixed_window mode)
    pub window: Option<RawTimeWindow>,

    /// Countdown length in minutes (countdown mode)
    pub countdown_minutes: Option<u64>,

    /// Access window (access_window mode)
    pub access_window: Option<RawAccessWindow>,

    /// Minutes before the deadline to emit the end warning
    pub warn_before_end_minutes: Option<u64>,

    /// Which navigation/hardware interactions to swallow while active
    #[serde(default)]
    pub blocked_input: RawBlockedInput,

    /// Emergency exit settings
    #[serde(default)]
    pub emergency: RawEmergency,

    /// Observer tuning
    #[serde(default)]
    pub observer: RawObserver,
}

/// Time window
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawTimeWindow {
    /// Days of week: "weekdays", "weekends", "all", or list like ["mon", "tue"]
    pub days: RawDays,

    /// Start time (HH:MM format)
    pub start: String,

    /// End time (HH:MM format). End before start spans midnight.
    pub end: String,
}

/// Access window with its self-termination toggle
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawAccessWindow {
    pub days: RawDays,
    pub start: String,
    pub end: String,

    /// End the session when the access window closes. Off by default.
    #[serde(default)]
    pub auto_stop: bool,
}

/// Days specification
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RawDays {
    Preset(String),
    List(Vec<String>),
}

/// Interaction-block flags
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawBlockedInput {
    #[serde(default)]
    pub back: bool,
    #[serde(default)]
    pub home: bool,
    #[serde(default)]
    pub recents: bool,
    #[serde(default)]
    pub power: bool,
    #[serde(default)]
    pub notifications: bool,
}

/// Emergency exit settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawEmergency {
    #[serde(default)]
    pub allow_exit: bool,

    pub password: Option<String>,
}

/// Observer tuning
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawObserver {
    /// Polling cadence: "aggressive", "normal", "power_save"
    pub polling_cadence: Option<String>,

    /// Apps that never trigger a bring-back
    #[serde(default)]
    pub allowed_apps: Vec<String>,

    /// Transient system-shell surfaces tolerated briefly (overrides defaults)
    pub shell_surfaces: Option<Vec<String>>,
}
