//! Configuration validation

use crate::schema::{RawConfig, RawDays, RawTimeWindow};
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Invalid time format '{value}': {message}")]
    InvalidTimeFormat { value: String, message: String },

    #[error("Invalid day specification: {0}")]
    InvalidDaySpec(String),

    #[error("Unknown mode: {0}")]
    UnknownMode(String),

    #[error("Unknown protection tier: {0}")]
    UnknownTier(String),

    #[error("Unknown polling cadence: {0}")]
    UnknownCadence(String),

    #[error("Mode '{mode}' requires the [{section}] section")]
    MissingSection { mode: String, section: String },

    #[error("countdown_minutes must be at least 1")]
    ZeroCountdown,

    #[error("warn_before_end_minutes {warn} is not below countdown_minutes {countdown}")]
    WarningExceedsCountdown { warn: u64, countdown: u64 },

    #[error("Emergency exit enabled without a password")]
    EmergencyWithoutPassword,
}

/// Validate a raw configuration. An empty result means the config is usable.
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    // A disabled config is always acceptable; nothing below runs.
    if !config.enabled {
        return errors;
    }

    let mode = config.mode.as_deref().unwrap_or("fixed_window");
    match mode {
        "fixed_window" => {
            match &config.window {
                Some(window) => errors.extend(validate_time_window(window)),
                None => errors.push(ValidationError::MissingSection {
                    mode: mode.into(),
                    section: "window".into(),
                }),
            }
        }
        "countdown" => match config.countdown_minutes {
            Some(0) => errors.push(ValidationError::ZeroCountdown),
            Some(countdown) => {
                if let Some(warn) = config.warn_before_end_minutes
                    && warn >= countdown
                {
                    errors.push(ValidationError::WarningExceedsCountdown { warn, countdown });
                }
            }
            None => errors.push(ValidationError::MissingSection {
                mode: mode.into(),
                section: "countdown_minutes".into(),
            }),
        },
        "access_window" => match &config.access_window {
            Some(access) => errors.extend(validate_time_window(&RawTimeWindow {
                days: access.days.clone(),
                start: access.start.clone(),
                end: access.end.clone(),
            })),
            None => errors.push(ValidationError::MissingSection {
                mode: mode.into(),
                section: "access_window".into(),
            }),
        },
        other => errors.push(ValidationError::UnknownMode(other.into())),
    }

    if let Some(tier) = &config.protection_tier
        && parse_tier(tier).is_none()
    {
        errors.push(ValidationError::UnknownTier(tier.clone()));
    }

    if let Some(cadence) = &config.observer.polling_cadence
        && parse_cadence(cadence).is_none()
    {
        errors.push(ValidationError::UnknownCadence(cadence.clone()));
    }

    if config.emergency.allow_exit
        && config
            .emergency
            .password
            .as_deref()
            .is_none_or(|p| p.is_empty())
    {
        errors.push(ValidationError::EmergencyWithoutPassword);
    }

    errors
}

fn validate_time_window(window: &RawTimeWindow) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Err(e) = parse_days(&window.days) {
        errors.push(ValidationError::InvalidDaySpec(e));
    }

    if let Err(e) = parse_time(&window.start) {
        errors.push(ValidationError::InvalidTimeFormat {
            value: window.start.clone(),
            message: e,
        });
    }

    if let Err(e) = parse_time(&window.end) {
        errors.push(ValidationError::InvalidTimeFormat {
            value: window.end.clone(),
            message: e,
        });
    }

    errors
}

/// Parse HH:MM time format
pub fn parse_time(s: &str) -> Result<(u8, u8), String> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 2 {
        return Err("Expected HH:MM format".into());
    }

    let hour: u8 = parts[0].parse().map_err(|_| "Invalid hour".to_string())?;
    let minute: u8 = parts[1].parse().map_err(|_| "Invalid minute".to_string())?;

    if hour >= 24 {
        return Err("Hour must be 0-23".into());
    }
    if minute >= 60 {
        return Err("Minute must be 0-59".into());
    }

    Ok((hour, minute))
}

/// Parse days specification into a Monday-first bitmask
pub fn parse_days(days: &RawDays) -> Result<u8, String> {
    match days {
        RawDays::Preset(preset) => match preset.to_lowercase().as_str() {
            "all" | "every" | "daily" => Ok(0x7F),
            "weekdays" => Ok(0x1F), // Mon-Fri
            "weekends" => Ok(0x60), // Sat-Sun
            other => Err(format!("Unknown day preset: {}", other)),
        },
        RawDays::List(list) => {
            let mut mask = 0u8;
            for day in list {
                let bit = match day.to_lowercase().as_str() {
                    "mon" | "monday" => 1 << 0,
                    "tue" | "tuesday" => 1 << 1,
                    "wed" | "wednesday" => 1 << 2,
                    "thu" | "thursday" => 1 << 3,
                    "fri" | "friday" => 1 << 4,
                    "sat" | "saturday" => 1 << 5,
                    "sun" | "sunday" => 1 << 6,
                    other => return Err(format!("Unknown day: {}", other)),
                };
                mask |= bit;
            }
            Ok(mask)
        }
    }
}

pub(crate) fn parse_tier(s: &str) -> Option<tether_api::ProtectionTier> {
    match s.to_lowercase().as_str() {
        "basic" => Some(tether_api::ProtectionTier::Basic),
        "standard" => Some(tether_api::ProtectionTier::Standard),
        "maximum" => Some(tether_api::ProtectionTier::Maximum),
        _ => None,
    }
}

pub(crate) fn parse_cadence(s: &str) -> Option<tether_api::PollingCadence> {
    match s.to_lowercase().as_str() {
        "aggressive" => Some(tether_api::PollingCadence::Aggressive),
        "normal" => Some(tether_api::PollingCadence::Normal),
        "power_save" | "powersave" => Some(tether_api::PollingCadence::PowerSave),
        _ => None,
    }
}
