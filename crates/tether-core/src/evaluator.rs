//! Time-window policy evaluation
//!
//! Pure functions of policy + current time. All window arithmetic (midnight
//! wrap, weekday masks, next-end search) lives here and in
//! [`tether_util::TimeWindow`]; nothing else in the engine computes windows.

use chrono::{DateTime, Local};
use tether_api::ConfinementMode;
use tether_config::ConfinementPolicy;
use tether_util::{Result, TetherError};

/// Whether confinement applies right now (fixed-window mode).
///
/// A policy without a configured window is unconstrained.
pub fn is_within_window(policy: &ConfinementPolicy, now: DateTime<Local>) -> bool {
    match &policy.window {
        Some(window) => window.contains(&now),
        None => true,
    }
}

/// Whether the target may be entered right now (access-window mode)
pub fn can_enter(policy: &ConfinementPolicy, now: DateTime<Local>) -> bool {
    match &policy.access_window {
        Some(window) => window.contains(&now),
        None => true,
    }
}

/// Compute the confinement deadline for a session starting at `now`.
///
/// FixedWindow: next occurrence of the window's end respecting the weekday
/// mask. Countdown: `now + countdown`. AccessWindow: next occurrence of the
/// access window's end.
pub fn deadline_for(policy: &ConfinementPolicy, now: DateTime<Local>) -> Result<DateTime<Local>> {
    match policy.mode {
        ConfinementMode::FixedWindow => policy
            .window
            .as_ref()
            .and_then(|w| w.next_end(&now))
            .ok_or_else(|| TetherError::config("fixed-window policy has no upcoming window end")),
        ConfinementMode::Countdown => {
            let countdown = chrono::Duration::from_std(policy.countdown)
                .map_err(|e| TetherError::config(format!("countdown out of range: {}", e)))?;
            Ok(now + countdown)
        }
        ConfinementMode::AccessWindow => policy
            .access_window
            .as_ref()
            .and_then(|w| w.next_end(&now))
            .ok_or_else(|| TetherError::config("access-window policy has no upcoming window end")),
    }
}
