//! Validated policy structures

use crate::schema::{RawConfig, RawTimeWindow};
use crate::validation::{parse_cadence, parse_days, parse_tier, parse_time};
use std::time::Duration;
use tether_api::{BlockedInput, ConfinementMode, PollingCadence, ProtectionTier};
use tether_util::{AppId, DaysOfWeek, TimeWindow, WallClock};

/// Validated confinement policy, immutable for the lifetime of a session.
///
/// Changing policy requires stop-then-start on the controller.
#[derive(Debug, Clone)]
pub struct ConfinementPolicy {
    pub enabled: bool,
    pub mode: ConfinementMode,
    pub protection_tier: ProtectionTier,

    /// Confinement window (fixed_window mode)
    pub window: Option<TimeWindow>,

    /// Countdown length (countdown mode)
    pub countdown: Duration,

    /// Access window (access_window mode)
    pub access_window: Option<TimeWindow>,

    /// End the session when the access window closes
    pub access_window_auto_stop: bool,

    /// How long before the deadline to emit the end warning
    pub warn_before_end: Option<Duration>,

    pub blocked_input: BlockedInput,
    pub emergency: EmergencyPolicy,
    pub polling_cadence: PollingCadence,

    /// Apps that never trigger a bring-back
    pub allowed_apps: Vec<AppId>,

    /// Transient system-shell surfaces tolerated briefly
    pub shell_surfaces: Vec<AppId>,
}

/// Emergency exit settings
#[derive(Debug, Clone, Default)]
pub struct EmergencyPolicy {
    pub allow_exit: bool,
    pub password: Option<String>,
}

/// Surfaces tolerated by default: the pull-down status bar and the launcher.
fn default_shell_surfaces() -> Vec<AppId> {
    vec![AppId::new("systemui"), AppId::new("launcher")]
}

impl ConfinementPolicy {
    /// The inert policy used when persisted configuration is unusable.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            mode: ConfinementMode::FixedWindow,
            protection_tier: ProtectionTier::Basic,
            window: None,
            countdown: Duration::from_secs(60 * 60),
            access_window: None,
            access_window_auto_stop: false,
            warn_before_end: None,
            blocked_input: BlockedInput::empty(),
            emergency: EmergencyPolicy::default(),
            polling_cadence: PollingCadence::Normal,
            allowed_apps: Vec::new(),
            shell_surfaces: default_shell_surfaces(),
        }
    }

    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        let mode = match raw.mode.as_deref() {
            Some("countdown") => ConfinementMode::Countdown,
            Some("access_window") => ConfinementMode::AccessWindow,
            _ => ConfinementMode::FixedWindow,
        };

        let protection_tier = raw
            .protection_tier
            .as_deref()
            .and_then(parse_tier)
            .unwrap_or(ProtectionTier::Standard);

        let window = raw.window.as_ref().map(convert_time_window);
        let access_window = raw.access_window.as_ref().map(|a| {
            convert_time_window(&RawTimeWindow {
                days: a.days.clone(),
                start: a.start.clone(),
                end: a.end.clone(),
            })
        });

        let mut blocked_input = BlockedInput::empty();
        blocked_input.set(BlockedInput::BACK, raw.blocked_input.back);
        blocked_input.set(BlockedInput::HOME, raw.blocked_input.home);
        blocked_input.set(BlockedInput::RECENTS, raw.blocked_input.recents);
        blocked_input.set(BlockedInput::POWER, raw.blocked_input.power);
        blocked_input.set(BlockedInput::NOTIFICATIONS, raw.blocked_input.notifications);

        Self {
            enabled: raw.enabled,
            mode,
            protection_tier,
            window,
            countdown: Duration::from_secs(raw.countdown_minutes.unwrap_or(60) * 60),
            access_window,
            access_window_auto_stop: raw
                .access_window
                .as_ref()
                .map(|a| a.auto_stop)
                .unwrap_or(false),
            warn_before_end: raw
                .warn_before_end_minutes
                .filter(|m| *m > 0)
                .map(|m| Duration::from_secs(m * 60)),
            blocked_input,
            emergency: EmergencyPolicy {
                allow_exit: raw.emergency.allow_exit,
                password: raw.emergency.password,
            },
            polling_cadence: raw
                .observer
                .polling_cadence
                .as_deref()
                .and_then(parse_cadence)
                .unwrap_or_default(),
            allowed_apps: raw
                .observer
                .allowed_apps
                .into_iter()
                .map(AppId::new)
                .collect(),
            shell_surfaces: raw
                .observer
                .shell_surfaces
                .map(|s| s.into_iter().map(AppId::new).collect())
                .unwrap_or_else(default_shell_surfaces),
        }
    }
}

fn convert_time_window(raw: &RawTimeWindow) -> TimeWindow {
    let days_mask = parse_days(&raw.days).unwrap_or(0x7F);
    let (start_h, start_m) = parse_time(&raw.start).unwrap_or((0, 0));
    let (end_h, end_m) = parse_time(&raw.end).unwrap_or((23, 59));

    TimeWindow {
        days: DaysOfWeek::new(days_mask),
        start: WallClock::new(start_h, start_m).unwrap(),
        end: WallClock::new(end_h, end_m).unwrap(),
    }
}
