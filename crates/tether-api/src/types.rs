//! Shared types for the tether engine

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tether_util::{AppId, SessionId};

/// Configured strength of enforcement.
///
/// Ordered: a session's effective tier may be lower than the configured one
/// (capability downgrade), never higher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtectionTier {
    /// Key interception only, no foreground observation
    Basic,
    /// Event-driven foreground observation
    Standard,
    /// Event-driven and polling observation running concurrently
    Maximum,
}

impl ProtectionTier {
    /// The next tier down the ladder, if any
    pub fn downgrade(self) -> Option<ProtectionTier> {
        match self {
            ProtectionTier::Maximum => Some(ProtectionTier::Standard),
            ProtectionTier::Standard => Some(ProtectionTier::Basic),
            ProtectionTier::Basic => None,
        }
    }
}

/// How the confinement deadline is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfinementMode {
    /// Confine during a recurring daily window; ends at the window's end
    FixedWindow,
    /// Confine for a fixed duration from start
    Countdown,
    /// Entry is gated on an access window; ends at the access window's end
    AccessWindow,
}

/// Polling cadence for the polling observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PollingCadence {
    Aggressive,
    #[default]
    Normal,
    PowerSave,
}

impl PollingCadence {
    pub fn interval(self) -> Duration {
        match self {
            PollingCadence::Aggressive => Duration::from_millis(200),
            PollingCadence::Normal => Duration::from_millis(500),
            PollingCadence::PowerSave => Duration::from_secs(1),
        }
    }
}

/// Confinement state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfinementState {
    Idle,
    Active,
    Ending,
}

/// Which observer produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObserverEventKind {
    /// Pushed by the host's window-change notification path
    FocusChanged,
    /// Produced by the periodic foreground inspection loop
    Poll,
}

/// A foreground observation fed into the decision pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObserverEvent {
    pub app: AppId,
    pub timestamp: DateTime<Local>,
    pub kind: ObserverEventKind,
}

/// Why the actuator did or did not act
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BringBackReason {
    /// Target is already foregrounded
    OnTarget,
    /// Foreground app is on the explicit allow-list
    AllowListed,
    /// Transient system-shell surface, within tolerance
    ShellTolerated,
    /// System-shell surface seen too many consecutive times
    ShellPersistent,
    /// Some other app took the foreground
    LeftTarget,
}

/// Outcome of a single `should_bring_back` evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BringBackDecision {
    pub should_act: bool,
    pub reason: BringBackReason,
    /// How long to wait before acting, so concurrent triggers coalesce
    pub debounce: Duration,
}

/// Why a confinement session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The scheduled boundary fired at the deadline
    BoundaryReached,
    /// A fixed window closed before the computed deadline
    WindowClosed,
    /// Emergency password accepted
    EmergencyExit,
    /// The host shell asked for a stop
    HostRequest,
    /// Process shutting down
    Shutdown,
}

bitflags::bitflags! {
    /// Navigation/hardware interactions the interceptor may swallow
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BlockedInput: u8 {
        const BACK          = 1 << 0;
        const HOME          = 1 << 1;
        const RECENTS       = 1 << 2;
        const POWER         = 1 << 3;
        const NOTIFICATIONS = 1 << 4;
    }
}

/// A navigation or hardware key as reported by the host input pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavKey {
    Back,
    Home,
    Recents,
    Power,
    NotificationShade,
}

impl NavKey {
    /// The blocked-input flag governing this key
    pub fn flag(self) -> BlockedInput {
        match self {
            NavKey::Back => BlockedInput::BACK,
            NavKey::Home => BlockedInput::HOME,
            NavKey::Recents => BlockedInput::RECENTS,
            NavKey::Power => BlockedInput::POWER,
            NavKey::NotificationShade => BlockedInput::NOTIFICATIONS,
        }
    }
}

/// Snapshot of an active confinement session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub target: AppId,
    pub state: ConfinementState,
    pub started_at: DateTime<Local>,
    pub deadline: DateTime<Local>,
    pub time_remaining: Duration,
    pub effective_tier: ProtectionTier,
}
