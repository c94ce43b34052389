//! Confinement session state

use chrono::{DateTime, Local};
use std::time::Duration;
use tether_api::{ConfinementState, ProtectionTier, SessionInfo};
use tether_util::{AppId, MonotonicInstant, SessionId};

/// State of one confinement run.
///
/// Wall-clock times are kept for display and alarm arming; enforcement uses
/// the monotonic pair so wall-clock changes cannot shorten or extend a
/// session.
#[derive(Debug)]
pub struct ConfinementSession {
    pub session_id: SessionId,
    pub target: AppId,
    pub state: ConfinementState,

    /// Tier actually running, possibly below the configured one
    pub effective_tier: ProtectionTier,

    pub started_at: DateTime<Local>,
    pub started_at_mono: MonotonicInstant,

    pub deadline: DateTime<Local>,
    pub deadline_mono: MonotonicInstant,

    /// End warning already issued
    warned: bool,
}

impl ConfinementSession {
    pub fn new(
        target: AppId,
        effective_tier: ProtectionTier,
        now: DateTime<Local>,
        now_mono: MonotonicInstant,
        deadline: DateTime<Local>,
    ) -> Self {
        let until_deadline = deadline
            .signed_duration_since(now)
            .to_std()
            .unwrap_or(Duration::ZERO);

        Self {
            session_id: SessionId::new(),
            target,
            state: ConfinementState::Active,
            effective_tier,
            started_at: now,
            started_at_mono: now_mono,
            deadline,
            deadline_mono: now_mono + until_deadline,

            warned: false,
        }
    }

    /// Time remaining until the deadline, using monotonic time
    pub fn time_remaining(&self, now_mono: MonotonicInstant) -> Duration {
        self.deadline_mono.saturating_duration_until(now_mono)
    }

    pub fn is_expired(&self, now_mono: MonotonicInstant) -> bool {
        now_mono >= self.deadline_mono
    }

    /// Whether the not-yet-issued end warning should fire now
    pub fn warn_due(&self, now_mono: MonotonicInstant, warn_before: Duration) -> bool {
        if self.warned {
            return false;
        }
        let remaining = self.time_remaining(now_mono);
        remaining > Duration::ZERO && remaining <= warn_before
    }

    pub fn mark_warned(&mut self) {
        self.warned = true;
    }

    pub fn mark_ending(&mut self) {
        self.state = ConfinementState::Ending;
    }

    pub fn duration_so_far(&self, now_mono: MonotonicInstant) -> Duration {
        now_mono.duration_since(self.started_at_mono)
    }

    pub fn to_info(&self, now_mono: MonotonicInstant) -> SessionInfo {
        SessionInfo {
            session_id: self.session_id.clone(),
            target: self.target.clone(),
            state: self.state,
            started_at: self.started_at,
            deadline: self.deadline,
            time_remaining: self.time_remaining(now_mono),
            effective_tier: self.effective_tier,
        }
    }
}
