//! Boundary trigger arming

use chrono::{DateTime, Local};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tether_host_api::{AlarmHandle, HostAdapter, HostError};
use tracing::{error, warn};

/// Wraps the host's wake-capable one-shot alarm for the session deadline.
///
/// The host side is process-independent: it persists armed alarms and
/// re-delivers the firing even if the engine process was restarted. This
/// wrapper guarantees the engine reacts to a firing at most once per arming,
/// and clamps deadlines the host rejects as past to `now + 1s`.
pub struct BoundaryTrigger {
    host: Arc<dyn HostAdapter>,
    armed: Option<AlarmHandle>,
    fired: Arc<AtomicBool>,
}

impl BoundaryTrigger {
    pub fn new(host: Arc<dyn HostAdapter>) -> Self {
        Self {
            host,
            armed: None,
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Arm the alarm at `deadline`. Returns the handle when the host accepted
    /// an arming; `None` means enforcement falls back to the in-process tick.
    pub fn arm(&mut self, deadline: DateTime<Local>) -> Option<AlarmHandle> {
        self.cancel();
        self.fired.store(false, Ordering::SeqCst);

        let handle = match self.host.arm_alarm(deadline) {
            Ok(handle) => Some(handle),
            Err(HostError::PastDeadline) => {
                let clamped = tether_util::now() + chrono::Duration::seconds(1);
                warn!(
                    deadline = %deadline,
                    "Host rejected deadline as past, clamping to now + 1s"
                );
                match self.host.arm_alarm(clamped) {
                    Ok(handle) => Some(handle),
                    Err(e) => {
                        error!(error = %e, "Failed to arm clamped boundary alarm");
                        None
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to arm boundary alarm");
                None
            }
        };

        self.armed = handle;
        handle
    }

    /// Cancel the current arming, if any
    pub fn cancel(&mut self) {
        if let Some(handle) = self.armed.take()
            && let Err(e) = self.host.cancel_alarm(&handle)
        {
            warn!(error = %e, "Failed to cancel boundary alarm");
        }
    }

    /// Claim a firing of `alarm`. Returns `true` exactly once per arming, and
    /// only for the currently armed handle.
    pub fn claim_fire(&self, alarm: &AlarmHandle) -> bool {
        match self.armed {
            Some(armed) if armed == *alarm => !self.fired.swap(true, Ordering::SeqCst),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_host_api::MockHost;

    #[test]
    fn arm_and_cancel() {
        let host = Arc::new(MockHost::new());
        let mut trigger = BoundaryTrigger::new(host.clone());

        let deadline = tether_util::now() + chrono::Duration::minutes(10);
        let handle = trigger.arm(deadline).unwrap();
        assert_eq!(host.armed_alarms().len(), 1);

        assert!(trigger.claim_fire(&handle));
        assert!(!trigger.claim_fire(&handle));

        trigger.cancel();
        assert!(host.armed_alarms().is_empty());
    }

    #[test]
    fn past_deadline_is_clamped() {
        let host = Arc::new(MockHost::new());
        let mut trigger = BoundaryTrigger::new(host.clone());

        let past = tether_util::now() - chrono::Duration::minutes(5);
        let handle = trigger.arm(past);
        assert!(handle.is_some());

        let alarms = host.armed_alarms();
        assert_eq!(alarms.len(), 1);
        assert!(alarms[0].1 > tether_util::now());
    }

    #[test]
    fn rearming_resets_the_fired_latch() {
        let host = Arc::new(MockHost::new());
        let mut trigger = BoundaryTrigger::new(host.clone());

        let deadline = tether_util::now() + chrono::Duration::minutes(10);
        let first = trigger.arm(deadline).unwrap();
        assert!(trigger.claim_fire(&first));

        let second = trigger.arm(deadline).unwrap();
        // The stale handle no longer claims anything
        assert!(!trigger.claim_fire(&first));
        assert!(trigger.claim_fire(&second));
    }
}
