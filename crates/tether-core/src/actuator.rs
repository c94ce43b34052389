//! Bring-back decision and actuation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tether_api::{BringBackDecision, BringBackReason, ObserverEvent};
use tether_host_api::HostAdapter;
use tether_util::{ActionThrottle, AppId};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Consecutive shell-surface detections tolerated before acting.
/// Allows brief legitimate overlays such as pulling down the status bar.
pub const SHELL_TOLERANCE: u8 = 3;

/// Triggers within this window collapse into one scheduled actuation
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(150);

/// Minimum gap between two actual refocus actions
pub const MIN_ACTION_GAP: Duration = Duration::from_millis(100);

/// Decides whether a foreground observation warrants a bring-back.
///
/// Pure state machine over consecutive observations; actual actuation is the
/// [`ActuationScheduler`]'s job.
#[derive(Debug)]
pub struct BringBackActuator {
    target: AppId,
    allowed: Vec<AppId>,
    shell_surfaces: Vec<AppId>,
    shell_streak: u8,
}

impl BringBackActuator {
    pub fn new(target: AppId, allowed: Vec<AppId>, shell_surfaces: Vec<AppId>) -> Self {
        Self {
            target,
            allowed,
            shell_surfaces,
            shell_streak: 0,
        }
    }

    pub fn should_bring_back(&mut self, current: &AppId) -> BringBackDecision {
        if *current == self.target {
            self.shell_streak = 0;
            return Self::pass(BringBackReason::OnTarget);
        }

        if self.allowed.contains(current) {
            self.shell_streak = 0;
            return Self::pass(BringBackReason::AllowListed);
        }

        if self.shell_surfaces.contains(current) {
            self.shell_streak = self.shell_streak.saturating_add(1);
            if self.shell_streak <= SHELL_TOLERANCE {
                return Self::pass(BringBackReason::ShellTolerated);
            }
            return Self::act(BringBackReason::ShellPersistent);
        }

        self.shell_streak = 0;
        Self::act(BringBackReason::LeftTarget)
    }

    fn pass(reason: BringBackReason) -> BringBackDecision {
        BringBackDecision {
            should_act: false,
            reason,
            debounce: Duration::ZERO,
        }
    }

    fn act(reason: BringBackReason) -> BringBackDecision {
        BringBackDecision {
            should_act: true,
            reason,
            debounce: DEBOUNCE_WINDOW,
        }
    }
}

/// Coalesces bring-back triggers and performs the escalating actuation.
///
/// Triggers within the debounce window cancel-and-reschedule one pending
/// action, so two concurrent observers produce a single refocus. Actual
/// refocus actions are additionally gated by [`MIN_ACTION_GAP`]. `stop()`
/// only prevents future actuations from being scheduled; an actuation that
/// already started runs to completion.
pub struct ActuationScheduler {
    host: Arc<dyn HostAdapter>,
    target: AppId,
    throttle: Mutex<ActionThrottle>,
    pending: Mutex<Option<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl ActuationScheduler {
    pub fn new(host: Arc<dyn HostAdapter>, target: AppId) -> Arc<Self> {
        Arc::new(Self {
            host,
            target,
            throttle: Mutex::new(ActionThrottle::new(MIN_ACTION_GAP)),
            pending: Mutex::new(None),
            stopped: AtomicBool::new(false),
        })
    }

    /// Schedule an actuation after `delay`, replacing any still-pending one
    pub fn schedule(self: &Arc<Self>, delay: Duration) {
        if self.stopped.load(Ordering::SeqCst) {
            return;
        }

        let mut pending = self.pending.lock().unwrap();
        if let Some(previous) = pending.take() {
            previous.abort();
        }

        let this = self.clone();
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if this.stopped.load(Ordering::SeqCst) {
                return;
            }
            // Leave the pending slot before acting: from here on the
            // actuation is no longer cancellable.
            *this.pending.lock().unwrap() = None;
            if !this.throttle.lock().unwrap().try_acquire() {
                debug!("Refocus throttled, next observation will retry");
                return;
            }
            this.perform().await;
        }));
    }

    /// No new actuations after this; a running one completes on its own
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        if let Some(pending) = self.pending.lock().unwrap().take() {
            pending.abort();
        }
    }

    async fn perform(&self) {
        match self.host.bring_to_front(&self.target).await {
            Ok(()) => {
                debug!(target_app = %self.target, "Brought target to front");
                return;
            }
            Err(e) => {
                warn!(error = %e, "Bring-to-front failed, trying move-task-to-front");
            }
        }

        match self.host.move_task_to_front(&self.target).await {
            Ok(()) => {
                debug!(target_app = %self.target, "Moved target task to front");
                return;
            }
            Err(e) => {
                warn!(error = %e, "Move-task-to-front failed, relaunching target");
            }
        }

        match self.host.relaunch(&self.target).await {
            Ok(()) => debug!(target_app = %self.target, "Relaunched target"),
            Err(e) => {
                // Never fatal: the next observer tick retries.
                error!(error = %e, "All refocus paths failed, waiting for next observation");
            }
        }
    }
}

/// The single decision function both observers feed into.
///
/// Observers lock it per event; it never touches session state.
pub struct DecisionPipeline {
    actuator: BringBackActuator,
    scheduler: Arc<ActuationScheduler>,
}

impl DecisionPipeline {
    pub fn new(actuator: BringBackActuator, scheduler: Arc<ActuationScheduler>) -> Self {
        Self { actuator, scheduler }
    }

    pub fn observe(&mut self, event: &ObserverEvent) {
        let decision = self.actuator.should_bring_back(&event.app);
        if decision.should_act {
            debug!(
                app = %event.app,
                kind = ?event.kind,
                reason = ?decision.reason,
                "Scheduling bring-back"
            );
            self.scheduler.schedule(decision.debounce);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_host_api::{MockHost, RefocusMethod};

    fn make_actuator() -> BringBackActuator {
        BringBackActuator::new(
            AppId::new("org.example.reader"),
            vec![AppId::new("org.example.dictionary")],
            vec![AppId::new("systemui"), AppId::new("launcher")],
        )
    }

    #[test]
    fn target_never_triggers() {
        let mut actuator = make_actuator();
        let decision = actuator.should_bring_back(&AppId::new("org.example.reader"));
        assert!(!decision.should_act);
        assert_eq!(decision.reason, BringBackReason::OnTarget);
    }

    #[test]
    fn allow_listed_never_triggers() {
        let mut actuator = make_actuator();
        let decision = actuator.should_bring_back(&AppId::new("org.example.dictionary"));
        assert!(!decision.should_act);
        assert_eq!(decision.reason, BringBackReason::AllowListed);
    }

    #[test]
    fn shell_surface_tolerated_three_times() {
        let mut actuator = make_actuator();
        let shell = AppId::new("systemui");

        for _ in 0..3 {
            let decision = actuator.should_bring_back(&shell);
            assert!(!decision.should_act);
            assert_eq!(decision.reason, BringBackReason::ShellTolerated);
        }

        let fourth = actuator.should_bring_back(&shell);
        assert!(fourth.should_act);
        assert_eq!(fourth.reason, BringBackReason::ShellPersistent);
    }

    #[test]
    fn target_resets_shell_streak() {
        let mut actuator = make_actuator();
        let shell = AppId::new("systemui");

        for _ in 0..3 {
            assert!(!actuator.should_bring_back(&shell).should_act);
        }
        actuator.should_bring_back(&AppId::new("org.example.reader"));

        // Streak restarted: three more detections pass again
        for _ in 0..3 {
            assert!(!actuator.should_bring_back(&shell).should_act);
        }
        assert!(actuator.should_bring_back(&shell).should_act);
    }

    #[test]
    fn unknown_app_acts_immediately() {
        let mut actuator = make_actuator();
        let decision = actuator.should_bring_back(&AppId::new("org.example.game"));
        assert!(decision.should_act);
        assert_eq!(decision.reason, BringBackReason::LeftTarget);
        assert_eq!(decision.debounce, DEBOUNCE_WINDOW);
    }

    #[tokio::test]
    async fn coalesced_triggers_yield_one_actuation() {
        let host = Arc::new(MockHost::new());
        host.set_foreground(AppId::new("intruder"));
        let scheduler = ActuationScheduler::new(host.clone(), AppId::new("org.example.reader"));

        // Two observers report within the debounce window
        scheduler.schedule(DEBOUNCE_WINDOW);
        scheduler.schedule(DEBOUNCE_WINDOW);

        tokio::time::sleep(DEBOUNCE_WINDOW + Duration::from_millis(100)).await;
        assert_eq!(host.refocus_attempts().len(), 1);
    }

    #[tokio::test]
    async fn escalation_falls_through_to_relaunch() {
        let host = Arc::new(MockHost::new());
        host.fail_bring_to_front.store(true, Ordering::SeqCst);
        host.fail_move_to_front.store(true, Ordering::SeqCst);

        let scheduler = ActuationScheduler::new(host.clone(), AppId::new("org.example.reader"));
        scheduler.schedule(Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(100)).await;

        let methods: Vec<RefocusMethod> =
            host.refocus_attempts().into_iter().map(|(m, _)| m).collect();
        assert_eq!(
            methods,
            vec![
                RefocusMethod::BringToFront,
                RefocusMethod::MoveTaskToFront,
                RefocusMethod::Relaunch
            ]
        );
        assert_eq!(host.foreground(), AppId::new("org.example.reader"));
    }

    #[tokio::test]
    async fn all_paths_failing_is_not_fatal() {
        let host = Arc::new(MockHost::new());
        host.fail_bring_to_front.store(true, Ordering::SeqCst);
        host.fail_move_to_front.store(true, Ordering::SeqCst);
        host.fail_relaunch.store(true, Ordering::SeqCst);

        let scheduler = ActuationScheduler::new(host.clone(), AppId::new("org.example.reader"));
        scheduler.schedule(Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(host.refocus_attempts().len(), 3);

        // Still schedulable afterwards
        tokio::time::sleep(MIN_ACTION_GAP).await;
        scheduler.schedule(Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(host.refocus_attempts().len(), 6);
    }

    #[tokio::test]
    async fn stop_prevents_future_actuations() {
        let host = Arc::new(MockHost::new());
        let scheduler = ActuationScheduler::new(host.clone(), AppId::new("org.example.reader"));

        scheduler.schedule(Duration::from_millis(50));
        scheduler.stop();
        scheduler.schedule(Duration::ZERO);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(host.refocus_attempts().is_empty());
    }
}
