//! Confinement controller
//!
//! The single owner of session state. Everything that mutates a
//! [`ConfinementSession`] goes through the controller; observers and the
//! actuation scheduler only ever feed the decision pipeline.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use tether_api::{ConfinementMode, EndReason, EngineEvent, ProtectionTier, SessionInfo};
use tether_config::ConfinementPolicy;
use tether_host_api::{
    CapabilitySet, HostAdapter, HostEvent, KeepAliveToken, PermissionStatusProvider,
};
use tether_util::{AppId, MonotonicInstant, Result, SessionId, TetherError};
use tokio::sync::{Mutex, broadcast, watch};
use tracing::{debug, info, warn};

use crate::{
    ActuationScheduler, BoundaryTrigger, BringBackActuator, ConfinementSession, DecisionPipeline,
    EventDrivenObserver, KeyInterceptor, PollingObserver, evaluator,
};

/// Countdown tick period
const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Re-check the window every this many countdown ticks
const WINDOW_RECHECK_TICKS: u64 = 60;

/// Slack added to the keep-alive request beyond the session length
const KEEP_ALIVE_MARGIN: Duration = Duration::from_secs(60);

/// State published to UI collaborators via the watch stream
#[derive(Debug, Clone)]
pub struct EngineState {
    pub active: bool,
    pub policy: Option<Arc<ConfinementPolicy>>,
}

/// Session resources torn down together on stop
struct ActiveConfinement {
    session: ConfinementSession,
    policy: Arc<ConfinementPolicy>,
    boundary: BoundaryTrigger,
    scheduler: Arc<ActuationScheduler>,
    shutdown_tx: watch::Sender<bool>,
    /// Released on drop, on every stop path
    _keep_alive: Option<KeepAliveToken>,
}

struct Inner {
    host: Arc<dyn HostAdapter>,
    permissions: Arc<dyn PermissionStatusProvider>,
    interceptor: Arc<KeyInterceptor>,
    session: Mutex<Option<ActiveConfinement>>,
    events_tx: broadcast::Sender<EngineEvent>,
    state_tx: watch::Sender<EngineState>,
    remaining_tx: watch::Sender<Option<u64>>,
}

/// Orchestrates confinement: `Idle -> Active -> (Ending) -> Idle`.
///
/// One controller instance per target per process, owned and injected by the
/// host shell. There are no ambient statics.
pub struct ConfinementController {
    inner: Arc<Inner>,
}

impl ConfinementController {
    pub fn new(
        host: Arc<dyn HostAdapter>,
        permissions: Arc<dyn PermissionStatusProvider>,
    ) -> Self {
        let (events_tx, _) = broadcast::channel(32);
        let (state_tx, _) = watch::channel(EngineState {
            active: false,
            policy: None,
        });
        let (remaining_tx, _) = watch::channel(None);

        Self {
            inner: Arc::new(Inner {
                host,
                permissions,
                interceptor: Arc::new(KeyInterceptor::new()),
                session: Mutex::new(None),
                events_tx,
                state_tx,
                remaining_tx,
            }),
        }
    }

    /// Start confinement of `target` under `policy`.
    ///
    /// Fails with [`TetherError::AlreadyActive`] when a session is running
    /// (the caller must `stop()` first) and with [`TetherError::Disabled`]
    /// for a disabled policy. Missing observer capability never fails the
    /// start; the session runs at the best available tier.
    pub async fn start(&self, policy: Arc<ConfinementPolicy>, target: AppId) -> Result<SessionId> {
        let inner = &self.inner;
        let mut guard = inner.session.lock().await;
        if guard.is_some() {
            return Err(TetherError::AlreadyActive);
        }
        if !policy.enabled {
            return Err(TetherError::Disabled);
        }

        let now = tether_util::now();
        let now_mono = MonotonicInstant::now();
        let deadline = evaluator::deadline_for(&policy, now)?;

        let available = inner.host.capabilities() & inner.permissions.granted();
        let effective_tier = effective_tier_for(policy.protection_tier, available);
        if effective_tier < policy.protection_tier {
            warn!(
                configured = ?policy.protection_tier,
                effective = ?effective_tier,
                "Observer capability unavailable, running downgraded"
            );
        }

        let session =
            ConfinementSession::new(target.clone(), effective_tier, now, now_mono, deadline);
        let session_id = session.session_id.clone();

        let keep_alive_request = deadline
            .signed_duration_since(now)
            .to_std()
            .unwrap_or(Duration::ZERO)
            + KEEP_ALIVE_MARGIN;
        let keep_alive = match inner.host.acquire_keep_alive(keep_alive_request) {
            Ok(token) => {
                debug!(granted_secs = token.granted().as_secs(), "Keep-alive acquired");
                Some(token)
            }
            Err(e) => {
                warn!(error = %e, "Keep-alive unavailable, enforcement may pause while the host sleeps");
                None
            }
        };

        let mut boundary = BoundaryTrigger::new(inner.host.clone());
        boundary.arm(deadline);

        let scheduler = ActuationScheduler::new(inner.host.clone(), target.clone());
        let actuator = BringBackActuator::new(
            target.clone(),
            policy.allowed_apps.clone(),
            policy.shell_surfaces.clone(),
        );
        let pipeline = Arc::new(StdMutex::new(DecisionPipeline::new(
            actuator,
            scheduler.clone(),
        )));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        if effective_tier >= ProtectionTier::Standard {
            EventDrivenObserver::spawn(inner.host.clone(), pipeline.clone(), shutdown_rx.clone());
        }
        if effective_tier == ProtectionTier::Maximum {
            PollingObserver::spawn(
                inner.host.clone(),
                pipeline.clone(),
                policy.polling_cadence.interval(),
                shutdown_rx.clone(),
            );
        }

        spawn_boundary_watch(inner.clone(), shutdown_rx.clone());
        spawn_ticks(inner.clone(), shutdown_rx);

        inner.interceptor.activate(policy.blocked_input);

        info!(
            session_id = %session_id,
            target_app = %target,
            deadline = %deadline,
            tier = ?effective_tier,
            "Confinement started"
        );

        let _ = inner.events_tx.send(EngineEvent::Started {
            session_id: session_id.clone(),
            target,
            deadline,
            effective_tier,
        });
        let _ = inner.state_tx.send(EngineState {
            active: true,
            policy: Some(policy.clone()),
        });
        let _ = inner
            .remaining_tx
            .send(Some(session.time_remaining(now_mono).as_millis() as u64));

        *guard = Some(ActiveConfinement {
            session,
            policy,
            boundary,
            scheduler,
            shutdown_tx,
            _keep_alive: keep_alive,
        });

        Ok(session_id)
    }

    /// Stop the current session. Idempotent: a second call is a no-op and
    /// emits nothing.
    pub async fn stop(&self, reason: EndReason) {
        self.inner.stop(reason).await;
    }

    /// Verify an emergency-exit attempt.
    ///
    /// Only valid while active and when the policy allows emergency exit. A
    /// wrong password leaves state unchanged; there is deliberately no
    /// lockout counter and no backoff. A correct one stops the session.
    pub async fn verify_escape(&self, attempt: &str) -> bool {
        let accepted = {
            let guard = self.inner.session.lock().await;
            match guard.as_ref() {
                Some(active) => {
                    active.policy.emergency.allow_exit
                        && active.policy.emergency.password.as_deref() == Some(attempt)
                }
                None => false,
            }
        };

        if accepted {
            info!("Emergency exit accepted");
            self.inner.stop(EndReason::EmergencyExit).await;
        } else {
            debug!("Emergency exit rejected");
        }
        accepted
    }

    /// Engine events: Started, EndWarning, exactly one Stopped per session
    pub fn events(&self) -> broadcast::Receiver<EngineEvent> {
        self.inner.events_tx.subscribe()
    }

    /// `(is_active, policy)` stream for UI binding
    pub fn state(&self) -> watch::Receiver<EngineState> {
        self.inner.state_tx.subscribe()
    }

    /// Remaining milliseconds, updated about once a second while active
    pub fn remaining_ms(&self) -> watch::Receiver<Option<u64>> {
        self.inner.remaining_tx.subscribe()
    }

    /// Decision consumed by the host's input pipeline
    pub fn interceptor(&self) -> Arc<KeyInterceptor> {
        self.inner.interceptor.clone()
    }

    pub async fn is_active(&self) -> bool {
        self.inner.session.lock().await.is_some()
    }

    pub async fn session_info(&self) -> Option<SessionInfo> {
        self.inner
            .session
            .lock()
            .await
            .as_ref()
            .map(|active| active.session.to_info(MonotonicInstant::now()))
    }
}

impl Inner {
    async fn stop(&self, reason: EndReason) {
        let mut guard = self.session.lock().await;
        let Some(mut active) = guard.take() else {
            debug!("stop() with no active confinement, ignoring");
            return;
        };

        active.session.mark_ending();
        let _ = active.shutdown_tx.send(true);
        active.scheduler.stop();
        active.boundary.cancel();
        self.interceptor.deactivate();

        let _ = self.remaining_tx.send(None);
        let _ = self.state_tx.send(EngineState {
            active: false,
            policy: None,
        });

        info!(
            session_id = %active.session.session_id,
            reason = ?reason,
            duration_secs = active.session.duration_so_far(MonotonicInstant::now()).as_secs(),
            "Confinement stopped"
        );
        let _ = self.events_tx.send(EngineEvent::Stopped {
            session_id: active.session.session_id.clone(),
            reason,
        });

        // Keep-alive token released here when `active` drops
    }

    /// One countdown tick. Returns the end reason when the session must stop.
    async fn tick(&self, recheck_window: bool) -> Option<EndReason> {
        let mut guard = self.session.lock().await;
        let active = guard.as_mut()?;

        let now_mono = MonotonicInstant::now();
        let remaining = active.session.time_remaining(now_mono);
        let _ = self.remaining_tx.send(Some(remaining.as_millis() as u64));

        if let Some(warn_before) = active.policy.warn_before_end
            && active.session.warn_due(now_mono, warn_before)
        {
            active.session.mark_warned();
            info!(
                remaining_secs = remaining.as_secs(),
                "Confinement ending soon"
            );
            let _ = self.events_tx.send(EngineEvent::EndWarning {
                session_id: active.session.session_id.clone(),
                time_remaining: remaining,
            });
        }

        // In-process fallback for the host alarm
        if active.session.is_expired(now_mono) {
            return Some(EndReason::BoundaryReached);
        }

        if recheck_window {
            let now = tether_util::now();
            let closed = match active.policy.mode {
                ConfinementMode::FixedWindow => !evaluator::is_within_window(&active.policy, now),
                ConfinementMode::AccessWindow => {
                    active.policy.access_window_auto_stop
                        && !evaluator::can_enter(&active.policy, now)
                }
                ConfinementMode::Countdown => false,
            };
            if closed {
                return Some(EndReason::WindowClosed);
            }
        }

        None
    }
}

/// Descend the tier ladder until the available capabilities suffice.
/// Basic always suffices, so the result is never above `configured`.
fn effective_tier_for(configured: ProtectionTier, available: CapabilitySet) -> ProtectionTier {
    let mut tier = configured;
    while !available.supports_tier(tier) {
        match tier.downgrade() {
            Some(lower) => tier = lower,
            None => break,
        }
    }
    tier
}

fn spawn_boundary_watch(inner: Arc<Inner>, mut shutdown: watch::Receiver<bool>) {
    let mut events = inner.host.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                event = events.recv() => match event {
                    Some(HostEvent::AlarmFired { alarm }) => {
                        let claimed = {
                            let guard = inner.session.lock().await;
                            guard
                                .as_ref()
                                .map(|active| active.boundary.claim_fire(&alarm))
                                .unwrap_or(false)
                        };
                        if claimed {
                            info!("Boundary alarm fired");
                            inner.stop(EndReason::BoundaryReached).await;
                            break;
                        }
                    }
                    Some(HostEvent::ForegroundChanged { .. }) => {}
                    None => break,
                },
            }
        }
    });
}

fn spawn_ticks(inner: Arc<Inner>, mut shutdown: watch::Receiver<bool>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut ticks: u64 = 0;
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    ticks += 1;
                    let recheck = ticks % WINDOW_RECHECK_TICKS == 0;
                    if let Some(reason) = inner.tick(recheck).await {
                        inner.stop(reason).await;
                        break;
                    }
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_api::{BlockedInput, NavKey};
    use tether_host_api::{MockHost, StaticPermissions};

    fn countdown_policy(minutes: u64) -> Arc<ConfinementPolicy> {
        let mut policy = ConfinementPolicy::disabled();
        policy.enabled = true;
        policy.mode = ConfinementMode::Countdown;
        policy.countdown = Duration::from_secs(minutes * 60);
        policy.protection_tier = ProtectionTier::Standard;
        policy.blocked_input = BlockedInput::BACK | BlockedInput::HOME;
        Arc::new(policy)
    }

    fn make_controller(host: &Arc<MockHost>) -> ConfinementController {
        ConfinementController::new(
            host.clone() as Arc<dyn HostAdapter>,
            Arc::new(StaticPermissions::all()),
        )
    }

    #[tokio::test]
    async fn start_sets_deadline_and_activates() {
        let host = Arc::new(MockHost::new());
        let controller = make_controller(&host);

        let before = tether_util::now();
        controller
            .start(countdown_policy(60), AppId::new("org.example.reader"))
            .await
            .unwrap();

        assert!(controller.is_active().await);
        let info = controller.session_info().await.unwrap();
        let expected = before + chrono::Duration::minutes(60);
        let drift = (info.deadline - expected).num_seconds().abs();
        assert!(drift <= 1, "deadline drift {}s", drift);

        // Keep-alive held, boundary armed, keys intercepted
        assert_eq!(host.active_keep_alives(), 1);
        assert_eq!(host.armed_alarms().len(), 1);
        assert!(controller.interceptor().handle_key(NavKey::Back));

        controller.stop(EndReason::HostRequest).await;
    }

    #[tokio::test]
    async fn second_start_is_rejected() {
        let host = Arc::new(MockHost::new());
        let controller = make_controller(&host);

        controller
            .start(countdown_policy(60), AppId::new("org.example.reader"))
            .await
            .unwrap();

        let err = controller
            .start(countdown_policy(60), AppId::new("org.example.reader"))
            .await
            .unwrap_err();
        assert!(matches!(err, TetherError::AlreadyActive));

        controller.stop(EndReason::HostRequest).await;
    }

    #[tokio::test]
    async fn disabled_policy_is_rejected() {
        let host = Arc::new(MockHost::new());
        let controller = make_controller(&host);

        let err = controller
            .start(
                Arc::new(ConfinementPolicy::disabled()),
                AppId::new("org.example.reader"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TetherError::Disabled));
    }

    #[tokio::test]
    async fn stop_is_idempotent_with_one_notification() {
        let host = Arc::new(MockHost::new());
        let controller = make_controller(&host);
        let mut events = controller.events();

        controller
            .start(countdown_policy(60), AppId::new("org.example.reader"))
            .await
            .unwrap();

        controller.stop(EndReason::HostRequest).await;
        controller.stop(EndReason::HostRequest).await;

        assert!(!controller.is_active().await);
        assert_eq!(host.active_keep_alives(), 0);
        assert!(host.armed_alarms().is_empty());
        assert!(!controller.interceptor().handle_key(NavKey::Back));

        let mut stopped_count = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, EngineEvent::Stopped { .. }) {
                stopped_count += 1;
            }
        }
        assert_eq!(stopped_count, 1);
    }

    #[tokio::test]
    async fn capability_downgrade_records_effective_tier() {
        let host = Arc::new(MockHost::new());
        // Event observation not granted: Standard degrades to Basic
        host.set_granted(CapabilitySet::all() - CapabilitySet::FOREGROUND_EVENTS);
        let controller = ConfinementController::new(
            host.clone() as Arc<dyn HostAdapter>,
            host.clone() as Arc<dyn PermissionStatusProvider>,
        );

        controller
            .start(countdown_policy(60), AppId::new("org.example.reader"))
            .await
            .unwrap();

        let info = controller.session_info().await.unwrap();
        assert_eq!(info.effective_tier, ProtectionTier::Basic);
        // Key interception still active under Basic
        assert!(controller.interceptor().handle_key(NavKey::Back));

        controller.stop(EndReason::HostRequest).await;
    }

    #[tokio::test]
    async fn escape_with_wrong_password_keeps_running() {
        let host = Arc::new(MockHost::new());
        let controller = make_controller(&host);

        let mut policy = (*countdown_policy(60)).clone();
        policy.emergency.allow_exit = true;
        policy.emergency.password = Some("4711".into());
        controller
            .start(Arc::new(policy), AppId::new("org.example.reader"))
            .await
            .unwrap();

        assert!(!controller.verify_escape("0000").await);
        assert!(controller.is_active().await);

        assert!(controller.verify_escape("4711").await);
        assert!(!controller.is_active().await);
    }

    #[tokio::test]
    async fn escape_denied_when_not_allowed() {
        let host = Arc::new(MockHost::new());
        let controller = make_controller(&host);

        controller
            .start(countdown_policy(60), AppId::new("org.example.reader"))
            .await
            .unwrap();

        assert!(!controller.verify_escape("anything").await);
        assert!(controller.is_active().await);

        controller.stop(EndReason::HostRequest).await;
    }

    #[tokio::test]
    async fn boundary_alarm_stops_the_session() {
        let host = Arc::new(MockHost::new());
        let controller = make_controller(&host);
        let mut events = controller.events();

        controller
            .start(countdown_policy(60), AppId::new("org.example.reader"))
            .await
            .unwrap();

        let (alarm_id, _) = host.armed_alarms()[0];
        host.fire_alarm(tether_host_api::AlarmHandle::new(alarm_id));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!controller.is_active().await);

        let mut saw_boundary_stop = false;
        while let Ok(event) = events.try_recv() {
            if matches!(
                event,
                EngineEvent::Stopped {
                    reason: EndReason::BoundaryReached,
                    ..
                }
            ) {
                saw_boundary_stop = true;
            }
        }
        assert!(saw_boundary_stop);
    }

    #[tokio::test]
    async fn restart_after_stop_works() {
        let host = Arc::new(MockHost::new());
        let controller = make_controller(&host);

        controller
            .start(countdown_policy(60), AppId::new("org.example.reader"))
            .await
            .unwrap();
        controller.stop(EndReason::HostRequest).await;

        controller
            .start(countdown_policy(30), AppId::new("org.example.reader"))
            .await
            .unwrap();
        assert!(controller.is_active().await);
        assert_eq!(host.active_keep_alives(), 1);

        controller.stop(EndReason::HostRequest).await;
    }

    #[test]
    fn tier_ladder_descends_to_best_available() {
        let all = CapabilitySet::all();
        assert_eq!(
            effective_tier_for(ProtectionTier::Maximum, all),
            ProtectionTier::Maximum
        );

        let no_poll = all - CapabilitySet::FOREGROUND_POLL;
        assert_eq!(
            effective_tier_for(ProtectionTier::Maximum, no_poll),
            ProtectionTier::Standard
        );

        let no_events = all - CapabilitySet::FOREGROUND_EVENTS;
        assert_eq!(
            effective_tier_for(ProtectionTier::Maximum, no_events),
            ProtectionTier::Basic
        );
        assert_eq!(
            effective_tier_for(ProtectionTier::Standard, no_events),
            ProtectionTier::Basic
        );

        assert_eq!(
            effective_tier_for(ProtectionTier::Basic, CapabilitySet::empty()),
            ProtectionTier::Basic
        );
    }
}
