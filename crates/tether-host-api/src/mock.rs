//! Mock host adapter for testing

use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tether_util::AppId;
use tokio::sync::mpsc;

use crate::{
    AlarmHandle, CapabilitySet, HostAdapter, HostError, HostEvent, HostResult, KeepAliveToken,
    MAX_KEEP_ALIVE, PermissionStatusProvider, RefocusMethod,
};

/// Mock host adapter for unit/integration testing and the simulated dev loop.
///
/// Refocus methods record their invocation and, on success, actually move the
/// requested app to the foreground so tests observe the full loop.
pub struct MockHost {
    capabilities: CapabilitySet,
    granted: Arc<Mutex<CapabilitySet>>,
    foreground: Arc<Mutex<AppId>>,
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<HostEvent>>>>,

    next_alarm_id: AtomicU64,
    alarms: Arc<Mutex<HashMap<u64, DateTime<Local>>>>,

    active_keep_alives: Arc<AtomicU64>,
    keep_alive_grants: Arc<Mutex<Vec<Duration>>>,

    refocus_log: Arc<Mutex<Vec<(RefocusMethod, AppId)>>>,

    /// Configure the primary foreground query to fail
    pub fail_primary_query: Arc<AtomicBool>,

    /// Configure the fallback foreground query to fail
    pub fail_fallback_query: Arc<AtomicBool>,

    /// Configure bring-to-front to fail
    pub fail_bring_to_front: Arc<AtomicBool>,

    /// Configure move-task-to-front to fail
    pub fail_move_to_front: Arc<AtomicBool>,

    /// Configure relaunch to fail
    pub fail_relaunch: Arc<AtomicBool>,
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            capabilities: CapabilitySet::all(),
            granted: Arc::new(Mutex::new(CapabilitySet::all())),
            foreground: Arc::new(Mutex::new(AppId::new("launcher"))),
            subscribers: Arc::new(Mutex::new(Vec::new())),
            next_alarm_id: AtomicU64::new(1),
            alarms: Arc::new(Mutex::new(HashMap::new())),
            active_keep_alives: Arc::new(AtomicU64::new(0)),
            keep_alive_grants: Arc::new(Mutex::new(Vec::new())),
            refocus_log: Arc::new(Mutex::new(Vec::new())),
            fail_primary_query: Arc::new(AtomicBool::new(false)),
            fail_fallback_query: Arc::new(AtomicBool::new(false)),
            fail_bring_to_front: Arc::new(AtomicBool::new(false)),
            fail_move_to_front: Arc::new(AtomicBool::new(false)),
            fail_relaunch: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_capabilities(mut self, caps: CapabilitySet) -> Self {
        self.capabilities = caps;
        self
    }

    /// Adjust the grants reported through [`PermissionStatusProvider`]
    pub fn set_granted(&self, granted: CapabilitySet) {
        *self.granted.lock().unwrap() = granted;
    }

    /// Change the foreground app and notify event subscribers
    pub fn set_foreground(&self, app: AppId) {
        *self.foreground.lock().unwrap() = app.clone();
        self.broadcast(HostEvent::ForegroundChanged {
            app,
            timestamp: tether_util::now(),
        });
    }

    /// Current foreground identity, without going through the adapter API
    pub fn foreground(&self) -> AppId {
        self.foreground.lock().unwrap().clone()
    }

    /// All refocus attempts so far, in order
    pub fn refocus_attempts(&self) -> Vec<(RefocusMethod, AppId)> {
        self.refocus_log.lock().unwrap().clone()
    }

    /// Number of keep-alive tokens currently held
    pub fn active_keep_alives(&self) -> u64 {
        self.active_keep_alives.load(Ordering::SeqCst)
    }

    /// Durations actually granted to keep-alive acquisitions
    pub fn keep_alive_grants(&self) -> Vec<Duration> {
        self.keep_alive_grants.lock().unwrap().clone()
    }

    /// Currently armed alarms as (handle id, deadline)
    pub fn armed_alarms(&self) -> Vec<(u64, DateTime<Local>)> {
        let mut alarms: Vec<_> = self
            .alarms
            .lock()
            .unwrap()
            .iter()
            .map(|(id, at)| (*id, *at))
            .collect();
        alarms.sort_by_key(|(id, _)| *id);
        alarms
    }

    /// Deliver an alarm firing to subscribers, as the platform would
    pub fn fire_alarm(&self, alarm: AlarmHandle) {
        if self.alarms.lock().unwrap().remove(&alarm.id()).is_some() {
            self.broadcast(HostEvent::AlarmFired { alarm });
        }
    }

    fn broadcast(&self, event: HostEvent) {
        self.subscribers
            .lock()
            .unwrap()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostAdapter for MockHost {
    fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<HostEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().unwrap().push(tx);
        rx
    }

    async fn foreground_app(&self) -> HostResult<AppId> {
        if self.fail_primary_query.load(Ordering::SeqCst) {
            return Err(HostError::Unavailable("mock primary query".into()));
        }
        Ok(self.foreground())
    }

    async fn foreground_app_fallback(&self) -> HostResult<AppId> {
        if self.fail_fallback_query.load(Ordering::SeqCst) {
            return Err(HostError::Unavailable("mock fallback query".into()));
        }
        Ok(self.foreground())
    }

    async fn bring_to_front(&self, app: &AppId) -> HostResult<()> {
        self.refocus_log
            .lock()
            .unwrap()
            .push((RefocusMethod::BringToFront, app.clone()));
        if self.fail_bring_to_front.load(Ordering::SeqCst) {
            return Err(HostError::RefocusFailed("mock bring-to-front".into()));
        }
        self.set_foreground(app.clone());
        Ok(())
    }

    async fn move_task_to_front(&self, app: &AppId) -> HostResult<()> {
        self.refocus_log
            .lock()
            .unwrap()
            .push((RefocusMethod::MoveTaskToFront, app.clone()));
        if self.fail_move_to_front.load(Ordering::SeqCst) {
            return Err(HostError::RefocusFailed("mock move-task-to-front".into()));
        }
        self.set_foreground(app.clone());
        Ok(())
    }

    async fn relaunch(&self, app: &AppId) -> HostResult<()> {
        self.refocus_log
            .lock()
            .unwrap()
            .push((RefocusMethod::Relaunch, app.clone()));
        if self.fail_relaunch.load(Ordering::SeqCst) {
            return Err(HostError::RelaunchFailed("mock relaunch".into()));
        }
        self.set_foreground(app.clone());
        Ok(())
    }

    fn acquire_keep_alive(&self, requested: Duration) -> HostResult<KeepAliveToken> {
        let granted = requested.min(MAX_KEEP_ALIVE);
        self.keep_alive_grants.lock().unwrap().push(granted);
        self.active_keep_alives.fetch_add(1, Ordering::SeqCst);

        let counter = self.active_keep_alives.clone();
        Ok(KeepAliveToken::new(granted, move || {
            counter.fetch_sub(1, Ordering::SeqCst);
        }))
    }

    fn arm_alarm(&self, at: DateTime<Local>) -> HostResult<AlarmHandle> {
        if at <= tether_util::now() {
            return Err(HostError::PastDeadline);
        }
        let id = self.next_alarm_id.fetch_add(1, Ordering::SeqCst);
        self.alarms.lock().unwrap().insert(id, at);
        Ok(AlarmHandle::new(id))
    }

    fn cancel_alarm(&self, alarm: &AlarmHandle) -> HostResult<()> {
        self.alarms.lock().unwrap().remove(&alarm.id());
        Ok(())
    }
}

impl PermissionStatusProvider for MockHost {
    fn granted(&self) -> CapabilitySet {
        *self.granted.lock().unwrap()
    }
}
