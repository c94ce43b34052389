//! Host adapter traits

use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::time::Duration;
use thiserror::Error;
use tether_util::AppId;
use tokio::sync::mpsc;

use crate::{AlarmHandle, CapabilitySet, KeepAliveToken};

/// Errors from host adapter operations
#[derive(Debug, Error)]
pub enum HostError {
    /// The queried mechanism is not usable right now (missing permission,
    /// service not running). Callers fall back or retry on the next tick.
    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Refocus failed: {0}")]
    RefocusFailed(String),

    #[error("Relaunch failed: {0}")]
    RelaunchFailed(String),

    /// The scheduling primitive rejected a deadline in the past
    #[error("Alarm deadline is in the past")]
    PastDeadline,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type HostResult<T> = Result<T, HostError>;

/// Which actuation path was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefocusMethod {
    /// Bring-to-front with reorder and reset-if-needed semantics
    BringToFront,
    /// Move an existing task to the front without resetting it
    MoveTaskToFront,
    /// Cold relaunch of the target
    Relaunch,
}

/// Events pushed by the host adapter
#[derive(Debug, Clone)]
pub enum HostEvent {
    /// The foreground app changed (low-latency notification path)
    ForegroundChanged {
        app: AppId,
        timestamp: DateTime<Local>,
    },

    /// A wake-capable alarm fired
    AlarmFired { alarm: AlarmHandle },
}

/// Host adapter trait - implemented by platform-specific adapters.
///
/// The alarm side is deliberately process-independent: a conforming host
/// persists armed alarms and re-delivers `AlarmFired` even when the engine
/// process was killed and restarted in the interim.
#[async_trait]
pub trait HostAdapter: Send + Sync {
    /// What this adapter can do on this platform
    fn capabilities(&self) -> CapabilitySet;

    /// Subscribe to host events. Each call returns an independent stream.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<HostEvent>;

    /// Current foreground identity, primary mechanism
    async fn foreground_app(&self) -> HostResult<AppId>;

    /// Current foreground identity, fallback mechanism for when the primary
    /// is unavailable (e.g. usage-stats query instead of the task list)
    async fn foreground_app_fallback(&self) -> HostResult<AppId>;

    /// Primary refocus: bring-to-front with reorder + reset-if-needed
    async fn bring_to_front(&self, app: &AppId) -> HostResult<()>;

    /// Secondary refocus: move an existing task to the front
    async fn move_task_to_front(&self, app: &AppId) -> HostResult<()>;

    /// Tertiary refocus: cold relaunch of the target
    async fn relaunch(&self, app: &AppId) -> HostResult<()>;

    /// Acquire a keep-alive grant. The host clamps the request to
    /// [`crate::MAX_KEEP_ALIVE`].
    fn acquire_keep_alive(&self, requested: Duration) -> HostResult<KeepAliveToken>;

    /// Arm a wake-capable one-shot alarm. Rejects past deadlines with
    /// [`HostError::PastDeadline`]; the caller clamps and retries.
    fn arm_alarm(&self, at: DateTime<Local>) -> HostResult<AlarmHandle>;

    /// Cancel a previously armed alarm. Cancelling an already-fired alarm is
    /// not an error.
    fn cancel_alarm(&self, alarm: &AlarmHandle) -> HostResult<()>;
}
