//! RAII handles for host-managed resources

use std::time::Duration;

/// Hard upper bound on keep-alive grants, independent of configured window
/// length.
pub const MAX_KEEP_ALIVE: Duration = Duration::from_secs(24 * 60 * 60);

/// A bounded-duration grant preventing the host process from being suspended
/// while confinement is active.
///
/// Released on drop, so every exit path of `stop()` releases it.
pub struct KeepAliveToken {
    granted: Duration,
    on_release: Option<Box<dyn FnOnce() + Send>>,
}

impl KeepAliveToken {
    pub fn new(granted: Duration, on_release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            granted,
            on_release: Some(Box::new(on_release)),
        }
    }

    /// The duration the host actually granted (never above [`MAX_KEEP_ALIVE`])
    pub fn granted(&self) -> Duration {
        self.granted
    }
}

impl Drop for KeepAliveToken {
    fn drop(&mut self) {
        if let Some(release) = self.on_release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for KeepAliveToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeepAliveToken")
            .field("granted", &self.granted)
            .finish()
    }
}

/// Identifies a wake-capable one-shot alarm armed through the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AlarmHandle(u64);

impl AlarmHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}
