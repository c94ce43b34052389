//! Navigation/hardware key interception

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use tether_api::{BlockedInput, NavKey};

/// Decides whether a navigation/hardware key should be swallowed.
///
/// The host input pipeline calls [`handle_key`](KeyInterceptor::handle_key)
/// on its own threads, so the interceptor is lock-free: an active flag plus
/// the blocked-input bits, both atomics. Keys always pass through while no
/// confinement is active.
#[derive(Debug, Default)]
pub struct KeyInterceptor {
    active: AtomicBool,
    flags: AtomicU8,
}

impl KeyInterceptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn activate(&self, blocked: BlockedInput) {
        self.flags.store(blocked.bits(), Ordering::Release);
        self.active.store(true, Ordering::Release);
    }

    pub(crate) fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Returns `true` if the key must be swallowed
    pub fn handle_key(&self, key: NavKey) -> bool {
        if !self.active.load(Ordering::Acquire) {
            return false;
        }
        BlockedInput::from_bits_truncate(self.flags.load(Ordering::Acquire)).contains(key.flag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_passes_everything() {
        let interceptor = KeyInterceptor::new();

        assert!(!interceptor.handle_key(NavKey::Back));
        assert!(!interceptor.handle_key(NavKey::Home));
        assert!(!interceptor.handle_key(NavKey::Power));
    }

    #[test]
    fn active_swallows_flagged_keys_only() {
        let interceptor = KeyInterceptor::new();
        interceptor.activate(BlockedInput::BACK | BlockedInput::HOME);

        assert!(interceptor.handle_key(NavKey::Back));
        assert!(interceptor.handle_key(NavKey::Home));
        assert!(!interceptor.handle_key(NavKey::Recents));
        assert!(!interceptor.handle_key(NavKey::Power));
        assert!(!interceptor.handle_key(NavKey::NotificationShade));
    }

    #[test]
    fn deactivate_restores_passthrough() {
        let interceptor = KeyInterceptor::new();
        interceptor.activate(BlockedInput::all());
        assert!(interceptor.handle_key(NavKey::Back));

        interceptor.deactivate();
        assert!(!interceptor.handle_key(NavKey::Back));
    }
}
