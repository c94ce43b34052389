//! Host capability model

use tether_api::ProtectionTier;

bitflags::bitflags! {
    /// What a host adapter can do, or what is currently permitted.
    ///
    /// The effective capability set for a session is the intersection of the
    /// adapter's abilities and the grants reported by the
    /// [`PermissionStatusProvider`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CapabilitySet: u16 {
        /// Low-latency foreground-change notifications
        const FOREGROUND_EVENTS = 1 << 0;
        /// Foreground identity can be queried on demand
        const FOREGROUND_POLL   = 1 << 1;
        /// Existing tasks can be refocused
        const REFOCUS           = 1 << 2;
        /// The target can be cold-relaunched
        const RELAUNCH          = 1 << 3;
        /// Navigation/hardware keys can be swallowed
        const KEY_INTERCEPT     = 1 << 4;
        /// Keep-alive tokens are honored
        const KEEP_ALIVE        = 1 << 5;
        /// Wake-capable one-shot alarms are honored
        const BOUNDARY_ALARM    = 1 << 6;
    }
}

impl CapabilitySet {
    /// Capabilities a tier needs from its observers.
    ///
    /// Basic runs without observation, Standard needs the event stream, and
    /// Maximum additionally needs on-demand polling.
    pub fn required_for(tier: ProtectionTier) -> CapabilitySet {
        match tier {
            ProtectionTier::Basic => CapabilitySet::empty(),
            ProtectionTier::Standard => CapabilitySet::FOREGROUND_EVENTS,
            ProtectionTier::Maximum => {
                CapabilitySet::FOREGROUND_EVENTS | CapabilitySet::FOREGROUND_POLL
            }
        }
    }

    /// Whether this set satisfies the given tier's observer requirements
    pub fn supports_tier(self, tier: ProtectionTier) -> bool {
        self.contains(Self::required_for(tier))
    }
}

/// Reports which capabilities are currently granted by the platform.
///
/// Replaces ad-hoc string parsing of OS settings with a typed query.
pub trait PermissionStatusProvider: Send + Sync {
    fn granted(&self) -> CapabilitySet;
}

/// Fixed-grant provider for tests and the simulated dev loop
#[derive(Debug, Clone)]
pub struct StaticPermissions(CapabilitySet);

impl StaticPermissions {
    pub fn new(granted: CapabilitySet) -> Self {
        Self(granted)
    }

    pub fn all() -> Self {
        Self(CapabilitySet::all())
    }
}

impl PermissionStatusProvider for StaticPermissions {
    fn granted(&self) -> CapabilitySet {
        self.0
    }
}
