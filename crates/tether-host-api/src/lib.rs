//! Host adapter interfaces for tether
//!
//! The engine talks to the platform exclusively through the [`HostAdapter`]
//! trait: foreground observation, refocus actuation, keep-alive tokens, and
//! wake-capable boundary alarms. [`PermissionStatusProvider`] reports which
//! of those capabilities are currently granted. [`MockHost`] implements both
//! for tests and the simulated dev loop.

mod capabilities;
mod handle;
mod mock;
mod traits;

pub use capabilities::*;
pub use handle::*;
pub use mock::*;
pub use traits::*;
