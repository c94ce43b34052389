//! Shared utilities for tether
//!
//! This crate provides:
//! - ID types (AppId, SessionId)
//! - Time utilities (monotonic time, wall-clock windows)
//! - Error types
//! - Actuation throttling
//! - Default paths for configuration

mod error;
mod ids;
mod paths;
mod throttle;
mod time;

pub use error::*;
pub use ids::*;
pub use paths::*;
pub use throttle::*;
pub use time::*;
