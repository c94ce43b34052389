//! Shared types for the tether confinement engine
//!
//! This crate defines the stable vocabulary used across the engine and its
//! collaborators:
//! - Protection tiers and confinement modes
//! - Observer events and bring-back decisions
//! - Session snapshots
//! - Engine events (engine -> UI binding)

mod events;
mod types;

pub use events::*;
pub use types::*;
