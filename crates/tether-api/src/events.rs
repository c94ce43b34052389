//! Events emitted by the engine for UI binding

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tether_util::{AppId, SessionId};

use crate::{EndReason, ProtectionTier};

/// Events emitted by the confinement controller
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Confinement started
    Started {
        session_id: SessionId,
        target: AppId,
        deadline: DateTime<Local>,
        effective_tier: ProtectionTier,
    },

    /// The configured end-of-window warning threshold was reached
    EndWarning {
        session_id: SessionId,
        time_remaining: Duration,
    },

    /// Confinement ended. Emitted exactly once per session.
    Stopped {
        session_id: SessionId,
        reason: EndReason,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopped_event_serialization() {
        let event = EngineEvent::Stopped {
            session_id: SessionId::new(),
            reason: EndReason::BoundaryReached,
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("stopped"));
        assert!(json.contains("boundary_reached"));
    }
}
