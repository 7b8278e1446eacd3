//! The per-session connection record and its two state axes.
//!
//! Each connection moves along two independent axes:
//!
//! ```text
//! identity phase:   Anonymous ──claim──► Named          (one-way)
//!
//! activity state:   Resting ◄──Stop──┐
//!                      │             │
//!                    Start         Stop
//!                      ▼             │
//!                   Working ──Pause──► OnBreak
//!                      ▲                 │
//!                      └──────Start──────┘
//! ```
//!
//! Any transition target is reachable from any state; applying the current
//! state again is a no-op.  Only named connections may change activity.

use serde::{Serialize, Serializer};
use uuid::Uuid;

/// Transport-assigned identifier of a live session.
///
/// Generated with `Uuid::new_v4()` at accept time, so ids are never reused
/// while a session is alive.
pub type ConnectionId = Uuid;

/// User-visible presence status.
///
/// Serialized on the wire as its integer code (`0`, `1`, `2`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ActivityState {
    #[default]
    Resting,
    Working,
    OnBreak,
}

impl ActivityState {
    /// Integer code used in the JSON envelope.
    pub fn code(self) -> u8 {
        match self {
            ActivityState::Resting => 0,
            ActivityState::Working => 1,
            ActivityState::OnBreak => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ActivityState::Resting),
            1 => Some(ActivityState::Working),
            2 => Some(ActivityState::OnBreak),
            _ => None,
        }
    }
}

impl Serialize for ActivityState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl std::fmt::Display for ActivityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ActivityState::Resting => "resting",
            ActivityState::Working => "working",
            ActivityState::OnBreak => "on-break",
        };
        f.write_str(label)
    }
}

/// A client-requested activity change.
///
/// Inbound wire codes: `0` = Start, `1` = Pause, `2` = Stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Start,
    Pause,
    Stop,
}

impl Transition {
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Transition::Start),
            1 => Some(Transition::Pause),
            2 => Some(Transition::Stop),
            _ => None,
        }
    }

    /// The activity state this transition leads to.
    pub fn target(self) -> ActivityState {
        match self {
            Transition::Start => ActivityState::Working,
            Transition::Pause => ActivityState::OnBreak,
            Transition::Stop => ActivityState::Resting,
        }
    }
}

/// Whether a connection has successfully claimed a display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityPhase {
    Anonymous,
    Named,
}

/// One live transport session.
///
/// The display name is private so that the only way to set it is through
/// [`crate::domain::registry::ConnectionRegistry::assign_name`], which keeps
/// the case-insensitive uniqueness index in sync.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    remote_address: String,
    display_name: Option<String>,
    pub(crate) activity_state: ActivityState,
    pub(crate) alive: bool,
}

impl Connection {
    /// Creates an anonymous, resting, alive connection.
    pub fn new(id: ConnectionId, remote_address: impl Into<String>) -> Self {
        Self {
            id,
            remote_address: remote_address.into(),
            display_name: None,
            activity_state: ActivityState::Resting,
            alive: true,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn remote_address(&self) -> &str {
        &self.remote_address
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn activity_state(&self) -> ActivityState {
        self.activity_state
    }

    /// `true` until a probe cycle starts without a pong since the last one.
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn phase(&self) -> IdentityPhase {
        if self.display_name.is_some() {
            IdentityPhase::Named
        } else {
            IdentityPhase::Anonymous
        }
    }

    /// Short label for log lines: `addr` or `addr (name)`.
    pub fn log_name(&self) -> String {
        match &self.display_name {
            Some(name) => format!("{} ({name})", self.remote_address),
            None => self.remote_address.clone(),
        }
    }

    pub(crate) fn set_display_name(&mut self, name: String) {
        self.display_name = Some(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_connection_is_anonymous_resting_and_alive() {
        // Arrange / Act
        let conn = Connection::new(Uuid::new_v4(), "10.0.0.1:5000");

        // Assert
        assert_eq!(conn.phase(), IdentityPhase::Anonymous);
        assert_eq!(conn.activity_state(), ActivityState::Resting);
        assert!(conn.is_alive());
        assert!(conn.display_name().is_none());
    }

    #[test]
    fn test_phase_becomes_named_once_name_is_set() {
        let mut conn = Connection::new(Uuid::new_v4(), "10.0.0.1:5000");
        conn.set_display_name("Alice".to_string());
        assert_eq!(conn.phase(), IdentityPhase::Named);
        assert_eq!(conn.display_name(), Some("Alice"));
    }

    #[test]
    fn test_transition_targets() {
        assert_eq!(Transition::Start.target(), ActivityState::Working);
        assert_eq!(Transition::Pause.target(), ActivityState::OnBreak);
        assert_eq!(Transition::Stop.target(), ActivityState::Resting);
    }

    #[test]
    fn test_transition_from_code_rejects_out_of_range() {
        assert_eq!(Transition::from_code(0), Some(Transition::Start));
        assert_eq!(Transition::from_code(2), Some(Transition::Stop));
        assert_eq!(Transition::from_code(3), None);
    }

    #[test]
    fn test_activity_state_serializes_as_integer_code() {
        let json = serde_json::to_string(&ActivityState::OnBreak).unwrap();
        assert_eq!(json, "2");
    }

    #[test]
    fn test_activity_state_code_round_trips() {
        for state in [
            ActivityState::Resting,
            ActivityState::Working,
            ActivityState::OnBreak,
        ] {
            assert_eq!(ActivityState::from_code(state.code()), Some(state));
        }
    }

    #[test]
    fn test_log_name_includes_display_name_when_set() {
        let mut conn = Connection::new(Uuid::new_v4(), "10.0.0.1:5000");
        assert_eq!(conn.log_name(), "10.0.0.1:5000");
        conn.set_display_name("Bob".to_string());
        assert_eq!(conn.log_name(), "10.0.0.1:5000 (Bob)");
    }
}
