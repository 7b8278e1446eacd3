//! Outbound events produced by the state machine.
//!
//! An [`OutboundEvent`] pairs *what* to send ([`OutboundPayload`]) with *who*
//! receives it ([`RecipientSelector`]).  Events are built once and never
//! modified; the router resolves the selector at delivery time.

use serde::Serialize;

use crate::domain::connection::{ActivityState, ConnectionId};
use crate::protocol::codes::MessageCode;

/// One entry of the user list: `{"displayName": ..., "activityState": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub display_name: String,
    pub activity_state: ActivityState,
}

impl UserSummary {
    pub fn new(display_name: impl Into<String>, activity_state: ActivityState) -> Self {
        Self {
            display_name: display_name.into(),
            activity_state,
        }
    }
}

/// Which registry members an event goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientSelector {
    /// Every live connection.
    All,
    /// Every live connection except the given one (usually the sender).
    AllExcept(ConnectionId),
    /// Exactly one connection.
    Only(ConnectionId),
}

impl RecipientSelector {
    /// Returns `true` if `id` is selected.
    pub fn includes(self, id: ConnectionId) -> bool {
        match self {
            RecipientSelector::All => true,
            RecipientSelector::AllExcept(excluded) => id != excluded,
            RecipientSelector::Only(target) => id == target,
        }
    }
}

/// The payload half of an outbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundPayload {
    /// Reply to a name claim: `true` when accepted.
    ClaimResult(bool),
    /// Current named users, sent to a newly named connection.
    UserList(Vec<UserSummary>),
    /// A connection claimed this name.
    UserJoined(String),
    /// A named user changed activity.
    ActivityChanged(UserSummary),
    /// A named user went away.
    UserLeft(String),
}

impl OutboundPayload {
    /// Wire code of the envelope this payload travels in.
    pub fn code(&self) -> MessageCode {
        match self {
            OutboundPayload::ClaimResult(_) | OutboundPayload::UserJoined(_) => {
                MessageCode::NameClaim
            }
            OutboundPayload::UserList(_) => MessageCode::UserList,
            OutboundPayload::ActivityChanged(_) => MessageCode::Activity,
            OutboundPayload::UserLeft(_) => MessageCode::UserLeft,
        }
    }

    /// Short variant name for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundPayload::ClaimResult(_) => "ClaimResult",
            OutboundPayload::UserList(_) => "UserList",
            OutboundPayload::UserJoined(_) => "UserJoined",
            OutboundPayload::ActivityChanged(_) => "ActivityChanged",
            OutboundPayload::UserLeft(_) => "UserLeft",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEvent {
    pub payload: OutboundPayload,
    pub recipients: RecipientSelector,
}

impl OutboundEvent {
    pub fn new(payload: OutboundPayload, recipients: RecipientSelector) -> Self {
        Self {
            payload,
            recipients,
        }
    }

    pub fn to(target: ConnectionId, payload: OutboundPayload) -> Self {
        Self::new(payload, RecipientSelector::Only(target))
    }

    pub fn all_except(sender: ConnectionId, payload: OutboundPayload) -> Self {
        Self::new(payload, RecipientSelector::AllExcept(sender))
    }

    pub fn all(payload: OutboundPayload) -> Self {
        Self::new(payload, RecipientSelector::All)
    }
}
