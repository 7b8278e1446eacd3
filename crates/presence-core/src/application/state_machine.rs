//! ProtocolStateMachine: what a connection may do, and what everyone else hears about it.
//!
//! The state machine is the only code that mutates a connection's identity
//! or activity.  Each handler takes the registry by `&mut`, applies one
//! event for one sender, and returns the outbound events to deliver, in the
//! order they must be delivered.  It never sends anything itself.
//!
//! # Event table
//!
//! | event            | Anonymous                          | Named                         |
//! |------------------|------------------------------------|-------------------------------|
//! | NameClaim(n)     | claim (see below)                  | per [`ReclaimPolicy`]         |
//! | Activity(t)      | ignored                            | change state, broadcast       |
//! | Disconnect       | removed, nothing sent              | removed, `UserLeft` to all    |
//! | reserved codes   | ignored                            | ignored                       |
//!
//! A successful claim produces, in this order:
//!
//! 1. `ClaimResult(true)` to the sender
//! 2. `UserList(every other named user)` to the sender
//! 3. `UserJoined(name)` to everyone except the sender

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::application::history::{ActivityChange, ActivityHistory, NoHistory};
use crate::domain::connection::{ConnectionId, Transition};
use crate::domain::events::{OutboundEvent, OutboundPayload, RecipientSelector, UserSummary};
use crate::domain::registry::{ConnectionRegistry, RegistryError};
use crate::protocol::envelope::InboundEvent;

/// Longest display name accepted unless configured otherwise, in characters.
pub const DEFAULT_MAX_NAME_LEN: usize = 32;

/// Who hears about an activity change.
///
/// Spelled `all-except-sender` / `all` in config files and on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActivityBroadcast {
    /// Everyone except the user who changed state.
    #[default]
    AllExceptSender,
    /// Everyone, including the user who changed state (an echo).
    All,
}

/// What happens when an already-named connection claims a name again.
///
/// The name itself never changes in any variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReclaimPolicy {
    /// Nothing is sent.
    #[default]
    Ignore,
    /// `ClaimResult(false)` to the sender.
    Reject,
    /// `ClaimResult(true)` and a fresh `UserList` to the sender if the
    /// requested name is its current one (case-insensitively), otherwise
    /// `ClaimResult(false)`.  Lets a client that missed updates resynchronise.
    Resync,
}

impl FromStr for ActivityBroadcast {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all-except-sender" => Ok(ActivityBroadcast::AllExceptSender),
            "all" => Ok(ActivityBroadcast::All),
            other => Err(format!(
                "unknown activity broadcast '{other}' (expected all-except-sender or all)"
            )),
        }
    }
}

impl FromStr for ReclaimPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ignore" => Ok(ReclaimPolicy::Ignore),
            "reject" => Ok(ReclaimPolicy::Reject),
            "resync" => Ok(ReclaimPolicy::Resync),
            other => Err(format!(
                "unknown reclaim policy '{other}' (expected ignore, reject or resync)"
            )),
        }
    }
}

/// Tunable protocol behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolPolicy {
    pub activity_broadcast: ActivityBroadcast,
    pub reclaim: ReclaimPolicy,
    pub max_name_len: usize,
}

impl Default for ProtocolPolicy {
    fn default() -> Self {
        Self {
            activity_broadcast: ActivityBroadcast::default(),
            reclaim: ReclaimPolicy::default(),
            max_name_len: DEFAULT_MAX_NAME_LEN,
        }
    }
}

pub struct ProtocolStateMachine {
    policy: ProtocolPolicy,
    history: Box<dyn ActivityHistory>,
}

impl ProtocolStateMachine {
    pub fn new(policy: ProtocolPolicy) -> Self {
        Self::with_history(policy, Box::new(NoHistory))
    }

    pub fn with_history(policy: ProtocolPolicy, history: Box<dyn ActivityHistory>) -> Self {
        Self { policy, history }
    }

    pub fn policy(&self) -> &ProtocolPolicy {
        &self.policy
    }

    pub(crate) fn set_history(&mut self, history: Box<dyn ActivityHistory>) {
        self.history = history;
    }

    /// Applies one decoded client event.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if `sender` is not registered.
    pub fn apply(
        &mut self,
        registry: &mut ConnectionRegistry,
        sender: ConnectionId,
        event: InboundEvent,
    ) -> Result<Vec<OutboundEvent>, RegistryError> {
        match event {
            InboundEvent::NameClaim(name) => self.claim_name(registry, sender, &name),
            InboundEvent::Activity(transition) => self.transition(registry, sender, transition),
            InboundEvent::Ignored(code) => {
                registry.find(sender)?;
                debug!("ignoring {code:?} from {sender}");
                Ok(Vec::new())
            }
        }
    }

    /// Handles a display-name claim.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if `sender` is not registered.
    pub fn claim_name(
        &mut self,
        registry: &mut ConnectionRegistry,
        sender: ConnectionId,
        requested: &str,
    ) -> Result<Vec<OutboundEvent>, RegistryError> {
        let current = registry.find(sender)?.display_name().map(str::to_string);
        if let Some(current) = current {
            return Ok(self.reclaim(registry, sender, &current, requested));
        }

        let name = requested.trim();
        if name.is_empty() || name.chars().count() > self.policy.max_name_len {
            debug!("rejecting invalid name claim from {sender}");
            return Ok(vec![claim_result(sender, false)]);
        }

        match registry.assign_name(sender, name) {
            Ok(()) => {}
            Err(RegistryError::NameTaken(_)) => {
                info!("name '{name}' already taken; claim from {sender} rejected");
                return Ok(vec![claim_result(sender, false)]);
            }
            Err(e) => return Err(e),
        }

        info!("{sender} is now known as '{name}'");
        Ok(vec![
            claim_result(sender, true),
            OutboundEvent::to(
                sender,
                OutboundPayload::UserList(registry.snapshot_excluding(sender)),
            ),
            OutboundEvent::all_except(sender, OutboundPayload::UserJoined(name.to_string())),
        ])
    }

    fn reclaim(
        &self,
        registry: &ConnectionRegistry,
        sender: ConnectionId,
        current: &str,
        requested: &str,
    ) -> Vec<OutboundEvent> {
        debug!("repeated name claim from '{current}' ({:?})", self.policy.reclaim);
        match self.policy.reclaim {
            ReclaimPolicy::Ignore => Vec::new(),
            ReclaimPolicy::Reject => vec![claim_result(sender, false)],
            ReclaimPolicy::Resync => {
                if requested.trim().to_lowercase() == current.to_lowercase() {
                    vec![
                        claim_result(sender, true),
                        OutboundEvent::to(
                            sender,
                            OutboundPayload::UserList(registry.snapshot_excluding(sender)),
                        ),
                    ]
                } else {
                    vec![claim_result(sender, false)]
                }
            }
        }
    }

    /// Handles a Start/Pause/Stop request.
    ///
    /// Anonymous senders and no-op transitions produce no events and leave
    /// the registry untouched.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if `sender` is not registered.
    pub fn transition(
        &mut self,
        registry: &mut ConnectionRegistry,
        sender: ConnectionId,
        transition: Transition,
    ) -> Result<Vec<OutboundEvent>, RegistryError> {
        let connection = registry.find_mut(sender)?;
        let Some(name) = connection.display_name().map(str::to_string) else {
            debug!("ignoring {transition:?} from anonymous {sender}");
            return Ok(Vec::new());
        };

        let from = connection.activity_state;
        let to = transition.target();
        if from == to {
            return Ok(Vec::new());
        }
        connection.activity_state = to;
        debug!("'{name}' {from} -> {to}");

        self.history.record(&ActivityChange {
            display_name: name.clone(),
            from,
            to,
        });

        let recipients = match self.policy.activity_broadcast {
            ActivityBroadcast::AllExceptSender => RecipientSelector::AllExcept(sender),
            ActivityBroadcast::All => RecipientSelector::All,
        };
        Ok(vec![OutboundEvent::new(
            OutboundPayload::ActivityChanged(UserSummary::new(name, to)),
            recipients,
        )])
    }

    /// Removes a connection that closed or failed its liveness probe.
    ///
    /// Unknown ids are ignored, so a close that races an eviction is harmless.
    /// The returned `UserLeft` event targets every *remaining* connection.
    pub fn disconnect(
        &mut self,
        registry: &mut ConnectionRegistry,
        id: ConnectionId,
    ) -> Vec<OutboundEvent> {
        let Some(connection) = registry.remove(id) else {
            return Vec::new();
        };
        match connection.display_name() {
            Some(name) => {
                info!("'{name}' left");
                vec![OutboundEvent::all(OutboundPayload::UserLeft(name.to_string()))]
            }
            None => Vec::new(),
        }
    }
}

fn claim_result(sender: ConnectionId, accepted: bool) -> OutboundEvent {
    OutboundEvent::to(sender, OutboundPayload::ClaimResult(accepted))
}
