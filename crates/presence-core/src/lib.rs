//! # presence-core
//!
//! The authoritative in-memory model behind the presence hub: who is
//! connected, which display names are claimed, and what each named user is
//! currently doing.
//!
//! This crate performs no I/O.  Everything that touches a socket goes through
//! the [`application::router::Transport`] trait, which the server crate
//! implements on top of WebSocket sessions and which tests implement with an
//! in-memory recorder.
//!
//! # Architecture overview
//!
//! ```text
//!   raw text frame
//!        │
//!        ▼
//!   Dispatcher ──decode──► ProtocolStateMachine ──mutates──► ConnectionRegistry
//!        │                          │
//!        │                   Vec<OutboundEvent>
//!        ▼                          │
//!   BroadcastRouter ◄───────────────┘
//!        │
//!        ▼
//!   Transport::send / ping / close
//! ```
//!
//! - **`domain`** – Connection records, activity states, the registry, and
//!   outbound event types.
//! - **`protocol`** – The JSON `{code, data}` envelope and message codes.
//! - **`application`** – The state machine, router, liveness monitor and the
//!   dispatcher that wires them together.
//!
//! Every mutating call takes `&mut self`.  The crate relies on its caller to
//! serialize access (one hub task owns the [`Dispatcher`]), so no locks are
//! needed anywhere in here.

pub mod application;
pub mod domain;
pub mod protocol;

pub use application::dispatcher::{DispatchError, Dispatcher, SweepReport};
pub use application::history::{ActivityChange, ActivityHistory, NoHistory};
pub use application::liveness::{LivenessMonitor, SweepOutcome};
pub use application::router::{BroadcastRouter, DeliveryFailure, DeliveryReport, Transport};
pub use application::state_machine::{
    ActivityBroadcast, ProtocolPolicy, ProtocolStateMachine, ReclaimPolicy,
};
pub use domain::connection::{ActivityState, Connection, ConnectionId, IdentityPhase, Transition};
pub use domain::events::{OutboundEvent, OutboundPayload, RecipientSelector, UserSummary};
pub use domain::registry::{ConnectionRegistry, RegistryError};
pub use protocol::codes::MessageCode;
pub use protocol::envelope::{decode_inbound, encode_outbound, Envelope, InboundEvent, ProtocolError};
