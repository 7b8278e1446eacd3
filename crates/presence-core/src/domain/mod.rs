//! Domain entities for the presence hub.
//!
//! Pure data with no I/O: the per-connection record, the registry that owns
//! every record, and the immutable outbound events the state machine emits.
//!
//! The transport layer never holds a [`connection::Connection`]; it only knows
//! the [`connection::ConnectionId`].  All per-connection state lives here, in
//! one place, owned by the registry.

pub mod connection;
pub mod events;
pub mod registry;
