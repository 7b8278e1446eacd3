//! Application layer: the behaviour of the hub.
//!
//! - **`state_machine`** – validates client events against a connection's
//!   identity phase and activity state and decides what to send.
//! - **`router`** – resolves recipients and pushes frames through the
//!   [`router::Transport`] seam.
//! - **`liveness`** – the ping/pong heartbeat sweep.
//! - **`dispatcher`** – the entry point that owns all of the above plus the
//!   registry and the transport.
//! - **`history`** – hook for recording accepted activity changes.
//! - **`recording_transport`** – in-memory [`router::Transport`] for tests
//!   and benchmarks.

pub mod dispatcher;
pub mod history;
pub mod liveness;
pub mod recording_transport;
pub mod router;
pub mod state_machine;
