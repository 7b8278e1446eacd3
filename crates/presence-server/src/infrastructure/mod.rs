//! Infrastructure layer for presence-server.
//!
//! Everything that does I/O lives here: reading the config file, accepting
//! WebSocket connections, the per-session reader and writer tasks, and the
//! hub task that owns the presence state.
//!
//! # What does NOT belong here?
//!
//! - Protocol rules and the wire format (those are in `presence-core`)
//! - Command-line parsing (that is done in `main.rs`)

pub mod config_file;
pub mod hub;
pub mod transport;
pub mod ws_server;

pub use config_file::{ConfigError, ConfigFile};
pub use hub::{spawn_hub, Hub, HubCommand};
pub use transport::{ChannelTransport, Outgoing};
pub use ws_server::{run_server, serve};
