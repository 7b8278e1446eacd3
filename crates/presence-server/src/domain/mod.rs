//! Domain layer for presence-server.
//!
//! Plain configuration types with no I/O.  The infrastructure layer fills
//! them in from defaults, a TOML file and the command line.

pub mod config;

pub use config::{HubConfig, InvalidConfig, DEFAULT_PORT, MAX_PROBE_INTERVAL};
