//! presence-server library crate.
//!
//! Hosts the presence core behind a WebSocket listener.  Clients speak the
//! JSON `{code, data}` envelope; everything they send is funnelled into one
//! hub task that owns the [`presence_core::Dispatcher`].
//!
//! # Architecture
//!
//! ```text
//! Browser / desktop client (JSON over WebSocket)
//!         ↕
//! [presence-server]
//!   ├── domain/              HubConfig (runtime settings, validation)
//!   └── infrastructure/
//!         ├── config_file    TOML config file schema and loading
//!         ├── transport      ChannelTransport: Transport over per-session queues
//!         ├── hub            Hub task: the single writer of presence state
//!         └── ws_server      Accept loop and per-session reader/writer tasks
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `infrastructure` owns sockets, tasks, timers and files.

/// Domain layer: runtime configuration.
pub mod domain;

/// Infrastructure layer: config files, the hub task and the WebSocket server.
pub mod infrastructure;
