//! Hub configuration types.
//!
//! [`HubConfig`] holds every runtime setting of the server.  It is built once
//! at startup in three layers (later layers win):
//!
//! 1. [`HubConfig::default`]
//! 2. an optional TOML file (`--config`)
//! 3. command-line flags and their `PRESENCE_*` environment variables
//!
//! and then checked with [`HubConfig::validate`] before the listener binds.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use presence_core::application::liveness::DEFAULT_PROBE_INTERVAL;
use presence_core::ProtocolPolicy;
use thiserror::Error;

/// Port the hub listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 31492;

/// Longest accepted probe interval.
pub const MAX_PROBE_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// A configuration value that parses but cannot be run with.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidConfig {
    #[error("probe interval must be greater than zero")]
    ZeroProbeInterval,

    #[error("probe interval must not exceed {} seconds", MAX_PROBE_INTERVAL.as_secs())]
    ProbeIntervalTooLarge,

    #[error("maximum display name length must be greater than zero")]
    ZeroMaxNameLen,
}

/// All runtime configuration for the presence hub.
#[derive(Debug, Clone, PartialEq)]
pub struct HubConfig {
    /// Address and port the WebSocket listener binds to.
    pub bind_addr: SocketAddr,

    /// Time between liveness sweeps.  A connection that misses one pong is
    /// evicted on the following sweep, so a dead peer is noticed within two
    /// intervals.
    pub probe_interval: Duration,

    /// Protocol knobs handed to the core state machine.
    pub policy: ProtocolPolicy,

    /// Default `tracing` filter directive, used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for HubConfig {
    /// | Field          | Default             |
    /// |----------------|---------------------|
    /// | bind_addr      | `0.0.0.0:31492`     |
    /// | probe_interval | 20 seconds          |
    /// | policy         | `ProtocolPolicy::default()` |
    /// | log_level      | `info`              |
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            probe_interval: DEFAULT_PROBE_INTERVAL,
            policy: ProtocolPolicy::default(),
            log_level: "info".to_string(),
        }
    }
}

impl HubConfig {
    /// Rejects settings the hub cannot operate with.
    ///
    /// # Errors
    ///
    /// - [`InvalidConfig::ZeroProbeInterval`] – a zero interval would make
    ///   the sweep timer spin.
    /// - [`InvalidConfig::ProbeIntervalTooLarge`] – longer than a day.
    /// - [`InvalidConfig::ZeroMaxNameLen`] – no name could ever be claimed.
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        if self.probe_interval.is_zero() {
            return Err(InvalidConfig::ZeroProbeInterval);
        }
        if self.probe_interval > MAX_PROBE_INTERVAL {
            return Err(InvalidConfig::ProbeIntervalTooLarge);
        }
        if self.policy.max_name_len == 0 {
            return Err(InvalidConfig::ZeroMaxNameLen);
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
