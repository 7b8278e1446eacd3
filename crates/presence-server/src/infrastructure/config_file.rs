//! TOML configuration file for the hub.
//!
//! Every key is optional; anything left out keeps the value from the layer
//! below (the built-in defaults).  Unknown keys are rejected so that a typo
//! does not silently fall back to a default.
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0"
//! port = 31492
//! probe_interval_secs = 20
//! log_level = "info"
//!
//! [protocol]
//! activity_broadcast = "all-except-sender"   # or "all"
//! reclaim = "ignore"                         # or "reject", "resync"
//! max_name_len = 32
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use presence_core::{ActivityBroadcast, ReclaimPolicy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::config::HubConfig;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// On-disk layout of the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub protocol: ProtocolSection,
}

/// `[server]` table: where to listen and how often to probe.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    pub bind: Option<IpAddr>,
    pub port: Option<u16>,
    pub probe_interval_secs: Option<u64>,
    pub log_level: Option<String>,
}

/// `[protocol]` table: knobs forwarded to the state machine.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProtocolSection {
    pub activity_broadcast: Option<ActivityBroadcast>,
    pub reclaim: Option<ReclaimPolicy>,
    pub max_name_len: Option<usize>,
}

impl ConfigFile {
    /// Parses a config file from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML, unknown keys or
    /// values of the wrong type.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and parses the file at `path`.
    ///
    /// Unlike a settings file in a well-known location, this path was named
    /// explicitly by the operator, so a missing file is an error.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Parse`] if its content is not a valid config.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Overlays every key present in the file onto `config`.
    pub fn apply(&self, config: &mut HubConfig) {
        let server = &self.server;
        if let Some(ip) = server.bind {
            config.bind_addr = SocketAddr::new(ip, config.bind_addr.port());
        }
        if let Some(port) = server.port {
            config.bind_addr.set_port(port);
        }
        if let Some(secs) = server.probe_interval_secs {
            config.probe_interval = Duration::from_secs(secs);
        }
        if let Some(level) = &server.log_level {
            config.log_level = level.clone();
        }

        let protocol = &self.protocol;
        if let Some(broadcast) = protocol.activity_broadcast {
            config.policy.activity_broadcast = broadcast;
        }
        if let Some(reclaim) = protocol.reclaim {
            config.policy.reclaim = reclaim;
        }
        if let Some(len) = protocol.max_name_len {
            config.policy.max_name_len = len;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::InvalidConfig;

    #[test]
    fn test_empty_file_keeps_every_default() {
        // Arrange
        let file = ConfigFile::from_toml_str("").unwrap();
        let mut config = HubConfig::default();

        // Act
        file.apply(&mut config);

        // Assert
        assert_eq!(config, HubConfig::default());
    }

    #[test]
    fn test_full_file_overrides_every_field() {
        let text = r#"
            [server]
            bind = "127.0.0.1"
            port = 9000
            probe_interval_secs = 5
            log_level = "debug"

            [protocol]
            activity_broadcast = "all"
            reclaim = "resync"
            max_name_len = 16
        "#;
        let mut config = HubConfig::default();

        ConfigFile::from_toml_str(text).unwrap().apply(&mut config);

        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.probe_interval, Duration::from_secs(5));
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.policy.activity_broadcast, ActivityBroadcast::All);
        assert_eq!(config.policy.reclaim, ReclaimPolicy::Resync);
        assert_eq!(config.policy.max_name_len, 16);
    }

    #[test]
    fn test_port_only_keeps_default_bind_ip() {
        let mut config = HubConfig::default();
        ConfigFile::from_toml_str("[server]\nport = 8080\n")
            .unwrap()
            .apply(&mut config);
        assert_eq!(config.bind_addr, "0.0.0.0:8080".parse().unwrap());
    }

    #[test]
    fn test_unknown_key_is_a_parse_error() {
        let result = ConfigFile::from_toml_str("[server]\nprot = 1\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_unknown_policy_name_is_a_parse_error() {
        let result = ConfigFile::from_toml_str("[protocol]\nreclaim = \"sometimes\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_config_file_toml_round_trip() {
        // Arrange
        let original = ConfigFile {
            server: ServerSection {
                port: Some(4000),
                ..ServerSection::default()
            },
            protocol: ProtocolSection {
                reclaim: Some(ReclaimPolicy::Reject),
                ..ProtocolSection::default()
            },
        };

        // Act
        let text = toml::to_string(&original).unwrap();
        let restored = ConfigFile::from_toml_str(&text).unwrap();

        // Assert
        assert_eq!(original, restored);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let path = std::env::temp_dir().join("presence-hub-no-such-config.toml");
        let result = ConfigFile::load(&path);
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_zero_probe_interval_from_file_fails_validation() {
        // Arrange
        let path = std::env::temp_dir().join(format!(
            "presence-hub-zero-probe-{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, "[server]\nprobe_interval_secs = 0\n").unwrap();
        let mut config = HubConfig::default();

        // Act
        let loaded = ConfigFile::load(&path);
        let _ = std::fs::remove_file(&path);
        loaded.unwrap().apply(&mut config);

        // Assert
        assert_eq!(config.validate(), Err(InvalidConfig::ZeroProbeInterval));
    }
}
