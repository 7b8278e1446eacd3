//! Presence hub: entry point.
//!
//! Accepts WebSocket connections, lets each client claim a unique display
//! name, and broadcasts joins, activity changes and departures to everyone
//! else connected.
//!
//! # Usage
//!
//! ```text
//! presence-server [OPTIONS]
//!
//! Options:
//!   --config <FILE>                 TOML config file
//!   --bind <IP>                     Listener IP address [default: 0.0.0.0]
//!   --port <PORT>                   Listener port [default: 31492]
//!   --probe-interval <SECS>         Liveness sweep interval [default: 20]
//!   --activity-broadcast <MODE>     all-except-sender | all
//!   --reclaim <POLICY>              ignore | reject | resync
//!   --max-name-len <CHARS>          Longest accepted display name [default: 32]
//!   --log-level <FILTER>            Default log filter [default: info]
//! ```
//!
//! # Precedence
//!
//! Built-in defaults, then the `--config` file, then flags.  Every flag also
//! reads a `PRESENCE_*` environment variable; a flag given on the command
//! line wins over its variable.  `RUST_LOG`, when set, replaces the log
//! filter entirely.
//!
//! | Variable                        | Flag                   |
//! |---------------------------------|------------------------|
//! | `PRESENCE_CONFIG`               | `--config`             |
//! | `PRESENCE_BIND`                 | `--bind`               |
//! | `PRESENCE_PORT`                 | `--port`               |
//! | `PRESENCE_PROBE_INTERVAL`       | `--probe-interval`     |
//! | `PRESENCE_ACTIVITY_BROADCAST`   | `--activity-broadcast` |
//! | `PRESENCE_RECLAIM`              | `--reclaim`            |
//! | `PRESENCE_MAX_NAME_LEN`         | `--max-name-len`       |
//! | `PRESENCE_LOG_LEVEL`            | `--log-level`          |

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use presence_core::{ActivityBroadcast, ReclaimPolicy};
use tracing::info;
use tracing_subscriber::EnvFilter;

use presence_server::domain::HubConfig;
use presence_server::infrastructure::{run_server, ConfigFile};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Real-time presence hub.
///
/// Every option is optional; anything left unset falls back to the config
/// file and then to the built-in default.
#[derive(Debug, Parser)]
#[command(
    name = "presence-server",
    about = "WebSocket hub that tracks who is online and what they are doing",
    version
)]
struct Cli {
    /// TOML config file.  Must exist if given.
    #[arg(long, env = "PRESENCE_CONFIG")]
    config: Option<PathBuf>,

    /// IP address to bind the listener to.
    #[arg(long, env = "PRESENCE_BIND")]
    bind: Option<IpAddr>,

    /// TCP port to listen on.
    #[arg(long, env = "PRESENCE_PORT")]
    port: Option<u16>,

    /// Seconds between liveness sweeps.  A client that misses one pong is
    /// dropped at the next sweep.
    #[arg(long, env = "PRESENCE_PROBE_INTERVAL")]
    probe_interval: Option<u64>,

    /// Who hears about an activity change: `all-except-sender` or `all`.
    #[arg(long, env = "PRESENCE_ACTIVITY_BROADCAST")]
    activity_broadcast: Option<ActivityBroadcast>,

    /// Reply to a repeated name claim: `ignore`, `reject` or `resync`.
    #[arg(long, env = "PRESENCE_RECLAIM")]
    reclaim: Option<ReclaimPolicy>,

    /// Longest display name accepted, in characters.
    #[arg(long, env = "PRESENCE_MAX_NAME_LEN")]
    max_name_len: Option<usize>,

    /// Default `tracing` filter, e.g. `info` or `presence_core=debug`.
    #[arg(long, env = "PRESENCE_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    /// Builds the final [`HubConfig`]: defaults, then the config file, then
    /// these flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or if
    /// the merged result is invalid (for example a zero probe interval).
    fn into_hub_config(self) -> anyhow::Result<HubConfig> {
        let mut config = HubConfig::default();
        if let Some(path) = &self.config {
            ConfigFile::load(path)
                .with_context(|| format!("failed to load config file {}", path.display()))?
                .apply(&mut config);
        }

        if let Some(ip) = self.bind {
            config.bind_addr = SocketAddr::new(ip, config.bind_addr.port());
        }
        if let Some(port) = self.port {
            config.bind_addr.set_port(port);
        }
        if let Some(secs) = self.probe_interval {
            config.probe_interval = Duration::from_secs(secs);
        }
        if let Some(mode) = self.activity_broadcast {
            config.policy.activity_broadcast = mode;
        }
        if let Some(policy) = self.reclaim {
            config.policy.reclaim = policy;
        }
        if let Some(len) = self.max_name_len {
            config.policy.max_name_len = len;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_hub_config()?;

    // ── Logging setup ─────────────────────────────────────────────────────────
    //
    // `RUST_LOG` wins when present; otherwise the configured level applies.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(
        "presence hub starting: bind={}, probe_interval={:?}, broadcast={:?}, reclaim={:?}",
        config.bind_addr,
        config.probe_interval,
        config.policy.activity_broadcast,
        config.policy.reclaim
    );

    // ── Graceful shutdown flag ────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    run_server(config, running).await?;

    info!("presence hub stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_without_arguments_yields_default_config() {
        // Arrange
        let cli = Cli::parse_from(["presence-server"]);

        // Act
        let config = cli.into_hub_config().unwrap();

        // Assert
        assert_eq!(config, HubConfig::default());
    }

    #[test]
    fn test_cli_port_override_keeps_default_ip() {
        let cli = Cli::parse_from(["presence-server", "--port", "9999"]);
        let config = cli.into_hub_config().unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:9999".parse().unwrap());
    }

    #[test]
    fn test_cli_bind_override() {
        let cli = Cli::parse_from(["presence-server", "--bind", "127.0.0.1"]);
        let config = cli.into_hub_config().unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:31492".parse().unwrap());
    }

    #[test]
    fn test_cli_policy_overrides() {
        let cli = Cli::parse_from([
            "presence-server",
            "--activity-broadcast",
            "all",
            "--reclaim",
            "reject",
            "--max-name-len",
            "12",
        ]);
        let config = cli.into_hub_config().unwrap();
        assert_eq!(config.policy.activity_broadcast, ActivityBroadcast::All);
        assert_eq!(config.policy.reclaim, ReclaimPolicy::Reject);
        assert_eq!(config.policy.max_name_len, 12);
    }

    #[test]
    fn test_cli_rejects_unknown_policy_name() {
        let result = Cli::try_parse_from(["presence-server", "--reclaim", "sometimes"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_rejects_invalid_bind_address() {
        let result = Cli::try_parse_from(["presence-server", "--bind", "not-an-ip"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_probe_interval_is_rejected() {
        let cli = Cli::parse_from(["presence-server", "--probe-interval", "0"]);
        assert!(cli.into_hub_config().is_err());
    }

    #[test]
    fn test_flags_win_over_config_file() {
        // Arrange
        let path = std::env::temp_dir().join(format!(
            "presence-hub-cli-precedence-{}.toml",
            std::process::id()
        ));
        std::fs::write(
            &path,
            "[server]\nport = 4000\nprobe_interval_secs = 7\n[protocol]\nreclaim = \"resync\"\n",
        )
        .unwrap();
        let path_arg = path.to_string_lossy().into_owned();

        // Act
        let cli = Cli::parse_from(["presence-server", "--config", &path_arg, "--port", "5000"]);
        let result = cli.into_hub_config();
        let _ = std::fs::remove_file(&path);
        let config = result.unwrap();

        // Assert
        assert_eq!(config.bind_addr.port(), 5000);
        assert_eq!(config.probe_interval, Duration::from_secs(7));
        assert_eq!(config.policy.reclaim, ReclaimPolicy::Resync);
    }

    #[test]
    fn test_flag_can_repair_invalid_file_value() {
        let path = std::env::temp_dir().join(format!(
            "presence-hub-cli-repair-{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, "[server]\nprobe_interval_secs = 0\n").unwrap();
        let path_arg = path.to_string_lossy().into_owned();

        let cli = Cli::parse_from([
            "presence-server",
            "--config",
            &path_arg,
            "--probe-interval",
            "3",
        ]);
        let result = cli.into_hub_config();
        let _ = std::fs::remove_file(&path);

        assert_eq!(result.unwrap().probe_interval, Duration::from_secs(3));
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let cli = Cli::parse_from([
            "presence-server",
            "--config",
            "/nonexistent/presence-hub.toml",
        ]);
        assert!(cli.into_hub_config().is_err());
    }
}
