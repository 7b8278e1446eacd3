//! LivenessMonitor: ping/pong heartbeat that finds connections which went away
//! without closing.
//!
//! # Two-cycle grace
//!
//! ```text
//! t = 0          sweep: alive=true  → alive:=false, ping
//! t ∈ (0, T)     pong arrives       → alive:=true        (survives)
//! t = T          sweep: alive=false → dead               (evicted)
//! ```
//!
//! A connection is evicted at the first sweep that finds no pong since the
//! previous sweep.  A connection that goes silent right after a sweep is
//! therefore detected after more than one and at most two intervals.
//!
//! The monitor only marks and reports.  Running the disconnect transition and
//! closing the transport is the dispatcher's job, so eviction goes through the
//! same path as a normal close.

use std::time::Duration;

use tracing::debug;

use crate::application::router::Transport;
use crate::domain::connection::ConnectionId;
use crate::domain::registry::ConnectionRegistry;

pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(20);

/// Result of one probe cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Connections that did not answer the previous ping, in accept order.
    pub dead: Vec<ConnectionId>,
    /// Connections that were pinged this cycle.
    pub probed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessMonitor {
    interval: Duration,
}

impl Default for LivenessMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_INTERVAL)
    }
}

impl LivenessMonitor {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Time between sweeps; the caller owns the timer.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs one probe cycle over a snapshot of the registry's ids.
    ///
    /// Dead connections are reported but left in the registry.
    pub fn sweep<T: Transport + ?Sized>(
        &self,
        registry: &mut ConnectionRegistry,
        transport: &mut T,
    ) -> SweepOutcome {
        let mut outcome = SweepOutcome::default();

        for id in registry.ids() {
            let Ok(connection) = registry.find_mut(id) else {
                continue;
            };
            if !connection.alive {
                outcome.dead.push(id);
                continue;
            }
            connection.alive = false;
            if let Err(e) = transport.ping(id) {
                debug!("liveness ping failed: {e}");
            }
            outcome.probed += 1;
        }

        outcome
    }

    /// Records a pong.  Returns `false` for unknown ids.
    pub fn acknowledge(&self, registry: &mut ConnectionRegistry, id: ConnectionId) -> bool {
        match registry.find_mut(id) {
            Ok(connection) => {
                connection.alive = true;
                true
            }
            Err(_) => false,
        }
    }
}
