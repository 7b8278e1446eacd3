//! Dispatcher: the single entry point into the core.
//!
//! The dispatcher owns the registry, the state machine, the router, the
//! liveness monitor and the transport.  Every method takes `&mut self`, so
//! whoever owns the dispatcher (the server's hub task) is by construction the
//! only writer, and every operation runs to completion before the next one
//! starts.
//!
//! | transport event        | method                         |
//! |------------------------|--------------------------------|
//! | session accepted       | [`Dispatcher::on_accept`]      |
//! | text frame received    | [`Dispatcher::on_message`]     |
//! | pong received          | [`Dispatcher::on_pong`]        |
//! | session closed         | [`Dispatcher::on_close`]       |
//! | probe timer fired      | [`Dispatcher::sweep`]          |
//! | server shutting down   | [`Dispatcher::close_all`]      |

use std::time::Duration;

use thiserror::Error;
use tracing::info;

use crate::application::history::ActivityHistory;
use crate::application::liveness::LivenessMonitor;
use crate::application::router::{BroadcastRouter, DeliveryReport, Transport};
use crate::application::state_machine::{ProtocolPolicy, ProtocolStateMachine};
use crate::domain::connection::{Connection, ConnectionId};
use crate::domain::registry::{ConnectionRegistry, RegistryError};
use crate::protocol::envelope::{decode_inbound, ProtocolError};

/// Why an inbound event was dropped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Result of one liveness sweep, including the `UserLeft` fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub evicted: Vec<ConnectionId>,
    pub probed: usize,
    pub delivery: DeliveryReport,
}

pub struct Dispatcher<T: Transport> {
    registry: ConnectionRegistry,
    machine: ProtocolStateMachine,
    router: BroadcastRouter,
    monitor: LivenessMonitor,
    transport: T,
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(policy: ProtocolPolicy, probe_interval: Duration, transport: T) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            machine: ProtocolStateMachine::new(policy),
            router: BroadcastRouter::new(),
            monitor: LivenessMonitor::new(probe_interval),
            transport,
        }
    }

    /// Replaces the default no-op activity history.
    pub fn with_history(mut self, history: Box<dyn ActivityHistory>) -> Self {
        self.machine.set_history(history);
        self
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn policy(&self) -> &ProtocolPolicy {
        self.machine.policy()
    }

    pub fn probe_interval(&self) -> Duration {
        self.monitor.interval()
    }

    /// Registers a freshly accepted session as an anonymous connection.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateId`] if the id is already live.
    pub fn on_accept(
        &mut self,
        id: ConnectionId,
        remote_address: impl Into<String>,
    ) -> Result<(), DispatchError> {
        self.registry.add(Connection::new(id, remote_address))?;
        Ok(())
    }

    /// Decodes and applies one inbound text frame, then delivers the effects.
    ///
    /// A frame that fails to decode is dropped without touching the registry
    /// or sending anything; the session stays open.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::Protocol`] – malformed frame or unknown code.
    /// - [`DispatchError::Registry`] – the sender is not registered.
    pub fn on_message(
        &mut self,
        id: ConnectionId,
        text: &str,
    ) -> Result<DeliveryReport, DispatchError> {
        let event = decode_inbound(text)?;
        let events = self.machine.apply(&mut self.registry, id, event)?;
        Ok(self
            .router
            .deliver_all(&events, &self.registry, &mut self.transport))
    }

    /// Records a pong.  Returns `false` if the session is unknown.
    pub fn on_pong(&mut self, id: ConnectionId) -> bool {
        self.monitor.acknowledge(&mut self.registry, id)
    }

    /// Runs the disconnect transition for a session the transport closed.
    ///
    /// Safe to call for ids that were already evicted.
    pub fn on_close(&mut self, id: ConnectionId) -> DeliveryReport {
        let events = self.machine.disconnect(&mut self.registry, id);
        self.router
            .deliver_all(&events, &self.registry, &mut self.transport)
    }

    /// Runs one liveness cycle: evicts connections that missed the previous
    /// ping, then pings the rest.
    pub fn sweep(&mut self) -> SweepReport {
        let outcome = self.monitor.sweep(&mut self.registry, &mut self.transport);
        let mut delivery = DeliveryReport::default();

        for id in &outcome.dead {
            if let Ok(connection) = self.registry.find(*id) {
                info!("evicting dead connection {}", connection.log_name());
            }
            let events = self.machine.disconnect(&mut self.registry, *id);
            delivery.merge(
                self.router
                    .deliver_all(&events, &self.registry, &mut self.transport),
            );
            self.transport.close(*id);
        }

        SweepReport {
            evicted: outcome.dead,
            probed: outcome.probed,
            delivery,
        }
    }

    /// Drops every connection and closes its session without announcing
    /// departures.  Used at shutdown.
    pub fn close_all(&mut self) {
        for id in self.registry.ids() {
            self.registry.remove(id);
            self.transport.close(id);
        }
    }
}
