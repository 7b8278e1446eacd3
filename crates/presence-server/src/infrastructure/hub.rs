//! The hub task: sole owner of presence state.
//!
//! Session tasks never touch the registry.  They forward what happens on
//! their socket as [`HubCommand`]s over one mpsc queue, and the hub applies
//! them one at a time against its [`Dispatcher`].  The liveness timer runs
//! in the same `select!` loop, so a sweep can never interleave with a claim
//! or a disconnect.

use std::net::SocketAddr;
use std::time::Duration;

use presence_core::{ConnectionId, DispatchError, Dispatcher, ProtocolPolicy};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::domain::config::{HubConfig, MAX_PROBE_INTERVAL};
use crate::infrastructure::transport::{ChannelTransport, Outbox, Outgoing};

/// Commands queued before session readers wait for the hub.
pub const COMMAND_QUEUE_CAPACITY: usize = 1024;

/// Something that happened on a session, or a request to stop.
#[derive(Debug)]
pub enum HubCommand {
    /// A WebSocket handshake completed.
    Accepted {
        id: ConnectionId,
        remote_addr: SocketAddr,
        outbox: Outbox,
    },
    /// A text frame arrived.
    Inbound { id: ConnectionId, text: String },
    /// A pong control frame arrived.
    Pong { id: ConnectionId },
    /// The session ended, cleanly or not.
    Closed { id: ConnectionId },
    /// Close every session and stop the hub.
    Shutdown,
}

pub struct Hub {
    dispatcher: Dispatcher<ChannelTransport>,
    commands: mpsc::Receiver<HubCommand>,
}

impl Hub {
    pub fn new(
        policy: ProtocolPolicy,
        probe_interval: Duration,
        commands: mpsc::Receiver<HubCommand>,
    ) -> Self {
        Self {
            dispatcher: Dispatcher::new(policy, probe_interval, ChannelTransport::new()),
            commands,
        }
    }

    /// Runs until [`HubCommand::Shutdown`] arrives or every sender is gone.
    pub async fn run(mut self) {
        let period = self.dispatcher.probe_interval().min(MAX_PROBE_INTERVAL);
        // The first sweep happens one full interval after start-up.
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(HubCommand::Shutdown) | None => break,
                    Some(command) => self.handle(command),
                },
                _ = ticker.tick() => self.sweep(),
            }
        }

        let remaining = self.dispatcher.registry().len();
        self.dispatcher.close_all();
        info!("hub stopped; closed {remaining} session(s)");
    }

    fn handle(&mut self, command: HubCommand) {
        match command {
            HubCommand::Accepted {
                id,
                remote_addr,
                outbox,
            } => self.accept(id, remote_addr, outbox),
            HubCommand::Inbound { id, text } => self.inbound(id, &text),
            HubCommand::Pong { id } => {
                if !self.dispatcher.on_pong(id) {
                    debug!("pong from unknown session {id}");
                }
            }
            HubCommand::Closed { id } => self.closed(id),
            HubCommand::Shutdown => {}
        }
    }

    fn accept(&mut self, id: ConnectionId, remote_addr: SocketAddr, outbox: Outbox) {
        match self.dispatcher.on_accept(id, remote_addr.to_string()) {
            Ok(()) => {
                self.dispatcher.transport_mut().attach(id, outbox);
                info!(
                    "session {id} from {remote_addr} joined ({} connected)",
                    self.dispatcher.registry().len()
                );
            }
            Err(e) => {
                // The live session with this id keeps its outbox.
                warn!("refusing session {id} from {remote_addr}: {e}");
                let _ = outbox.try_send(Outgoing::Close);
            }
        }
    }

    fn inbound(&mut self, id: ConnectionId, text: &str) {
        match self.dispatcher.registry().find(id) {
            Ok(sender) => debug!("recv from {}: {text}", sender.log_name()),
            Err(_) => debug!("recv from {id}: {text}"),
        }
        match self.dispatcher.on_message(id, text) {
            Ok(report) if !report.is_clean() => debug!(
                "partial delivery after frame from {id}: {} delivered, {} skipped, {} failed",
                report.delivered, report.skipped, report.failed
            ),
            Ok(_) => {}
            Err(DispatchError::Protocol(e)) => warn!("dropping frame from {id}: {e}"),
            Err(DispatchError::Registry(e)) => debug!("frame from departed session: {e}"),
        }
    }

    fn closed(&mut self, id: ConnectionId) {
        let label = self
            .dispatcher
            .registry()
            .find(id)
            .map(|c| c.log_name())
            .ok();
        self.dispatcher.on_close(id);
        self.dispatcher.transport_mut().detach(id);
        if let Some(label) = label {
            info!(
                "{label} disconnected ({} connected)",
                self.dispatcher.registry().len()
            );
        }
    }

    fn sweep(&mut self) {
        let report = self.dispatcher.sweep();
        debug!(
            "liveness sweep: {} probed, {} evicted",
            report.probed,
            report.evicted.len()
        );
    }
}

/// Starts a hub task for `config` and returns its command queue.
pub fn spawn_hub(config: &HubConfig) -> (mpsc::Sender<HubCommand>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
    let hub = Hub::new(config.policy.clone(), config.probe_interval, rx);
    (tx, tokio::spawn(hub.run()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
