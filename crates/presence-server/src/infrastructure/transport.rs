//! `Transport` implementation backed by per-session outbox queues.
//!
//! The hub task never touches a socket.  Each WebSocket session owns a writer
//! task that drains a bounded [`mpsc`] queue of [`Outgoing`] items; the hub
//! holds the sending half here.  Queuing is non-blocking (`try_send`), so a
//! client that stops reading loses frames instead of stalling everyone else.

use std::collections::HashMap;

use presence_core::{ConnectionId, DeliveryFailure, Transport};
use tokio::sync::mpsc::{self, error::TrySendError};

/// Frames queued per session before further sends are dropped.
pub const OUTBOX_CAPACITY: usize = 256;

/// One item for a session's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    /// An encoded envelope, sent as a text frame.
    Text(String),
    /// A WebSocket ping control frame.
    Ping,
    /// Send a close frame and stop writing.
    Close,
}

pub type Outbox = mpsc::Sender<Outgoing>;

#[derive(Debug, Default)]
pub struct ChannelTransport {
    sessions: HashMap<ConnectionId, Outbox>,
}

impl ChannelTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the outbox of a newly accepted session.
    pub fn attach(&mut self, id: ConnectionId, outbox: Outbox) {
        self.sessions.insert(id, outbox);
    }

    /// Forgets a session.  Dropping the sender lets its writer task finish
    /// once the queue is drained.
    pub fn detach(&mut self, id: ConnectionId) -> bool {
        self.sessions.remove(&id).is_some()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn push(&self, id: ConnectionId, item: Outgoing) -> Result<(), DeliveryFailure> {
        let outbox = self.sessions.get(&id).ok_or(DeliveryFailure::NotOpen(id))?;
        outbox.try_send(item).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryFailure::SendFailed {
                id,
                reason: "outbox full".to_string(),
            },
            TrySendError::Closed(_) => DeliveryFailure::NotOpen(id),
        })
    }
}

impl Transport for ChannelTransport {
    fn is_open(&self, id: ConnectionId) -> bool {
        self.sessions
            .get(&id)
            .is_some_and(|outbox| !outbox.is_closed())
    }

    fn send(&mut self, id: ConnectionId, frame: &str) -> Result<(), DeliveryFailure> {
        self.push(id, Outgoing::Text(frame.to_string()))
    }

    fn ping(&mut self, id: ConnectionId) -> Result<(), DeliveryFailure> {
        self.push(id, Outgoing::Ping)
    }

    fn close(&mut self, id: ConnectionId) {
        if let Some(outbox) = self.sessions.remove(&id) {
            // Best effort: if the queue is full the writer still stops once
            // the dropped sender drains.
            let _ = outbox.try_send(Outgoing::Close);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_send_queues_text_frame() {
        // Arrange
        let mut transport = ChannelTransport::new();
        let id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::channel(4);
        transport.attach(id, tx);

        // Act
        transport.send(id, r#"{"code":5,"data":true}"#).unwrap();

        // Assert
        assert_eq!(
            rx.try_recv().unwrap(),
            Outgoing::Text(r#"{"code":5,"data":true}"#.to_string())
        );
    }

    #[test]
    fn test_unknown_session_is_not_open() {
        let mut transport = ChannelTransport::new();
        let id = Uuid::new_v4();
        assert!(!transport.is_open(id));
        assert_eq!(transport.ping(id), Err(DeliveryFailure::NotOpen(id)));
    }

    #[test]
    fn test_dropped_receiver_means_not_open() {
        let mut transport = ChannelTransport::new();
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(4);
        transport.attach(id, tx);
        assert!(transport.is_open(id));

        drop(rx);

        assert!(!transport.is_open(id));
        assert_eq!(transport.send(id, "x"), Err(DeliveryFailure::NotOpen(id)));
    }

    #[test]
    fn test_full_outbox_is_a_send_failure() {
        let mut transport = ChannelTransport::new();
        let id = Uuid::new_v4();
        let (tx, _rx) = mpsc::channel(1);
        transport.attach(id, tx);

        transport.send(id, "first").unwrap();
        let result = transport.send(id, "second");

        assert!(matches!(result, Err(DeliveryFailure::SendFailed { .. })));
    }

    #[test]
    fn test_close_queues_close_and_forgets_session() {
        let mut transport = ChannelTransport::new();
        let id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::channel(4);
        transport.attach(id, tx);

        transport.close(id);

        assert_eq!(rx.try_recv().unwrap(), Outgoing::Close);
        assert_eq!(transport.session_count(), 0);
        assert!(!transport.detach(id));
    }
}
