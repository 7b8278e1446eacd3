//! In-memory [`Transport`] that records every call.
//!
//! Used by unit tests, the integration tests under `tests/`, and the fan-out
//! benchmark.  Nothing leaves the process: sent frames, pings and closes are
//! pushed into vectors so assertions can inspect exactly what happened and in
//! what order.
//!
//! ```rust
//! use presence_core::application::recording_transport::RecordingTransport;
//! use presence_core::Transport;
//! use uuid::Uuid;
//!
//! let mut transport = RecordingTransport::new();
//! let id = Uuid::new_v4();
//! transport.send(id, r#"{"code":5,"data":true}"#).unwrap();
//! assert_eq!(transport.frames_for(id), vec![r#"{"code":5,"data":true}"#]);
//! ```
//!
//! # Failure injection
//!
//! - [`mark_closed`](RecordingTransport::mark_closed) makes `is_open` return
//!   `false` for a session, as if the peer vanished.
//! - [`fail_sends_to`](RecordingTransport::fail_sends_to) keeps the session
//!   "open" but makes every `send` and `ping` to it return an error.

use std::collections::HashSet;

use crate::application::router::{DeliveryFailure, Transport};
use crate::domain::connection::ConnectionId;

#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Vec<(ConnectionId, String)>,
    pings: Vec<ConnectionId>,
    closes: Vec<ConnectionId>,
    closed: HashSet<ConnectionId>,
    failing: HashSet<ConnectionId>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_closed(&mut self, id: ConnectionId) {
        self.closed.insert(id);
    }

    pub fn fail_sends_to(&mut self, id: ConnectionId) {
        self.failing.insert(id);
    }

    /// Every `(recipient, frame)` pair in send order.
    pub fn sent(&self) -> &[(ConnectionId, String)] {
        &self.sent
    }

    /// Frames sent to one session, in order.
    pub fn frames_for(&self, id: ConnectionId) -> Vec<&str> {
        self.sent
            .iter()
            .filter(|(to, _)| *to == id)
            .map(|(_, frame)| frame.as_str())
            .collect()
    }

    pub fn pings(&self) -> &[ConnectionId] {
        &self.pings
    }

    /// Sessions passed to `close`, in order.
    pub fn closes(&self) -> &[ConnectionId] {
        &self.closes
    }

    /// Forgets everything recorded so far; failure injection is kept.
    pub fn clear(&mut self) {
        self.sent.clear();
        self.pings.clear();
        self.closes.clear();
    }
}

impl Transport for RecordingTransport {
    fn is_open(&self, id: ConnectionId) -> bool {
        !self.closed.contains(&id)
    }

    fn send(&mut self, id: ConnectionId, frame: &str) -> Result<(), DeliveryFailure> {
        if self.failing.contains(&id) {
            return Err(DeliveryFailure::SendFailed {
                id,
                reason: "injected failure".to_string(),
            });
        }
        self.sent.push((id, frame.to_string()));
        Ok(())
    }

    fn ping(&mut self, id: ConnectionId) -> Result<(), DeliveryFailure> {
        if self.failing.contains(&id) {
            return Err(DeliveryFailure::SendFailed {
                id,
                reason: "injected failure".to_string(),
            });
        }
        self.pings.push(id);
        Ok(())
    }

    fn close(&mut self, id: ConnectionId) {
        self.closes.push(id);
        self.closed.insert(id);
    }
}
