//! BroadcastRouter: resolves recipients and fans frames out over a [`Transport`].
//!
//! # Delivery guarantees
//!
//! Best-effort, at-most-once, to sessions that are open *at delivery time*:
//!
//! - A session the transport reports as not open is skipped.
//! - A failed send is counted and dropped; there is no queue and no retry.
//! - `deliver` never returns an error.  The [`DeliveryReport`] it returns is
//!   for the caller's logs only.
//!
//! Recipients are resolved against a copy of the registry's id list, in
//! accept order, so every recipient of one event sees the same frame and the
//! registry is never iterated while something else might mutate it.

use thiserror::Error;
use tracing::{debug, error};

use crate::domain::connection::ConnectionId;
use crate::domain::events::{OutboundEvent, RecipientSelector};
use crate::domain::registry::ConnectionRegistry;
use crate::protocol::envelope::encode_outbound;

/// A single failed delivery attempt.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryFailure {
    #[error("session {0} is not open")]
    NotOpen(ConnectionId),

    #[error("send to session {id} failed: {reason}")]
    SendFailed { id: ConnectionId, reason: String },
}

/// The transport primitives the core needs.
///
/// The server implements this on top of per-session WebSocket outboxes; tests
/// use [`RecordingTransport`](crate::application::recording_transport::RecordingTransport).
/// Every method is fire-and-forget: none of them waits for the peer.
#[cfg_attr(test, mockall::automock)]
pub trait Transport {
    /// `true` if a frame sent now has a chance of reaching the peer.
    fn is_open(&self, id: ConnectionId) -> bool;

    /// Queues one text frame.
    fn send(&mut self, id: ConnectionId, frame: &str) -> Result<(), DeliveryFailure>;

    /// Queues a transport-level ping.  The matching pong arrives later as a
    /// separate inbound event.
    fn ping(&mut self, id: ConnectionId) -> Result<(), DeliveryFailure>;

    /// Closes the session.  Idempotent.
    fn close(&mut self, id: ConnectionId);
}

/// Counters describing the outcome of one or more deliveries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    /// Recipients whose transport was not open.
    pub skipped: usize,
    /// Recipients whose send failed.
    pub failed: usize,
}

impl DeliveryReport {
    pub fn merge(&mut self, other: DeliveryReport) {
        self.delivered += other.delivered;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }

    /// `true` when nothing was skipped or failed.
    pub fn is_clean(&self) -> bool {
        self.skipped == 0 && self.failed == 0
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BroadcastRouter;

impl BroadcastRouter {
    pub fn new() -> Self {
        Self
    }

    /// Delivers one event to every recipient its selector resolves to.
    pub fn deliver<T: Transport + ?Sized>(
        &self,
        event: &OutboundEvent,
        registry: &ConnectionRegistry,
        transport: &mut T,
    ) -> DeliveryReport {
        let recipients = resolve(event.recipients, registry);
        let mut report = DeliveryReport::default();

        // Serialize once for every recipient.
        let frame = match encode_outbound(&event.payload) {
            Ok(frame) => frame,
            Err(e) => {
                error!("dropping {} event: {e}", event.payload.kind());
                report.failed = recipients.len();
                return report;
            }
        };

        for id in recipients {
            if !transport.is_open(id) {
                report.skipped += 1;
                continue;
            }
            match transport.send(id, &frame) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    debug!("{e}");
                    report.failed += 1;
                }
            }
        }

        debug!(
            "{} delivered={} skipped={} failed={}",
            event.payload.kind(),
            report.delivered,
            report.skipped,
            report.failed
        );
        report
    }

    /// Delivers events in order.  Each event is resolved against the registry
    /// as it stands when that event is delivered.
    pub fn deliver_all<T: Transport + ?Sized>(
        &self,
        events: &[OutboundEvent],
        registry: &ConnectionRegistry,
        transport: &mut T,
    ) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for event in events {
            report.merge(self.deliver(event, registry, transport));
        }
        report
    }
}

fn resolve(selector: RecipientSelector, registry: &ConnectionRegistry) -> Vec<ConnectionId> {
    match selector {
        RecipientSelector::Only(target) if registry.contains(target) => vec![target],
        RecipientSelector::Only(_) => Vec::new(),
        RecipientSelector::All | RecipientSelector::AllExcept(_) => registry
            .ids()
            .into_iter()
            .filter(|id| selector.includes(*id))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::recording_transport::RecordingTransport;
    use crate::domain::connection::Connection;
    use crate::domain::events::OutboundPayload;
    use mockall::predicate::eq;
    use uuid::Uuid;

    fn registry_with(count: usize) -> (ConnectionRegistry, Vec<ConnectionId>) {
        let mut registry = ConnectionRegistry::new();
        let ids: Vec<_> = (0..count).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            registry.add(Connection::new(*id, "127.0.0.1:1")).unwrap();
        }
        (registry, ids)
    }

    #[test]
    fn test_all_except_never_sends_to_the_sender() {
        // Arrange: three connections, the first is the sender.
        let (registry, ids) = registry_with(3);
        let sender = ids[0];
        let mut transport = MockTransport::new();
        transport.expect_is_open().return_const(true);
        transport
            .expect_send()
            .withf(move |id, _| *id == sender)
            .times(0);
        transport
            .expect_send()
            .withf(move |id, _| *id != sender)
            .times(2)
            .returning(|_, _| Ok(()));
        let event = OutboundEvent::all_except(sender, OutboundPayload::UserJoined("Bob".into()));

        // Act
        let report = BroadcastRouter::new().deliver(&event, &registry, &mut transport);

        // Assert
        assert_eq!(report.delivered, 2);
        assert!(report.is_clean());
    }

    #[test]
    fn test_only_sends_the_encoded_frame_to_the_target() {
        let (registry, ids) = registry_with(2);
        let mut transport = MockTransport::new();
        transport.expect_is_open().return_const(true);
        transport
            .expect_send()
            .with(eq(ids[1]), eq(r#"{"code":5,"data":true}"#))
            .times(1)
            .returning(|_, _| Ok(()));
        let event = OutboundEvent::to(ids[1], OutboundPayload::ClaimResult(true));

        let report = BroadcastRouter::new().deliver(&event, &registry, &mut transport);

        assert_eq!(report.delivered, 1);
    }

    #[test]
    fn test_only_to_unknown_connection_sends_nothing() {
        let (registry, _ids) = registry_with(2);
        let mut transport = RecordingTransport::new();
        let event = OutboundEvent::to(Uuid::new_v4(), OutboundPayload::ClaimResult(true));

        let report = BroadcastRouter::new().deliver(&event, &registry, &mut transport);

        assert_eq!(report, DeliveryReport::default());
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn test_closed_sessions_are_skipped_not_sent() {
        // Arrange
        let (registry, ids) = registry_with(3);
        let mut transport = RecordingTransport::new();
        transport.mark_closed(ids[1]);
        let event = OutboundEvent::all(OutboundPayload::UserLeft("Alice".into()));

        // Act
        let report = BroadcastRouter::new().deliver(&event, &registry, &mut transport);

        // Assert
        assert_eq!(report.delivered, 2);
        assert_eq!(report.skipped, 1);
        assert!(transport.frames_for(ids[1]).is_empty());
    }

    #[test]
    fn test_send_failures_are_counted_and_swallowed() {
        let (registry, ids) = registry_with(2);
        let mut transport = RecordingTransport::new();
        transport.fail_sends_to(ids[0]);
        let event = OutboundEvent::all(OutboundPayload::UserLeft("Alice".into()));

        let report = BroadcastRouter::new().deliver(&event, &registry, &mut transport);

        assert_eq!(report.failed, 1);
        assert_eq!(report.delivered, 1);
        assert_eq!(transport.frames_for(ids[1]), vec![r#"{"code":6,"data":"Alice"}"#]);
    }

    #[test]
    fn test_deliver_all_preserves_event_order_per_recipient() {
        let (registry, ids) = registry_with(1);
        let mut transport = RecordingTransport::new();
        let events = vec![
            OutboundEvent::to(ids[0], OutboundPayload::ClaimResult(true)),
            OutboundEvent::to(ids[0], OutboundPayload::UserList(vec![])),
        ];

        let report = BroadcastRouter::new().deliver_all(&events, &registry, &mut transport);

        assert_eq!(report.delivered, 2);
        assert_eq!(
            transport.frames_for(ids[0]),
            vec![r#"{"code":5,"data":true}"#, r#"{"code":3,"data":[]}"#]
        );
    }

    #[test]
    fn test_delivery_report_merge_sums_counters() {
        let mut a = DeliveryReport {
            delivered: 1,
            skipped: 2,
            failed: 0,
        };
        a.merge(DeliveryReport {
            delivered: 3,
            skipped: 0,
            failed: 1,
        });
        assert_eq!(
            a,
            DeliveryReport {
                delivered: 4,
                skipped: 2,
                failed: 1
            }
        );
        assert!(!a.is_clean());
    }
}
