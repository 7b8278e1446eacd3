//! Hook for recording accepted activity changes.
//!
//! The hub keeps no history of its own; nothing is persisted across a
//! restart.  Embedders that want an audit trail implement
//! [`ActivityHistory`] and pass it to
//! [`Dispatcher::with_history`](crate::application::dispatcher::Dispatcher::with_history).

use crate::domain::connection::ActivityState;

/// One accepted activity transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityChange {
    pub display_name: String,
    pub from: ActivityState,
    pub to: ActivityState,
}

/// Receives every activity change the state machine accepts.
///
/// Called synchronously from inside the hub loop, so implementations must not
/// block.  No-op transitions (target equals current state) are never recorded.
pub trait ActivityHistory: Send {
    fn record(&mut self, change: &ActivityChange);
}

/// Discards every change.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHistory;

impl ActivityHistory for NoHistory {
    fn record(&mut self, _change: &ActivityChange) {}
}
