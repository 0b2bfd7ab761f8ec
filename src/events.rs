// Events that flow from the polling scheduler to the UI
//
// The scheduler runs in its own task, so it reports what happened over an
// mpsc channel instead of touching UI state directly. The store itself is
// read through snapshots; these events are only for notifications.

use chrono::{DateTime, Utc};

/// Something the poller wants the user to know about
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    /// A refresh replaced the cache
    Refreshed {
        timestamp: DateTime<Utc>,
        count: usize,
    },

    /// A refresh failed; the next tick will retry
    RefreshFailed {
        timestamp: DateTime<Utc>,
        message: String,
    },

    /// The server rejected the token; polling stopped and the store was cleared
    SessionEnded {
        timestamp: DateTime<Utc>,
        reason: String,
    },
}

impl MonitorEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Refreshed { timestamp, .. }
            | Self::RefreshFailed { timestamp, .. }
            | Self::SessionEnded { timestamp, .. } => *timestamp,
        }
    }
}
