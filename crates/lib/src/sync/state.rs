//! Observable sync state.

use std::fmt;

/// Lifecycle of the background loop for one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Attached to the server; the first sync cycle has not completed.
    Attaching,
    /// A sync cycle is in flight.
    Syncing,
    /// The last cycle completed and nothing is pending.
    Synced,
    /// Cycles are suspended until resumed; local edits still queue up.
    Paused,
    /// The loop has shut down.
    Detached,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncStatus::Attaching => "attaching",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Synced => "synced",
            SyncStatus::Paused => "paused",
            SyncStatus::Detached => "detached",
        };
        f.write_str(s)
    }
}

/// Reachability of the server, as seen by the last cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    /// The last cycle failed; retries are backing off.
    Disconnected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
        };
        f.write_str(s)
    }
}
