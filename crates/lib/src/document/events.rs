//! Document change and presence events.

use crate::presence::Presence;
use crate::time::ActorId;

/// Where a change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// Produced by this replica's own editing calls.
    Local,
    /// Pulled from the server and merged.
    Remote,
}

/// An event delivered to document subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum DocEvent {
    /// The document value changed.
    Change {
        origin: ChangeOrigin,
        actor: ActorId,
        message: Option<String>,
        /// Dotted `$`-rooted paths whose visible value may have changed.
        paths: Vec<String>,
    },
    /// A replica published or replaced its presence.
    PresenceUpdated { actor: ActorId, presence: Presence },
    /// A replica detached and its presence was removed.
    PresenceDeparted { actor: ActorId },
}

/// Handle returned by [`crate::Document::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);

pub(crate) type Listener = Box<dyn Fn(&DocEvent) + Send + Sync>;
