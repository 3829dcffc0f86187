//! Tombstone garbage collection.
//!
//! Deleted nodes are kept as tombstones so that concurrent operations
//! can still resolve them. Once every attached replica has reported a
//! lamport value past a tombstone's deletion stamp, no operation that
//! could reference it can still be produced, and the subtree is
//! physically reclaimed. The floor is the minimum observed lamport
//! across attached replicas, as computed by the server.

use tracing::debug;

use crate::crdt::Root;
use crate::document::DocumentKey;

/// Reclaim every tombstone in `root` whose deletion lamport is strictly
/// below `floor`. Returns the number of nodes removed.
pub(crate) fn collect(key: &DocumentKey, root: &mut Root, floor: u64) -> usize {
    let purged = root.purge(floor);
    if purged > 0 {
        debug!(doc = %key, floor, purged, "collected tombstones");
    }
    purged
}
