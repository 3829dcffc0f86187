/*! Integration tests for Tandem.
 *
 * This test suite is organized as a single integration test binary.
 * The module structure mirrors the main library structure:
 * - crdt: convergence of the value model under reordered and
 *   re-delivered changes
 * - document: local editing, events, and subscriptions
 * - presence: per-replica presence maps
 * - sync: the push-pull loop against the in-process server
 * - gc: tombstone collection driven by the sync floor
 */

use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("tandem=info".parse().unwrap()),
        )
        .with_test_writer()
        .try_init();
}

mod crdt;
mod document;
mod gc;
mod helpers;
mod presence;
mod sync;
