//! Tombstone collection.

use std::sync::Arc;

use serde_json::json;
use tandem::crdt::NodeSeed;
use tandem::{Operation, SyncServer, Timestamp};

use crate::helpers::{actor, attach, change, doc, ts};

#[test]
fn floor_collects_strictly_below() {
    let mut document = doc("gc-floor");
    document.update(|edit| edit.set("$", "a", 1i64)).unwrap(); // lamport 1
    document.update(|edit| edit.remove("$", "a")).unwrap(); // lamport 2

    // Root plus the tombstoned entry.
    assert_eq!(document.node_count(), 2);
    assert_eq!(document.to_json(), json!({}));

    // A replica may still sit exactly at the deletion stamp.
    assert_eq!(document.garbage_collect(2), 0);
    assert_eq!(document.garbage_collect(3), 1);
    assert_eq!(document.node_count(), 1);
}

#[test]
fn collection_reclaims_whole_subtrees() {
    let mut document = doc("gc-subtree");
    document
        .update(|edit| {
            edit.set(
                "$",
                "todo",
                tandem::Input::object([
                    ("title", tandem::Input::from("shop")),
                    ("tags", tandem::Input::array([tandem::Input::from("a")])),
                ]),
            )
        })
        .unwrap(); // lamport 1
    document.update(|edit| edit.remove("$", "todo")).unwrap(); // lamport 2

    // todo + title + tags + "a" are all tombstoned but retained.
    assert_eq!(document.node_count(), 5);
    assert_eq!(document.garbage_collect(3), 4);
    assert_eq!(document.node_count(), 1);
}

#[test]
fn replayed_increments_stay_noops_after_collection() {
    let a = actor(1);
    let mut document = doc("gc-counter");
    document.apply_change(&change(
        a,
        1,
        vec![Operation::Set {
            parent: Timestamp::initial(),
            key: "hits".to_string(),
            value: NodeSeed::Counter { initial: 0 },
            executed_at: ts(1, a),
        }],
    ));
    let increment = change(
        a,
        2,
        vec![Operation::Increase {
            parent: ts(1, a),
            amount: 5,
            executed_at: ts(2, a),
        }],
    );
    document.apply_change(&increment);
    assert_eq!(document.get("$.hits"), Some(json!(5)));

    // Collection prunes the increment's re-delivery guard; a replay of
    // the same change must still be a no-op.
    document.garbage_collect(3);
    document.apply_change(&increment);
    assert_eq!(document.get("$.hits"), Some(json!(5)));
}

#[tokio::test]
async fn sync_floor_rises_once_every_replica_has_observed() {
    let server = Arc::new(SyncServer::new());
    let ha = attach(server.clone(), "gc-sync").await;
    let hb = attach(server.clone(), "gc-sync").await;

    {
        let document = ha.document();
        let mut doc = document.lock().await;
        doc.update(|edit| edit.set("$", "a", 1i64)).unwrap(); // lamport 1
        doc.update(|edit| edit.remove("$", "a")).unwrap(); // lamport 2
        doc.update(|edit| edit.set("$", "b", 3i64)).unwrap(); // lamport 3
    }
    ha.sync_now().await.unwrap();

    // b pulls the changes; its own observation is only reported on the
    // next cycle, so nothing is collectible yet.
    hb.sync_now().await.unwrap();
    assert_eq!(hb.document().lock().await.node_count(), 3);

    // Now both replicas have reported past the deletion stamp.
    hb.sync_now().await.unwrap();
    assert_eq!(hb.document().lock().await.node_count(), 2);

    ha.sync_now().await.unwrap();
    assert_eq!(ha.document().lock().await.node_count(), 2);

    let a = ha.document().lock().await.to_json();
    assert_eq!(a, json!({ "b": 3 }));
    assert_eq!(a, hb.document().lock().await.to_json());
}
