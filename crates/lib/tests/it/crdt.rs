//! Convergence of the value model under reordered, interleaved, and
//! re-delivered changes, exercised through hand-built changes from
//! multiple replicas.

use serde_json::json;
use tandem::crdt::{NodeSeed, Primitive, TextPos};
use tandem::time::VersionVector;
use tandem::{Change, Document, Operation, Timestamp};

use crate::helpers::{actor, change, doc, ts, tsd};

fn replay(key: &str, changes: &[&Change]) -> Document {
    let mut document = doc(key);
    for change in changes {
        document.apply_change(change);
    }
    document
}

#[test]
fn concurrent_object_writes_resolve_to_the_higher_timestamp() {
    let a = actor(1);
    let b = actor(2);
    let root = Timestamp::initial();
    // Replica a writes config = { theme: "dark" }, replica b concurrently
    // writes config = { mode: "compact" }. The whole entry resolves to
    // b's object; no key-level merge happens across the conflict.
    let ca = change(
        a,
        1,
        vec![
            Operation::Set {
                parent: root,
                key: "config".to_string(),
                value: NodeSeed::Object,
                executed_at: ts(1, a),
            },
            Operation::Set {
                parent: ts(1, a),
                key: "theme".to_string(),
                value: NodeSeed::Primitive(Primitive::from("dark")),
                executed_at: tsd(1, a, 1),
            },
        ],
    );
    let cb = change(
        b,
        1,
        vec![
            Operation::Set {
                parent: root,
                key: "config".to_string(),
                value: NodeSeed::Object,
                executed_at: ts(1, b),
            },
            Operation::Set {
                parent: ts(1, b),
                key: "mode".to_string(),
                value: NodeSeed::Primitive(Primitive::from("compact")),
                executed_at: tsd(1, b, 1),
            },
        ],
    );

    let d1 = replay("crdt-objects", &[&ca, &cb]);
    let d2 = replay("crdt-objects", &[&cb, &ca]);
    assert_eq!(d1.to_json(), d2.to_json());
    assert_eq!(d1.to_json(), json!({ "config": { "mode": "compact" } }));
}

#[test]
fn concurrent_head_text_inserts_converge() {
    let a = actor(1);
    let b = actor(2);
    let text = ts(1, a);
    let c0 = change(
        a,
        1,
        vec![Operation::Set {
            parent: Timestamp::initial(),
            key: "note".to_string(),
            value: NodeSeed::Text,
            executed_at: text,
        }],
    );
    let head = TextPos {
        created_at: text,
        offset: 0,
    };
    let mut seen = VersionVector::new();
    seen.observe(&text);
    // Both replicas insert at index 0 of the empty text. The newer
    // insert takes the head boundary, so "X" lands first everywhere.
    let ca = change(
        a,
        2,
        vec![Operation::Edit {
            parent: text,
            from: head,
            to: head,
            content: "hello".to_string(),
            seen: seen.clone(),
            executed_at: ts(2, a),
        }],
    );
    let cb = change(
        b,
        2,
        vec![Operation::Edit {
            parent: text,
            from: head,
            to: head,
            content: "X".to_string(),
            seen,
            executed_at: ts(2, b),
        }],
    );

    let d1 = replay("crdt-text", &[&c0, &ca, &cb]);
    let d2 = replay("crdt-text", &[&c0, &cb, &ca]);
    assert_eq!(d1.get("$.note"), Some(json!("Xhello")));
    assert_eq!(d1.to_json(), d2.to_json());
}

#[test]
fn counter_increments_sum_in_any_order() {
    let a = actor(1);
    let b = actor(2);
    let counter = ts(1, a);
    let c0 = change(
        a,
        1,
        vec![Operation::Set {
            parent: Timestamp::initial(),
            key: "votes".to_string(),
            value: NodeSeed::Counter { initial: 0 },
            executed_at: counter,
        }],
    );
    let increments = [
        change(
            a,
            2,
            vec![Operation::Increase {
                parent: counter,
                amount: 1,
                executed_at: ts(2, a),
            }],
        ),
        change(
            b,
            2,
            vec![Operation::Increase {
                parent: counter,
                amount: 2,
                executed_at: ts(2, b),
            }],
        ),
        change(
            b,
            3,
            vec![Operation::Increase {
                parent: counter,
                amount: 3,
                executed_at: ts(3, b),
            }],
        ),
    ];

    for order in [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]] {
        let mut document = doc("crdt-counter");
        document.apply_change(&c0);
        for i in order {
            document.apply_change(&increments[i]);
        }
        assert_eq!(document.get("$.votes"), Some(json!(6)), "{order:?}");
    }
}

#[test]
fn remove_and_concurrent_edit_converge() {
    let a = actor(1);
    let b = actor(2);
    let list = ts(1, a);
    let item = tsd(1, a, 1);
    let c0 = change(
        a,
        1,
        vec![
            Operation::Set {
                parent: Timestamp::initial(),
                key: "items".to_string(),
                value: NodeSeed::Array,
                executed_at: list,
            },
            Operation::Add {
                parent: list,
                after: list,
                value: NodeSeed::Object,
                executed_at: item,
            },
            Operation::Set {
                parent: item,
                key: "name".to_string(),
                value: NodeSeed::Primitive(Primitive::from("milk")),
                executed_at: tsd(1, a, 2),
            },
        ],
    );
    // Replica a removes the item while b concurrently edits inside it.
    let ca = change(
        a,
        2,
        vec![Operation::Remove {
            parent: list,
            target: item,
            executed_at: ts(2, a),
        }],
    );
    let cb = change(
        b,
        2,
        vec![Operation::Set {
            parent: item,
            key: "qty".to_string(),
            value: NodeSeed::Primitive(Primitive::Integer(2)),
            executed_at: ts(2, b),
        }],
    );

    let d1 = replay("crdt-remove", &[&c0, &ca, &cb]);
    let d2 = replay("crdt-remove", &[&c0, &cb, &ca]);
    assert_eq!(d1.to_json(), d2.to_json());
    // The removal wins the visible value; the edit landed on the
    // tombstoned item without error.
    assert_eq!(d1.to_json(), json!({ "items": [] }));
}

#[test]
fn redelivered_changes_are_noops() {
    let a = actor(1);
    let counter = ts(1, a);
    let c0 = change(
        a,
        1,
        vec![Operation::Set {
            parent: Timestamp::initial(),
            key: "votes".to_string(),
            value: NodeSeed::Counter { initial: 0 },
            executed_at: counter,
        }],
    );
    let c1 = change(
        a,
        2,
        vec![Operation::Increase {
            parent: counter,
            amount: 5,
            executed_at: ts(2, a),
        }],
    );

    let mut document = doc("crdt-idempotent");
    document.apply_change(&c0);
    document.apply_change(&c1);
    document.apply_change(&c1);
    document.apply_change(&c0);
    assert_eq!(document.get("$.votes"), Some(json!(5)));
}

#[test]
fn unknown_references_are_skipped() {
    let b = actor(2);
    let orphan = change(
        b,
        9,
        vec![Operation::Set {
            parent: ts(7, b),
            key: "x".to_string(),
            value: NodeSeed::Primitive(Primitive::Integer(1)),
            executed_at: ts(9, b),
        }],
    );
    let mut document = doc("crdt-orphan");
    document.apply_change(&orphan);
    assert_eq!(document.to_json(), json!({}));
}
