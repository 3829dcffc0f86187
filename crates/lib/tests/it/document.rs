//! Local editing, events, and subscriptions.

use std::sync::{Arc, Mutex};

use serde_json::json;
use tandem::{ChangeOrigin, DocEvent, DocumentKey, Input, Operation};

use crate::helpers::{actor, change, doc, ts};

#[test]
fn updates_commit_atomically() {
    let mut document = doc("atomic");
    let err = document
        .update(|edit| {
            edit.set("$", "a", 1i64)?;
            edit.set("$.missing", "b", 2i64)
        })
        .unwrap_err();
    assert!(err.is_validation_error());
    // The first set must not survive the failed session.
    assert_eq!(document.to_json(), json!({}));
    assert!(document.pending_changes().is_empty());
}

#[test]
fn update_returns_the_committed_change() {
    let mut document = doc("update-return");
    let committed = document
        .update(|edit| {
            edit.set("$", "a", 1i64)?;
            edit.set("$", "b", 2i64)
        })
        .unwrap()
        .expect("edits were made");
    assert_eq!(committed.actor, document.actor());
    assert_eq!(committed.lamport, 1);
    assert_eq!(committed.ops.len(), 2);
    assert_eq!(document.pending_changes(), vec![committed]);

    // A session that edits nothing commits nothing.
    let empty = document.update(|_| Ok(())).unwrap();
    assert!(empty.is_none());
}

#[test]
fn nested_values_expand_into_containers() {
    let mut document = doc("nested");
    document
        .update(|edit| {
            edit.set(
                "$",
                "todo",
                Input::object([
                    ("title", Input::from("shop")),
                    ("tags", Input::array([Input::from("a"), Input::from("b")])),
                    ("body", Input::text("hi")),
                    ("votes", Input::counter(2)),
                ]),
            )
        })
        .unwrap();

    assert_eq!(
        document.to_json(),
        json!({
            "todo": {
                "title": "shop",
                "tags": ["a", "b"],
                "body": "hi",
                "votes": 2,
            }
        })
    );
    // One change, however many nodes the value expanded into.
    assert_eq!(document.pending_changes().len(), 1);
}

#[test]
fn text_edits_address_live_character_indices() {
    let mut document = doc("text");
    document
        .update(|edit| edit.set("$", "note", Input::text("hello world")))
        .unwrap();
    document
        .update(|edit| edit.edit("$.note", 5, 11, "!"))
        .unwrap();
    assert_eq!(document.get("$.note"), Some(json!("hello!")));

    document
        .update(|edit| edit.style("$.note", 0, 5, [("bold", "true")]))
        .unwrap();
    let node = document.root().resolve("$.note").unwrap();
    let spans = node.as_text().unwrap().spans();
    assert_eq!(spans[0].content, "hello");
    assert_eq!(spans[0].attributes.get("bold").map(String::as_str), Some("true"));
    assert!(spans[1].attributes.is_empty());
}

#[test]
fn arrays_edit_by_live_index() {
    let mut document = doc("arrays");
    document
        .update(|edit| {
            edit.set("$", "xs", Input::array([]))?;
            edit.push("$.xs", 1i64)?;
            edit.push("$.xs", 3i64)?;
            edit.insert("$.xs", 1, 2i64)
        })
        .unwrap();
    assert_eq!(document.get("$.xs"), Some(json!([1, 2, 3])));

    document.update(|edit| edit.remove_at("$.xs", 0)).unwrap();
    assert_eq!(document.get("$.xs"), Some(json!([2, 3])));

    let err = document
        .update(|edit| edit.remove_at("$.xs", 5))
        .unwrap_err();
    assert!(err.is_validation_error());
}

#[test]
fn counters_accumulate_locally() {
    let mut document = doc("counters");
    document
        .update(|edit| edit.set("$", "votes", Input::counter(10)))
        .unwrap();
    document.update(|edit| edit.increase("$.votes", 5)).unwrap();
    document.update(|edit| edit.increase("$.votes", -2)).unwrap();
    assert_eq!(document.get("$.votes"), Some(json!(13)));

    let err = document
        .update(|edit| edit.increase("$", 1))
        .unwrap_err();
    assert!(err.is_validation_error());
}

#[test]
fn events_carry_origin_message_and_paths() {
    let events: Arc<Mutex<Vec<DocEvent>>> = Arc::default();
    let sink = Arc::clone(&events);

    let mut document = doc("events");
    let subscription = document.subscribe(move |event| {
        sink.lock().unwrap().push(event.clone());
    });

    document
        .update_with_message("init", |edit| {
            edit.set("$", "a", Input::object([("b", Input::from(1i64))]))
        })
        .unwrap();

    {
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            DocEvent::Change {
                origin,
                message,
                paths,
                ..
            } => {
                assert_eq!(*origin, ChangeOrigin::Local);
                assert_eq!(message.as_deref(), Some("init"));
                assert!(paths.contains(&"$.a".to_string()), "{paths:?}");
                assert!(paths.contains(&"$.a.b".to_string()), "{paths:?}");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    assert!(document.unsubscribe(subscription));
    document.update(|edit| edit.set("$", "c", 2i64)).unwrap();
    assert_eq!(events.lock().unwrap().len(), 1);
}

#[test]
fn merged_changes_emit_remote_events() {
    let events: Arc<Mutex<Vec<DocEvent>>> = Arc::default();
    let sink = Arc::clone(&events);

    let mut document = doc("remote-events");
    document.subscribe(move |event| {
        sink.lock().unwrap().push(event.clone());
    });

    let b = actor(2);
    document.apply_change(&change(
        b,
        1,
        vec![Operation::Set {
            parent: tandem::Timestamp::initial(),
            key: "x".to_string(),
            value: tandem::crdt::NodeSeed::Primitive(tandem::crdt::Primitive::Integer(7)),
            executed_at: ts(1, b),
        }],
    ));

    let events = events.lock().unwrap();
    assert!(matches!(
        &events[0],
        DocEvent::Change {
            origin: ChangeOrigin::Remote,
            ..
        }
    ));
}

#[test]
fn keys_must_be_url_safe() {
    assert!(DocumentKey::new("room-1").is_ok());
    let err = DocumentKey::new("no spaces").unwrap_err();
    assert!(err.is_validation_error());
}
