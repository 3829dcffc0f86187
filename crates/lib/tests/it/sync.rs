//! The push-pull loop against the in-process server.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tandem::{ConnectionStatus, DocStatus, SyncServer, SyncStatus};

use crate::helpers::{attach, attach_doc, doc, FlakyTransport};

#[tokio::test]
async fn two_replicas_converge() {
    let server = Arc::new(SyncServer::new());
    let ha = attach(server.clone(), "converge").await;
    let hb = attach(server.clone(), "converge").await;

    ha.document()
        .lock()
        .await
        .update(|edit| edit.set("$", "x", 1i64))
        .unwrap();
    hb.document()
        .lock()
        .await
        .update(|edit| edit.set("$", "y", 2i64))
        .unwrap();

    ha.sync_now().await.unwrap();
    hb.sync_now().await.unwrap();
    ha.sync_now().await.unwrap();

    let a = ha.document().lock().await.to_json();
    let b = hb.document().lock().await.to_json();
    assert_eq!(a, json!({ "x": 1, "y": 2 }));
    assert_eq!(a, b);
    assert_eq!(ha.status(), SyncStatus::Synced);
}

#[tokio::test]
async fn offline_edits_replay_after_attach() {
    let server = Arc::new(SyncServer::new());

    let mut offline = doc("offline");
    offline
        .update(|edit| edit.set("$", "draft", "written offline"))
        .unwrap();
    assert_eq!(offline.status(), DocStatus::Detached);

    let ha = attach_doc(server.clone(), offline).await;
    ha.sync_now().await.unwrap();
    assert_eq!(server.change_count(ha.document().lock().await.key()), 1);

    let hb = attach(server.clone(), "offline").await;
    hb.sync_now().await.unwrap();
    assert_eq!(
        hb.document().lock().await.get("$.draft"),
        Some(json!("written offline"))
    );
}

#[tokio::test]
async fn pushes_are_acknowledged() {
    let server = Arc::new(SyncServer::new());
    let handle = attach(server.clone(), "acks").await;
    handle
        .document()
        .lock()
        .await
        .update(|edit| edit.set("$", "x", 1i64))
        .unwrap();
    assert_eq!(handle.document().lock().await.pending_changes().len(), 1);

    handle.sync_now().await.unwrap();
    assert!(handle.document().lock().await.pending_changes().is_empty());

    // A second cycle with nothing pending pushes nothing new.
    handle.sync_now().await.unwrap();
    assert_eq!(server.change_count(handle.document().lock().await.key()), 1);
}

#[tokio::test]
async fn transport_failures_surface_and_recover() {
    let transport = Arc::new(FlakyTransport::new());
    let handle = attach(transport.clone(), "flaky").await;

    handle
        .document()
        .lock()
        .await
        .update(|edit| edit.set("$", "x", 1i64))
        .unwrap();

    transport.set_failing(true);
    let err = handle.sync_now().await.unwrap_err();
    assert!(err.is_transport_error());
    assert_eq!(handle.connection(), ConnectionStatus::Disconnected);
    // The edit is still queued.
    assert_eq!(handle.document().lock().await.pending_changes().len(), 1);

    transport.set_failing(false);
    handle.sync_now().await.unwrap();
    assert_eq!(handle.connection(), ConnectionStatus::Connected);
    assert!(handle.document().lock().await.pending_changes().is_empty());
}

#[tokio::test]
async fn pause_suspends_the_cadence_until_resume() {
    let server = Arc::new(SyncServer::new());
    let handle = attach(server.clone(), "paused").await;

    handle.pause().await.unwrap();
    let mut status = handle.status_watch();
    tokio::time::timeout(
        Duration::from_secs(5),
        status.wait_for(|s| *s == SyncStatus::Paused),
    )
    .await
    .unwrap()
    .unwrap();

    handle
        .document()
        .lock()
        .await
        .update(|edit| edit.set("$", "x", 1i64))
        .unwrap();

    // Resume schedules an immediate cycle.
    handle.resume().await.unwrap();
    tokio::time::timeout(
        Duration::from_secs(5),
        status.wait_for(|s| *s == SyncStatus::Synced),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(server.change_count(handle.document().lock().await.key()), 1);
}

#[tokio::test]
async fn detach_flushes_pending_and_stops_the_loop() {
    let server = Arc::new(SyncServer::new());
    let handle = attach(server.clone(), "detach").await;
    let document = handle.document();
    document
        .lock()
        .await
        .update(|edit| edit.set("$", "x", 1i64))
        .unwrap();

    let clone = handle.clone();
    handle.detach().await.unwrap();

    let doc = document.lock().await;
    assert_eq!(doc.status(), DocStatus::Detached);
    assert_eq!(server.change_count(doc.key()), 1);
    drop(doc);

    let err = clone.sync_now().await.unwrap_err();
    assert!(matches!(err, tandem::SyncError::LoopStopped));
}
