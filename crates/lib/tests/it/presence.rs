//! Per-replica presence maps.

use std::sync::{Arc, Mutex};

use tandem::{DocEvent, Presence, SyncServer};

use crate::helpers::{attach, doc};

#[test]
fn publishing_presence_emits_an_event() {
    let events: Arc<Mutex<Vec<DocEvent>>> = Arc::default();
    let sink = Arc::clone(&events);

    let mut document = doc("presence-local");
    document.subscribe(move |event| {
        sink.lock().unwrap().push(event.clone());
    });

    let cursor: Presence = [("cursor", "5")].into_iter().collect();
    document.set_presence(cursor.clone());

    let actor = document.actor();
    assert_eq!(document.presence(&actor), Some(&cursor));
    assert!(matches!(
        &events.lock().unwrap()[0],
        DocEvent::PresenceUpdated { .. }
    ));
}

#[tokio::test]
async fn presence_propagates_between_replicas() {
    let server = Arc::new(SyncServer::new());
    let ha = attach(server.clone(), "presence").await;
    let hb = attach(server.clone(), "presence").await;

    let cursor: Presence = [("cursor", "12"), ("name", "ada")].into_iter().collect();
    let actor_a = {
        let document = ha.document();
        let mut doc = document.lock().await;
        doc.set_presence(cursor.clone());
        doc.actor()
    };

    ha.sync_now().await.unwrap();
    hb.sync_now().await.unwrap();

    assert_eq!(
        hb.document().lock().await.presence(&actor_a),
        Some(&cursor)
    );
}

#[tokio::test]
async fn newest_update_replaces_the_whole_map() {
    let server = Arc::new(SyncServer::new());
    let ha = attach(server.clone(), "presence-lww").await;
    let hb = attach(server.clone(), "presence-lww").await;

    let first: Presence = [("cursor", "1"), ("name", "ada")].into_iter().collect();
    let second: Presence = [("cursor", "2")].into_iter().collect();
    let actor_a = {
        let document = ha.document();
        let mut doc = document.lock().await;
        doc.set_presence(first);
        doc.actor()
    };
    ha.sync_now().await.unwrap();
    ha.document().lock().await.set_presence(second.clone());
    ha.sync_now().await.unwrap();

    hb.sync_now().await.unwrap();
    // Replacement is wholesale; "name" did not linger.
    assert_eq!(
        hb.document().lock().await.presence(&actor_a),
        Some(&second)
    );
}

#[tokio::test]
async fn detaching_removes_presence_everywhere() {
    let server = Arc::new(SyncServer::new());
    let ha = attach(server.clone(), "presence-detach").await;
    let hb = attach(server.clone(), "presence-detach").await;

    let cursor: Presence = [("cursor", "3")].into_iter().collect();
    let actor_a = {
        let document = ha.document();
        let mut doc = document.lock().await;
        doc.set_presence(cursor);
        doc.actor()
    };
    ha.sync_now().await.unwrap();
    hb.sync_now().await.unwrap();
    assert!(hb.document().lock().await.presence(&actor_a).is_some());

    ha.detach().await.unwrap();
    hb.sync_now().await.unwrap();
    assert!(hb.document().lock().await.presence(&actor_a).is_none());
}
