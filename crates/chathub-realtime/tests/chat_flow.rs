//! End-to-end room scenarios over the in-process transport.

use std::sync::Arc;
use std::time::Duration;

use chathub_core::config::{PersistenceConfig, RealtimeConfig};
use chathub_core::error::ErrorKind;
use chathub_core::types::{RoomId, UserId};
use chathub_database::{ChatStore, MemoryChatStore};
use chathub_realtime::connection::{
    ChannelPeer, ChannelTransport, NORMAL_CLOSURE, PeerEvent, ROOM_CLOSED_REASON,
    ROOM_MISSING_REASON,
};
use chathub_realtime::{ChatEngine, ChatIdentity, CloseOutcome};
use tokio::task::JoinHandle;

fn engine() -> (Arc<MemoryChatStore>, ChatEngine) {
    let store = Arc::new(MemoryChatStore::new());
    let engine = ChatEngine::new(
        store.clone(),
        &RealtimeConfig::default(),
        &PersistenceConfig::default(),
    );
    (store, engine)
}

fn user(name: &str) -> ChatIdentity {
    ChatIdentity {
        user_id: UserId::new(),
        username: name.to_string(),
    }
}

fn connect(
    engine: &ChatEngine,
    room_id: RoomId,
    identity: ChatIdentity,
) -> (ChannelPeer, JoinHandle<chathub_core::AppResult<()>>) {
    let (transport, peer) = ChannelTransport::pair();
    let engine = engine.clone();
    let task =
        tokio::spawn(async move { engine.accept_connection(room_id, identity, transport).await });
    (peer, task)
}

async fn next(peer: &mut ChannelPeer) -> PeerEvent {
    tokio::time::timeout(Duration::from_secs(2), peer.next_event())
        .await
        .expect("no event in time")
        .expect("server side dropped")
}

async fn next_json(peer: &mut ChannelPeer) -> serde_json::Value {
    match next(peer).await {
        PeerEvent::Frame(text) => serde_json::from_str(&text).expect("frame is json"),
        other => panic!("expected a frame, got {other:?}"),
    }
}

#[tokio::test]
async fn test_general_room_hi_reaches_other_connection_and_store() {
    let (store, engine) = engine();
    let general = engine.open_room("general").await.unwrap();

    let alice = user("alice");
    let alice_id = alice.user_id;
    let (mut a, a_task) = connect(&engine, general.id, alice);
    let (mut b, b_task) = connect(&engine, general.id, user("bob"));
    assert_eq!(next_json(&mut a).await["type"], "joined");
    assert_eq!(next_json(&mut b).await["type"], "joined");

    assert!(a.send("hi"));

    let got = next_json(&mut b).await;
    assert_eq!(got["type"], "message");
    assert_eq!(got["body"], "hi");
    assert_eq!(got["author_id"], alice_id.to_string());
    assert_eq!(got["room_id"], general.id.to_string());

    a.hang_up();
    b.hang_up();
    a_task.await.unwrap().unwrap();
    b_task.await.unwrap().unwrap();
    engine.shutdown().await;

    let rows = store.messages().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].body, "hi");
    assert_eq!(rows[0].author_id, alice_id);
    assert_eq!(rows[0].room_id, general.id);
    let room = store.find_room(rows[0].room_id).await.unwrap().unwrap();
    assert_eq!(room.name, "general");
}

#[tokio::test]
async fn test_never_opened_room_is_rejected() {
    let (store, engine) = engine();

    let (transport, mut peer) = ChannelTransport::pair();
    peer.send("let me in");
    let err = engine
        .accept_connection(RoomId::new(), user("mallory"), transport)
        .await
        .unwrap_err();

    assert!(err.is(ErrorKind::NotFound));
    assert_eq!(
        next(&mut peer).await,
        PeerEvent::Closed {
            code: NORMAL_CLOSURE,
            reason: ROOM_MISSING_REASON.to_string(),
        }
    );
    assert_eq!(peer.close_calls(), 1);
    assert_eq!(engine.metrics().connections_rejected, 1);

    engine.shutdown().await;
    assert_eq!(store.message_count().await, 0);
}

#[tokio::test]
async fn test_messages_keep_submission_order() {
    let (store, engine) = engine();
    let room = engine.open_room("ordered").await.unwrap();

    let (mut a, a_task) = connect(&engine, room.id, user("alice"));
    let (mut b, b_task) = connect(&engine, room.id, user("bob"));
    next_json(&mut a).await;
    next_json(&mut b).await;

    for i in 0..50 {
        assert!(a.send(format!("m{i}")));
    }
    for i in 0..50 {
        assert_eq!(next_json(&mut b).await["body"], format!("m{i}"));
    }

    a.hang_up();
    b.hang_up();
    a_task.await.unwrap().unwrap();
    b_task.await.unwrap().unwrap();
    engine.shutdown().await;

    assert_eq!(store.message_count().await, 50);
    let recent = engine.recent_messages(room.id, Some(3)).await.unwrap();
    assert_eq!(recent.len(), 3);
    assert!(recent.windows(2).all(|w| w[0].sent_at >= w[1].sent_at));
    assert!(recent.iter().all(|m| m.is_persisted()));
}

#[tokio::test]
async fn test_close_room_notifies_and_releases_connections() {
    let (_store, engine) = engine();
    let room = engine.open_room("closing").await.unwrap();

    let (mut a, a_task) = connect(&engine, room.id, user("alice"));
    let (mut b, b_task) = connect(&engine, room.id, user("bob"));
    next_json(&mut a).await;
    next_json(&mut b).await;

    assert_eq!(engine.close_room(room.id).await, CloseOutcome::Closed);
    assert_eq!(engine.close_room(room.id).await, CloseOutcome::AlreadyClosed);

    for peer in [&mut a, &mut b] {
        assert_eq!(next_json(peer).await["type"], "room_closed");
        assert_eq!(
            next(peer).await,
            PeerEvent::Closed {
                code: NORMAL_CLOSURE,
                reason: ROOM_CLOSED_REASON.to_string(),
            }
        );
    }
    a_task.await.unwrap().unwrap();
    b_task.await.unwrap().unwrap();
    assert_eq!(a.close_calls(), 1);
    assert_eq!(b.close_calls(), 1);

    assert!(engine.list_open_rooms().await.is_empty());
    let reopened = engine.reopen_room(room.id).await.unwrap();
    assert_eq!(reopened.id, room.id);
    engine.shutdown().await;
}

#[tokio::test]
async fn test_recent_messages_unknown_room_is_not_found() {
    let (_store, engine) = engine();
    let err = engine
        .recent_messages(RoomId::new(), None)
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::NotFound));
    engine.shutdown().await;
}

#[tokio::test]
async fn test_open_room_rejects_bad_names_and_duplicates() {
    let (_store, engine) = engine();
    assert!(engine.open_room("   ").await.unwrap_err().is(ErrorKind::Validation));

    engine.open_room(" lobby ").await.unwrap();
    let err = engine.open_room("lobby").await.unwrap_err();
    assert!(err.is(ErrorKind::Conflict));

    let names: Vec<String> = engine
        .list_rooms()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.name)
        .collect();
    assert_eq!(names, vec!["lobby".to_string()]);
    engine.shutdown().await;
}
