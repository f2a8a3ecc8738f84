//! Registry of open rooms and the connections inside them.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use chathub_core::config::RealtimeConfig;
use chathub_core::error::AppError;
use chathub_core::result::AppResult;
use chathub_core::types::{ConnectionId, RoomId};
use chathub_database::ChatStore;
use chathub_entity::{ChatMessage, Room};
use chathub_worker::PersistencePool;

use super::broadcaster::{BroadcasterState, RoomBroadcaster};
use super::state::{Roster, RoomState};
use crate::connection::handle::ConnectionHandle;
use crate::metrics::RealtimeMetrics;

/// Point-in-time view of an open room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomDescriptor {
    /// Room id.
    pub id: RoomId,
    /// Display name.
    pub name: String,
    /// When the durable room was created.
    pub created_at: DateTime<Utc>,
    /// Connections joined at snapshot time.
    pub connections: usize,
    /// Broadcaster state at snapshot time.
    pub state: BroadcasterState,
}

impl RoomDescriptor {
    fn of(state: &RoomState) -> Self {
        Self {
            id: state.room.id,
            name: state.room.name.clone(),
            created_at: state.room.created_at,
            connections: state.clients.len(),
            state: *state.broadcaster_state.borrow(),
        }
    }
}

/// Result of [`RoomRegistry::close`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseOutcome {
    /// This call closed the room.
    Closed,
    /// The room was not open.
    AlreadyClosed,
}

#[derive(Debug, Default)]
struct Rooms {
    by_id: HashMap<RoomId, RoomState>,
    memberships: HashMap<ConnectionId, RoomId>,
}

/// Which rooms are live and which connections belong to each.
///
/// Both maps sit behind one reader/writer lock. Nothing handed out by the
/// registry borrows from them: lookups return descriptors and connection
/// lists are copies.
pub struct RoomRegistry {
    rooms: RwLock<Rooms>,
    /// Serializes the name check and the durable create in `open`.
    open_lock: Mutex<()>,
    /// Broadcaster tasks of closed rooms that may still be draining.
    /// Finished ones are pruned on each close.
    retired: Mutex<Vec<JoinHandle<()>>>,
    store: Arc<dyn ChatStore>,
    pool: Arc<PersistencePool>,
    metrics: Arc<RealtimeMetrics>,
    inbox_capacity: usize,
}

impl std::fmt::Debug for RoomRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomRegistry")
            .field("inbox_capacity", &self.inbox_capacity)
            .finish_non_exhaustive()
    }
}

impl RoomRegistry {
    /// Create an empty registry.
    pub fn new(
        store: Arc<dyn ChatStore>,
        pool: Arc<PersistencePool>,
        metrics: Arc<RealtimeMetrics>,
        config: &RealtimeConfig,
    ) -> Self {
        Self {
            rooms: RwLock::new(Rooms::default()),
            open_lock: Mutex::new(()),
            retired: Mutex::new(Vec::new()),
            store,
            pool,
            metrics,
            inbox_capacity: config.room_inbox_capacity.max(1),
        }
    }

    /// Create a durable room and open it for live traffic.
    ///
    /// Fails with `Conflict` when a room with this name already exists.
    /// Concurrent calls are serialized so only one create can win a name.
    pub async fn open(self: &Arc<Self>, name: &str) -> AppResult<RoomDescriptor> {
        let _guard = self.open_lock.lock().await;

        if self.store.find_room_by_name(name).await?.is_some() {
            return Err(AppError::conflict(format!("Room '{name}' already exists")));
        }
        let room = self.store.create_room(name).await?;
        Ok(self.install(room).await)
    }

    /// Open an existing durable room that has no live state.
    pub async fn activate(self: &Arc<Self>, room_id: RoomId) -> AppResult<RoomDescriptor> {
        let _guard = self.open_lock.lock().await;

        if self.rooms.read().await.by_id.contains_key(&room_id) {
            return Err(AppError::conflict(format!("Room {room_id} is already open")));
        }
        let room = self
            .store
            .find_room(room_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Room {room_id} not found")))?;
        Ok(self.install(room).await)
    }

    async fn install(self: &Arc<Self>, room: Room) -> RoomDescriptor {
        let (inbox_tx, inbox_rx) = mpsc::channel(self.inbox_capacity);
        let (close_tx, close_rx) = oneshot::channel();
        let (state_tx, state_rx) = watch::channel(BroadcasterState::Running);

        let broadcaster = RoomBroadcaster::new(
            room.id,
            inbox_rx,
            close_rx,
            state_tx,
            Arc::downgrade(self),
            Arc::clone(&self.pool),
            Arc::clone(&self.metrics),
        );
        let task = tokio::spawn(broadcaster.run());

        let state = RoomState {
            room,
            inbox: inbox_tx,
            clients: Roster::new(),
            close_signal: close_tx,
            broadcaster_state: state_rx,
            task,
        };
        let descriptor = RoomDescriptor::of(&state);

        self.rooms.write().await.by_id.insert(descriptor.id, state);
        self.metrics.room_opened();
        info!(room_id = %descriptor.id, name = %descriptor.name, "Room opened");
        descriptor
    }

    /// Descriptor of an open room, or `NotFound`.
    pub async fn lookup(&self, room_id: RoomId) -> AppResult<RoomDescriptor> {
        self.rooms
            .read()
            .await
            .by_id
            .get(&room_id)
            .map(RoomDescriptor::of)
            .ok_or_else(|| AppError::room_not_open(room_id))
    }

    /// Add a connection to an open room.
    ///
    /// A connection belongs to at most one room; joining a second room is
    /// a `Conflict`. Joining the same room again is a no-op.
    pub async fn join(&self, room_id: RoomId, conn: Arc<ConnectionHandle>) -> AppResult<()> {
        let mut rooms = self.rooms.write().await;
        let conn_id = conn.id();

        match rooms.memberships.get(&conn_id) {
            Some(current) if *current == room_id => return Ok(()),
            Some(current) => {
                return Err(AppError::conflict(format!(
                    "Connection {conn_id} is already in room {current}"
                )));
            }
            None => {}
        }

        let state = rooms
            .by_id
            .get_mut(&room_id)
            .ok_or_else(|| AppError::room_not_open(room_id))?;
        state.clients.push(conn);
        rooms.memberships.insert(conn_id, room_id);

        debug!(room_id = %room_id, connection_id = %conn_id, "Connection joined");
        Ok(())
    }

    /// Remove a connection from a room. Returns whether it was there.
    pub async fn leave(&self, room_id: RoomId, connection_id: ConnectionId) -> bool {
        let mut rooms = self.rooms.write().await;

        let removed = rooms
            .by_id
            .get_mut(&room_id)
            .is_some_and(|state| state.remove(connection_id));
        if rooms.memberships.get(&connection_id) == Some(&room_id) {
            rooms.memberships.remove(&connection_id);
        }

        if removed {
            debug!(room_id = %room_id, connection_id = %connection_id, "Connection left");
        }
        removed
    }

    /// Close a room.
    ///
    /// Removes its live state and signals the broadcaster, which drains
    /// what is already queued and then evicts the final roster. A second
    /// call reports [`CloseOutcome::AlreadyClosed`].
    pub async fn close(&self, room_id: RoomId) -> CloseOutcome {
        let state = {
            let mut rooms = self.rooms.write().await;
            let Some(state) = rooms.by_id.remove(&room_id) else {
                return CloseOutcome::AlreadyClosed;
            };
            for conn in &state.clients {
                rooms.memberships.remove(&conn.id());
            }
            state
        };

        let RoomState {
            room,
            inbox,
            clients,
            close_signal,
            task,
            ..
        } = state;
        let roster_len = clients.len();
        // Signal before dropping the inbox so the broadcaster always gets the roster.
        let _ = close_signal.send(clients);
        drop(inbox);
        {
            let mut retired = self.retired.lock().await;
            retired.retain(|t| !t.is_finished());
            retired.push(task);
        }

        self.metrics.room_closed();
        info!(room_id = %room.id, name = %room.name, connections = roster_len, "Room closed");
        CloseOutcome::Closed
    }

    /// Copy of the connections currently in a room.
    pub async fn list_connections(&self, room_id: RoomId) -> AppResult<Vec<Arc<ConnectionHandle>>> {
        self.rooms
            .read()
            .await
            .by_id
            .get(&room_id)
            .map(|state| state.clients.clone())
            .ok_or_else(|| AppError::room_not_open(room_id))
    }

    /// Queue a message on its room's inbox.
    ///
    /// Waits while the inbox is full. Fails with `NotFound` when the room
    /// is not open or closes while the message is waiting.
    pub async fn publish(&self, msg: ChatMessage) -> AppResult<()> {
        let room_id = msg.room_id;
        let inbox = self
            .rooms
            .read()
            .await
            .by_id
            .get(&room_id)
            .map(|state| state.inbox.clone())
            .ok_or_else(|| AppError::room_not_open(room_id))?;

        inbox
            .send(msg)
            .await
            .map_err(|_| AppError::room_not_open(room_id))?;
        self.metrics.message_received();
        Ok(())
    }

    /// Descriptors of every open room, by name.
    pub async fn list_open(&self) -> Vec<RoomDescriptor> {
        let mut rooms: Vec<RoomDescriptor> = self
            .rooms
            .read()
            .await
            .by_id
            .values()
            .map(RoomDescriptor::of)
            .collect();
        rooms.sort_by(|a, b| a.name.cmp(&b.name));
        rooms
    }

    /// Number of open rooms.
    pub async fn open_count(&self) -> usize {
        self.rooms.read().await.by_id.len()
    }

    /// Wait for the broadcasters of closed rooms to finish draining.
    pub async fn await_retired(&self) {
        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.retired.lock().await);
        for task in tasks {
            let _ = task.await;
        }
    }

    #[cfg(test)]
    async fn retired_len(&self) -> usize {
        self.retired.lock().await.len()
    }

    /// Close every open room and wait for all broadcasters to stop.
    pub async fn shutdown(&self) {
        let ids: Vec<RoomId> = self.rooms.read().await.by_id.keys().copied().collect();
        info!(rooms = ids.len(), "Closing open rooms");
        for id in ids {
            self.close(id).await;
        }
        self.await_retired().await;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    use chathub_core::config::PersistenceConfig;
    use chathub_core::error::ErrorKind;
    use chathub_core::types::UserId;
    use chathub_database::MemoryChatStore;

    use super::*;
    use crate::connection::handle::ChatIdentity;
    use crate::message::{Frame, OutboundMessage};

    struct Fixture {
        store: Arc<MemoryChatStore>,
        pool: Arc<PersistencePool>,
        registry: Arc<RoomRegistry>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryChatStore::new());
        let pool = Arc::new(PersistencePool::start(
            store.clone(),
            &PersistenceConfig::default(),
        ));
        let registry = Arc::new(RoomRegistry::new(
            store.clone(),
            Arc::clone(&pool),
            Arc::new(RealtimeMetrics::new()),
            &RealtimeConfig::default(),
        ));
        Fixture {
            store,
            pool,
            registry,
        }
    }

    fn connection(name: &str) -> (Arc<ConnectionHandle>, mpsc::Receiver<Frame>) {
        ConnectionHandle::new(
            ChatIdentity {
                user_id: UserId::new(),
                username: name.to_string(),
            },
            64,
        )
    }

    async fn next_frame(rx: &mut mpsc::Receiver<Frame>) -> OutboundMessage {
        let frame = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("no frame in time")
            .expect("channel closed");
        serde_json::from_str(&frame).unwrap()
    }

    #[tokio::test]
    async fn test_concurrent_open_same_name_creates_one_room() {
        let fx = fixture();
        let attempts: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&fx.registry);
                tokio::spawn(async move { registry.open("general").await })
            })
            .collect();

        let mut opened = 0;
        let mut conflicts = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => opened += 1,
                Err(e) if e.is(ErrorKind::Conflict) => conflicts += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(opened, 1);
        assert_eq!(conflicts, 15);
        assert_eq!(fx.store.create_room_calls(), 1);
        assert_eq!(fx.store.list_rooms().await.unwrap().len(), 1);
        assert_eq!(fx.registry.open_count().await, 1);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let fx = fixture();
        let room = fx.registry.open("general").await.unwrap();

        assert_eq!(fx.registry.close(room.id).await, CloseOutcome::Closed);
        assert_eq!(fx.registry.close(room.id).await, CloseOutcome::AlreadyClosed);

        let err = fx.registry.lookup(room.id).await.unwrap_err();
        assert!(err.is(ErrorKind::NotFound));
        fx.registry.await_retired().await;
    }

    #[tokio::test]
    async fn test_join_requires_open_room() {
        let fx = fixture();
        let (conn, _rx) = connection("alice");

        let err = fx.registry.join(RoomId::new(), conn).await.unwrap_err();
        assert!(err.is(ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_connection_belongs_to_one_room() {
        let fx = fixture();
        let general = fx.registry.open("general").await.unwrap();
        let random = fx.registry.open("random").await.unwrap();
        let (conn, _rx) = connection("alice");

        fx.registry.join(general.id, Arc::clone(&conn)).await.unwrap();
        fx.registry.join(general.id, Arc::clone(&conn)).await.unwrap();
        let err = fx.registry.join(random.id, Arc::clone(&conn)).await.unwrap_err();
        assert!(err.is(ErrorKind::Conflict));
        assert_eq!(fx.registry.lookup(general.id).await.unwrap().connections, 1);

        assert!(fx.registry.leave(general.id, conn.id()).await);
        fx.registry.join(random.id, conn).await.unwrap();
    }

    #[tokio::test]
    async fn test_leave_twice_is_noop() {
        let fx = fixture();
        let room = fx.registry.open("general").await.unwrap();
        let (conn, _rx) = connection("alice");
        fx.registry.join(room.id, Arc::clone(&conn)).await.unwrap();

        assert!(fx.registry.leave(room.id, conn.id()).await);
        assert!(!fx.registry.leave(room.id, conn.id()).await);
        assert!(!fx.registry.leave(RoomId::new(), conn.id()).await);
    }

    #[tokio::test]
    async fn test_list_connections_is_a_snapshot() {
        let fx = fixture();
        let room = fx.registry.open("general").await.unwrap();
        let (a, _ra) = connection("alice");
        let (b, _rb) = connection("bob");
        fx.registry.join(room.id, Arc::clone(&a)).await.unwrap();
        fx.registry.join(room.id, Arc::clone(&b)).await.unwrap();

        let before = fx.registry.list_connections(room.id).await.unwrap();
        fx.registry.leave(room.id, a.id()).await;
        let after = fx.registry.list_connections(room.id).await.unwrap();

        assert_eq!(before.len(), 2);
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].id(), b.id());
    }

    /// Logical-clock readings around one connection's join and leave.
    #[derive(Debug, Clone, Copy)]
    struct MemberSpan {
        join_start: u64,
        join_done: u64,
        leave_start: u64,
        leave_done: u64,
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_snapshots_agree_with_concurrent_joins_and_leaves() {
        let fx = fixture();
        let room_id = fx.registry.open("general").await.unwrap().id;
        let clock = Arc::new(AtomicU64::new(0));

        let members: Vec<_> = (0..32)
            .map(|i| {
                let registry = Arc::clone(&fx.registry);
                let clock = Arc::clone(&clock);
                tokio::spawn(async move {
                    let (conn, _rx) = connection(&format!("user-{i}"));
                    let join_start = clock.fetch_add(1, Ordering::SeqCst);
                    registry.join(room_id, Arc::clone(&conn)).await.unwrap();
                    let join_done = clock.fetch_add(1, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    let leave_start = clock.fetch_add(1, Ordering::SeqCst);
                    assert!(registry.leave(room_id, conn.id()).await);
                    let leave_done = clock.fetch_add(1, Ordering::SeqCst);
                    (
                        conn.id(),
                        MemberSpan {
                            join_start,
                            join_done,
                            leave_start,
                            leave_done,
                        },
                    )
                })
            })
            .collect();

        let observers: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&fx.registry);
                let clock = Arc::clone(&clock);
                tokio::spawn(async move {
                    let mut snapshots = Vec::new();
                    for _ in 0..25 {
                        let before = clock.fetch_add(1, Ordering::SeqCst);
                        let conns = registry.list_connections(room_id).await.unwrap();
                        let after = clock.fetch_add(1, Ordering::SeqCst);
                        let ids: HashSet<ConnectionId> = conns.iter().map(|c| c.id()).collect();
                        assert_eq!(ids.len(), conns.len(), "duplicate connection in snapshot");
                        snapshots.push((before, ids, after));
                        tokio::task::yield_now().await;
                    }
                    snapshots
                })
            })
            .collect();

        let mut spans = HashMap::new();
        for member in members {
            let (id, span) = member.await.unwrap();
            spans.insert(id, span);
        }
        let mut snapshots = Vec::new();
        for observer in observers {
            snapshots.extend(observer.await.unwrap());
        }

        for (before, ids, after) in &snapshots {
            assert!(ids.iter().all(|id| spans.contains_key(id)));
            for (id, span) in &spans {
                if span.join_done < *before && span.leave_start > *after {
                    assert!(ids.contains(id), "joined connection missing from snapshot");
                }
                if span.leave_done < *before || span.join_start > *after {
                    assert!(!ids.contains(id), "snapshot holds a connection outside its membership");
                }
            }
        }
        assert!(fx.registry.list_connections(room_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_finished_broadcasters_are_pruned() {
        let fx = fixture();
        for i in 0..50 {
            let room = fx.registry.open(&format!("room-{i}")).await.unwrap();
            assert_eq!(fx.registry.close(room.id).await, CloseOutcome::Closed);
            assert!(fx.registry.retired_len().await <= 1);
            // Let the broadcaster observe the close and stop.
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        fx.registry.await_retired().await;
        assert_eq!(fx.registry.retired_len().await, 0);
    }

    #[tokio::test]
    async fn test_messages_arrive_in_submission_order() {
        let fx = fixture();
        let room = fx.registry.open("general").await.unwrap();
        let (conn, mut rx) = connection("bob");
        fx.registry.join(room.id, conn).await.unwrap();

        let author = UserId::new();
        for i in 0..20 {
            fx.registry
                .publish(ChatMessage::new(author, room.id, format!("m{i}")))
                .await
                .unwrap();
        }

        for i in 0..20 {
            match next_frame(&mut rx).await {
                OutboundMessage::Message { body, .. } => assert_eq!(body, format!("m{i}")),
                other => panic!("unexpected frame: {other:?}"),
            }
        }

        fx.registry.shutdown().await;
        fx.pool.shutdown().await;
        assert_eq!(fx.store.message_count().await, 20);
    }

    #[tokio::test]
    async fn test_close_drains_then_evicts() {
        let fx = fixture();
        let room = fx.registry.open("general").await.unwrap();
        let (conn, mut rx) = connection("bob");
        fx.registry.join(room.id, Arc::clone(&conn)).await.unwrap();

        let author = UserId::new();
        for i in 0..5 {
            fx.registry
                .publish(ChatMessage::new(author, room.id, format!("m{i}")))
                .await
                .unwrap();
        }
        assert_eq!(fx.registry.close(room.id).await, CloseOutcome::Closed);
        fx.registry.await_retired().await;

        for i in 0..5 {
            match next_frame(&mut rx).await {
                OutboundMessage::Message { body, .. } => assert_eq!(body, format!("m{i}")),
                other => panic!("unexpected frame: {other:?}"),
            }
        }
        assert_eq!(
            next_frame(&mut rx).await,
            OutboundMessage::RoomClosed { room_id: room.id }
        );
        assert!(conn.is_evicted());

        let err = fx
            .registry
            .publish(ChatMessage::new(author, room.id, "late"))
            .await
            .unwrap_err();
        assert!(err.is(ErrorKind::NotFound));

        fx.pool.shutdown().await;
        assert_eq!(fx.store.message_count().await, 5);
    }

    #[tokio::test]
    async fn test_activate_reopens_closed_room() {
        let fx = fixture();
        let room = fx.registry.open("general").await.unwrap();
        fx.registry.close(room.id).await;

        let reopened = fx.registry.activate(room.id).await.unwrap();
        assert_eq!(reopened.name, "general");
        assert_eq!(reopened.state, BroadcasterState::Running);

        let err = fx.registry.activate(room.id).await.unwrap_err();
        assert!(err.is(ErrorKind::Conflict));
        let err = fx.registry.activate(RoomId::new()).await.unwrap_err();
        assert!(err.is(ErrorKind::NotFound));

        let err = fx.registry.open("general").await.unwrap_err();
        assert!(err.is(ErrorKind::Conflict));
    }

    #[tokio::test]
    async fn test_list_open_reports_counts() {
        let fx = fixture();
        let general = fx.registry.open("general").await.unwrap();
        fx.registry.open("random").await.unwrap();
        let (conn, _rx) = connection("alice");
        fx.registry.join(general.id, conn).await.unwrap();

        let open = fx.registry.list_open().await;
        let summary: Vec<(&str, usize)> = open
            .iter()
            .map(|r| (r.name.as_str(), r.connections))
            .collect();
        assert_eq!(summary, vec![("general", 1), ("random", 0)]);
    }
}
