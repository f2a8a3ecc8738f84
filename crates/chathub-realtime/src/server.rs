//! Top-level chat engine that ties the registry, broadcasters and the
//! persistence pool together.

use std::sync::Arc;

use tracing::info;

use chathub_core::config::{PersistenceConfig, RealtimeConfig};
use chathub_core::error::AppError;
use chathub_core::result::AppResult;
use chathub_core::types::RoomId;
use chathub_database::ChatStore;
use chathub_entity::{ChatMessage, Room};
use chathub_worker::{PersistencePool, PoolStatsSnapshot};

use crate::connection::handle::ChatIdentity;
use crate::connection::lifecycle::ConnectionLifecycle;
use crate::connection::transport::ChatTransport;
use crate::message::validator::validate_room_name;
use crate::metrics::{MetricsSnapshot, RealtimeMetrics};
use crate::room::{CloseOutcome, RoomDescriptor, RoomRegistry};

/// The interface the HTTP layer uses to drive live chat.
#[derive(Clone)]
pub struct ChatEngine {
    registry: Arc<RoomRegistry>,
    lifecycle: ConnectionLifecycle,
    pool: Arc<PersistencePool>,
    store: Arc<dyn ChatStore>,
    metrics: Arc<RealtimeMetrics>,
    recent_limit: i64,
    recent_max: i64,
}

impl std::fmt::Debug for ChatEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatEngine").finish()
    }
}

impl ChatEngine {
    /// Build the engine and start the persistence workers.
    pub fn new(
        store: Arc<dyn ChatStore>,
        realtime: &RealtimeConfig,
        persistence: &PersistenceConfig,
    ) -> Self {
        let metrics = Arc::new(RealtimeMetrics::new());
        let pool = Arc::new(PersistencePool::start(Arc::clone(&store), persistence));
        let registry = Arc::new(RoomRegistry::new(
            Arc::clone(&store),
            Arc::clone(&pool),
            Arc::clone(&metrics),
            realtime,
        ));
        let lifecycle =
            ConnectionLifecycle::new(Arc::clone(&registry), Arc::clone(&metrics), realtime);

        info!("Chat engine initialized");

        Self {
            registry,
            lifecycle,
            pool,
            store,
            metrics,
            recent_limit: realtime.recent_messages_limit.max(1),
            recent_max: realtime.recent_messages_max.max(1),
        }
    }

    /// Create a room and open it for live traffic.
    pub async fn open_room(&self, name: &str) -> AppResult<RoomDescriptor> {
        let name = validate_room_name(name)?;
        self.registry.open(name).await
    }

    /// Open an existing room again after a close or a restart.
    pub async fn reopen_room(&self, room_id: RoomId) -> AppResult<RoomDescriptor> {
        self.registry.activate(room_id).await
    }

    /// Rooms that currently accept connections.
    pub async fn list_open_rooms(&self) -> Vec<RoomDescriptor> {
        self.registry.list_open().await
    }

    /// Every durable room, open or not.
    pub async fn list_rooms(&self) -> AppResult<Vec<Room>> {
        self.store.list_rooms().await
    }

    /// Close a room's live state.
    pub async fn close_room(&self, room_id: RoomId) -> CloseOutcome {
        self.registry.close(room_id).await
    }

    /// Run an accepted connection until it ends.
    pub async fn accept_connection<T: ChatTransport>(
        &self,
        room_id: RoomId,
        identity: ChatIdentity,
        transport: T,
    ) -> AppResult<()> {
        self.lifecycle.run(room_id, identity, transport).await
    }

    /// Recent messages of a durable room, most recent first.
    ///
    /// `limit` defaults to the configured value and is clamped to the
    /// configured maximum.
    pub async fn recent_messages(
        &self,
        room_id: RoomId,
        limit: Option<i64>,
    ) -> AppResult<Vec<ChatMessage>> {
        if !self.store.room_exists(room_id).await? {
            return Err(AppError::not_found(format!("Room {room_id} not found")));
        }
        let limit = limit.unwrap_or(self.recent_limit).clamp(1, self.recent_max);
        self.store.fetch_recent(room_id, limit).await
    }

    /// The room registry.
    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// Engine counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Persistence pool counters.
    pub fn persistence_stats(&self) -> PoolStatsSnapshot {
        self.pool.stats()
    }

    /// Close every room, let broadcasters drain, then drain the pool.
    pub async fn shutdown(&self) {
        info!("Shutting down chat engine");
        self.registry.shutdown().await;
        self.pool.shutdown().await;
        info!("Chat engine shut down");
    }
}
