//! Bounded persistence queue and its worker tasks.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::JoinHandle;

use chathub_core::config::PersistenceConfig;
use chathub_database::ChatStore;
use chathub_entity::ChatMessage;

use crate::error::SubmitError;
use crate::stats::{PoolStats, PoolStatsSnapshot};
use crate::worker::PersistWorker;

/// Fixed-size pool of workers draining one bounded queue into a [`ChatStore`].
///
/// The queue is the only synchronization between producers and workers.
/// Writes are at-most-once: a message whose save fails is logged and
/// dropped.
#[derive(Debug)]
pub struct PersistencePool {
    sender: RwLock<Option<mpsc::Sender<ChatMessage>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    stats: Arc<PoolStats>,
    capacity: usize,
    drain_timeout: Duration,
}

impl PersistencePool {
    /// Create the queue and spawn `config.workers` workers.
    pub fn start(store: Arc<dyn ChatStore>, config: &PersistenceConfig) -> Self {
        let capacity = config.queue_capacity.max(1);
        let worker_count = config.workers.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let queue = Arc::new(Mutex::new(rx));
        let stats = Arc::new(PoolStats::default());

        let workers = (0..worker_count)
            .map(|id| {
                let worker = PersistWorker {
                    id,
                    store: Arc::clone(&store),
                    queue: Arc::clone(&queue),
                    stats: Arc::clone(&stats),
                };
                tokio::spawn(worker.run())
            })
            .collect();

        tracing::info!(
            workers = worker_count,
            queue_capacity = capacity,
            "Persistence pool started"
        );

        Self {
            sender: RwLock::new(Some(tx)),
            workers: Mutex::new(workers),
            stats,
            capacity,
            drain_timeout: Duration::from_secs(config.drain_timeout_seconds),
        }
    }

    /// Queue a message for saving.
    ///
    /// Waits while the queue is full. Returns the message inside
    /// [`SubmitError::Closed`] once shutdown has begun.
    pub async fn submit(&self, msg: ChatMessage) -> Result<(), SubmitError> {
        let sender = match self.sender.read().await.as_ref() {
            Some(tx) => tx.clone(),
            None => return Err(SubmitError::Closed(Box::new(msg))),
        };

        sender
            .send(msg)
            .await
            .map_err(|e| SubmitError::Closed(Box::new(e.0)))?;
        self.stats.inc_submitted();
        Ok(())
    }

    /// Messages queued and not yet picked up by a worker.
    pub async fn pending(&self) -> usize {
        match self.sender.read().await.as_ref() {
            Some(tx) => self.capacity - tx.capacity(),
            None => 0,
        }
    }

    /// Queue capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Counter snapshot.
    pub fn stats(&self) -> PoolStatsSnapshot {
        self.stats.snapshot()
    }

    /// Stop intake, then wait for the workers to drain the queue.
    ///
    /// Safe to call more than once.
    pub async fn shutdown(&self) {
        let had_sender = self.sender.write().await.take().is_some();
        let workers: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock().await);
        if !had_sender && workers.is_empty() {
            return;
        }

        tracing::info!(workers = workers.len(), "Draining persistence queue");
        let joined =
            tokio::time::timeout(self.drain_timeout, futures::future::join_all(workers)).await;

        let stats = self.stats.snapshot();
        match joined {
            Ok(_) => tracing::info!(
                persisted = stats.persisted,
                failed = stats.failed,
                "Persistence pool stopped"
            ),
            Err(_) => tracing::warn!(
                timeout_secs = self.drain_timeout.as_secs(),
                "Persistence pool did not drain before timeout"
            ),
        }
    }
}
