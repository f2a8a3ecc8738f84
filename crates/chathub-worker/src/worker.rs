//! One persistence worker: dequeue, save, repeat.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

use chathub_database::ChatStore;
use chathub_entity::ChatMessage;

use crate::stats::PoolStats;

/// Characters of the body kept in failure logs.
const LOG_BODY_CHARS: usize = 64;

pub(crate) struct PersistWorker {
    pub(crate) id: usize,
    pub(crate) store: Arc<dyn ChatStore>,
    pub(crate) queue: Arc<Mutex<mpsc::Receiver<ChatMessage>>>,
    pub(crate) stats: Arc<PoolStats>,
}

impl PersistWorker {
    /// Runs until the queue is closed and empty.
    pub(crate) async fn run(self) {
        tracing::debug!(worker_id = self.id, "Persistence worker started");

        loop {
            let next = {
                let mut queue = self.queue.lock().await;
                queue.recv().await
            };
            let Some(msg) = next else { break };
            self.persist(msg).await;
        }

        tracing::debug!(worker_id = self.id, "Persistence worker stopped");
    }

    async fn persist(&self, msg: ChatMessage) {
        match self.store.save_message(&msg).await {
            Ok(message_id) => {
                self.stats.inc_persisted();
                tracing::debug!(
                    worker_id = self.id,
                    message_id = %message_id,
                    room_id = %msg.room_id,
                    "Message persisted"
                );
            }
            Err(e) => {
                self.stats.inc_failed();
                tracing::error!(
                    worker_id = self.id,
                    room_id = %msg.room_id,
                    author_id = %msg.author_id,
                    body = %msg.preview(LOG_BODY_CHARS),
                    error = %e,
                    "Failed to persist message, dropping it"
                );
            }
        }
    }
}
