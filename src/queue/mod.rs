// src/queue/mod.rs
//! Bounded in-memory job queues.
//!
//! A queue holds entity ids only, never entities, so a worker always reads
//! the current state from the store. Ids still buffered when the process
//! stops are lost; the entities stay QUEUED in the store until a recovery
//! job resets them.

pub mod worker_pool;

use std::time::Duration;

use metrics::gauge;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

pub use worker_pool::{PoolShutdown, WorkerPool};

pub const FETCH_QUEUE: &str = "fetch";
pub const BRIEFING_QUEUE: &str = "briefing";

/// Producer side of a queue, as the schedulers see it.
pub trait JobSink: Send + Sync {
    fn name(&self) -> &'static str;

    fn size(&self) -> usize;

    /// May be stale by the time `enqueue` runs.
    fn can_accept(&self) -> bool;

    /// Never blocks. `false` means the id was not taken.
    fn enqueue(&self, id: Uuid) -> bool;
}

/// Fixed-capacity FIFO of entity ids with non-blocking admission.
pub struct JobQueue {
    name: &'static str,
    tx: mpsc::Sender<Uuid>,
    rx: Mutex<mpsc::Receiver<Uuid>>,
}

impl JobQueue {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            name,
            tx,
            rx: Mutex::new(rx),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Ids currently buffered.
    pub fn size(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Pure capacity check; the answer may be stale by the time `enqueue` runs.
    pub fn can_accept(&self) -> bool {
        self.tx.capacity() > 0
    }

    /// Never blocks. `false` when the buffer is full.
    pub fn enqueue(&self, id: Uuid) -> bool {
        match self.tx.try_send(id) {
            Ok(()) => {
                gauge!("queue_depth", "queue" => self.name).set(self.size() as f64);
                tracing::debug!(target: "queue", queue = self.name, %id, size = self.size(), "enqueued");
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(target: "queue", queue = self.name, %id, "queue full, enqueue rejected");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!(target: "queue", queue = self.name, %id, "queue closed, enqueue rejected");
                false
            }
        }
    }

    /// Next id in FIFO order, or `None` after `wait` elapses with nothing to take.
    pub async fn pop(&self, wait: Duration) -> Option<Uuid> {
        let next = tokio::time::timeout(wait, async {
            let mut rx = self.rx.lock().await;
            rx.recv().await
        })
        .await
        .ok()
        .flatten();
        if next.is_some() {
            gauge!("queue_depth", "queue" => self.name).set(self.size() as f64);
        }
        next
    }
}

impl JobSink for JobQueue {
    fn name(&self) -> &'static str {
        JobQueue::name(self)
    }

    fn size(&self) -> usize {
        JobQueue::size(self)
    }

    fn can_accept(&self) -> bool {
        JobQueue::can_accept(self)
    }

    fn enqueue(&self, id: Uuid) -> bool {
        JobQueue::enqueue(self, id)
    }
}
