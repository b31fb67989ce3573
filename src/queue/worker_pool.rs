// src/queue/worker_pool.rs
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::JobQueue;
use crate::processor::JobProcessor;

/// What `shutdown` left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolShutdown {
    /// Workers still busy when the grace period ran out.
    pub forced: usize,
    /// Ids never popped; their entities stay QUEUED until recovery.
    pub abandoned: usize,
}

/// Fixed set of long-lived workers draining one queue.
pub struct WorkerPool {
    queue: Arc<JobQueue>,
    workers: JoinSet<()>,
    token: CancellationToken,
    grace: Duration,
}

impl WorkerPool {
    pub fn start(
        queue: Arc<JobQueue>,
        processor: Arc<dyn JobProcessor>,
        size: usize,
        poll_timeout: Duration,
        grace: Duration,
        token: CancellationToken,
    ) -> Self {
        let mut workers = JoinSet::new();
        for worker_id in 0..size.max(1) {
            workers.spawn(worker_loop(
                worker_id,
                queue.clone(),
                processor.clone(),
                poll_timeout,
                token.clone(),
            ));
        }
        tracing::info!(
            target: "worker",
            queue = queue.name(),
            workers = size.max(1),
            processor = processor.name(),
            "worker pool started"
        );
        Self {
            queue,
            workers,
            token,
            grace,
        }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Stop taking new ids, let in-flight jobs finish within the grace
    /// period, then abort whatever is still running.
    pub async fn shutdown(mut self) -> PoolShutdown {
        self.token.cancel();

        let drained = tokio::time::timeout(self.grace, async {
            while self.workers.join_next().await.is_some() {}
        })
        .await
        .is_ok();

        let forced = if drained { 0 } else { self.workers.len() };
        if forced > 0 {
            tracing::warn!(target: "worker", queue = self.queue.name(), forced, "grace period elapsed, aborting workers");
            self.workers.shutdown().await;
        }

        let abandoned = self.queue.size();
        if abandoned > 0 {
            tracing::warn!(
                target: "worker",
                queue = self.queue.name(),
                abandoned,
                "queued ids dropped at shutdown; recovery will reset them"
            );
        }
        tracing::info!(target: "worker", queue = self.queue.name(), "worker pool stopped");
        PoolShutdown { forced, abandoned }
    }
}

async fn worker_loop(
    worker_id: usize,
    queue: Arc<JobQueue>,
    processor: Arc<dyn JobProcessor>,
    poll_timeout: Duration,
    token: CancellationToken,
) {
    tracing::debug!(target: "worker", queue = queue.name(), worker_id, "worker started");
    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            id = queue.pop(poll_timeout) => id,
        };
        let Some(id) = next else { continue };
        run_guarded(queue.name(), worker_id, processor.clone(), id).await;
    }
    tracing::debug!(target: "worker", queue = queue.name(), worker_id, "worker exiting");
}

/// Processor task tied to the worker awaiting it: dropping the guard aborts the job,
/// so a forced shutdown of the worker stops the job too.
struct JobTask(JoinHandle<anyhow::Result<()>>);

impl Drop for JobTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Fault barrier: neither an error nor a panic from the processor ends the worker.
async fn run_guarded(queue: &'static str, worker_id: usize, processor: Arc<dyn JobProcessor>, id: Uuid) {
    let mut job = JobTask(tokio::spawn(async move { processor.process(id).await }));
    let outcome = (&mut job.0).await;
    let label = match outcome {
        Ok(Ok(())) => "ok",
        Ok(Err(e)) => {
            tracing::error!(target: "worker", queue, worker_id, %id, error = %format!("{e:#}"), "processor failed");
            "error"
        }
        Err(join) if join.is_panic() => {
            tracing::error!(target: "worker", queue, worker_id, %id, "processor panicked");
            "panic"
        }
        Err(_) => {
            tracing::warn!(target: "worker", queue, worker_id, %id, "processor task cancelled");
            "cancelled"
        }
    };
    counter!("worker_jobs_total", "queue" => queue, "outcome" => label).increment(1);
}
