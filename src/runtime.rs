// src/runtime.rs
//! Wires queues, worker pools, schedulers and recovery jobs into one
//! running orchestrator with a single shutdown path.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::OrchestratorConfig;
use crate::ingest::FetcherRegistry;
use crate::notify::ReportMailer;
use crate::processor::{BriefingWorker, FetchWorker};
use crate::queue::{JobQueue, PoolShutdown, WorkerPool, BRIEFING_QUEUE, FETCH_QUEUE};
use crate::recovery::{StuckBriefingRecoveryJob, StuckItemRecoveryJob, StuckSourceRecoveryJob};
use crate::scheduler::{spawn_periodic, BriefingSchedulerJob, FeedSchedulerJob, PeriodicJob};
use crate::store::{
    BriefingRepository, CreditLedger, NewsItemRepository, ReportRepository, SourceRepository,
};

/// Everything the orchestrator reads from or writes to.
#[derive(Clone)]
pub struct OrchestratorDeps {
    pub sources: Arc<dyn SourceRepository>,
    pub briefings: Arc<dyn BriefingRepository>,
    pub items: Arc<dyn NewsItemRepository>,
    pub reports: Arc<dyn ReportRepository>,
    pub credits: Arc<dyn CreditLedger>,
    pub fetchers: FetcherRegistry,
    pub mailer: Arc<dyn ReportMailer>,
}

pub struct Orchestrator;

impl Orchestrator {
    /// Start pools first so the first scheduler tick has consumers.
    pub fn start(cfg: &OrchestratorConfig, deps: OrchestratorDeps) -> OrchestratorHandle {
        let token = CancellationToken::new();
        let q = &cfg.queues;

        let fetch_queue = Arc::new(JobQueue::new(FETCH_QUEUE, q.fetch_capacity));
        let briefing_queue = Arc::new(JobQueue::new(BRIEFING_QUEUE, q.briefing_capacity));

        let fetch_worker = Arc::new(FetchWorker::new(
            deps.sources.clone(),
            deps.items.clone(),
            deps.fetchers.clone(),
        ));
        let briefing_worker = Arc::new(BriefingWorker::new(
            deps.briefings.clone(),
            deps.sources.clone(),
            deps.items.clone(),
            deps.reports.clone(),
            deps.mailer.clone(),
            cfg.briefing.top_items,
        ));

        let fetch_pool = WorkerPool::start(
            fetch_queue.clone(),
            fetch_worker,
            q.fetch_workers,
            q.poll_timeout(),
            q.shutdown_grace(),
            token.child_token(),
        );
        let briefing_pool = WorkerPool::start(
            briefing_queue.clone(),
            briefing_worker.clone(),
            q.briefing_workers,
            q.poll_timeout(),
            q.shutdown_grace(),
            token.child_token(),
        );

        let secs = Duration::from_secs;
        let jobs: Vec<(Arc<dyn PeriodicJob>, Duration)> = vec![
            (
                Arc::new(FeedSchedulerJob::new(
                    deps.sources.clone(),
                    deps.credits.clone(),
                    fetch_queue.clone(),
                    &cfg.scheduler,
                )),
                secs(cfg.scheduler.feed_interval_secs),
            ),
            (
                Arc::new(BriefingSchedulerJob::new(
                    deps.briefings.clone(),
                    deps.credits.clone(),
                    briefing_queue.clone(),
                )),
                secs(cfg.scheduler.briefing_interval_secs),
            ),
            (
                Arc::new(StuckSourceRecoveryJob::new(deps.sources.clone(), &cfg.recovery)),
                secs(cfg.recovery.interval_secs),
            ),
            (
                Arc::new(StuckBriefingRecoveryJob::new(deps.briefings.clone(), &cfg.recovery)),
                secs(cfg.recovery.interval_secs),
            ),
            (
                Arc::new(StuckItemRecoveryJob::new(deps.items.clone(), &cfg.recovery)),
                secs(cfg.recovery.interval_secs),
            ),
        ];
        let periodic = jobs
            .into_iter()
            .map(|(job, every)| spawn_periodic(job, every, token.child_token()))
            .collect();

        tracing::info!(
            target: "scheduler",
            fetch_workers = fetch_pool.size(),
            briefing_workers = briefing_pool.size(),
            fetch_capacity = fetch_queue.capacity(),
            briefing_capacity = briefing_queue.capacity(),
            "orchestrator started"
        );

        OrchestratorHandle {
            token,
            fetch_queue,
            briefing_queue,
            briefing_worker,
            fetch_pool,
            briefing_pool,
            periodic,
        }
    }
}

/// What `OrchestratorHandle::shutdown` left behind, per pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    pub fetch: PoolShutdown,
    pub briefing: PoolShutdown,
}

pub struct OrchestratorHandle {
    token: CancellationToken,
    fetch_queue: Arc<JobQueue>,
    briefing_queue: Arc<JobQueue>,
    briefing_worker: Arc<BriefingWorker>,
    fetch_pool: WorkerPool,
    briefing_pool: WorkerPool,
    periodic: Vec<JoinHandle<()>>,
}

impl OrchestratorHandle {
    pub fn fetch_queue(&self) -> Arc<JobQueue> {
        self.fetch_queue.clone()
    }

    pub fn briefing_queue(&self) -> Arc<JobQueue> {
        self.briefing_queue.clone()
    }

    pub fn briefing_worker(&self) -> Arc<BriefingWorker> {
        self.briefing_worker.clone()
    }

    /// Stop the timers, then drain both pools within their grace period.
    pub async fn shutdown(self) -> ShutdownReport {
        self.token.cancel();
        for handle in self.periodic {
            if let Err(e) = handle.await {
                tracing::warn!(target: "scheduler", error = %e, "periodic job ended abnormally");
            }
        }
        let (fetch, briefing) =
            tokio::join!(self.fetch_pool.shutdown(), self.briefing_pool.shutdown());
        tracing::info!(
            target: "scheduler",
            fetch_abandoned = fetch.abandoned,
            briefing_abandoned = briefing.abandoned,
            "orchestrator stopped"
        );
        ShutdownReport { fetch, briefing }
    }
}
