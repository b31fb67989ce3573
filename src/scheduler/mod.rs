// src/scheduler/mod.rs
//! Timer-driven jobs: the two schedulers that feed the queues and the
//! recovery jobs that run beside them.

pub mod briefing;
pub mod feed;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::domain::UserId;

pub use briefing::{is_briefing_due, BriefingSchedulerJob};
pub use feed::FeedSchedulerJob;

/// A job run once per tick. Implementations log their own failures; nothing
/// escapes a run.
#[async_trait]
pub trait PeriodicJob: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn run_once(&self);
}

/// What one scheduler cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleSummary {
    /// The queue was full at the start; nothing was read.
    pub queue_full: bool,
    pub candidates: usize,
    pub due: usize,
    pub skipped_credits: usize,
    pub queued: usize,
    /// Marked QUEUED, refused by the queue, reverted.
    pub rejected: usize,
    /// Left untouched because the queue filled during the cycle.
    pub deferred: usize,
}

/// Drive `job` every `every` until `token` is cancelled. The first run is immediate.
pub fn spawn_periodic(
    job: Arc<dyn PeriodicJob>,
    every: Duration,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(target: "scheduler", job = job.name(), every_secs = every.as_secs(), "periodic job started");
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => job.run_once().await,
            }
        }
        tracing::info!(target: "scheduler", job = job.name(), "periodic job stopped");
    })
}

/// Split candidates into (admitted, skipped count) by owner credit.
pub(crate) fn admit_by_credits<T>(
    candidates: Vec<T>,
    allowed: &HashSet<UserId>,
    owner: impl Fn(&T) -> UserId,
) -> (Vec<T>, usize) {
    let total = candidates.len();
    let admitted: Vec<T> = candidates
        .into_iter()
        .filter(|c| allowed.contains(&owner(c)))
        .collect();
    let skipped = total - admitted.len();
    (admitted, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    #[test]
    fn credit_filter_counts_skips() {
        let rich = Uuid::new_v4();
        let poor = Uuid::new_v4();
        let allowed: HashSet<UserId> = [rich].into_iter().collect();
        let (admitted, skipped) = admit_by_credits(vec![rich, poor, rich], &allowed, |u| *u);
        assert_eq!(admitted, vec![rich, rich]);
        assert_eq!(skipped, 1);
    }

    struct Counting(AtomicUsize);

    #[async_trait]
    impl PeriodicJob for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn run_once(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_job_ticks_until_cancelled() {
        let job = Arc::new(Counting(AtomicUsize::new(0)));
        let token = CancellationToken::new();
        let handle = spawn_periodic(job.clone(), Duration::from_secs(60), token.clone());

        tokio::time::sleep(Duration::from_secs(150)).await;
        token.cancel();
        handle.await.unwrap();

        // t=0, t=60, t=120
        assert_eq!(job.0.load(Ordering::SeqCst), 3);
    }
}
