// src/scheduler/feed.rs
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use metrics::counter;

use super::{admit_by_credits, CycleSummary, PeriodicJob};
use crate::config::SchedulerConfig;
use crate::domain::{Source, SourceTransition};
use crate::queue::JobSink;
use crate::store::{CreditLedger, SourceRepository};

/// Moves due sources IDLE → QUEUED and hands their ids to the fetch queue.
pub struct FeedSchedulerJob {
    sources: Arc<dyn SourceRepository>,
    credits: Arc<dyn CreditLedger>,
    queue: Arc<dyn JobSink>,
    cutoff: Duration,
}

enum Admission {
    Queued,
    Rejected,
    Stale,
}

impl FeedSchedulerJob {
    pub fn new(
        sources: Arc<dyn SourceRepository>,
        credits: Arc<dyn CreditLedger>,
        queue: Arc<dyn JobSink>,
        cfg: &SchedulerConfig,
    ) -> Self {
        Self {
            sources,
            credits,
            queue,
            cutoff: Duration::minutes(cfg.fetch_cutoff_minutes),
        }
    }

    pub async fn run_cycle_at(&self, now: DateTime<Utc>) -> Result<CycleSummary> {
        let mut summary = CycleSummary::default();

        if !self.queue.can_accept() {
            tracing::warn!(
                target: "scheduler",
                queue = self.queue.name(),
                size = self.queue.size(),
                "fetch queue full, skipping cycle"
            );
            summary.queue_full = true;
            return Ok(summary);
        }

        let candidates = self.sources.find_fetch_candidates(now - self.cutoff).await?;
        summary.candidates = candidates.len();
        counter!("scheduler_candidates_total", "queue" => self.queue.name()).increment(candidates.len() as u64);

        let due: Vec<Source> = candidates.into_iter().filter(|s| s.is_due(now)).collect();
        summary.due = due.len();
        if due.is_empty() {
            return Ok(summary);
        }

        let allowed = self.credits.users_with_credits().await?;
        let (admitted, skipped) = admit_by_credits(due, &allowed, |s| s.owner_id);
        summary.skipped_credits = skipped;
        if skipped > 0 {
            tracing::info!(target: "scheduler", skipped, "sources skipped, owner has no credits");
            counter!("scheduler_credit_skipped_total", "queue" => self.queue.name()).increment(skipped as u64);
        }

        let total = admitted.len();
        for (idx, source) in admitted.into_iter().enumerate() {
            if !self.queue.can_accept() {
                summary.deferred = total - idx;
                tracing::info!(
                    target: "scheduler",
                    deferred = summary.deferred,
                    "fetch queue filled during cycle, deferring remaining sources"
                );
                break;
            }
            match self.admit(&source, now).await {
                Ok(Admission::Queued) => summary.queued += 1,
                Ok(Admission::Rejected) => summary.rejected += 1,
                Ok(Admission::Stale) => {}
                Err(e) => {
                    tracing::warn!(
                        target: "scheduler",
                        source_id = %source.id,
                        error = %format!("{e:#}"),
                        "failed to queue source"
                    );
                }
            }
        }

        counter!("scheduler_queued_total", "queue" => self.queue.name()).increment(summary.queued as u64);
        counter!("scheduler_enqueue_rejected_total", "queue" => self.queue.name()).increment(summary.rejected as u64);
        Ok(summary)
    }

    /// Commit QUEUED, then enqueue; a refused enqueue reverts to IDLE.
    async fn admit(&self, source: &Source, now: DateTime<Utc>) -> Result<Admission> {
        if self
            .sources
            .transition(source.id, SourceTransition::Queue { at: now })
            .await?
            .is_none()
        {
            tracing::debug!(target: "scheduler", source_id = %source.id, "source changed state, not queued");
            return Ok(Admission::Stale);
        }

        if self.queue.enqueue(source.id) {
            tracing::debug!(target: "scheduler", source_id = %source.id, "source queued");
            return Ok(Admission::Queued);
        }

        self.sources
            .transition(source.id, SourceTransition::RevertQueue)
            .await?;
        tracing::warn!(target: "scheduler", source_id = %source.id, "enqueue refused, source reverted to idle");
        Ok(Admission::Rejected)
    }
}

#[async_trait]
impl PeriodicJob for FeedSchedulerJob {
    fn name(&self) -> &'static str {
        "feed-scheduler"
    }

    async fn run_once(&self) {
        match self.run_cycle_at(Utc::now()).await {
            Ok(s) if s.queued > 0 || s.rejected > 0 || s.skipped_credits > 0 => {
                tracing::info!(
                    target: "scheduler",
                    candidates = s.candidates,
                    due = s.due,
                    queued = s.queued,
                    rejected = s.rejected,
                    skipped_credits = s.skipped_credits,
                    deferred = s.deferred,
                    "feed scheduling cycle"
                );
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(target: "scheduler", error = %format!("{e:#}"), "feed scheduling cycle failed");
            }
        }
    }
}
