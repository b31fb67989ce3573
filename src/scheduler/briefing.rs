// src/scheduler/briefing.rs
use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;
use metrics::counter;
use once_cell::sync::Lazy;
use parking_lot::Mutex;

use super::{admit_by_credits, CycleSummary, PeriodicJob};
use crate::domain::{Briefing, BriefingId, BriefingTransition, Frequency};
use crate::queue::JobSink;
use crate::store::{BriefingRepository, CreditLedger};

/// True the first time a bad zone is seen for this briefing in this process.
fn first_invalid_zone_report(id: BriefingId) -> bool {
    static REPORTED: Lazy<Mutex<HashSet<BriefingId>>> = Lazy::new(|| Mutex::new(HashSet::new()));
    REPORTED.lock().insert(id)
}

/// Resolve the briefing's zone; an unknown zone falls back to UTC.
/// Warns once per briefing, later cycles log at debug.
fn briefing_zone(briefing: &Briefing) -> Tz {
    match briefing.timezone.parse::<Tz>() {
        Ok(tz) => tz,
        Err(err) => {
            if first_invalid_zone_report(briefing.id) {
                tracing::warn!(
                    target: "scheduler",
                    briefing_id = %briefing.id,
                    timezone = %briefing.timezone,
                    error = %err,
                    "invalid timezone, comparing in UTC"
                );
            } else {
                tracing::debug!(target: "scheduler", briefing_id = %briefing.id, "invalid timezone, using UTC");
            }
            chrono_tz::UTC
        }
    }
}

/// Precise due check in the briefing's local time.
///
/// Weekly briefings must hit their weekday (when one is set; without one
/// they wait seven local days). Nothing runs twice on the same local day,
/// and nothing runs before `schedule_time`.
pub fn is_briefing_due(briefing: &Briefing, now: DateTime<Utc>) -> bool {
    let tz = briefing_zone(briefing);
    let local_now = now.with_timezone(&tz);
    let today = local_now.date_naive();
    let last_local_day = briefing
        .last_executed_at
        .map(|t| t.with_timezone(&tz).date_naive());

    if briefing.frequency == Frequency::Weekly {
        match briefing.schedule_day_of_week {
            Some(day) if local_now.weekday() != day => return false,
            Some(_) => {}
            None => {
                if last_local_day.is_some_and(|d| (today - d).num_days() < 7) {
                    return false;
                }
            }
        }
    }

    if last_local_day == Some(today) {
        return false;
    }

    local_now.time() >= briefing.schedule_time
}

/// Moves due briefings ACTIVE → QUEUED and hands their ids to the briefing queue.
pub struct BriefingSchedulerJob {
    briefings: Arc<dyn BriefingRepository>,
    credits: Arc<dyn CreditLedger>,
    queue: Arc<dyn JobSink>,
}

enum Admission {
    Queued,
    Rejected,
    Stale,
}

impl BriefingSchedulerJob {
    pub fn new(
        briefings: Arc<dyn BriefingRepository>,
        credits: Arc<dyn CreditLedger>,
        queue: Arc<dyn JobSink>,
    ) -> Self {
        Self {
            briefings,
            credits,
            queue,
        }
    }

    pub async fn run_cycle_at(&self, now: DateTime<Utc>) -> Result<CycleSummary> {
        let mut summary = CycleSummary::default();

        if !self.queue.can_accept() {
            tracing::warn!(
                target: "scheduler",
                queue = self.queue.name(),
                size = self.queue.size(),
                "briefing queue full, skipping cycle"
            );
            summary.queue_full = true;
            return Ok(summary);
        }

        // Coarse: not executed since UTC midnight. The local-day check is precise.
        let utc_midnight = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|d| d.and_utc())
            .unwrap_or(now);
        let candidates = self.briefings.find_schedule_candidates(utc_midnight).await?;
        summary.candidates = candidates.len();
        counter!("scheduler_candidates_total", "queue" => self.queue.name()).increment(candidates.len() as u64);

        let due: Vec<Briefing> = candidates
            .into_iter()
            .filter(|b| is_briefing_due(b, now))
            .collect();
        summary.due = due.len();
        if due.is_empty() {
            return Ok(summary);
        }

        let allowed = self.credits.users_with_credits().await?;
        let (admitted, skipped) = admit_by_credits(due, &allowed, |b| b.user_id);
        summary.skipped_credits = skipped;
        if skipped > 0 {
            tracing::info!(target: "scheduler", skipped, "briefings skipped, owner has no credits");
            counter!("scheduler_credit_skipped_total", "queue" => self.queue.name()).increment(skipped as u64);
        }

        let total = admitted.len();
        for (idx, briefing) in admitted.into_iter().enumerate() {
            if !self.queue.can_accept() {
                summary.deferred = total - idx;
                tracing::info!(
                    target: "scheduler",
                    deferred = summary.deferred,
                    "briefing queue filled during cycle, deferring remaining briefings"
                );
                break;
            }
            match self.admit(&briefing, now).await {
                Ok(Admission::Queued) => summary.queued += 1,
                Ok(Admission::Rejected) => summary.rejected += 1,
                Ok(Admission::Stale) => {}
                Err(e) => {
                    tracing::warn!(
                        target: "scheduler",
                        briefing_id = %briefing.id,
                        error = %format!("{e:#}"),
                        "failed to queue briefing"
                    );
                }
            }
        }

        counter!("scheduler_queued_total", "queue" => self.queue.name()).increment(summary.queued as u64);
        counter!("scheduler_enqueue_rejected_total", "queue" => self.queue.name()).increment(summary.rejected as u64);
        Ok(summary)
    }

    /// The QUEUED write commits on its own, before the id becomes visible to a worker.
    async fn admit(&self, briefing: &Briefing, now: DateTime<Utc>) -> Result<Admission> {
        if self
            .briefings
            .transition(briefing.id, BriefingTransition::Queue { at: now })
            .await?
            .is_none()
        {
            tracing::debug!(target: "scheduler", briefing_id = %briefing.id, "briefing changed state, not queued");
            return Ok(Admission::Stale);
        }

        if self.queue.enqueue(briefing.id) {
            tracing::info!(target: "scheduler", briefing_id = %briefing.id, "briefing queued");
            return Ok(Admission::Queued);
        }

        self.briefings
            .transition(briefing.id, BriefingTransition::RevertQueue)
            .await?;
        tracing::warn!(target: "scheduler", briefing_id = %briefing.id, "enqueue refused, briefing reverted to active");
        Ok(Admission::Rejected)
    }
}

#[async_trait]
impl PeriodicJob for BriefingSchedulerJob {
    fn name(&self) -> &'static str {
        "briefing-scheduler"
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
                    "briefing scheduling cycle"
                );
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(target: "scheduler", error = %format!("{e:#}"), "briefing scheduling cycle failed");
            }
        }
    }
}
