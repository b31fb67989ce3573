// src/recovery.rs
//! Jobs that force entities out of transient states they have held too long.
//!
//! A process crash between "mark QUEUED/FETCHING/PROCESSING" and the matching
//! completion leaves the entity parked; these jobs are the only way back.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use metrics::counter;

use crate::config::RecoveryConfig;
use crate::scheduler::PeriodicJob;
use crate::store::{BriefingRepository, NewsItemRepository, SourceRepository};

fn stuck_message(minutes: i64) -> String {
    format!("stuck for more than {minutes} minutes")
}

fn report(kind: &'static str, repaired: usize, threshold_minutes: i64) {
    if repaired == 0 {
        return;
    }
    counter!("recovery_repaired_total", "kind" => kind).increment(repaired as u64);
    tracing::warn!(
        target: "recovery",
        kind,
        repaired,
        threshold_minutes,
        "recovered stuck entities"
    );
}

/// QUEUED/FETCHING sources past the threshold go back to IDLE. Lifecycle status is kept.
pub struct StuckSourceRecoveryJob {
    sources: Arc<dyn SourceRepository>,
    threshold_minutes: i64,
}

impl StuckSourceRecoveryJob {
    pub fn new(sources: Arc<dyn SourceRepository>, cfg: &RecoveryConfig) -> Self {
        Self {
            sources,
            threshold_minutes: cfg.source_threshold_minutes,
        }
    }

    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = now - Duration::minutes(self.threshold_minutes);
        let repaired = self.sources.recover_stuck(cutoff).await?;
        report("source", repaired, self.threshold_minutes);
        Ok(repaired)
    }
}

/// QUEUED/PROCESSING briefings past the threshold go to ERROR.
pub struct StuckBriefingRecoveryJob {
    briefings: Arc<dyn BriefingRepository>,
    threshold_minutes: i64,
}

impl StuckBriefingRecoveryJob {
    pub fn new(briefings: Arc<dyn BriefingRepository>, cfg: &RecoveryConfig) -> Self {
        Self {
            briefings,
            threshold_minutes: cfg.briefing_threshold_minutes,
        }
    }

    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = now - Duration::minutes(self.threshold_minutes);
        let repaired = self
            .briefings
            .recover_stuck(cutoff, &stuck_message(self.threshold_minutes))
            .await?;
        report("briefing", repaired, self.threshold_minutes);
        Ok(repaired)
    }
}

/// PROCESSING content items past the threshold go to ERROR.
pub struct StuckItemRecoveryJob {
    items: Arc<dyn NewsItemRepository>,
    threshold_minutes: i64,
}

impl StuckItemRecoveryJob {
    pub fn new(items: Arc<dyn NewsItemRepository>, cfg: &RecoveryConfig) -> Self {
        Self {
            items,
            threshold_minutes: cfg.item_threshold_minutes,
        }
    }

    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = now - Duration::minutes(self.threshold_minutes);
        let repaired = self
            .items
            .recover_stuck(cutoff, &stuck_message(self.threshold_minutes))
            .await?;
        report("item", repaired, self.threshold_minutes);
        Ok(repaired)
    }
}

macro_rules! periodic_recovery {
    ($job:ty, $name:literal) => {
        #[async_trait]
        impl PeriodicJob for $job {
            fn name(&self) -> &'static str {
                $name
            }

            async fn run_once(&self) {
                if let Err(e) = self.run_at(Utc::now()).await {
                    tracing::error!(
                        target: "recovery",
                        job = $name,
                        error = %format!("{e:#}"),
                        "recovery run failed"
                    );
                }
            }
        }
    };
}

periodic_recovery!(StuckSourceRecoveryJob, "stuck-source-recovery");
periodic_recovery!(StuckBriefingRecoveryJob, "stuck-briefing-recovery");
periodic_recovery!(StuckItemRecoveryJob, "stuck-item-recovery");
