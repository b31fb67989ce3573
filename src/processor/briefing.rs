// src/processor/briefing.rs
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use uuid::Uuid;

use super::JobProcessor;
use crate::domain::{Briefing, BriefingId, BriefingStatus, BriefingTransition, Report, SourceId};
use crate::notify::ReportMailer;
use crate::store::{BriefingRepository, NewsItemRepository, ReportRepository, SourceRepository};

/// Builds reports for briefings: QUEUED → PROCESSING → ACTIVE (or ERROR).
pub struct BriefingWorker {
    briefings: Arc<dyn BriefingRepository>,
    sources: Arc<dyn SourceRepository>,
    items: Arc<dyn NewsItemRepository>,
    reports: Arc<dyn ReportRepository>,
    mailer: Arc<dyn ReportMailer>,
    top_items: usize,
}

impl BriefingWorker {
    pub fn new(
        briefings: Arc<dyn BriefingRepository>,
        sources: Arc<dyn SourceRepository>,
        items: Arc<dyn NewsItemRepository>,
        reports: Arc<dyn ReportRepository>,
        mailer: Arc<dyn ReportMailer>,
        top_items: usize,
    ) -> Self {
        Self {
            briefings,
            sources,
            items,
            reports,
            mailer,
            top_items: top_items.max(1),
        }
    }

    pub async fn process_briefing(&self, id: BriefingId) -> Result<()> {
        let Some(briefing) = self.briefings.find_by_id(id).await? else {
            tracing::debug!(target: "briefing", briefing_id = %id, "briefing no longer exists, skipping");
            return Ok(());
        };
        if briefing.status != BriefingStatus::Queued {
            tracing::debug!(
                target: "briefing",
                briefing_id = %id,
                status = ?briefing.status,
                "briefing not queued, stale pop ignored"
            );
            return Ok(());
        }

        let now = Utc::now();
        let Some(briefing) = self
            .briefings
            .transition(id, BriefingTransition::StartProcessing { at: now })
            .await?
        else {
            tracing::debug!(target: "briefing", briefing_id = %id, "briefing changed state before processing, skipping");
            return Ok(());
        };

        match self.build_report(&briefing, now).await {
            Ok(report) => {
                let Some(briefing) = self
                    .briefings
                    .transition(id, BriefingTransition::Complete { at: now })
                    .await?
                else {
                    // Recovery moved it out of PROCESSING while the report was built.
                    tracing::warn!(
                        target: "briefing",
                        briefing_id = %id,
                        report_id = %report.id,
                        "briefing left processing before completion, report kept, email skipped"
                    );
                    return Ok(());
                };
                tracing::info!(
                    target: "briefing",
                    briefing_id = %id,
                    report_id = %report.id,
                    items = report.items.len(),
                    "briefing executed"
                );
                // Delivery failures never undo the report or the status change.
                if let Err(e) = self.mailer.send_report_email(&briefing, &report).await {
                    tracing::warn!(
                        target: "briefing",
                        briefing_id = %id,
                        report_id = %report.id,
                        error = %format!("{e:#}"),
                        "report email failed"
                    );
                }
            }
            Err(e) => {
                let message = format!("{e:#}");
                self.briefings
                    .transition(id, BriefingTransition::Fail { message: message.clone() })
                    .await?;
                tracing::warn!(target: "briefing", briefing_id = %id, error = %message, "briefing failed");
            }
        }
        Ok(())
    }

    /// On-demand execution outside the schedule. Lifecycle status is untouched.
    /// `None` when the briefing does not exist.
    pub async fn execute_now(&self, id: BriefingId) -> Result<Option<Report>> {
        let Some(briefing) = self.briefings.find_by_id(id).await? else {
            return Ok(None);
        };
        let report = self.build_report(&briefing, Utc::now()).await?;
        tracing::info!(
            target: "briefing",
            briefing_id = %id,
            report_id = %report.id,
            items = report.items.len(),
            "briefing executed on demand"
        );
        Ok(Some(report))
    }

    /// Select the top scored items of the lookback window and persist them as a report.
    async fn build_report(&self, briefing: &Briefing, now: DateTime<Utc>) -> Result<Report> {
        let window_start = briefing.lookback_start(now);
        let source_ids: Vec<SourceId> = self
            .sources
            .find_by_briefing(briefing.id)
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect();

        let ranked = if source_ids.is_empty() {
            Vec::new()
        } else {
            self.items
                .top_scored(&source_ids, window_start, self.top_items)
                .await?
        };
        if ranked.is_empty() {
            tracing::info!(
                target: "briefing",
                briefing_id = %briefing.id,
                sources = source_ids.len(),
                "no qualifying items, generating empty report"
            );
        }

        let report = Report::from_ranked(briefing.id, window_start, now, &ranked);
        self.reports.insert(report.clone()).await?;
        counter!("briefing_reports_total").increment(1);
        Ok(report)
    }
}

#[async_trait]
impl JobProcessor for BriefingWorker {
    fn name(&self) -> &'static str {
        "briefing"
    }

    async fn process(&self, id: Uuid) -> Result<()> {
        self.process_briefing(id).await
    }
}
