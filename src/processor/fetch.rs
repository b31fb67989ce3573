// src/processor/fetch.rs
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use uuid::Uuid;

use super::JobProcessor;
use crate::domain::{
    FetchStatus, NewsItem, NewsItemStatus, Source, SourceId, SourceTransition,
};
use crate::ingest::FetcherRegistry;
use crate::store::{NewsItemRepository, SourceRepository};

/// Counts from one successful fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FetchOutcome {
    pub fetched: usize,
    pub created: usize,
}

/// Runs one fetch for one source: QUEUED → FETCHING → IDLE (or ERROR).
pub struct FetchWorker {
    sources: Arc<dyn SourceRepository>,
    items: Arc<dyn NewsItemRepository>,
    fetchers: FetcherRegistry,
}

impl FetchWorker {
    pub fn new(
        sources: Arc<dyn SourceRepository>,
        items: Arc<dyn NewsItemRepository>,
        fetchers: FetcherRegistry,
    ) -> Self {
        Self {
            sources,
            items,
            fetchers,
        }
    }

    pub async fn process_source(&self, id: SourceId) -> Result<()> {
        let Some(source) = self.sources.find_by_id(id).await? else {
            tracing::debug!(target: "fetch", source_id = %id, "source no longer exists, skipping");
            return Ok(());
        };

        if !source.is_fetchable() {
            if source.fetch_status != FetchStatus::Idle {
                self.sources.transition(id, SourceTransition::ResetIdle).await?;
            }
            tracing::info!(
                target: "fetch",
                source_id = %id,
                status = ?source.status,
                "source paused or deleted, reset to idle and skipped"
            );
            return Ok(());
        }

        if source.fetch_status == FetchStatus::Fetching {
            tracing::debug!(target: "fetch", source_id = %id, "source already fetching, duplicate pop ignored");
            return Ok(());
        }

        let started = Utc::now();
        let Some(source) = self
            .sources
            .transition(id, SourceTransition::StartFetch { at: started })
            .await?
        else {
            tracing::debug!(target: "fetch", source_id = %id, "source changed state before fetch, skipping");
            return Ok(());
        };
        tracing::debug!(target: "fetch", source_id = %id, source_type = %source.source_type, "fetch started");

        match self.fetch_and_store(&source, started).await {
            Ok(outcome) => {
                self.sources
                    .transition(id, SourceTransition::CompleteFetch { at: started })
                    .await?;
                tracing::info!(
                    target: "fetch",
                    source_id = %id,
                    fetched = outcome.fetched,
                    created = outcome.created,
                    first_import = source.is_first_import(),
                    "fetch completed"
                );
            }
            Err(e) => {
                let error = format!("{e:#}");
                self.sources
                    .transition(id, SourceTransition::FailFetch { error: error.clone() })
                    .await?;
                tracing::warn!(target: "fetch", source_id = %id, %error, "fetch failed");
            }
        }
        Ok(())
    }

    async fn fetch_and_store(&self, source: &Source, now: DateTime<Utc>) -> Result<FetchOutcome> {
        let fetcher = self.fetchers.resolve(source.source_type)?;
        let fetched = fetcher.fetch(source, source.last_fetched_at).await?;

        // Backlog from a first import must not surface as new content.
        let status = if source.is_first_import() {
            NewsItemStatus::Done
        } else {
            NewsItemStatus::New
        };

        let mut outcome = FetchOutcome {
            fetched: fetched.len(),
            created: 0,
        };
        for item in fetched {
            let item = NewsItem::from_fetched(source.id, item, status, now);
            if self.items.insert_if_absent(item).await? {
                outcome.created += 1;
            }
        }
        counter!("fetch_items_created_total").increment(outcome.created as u64);
        Ok(outcome)
    }
}

#[async_trait]
impl JobProcessor for FetchWorker {
    fn name(&self) -> &'static str {
        "fetch"
    }

    async fn process(&self, id: Uuid) -> Result<()> {
        self.process_source(id).await
    }
}
