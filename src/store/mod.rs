// src/store/mod.rs
//! Repository seams the orchestration core reads and writes through.
//!
//! Every state change is a single `transition` call: the store checks the
//! entity's precondition and applies the change atomically, so two actors
//! racing on one id cannot both succeed. `Ok(None)` means the entity is gone
//! or no longer in the expected state.

pub mod memory;

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    Briefing, BriefingId, BriefingTransition, NewsItem, Report, Source, SourceId,
    SourceTransition, UserId,
};

pub use memory::InMemoryStore;

#[async_trait]
pub trait SourceRepository: Send + Sync {
    async fn insert(&self, source: Source) -> Result<()>;

    async fn find_by_id(&self, id: SourceId) -> Result<Option<Source>>;

    async fn find_by_briefing(&self, briefing_id: BriefingId) -> Result<Vec<Source>>;

    /// ACTIVE + IDLE sources never fetched or last fetched before `cutoff`.
    async fn find_fetch_candidates(&self, cutoff: DateTime<Utc>) -> Result<Vec<Source>>;

    async fn transition(&self, id: SourceId, transition: SourceTransition) -> Result<Option<Source>>;

    /// QUEUED/FETCHING sources whose transient timestamp is before `cutoff` go back to IDLE.
    async fn recover_stuck(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}

#[async_trait]
pub trait BriefingRepository: Send + Sync {
    async fn insert(&self, briefing: Briefing) -> Result<()>;

    async fn find_by_id(&self, id: BriefingId) -> Result<Option<Briefing>>;

    /// ACTIVE briefings never executed or last executed before `executed_before`.
    async fn find_schedule_candidates(&self, executed_before: DateTime<Utc>) -> Result<Vec<Briefing>>;

    async fn transition(
        &self,
        id: BriefingId,
        transition: BriefingTransition,
    ) -> Result<Option<Briefing>>;

    /// QUEUED/PROCESSING briefings whose transient timestamp is before `cutoff` go to ERROR.
    async fn recover_stuck(&self, cutoff: DateTime<Utc>, message: &str) -> Result<usize>;
}

#[async_trait]
pub trait NewsItemRepository: Send + Sync {
    /// Insert unless (source, natural id) already exists. Returns whether it was inserted.
    async fn insert_if_absent(&self, item: NewsItem) -> Result<bool>;

    async fn find_by_source(&self, source_id: SourceId) -> Result<Vec<NewsItem>>;

    /// DONE, scored items of `source_ids` created at or after `since`, best score first.
    async fn top_scored(
        &self,
        source_ids: &[SourceId],
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<NewsItem>>;

    /// PROCESSING items started before `cutoff` go to ERROR.
    async fn recover_stuck(&self, cutoff: DateTime<Utc>, message: &str) -> Result<usize>;
}

#[async_trait]
pub trait ReportRepository: Send + Sync {
    async fn insert(&self, report: Report) -> Result<()>;

    async fn find_by_briefing(&self, briefing_id: BriefingId) -> Result<Vec<Report>>;
}

/// Admission signal: users currently allowed to consume resources.
#[async_trait]
pub trait CreditLedger: Send + Sync {
    async fn users_with_credits(&self) -> Result<HashSet<UserId>>;
}
