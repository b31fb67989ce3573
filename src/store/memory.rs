// src/store/memory.rs
use std::collections::{HashMap, HashSet};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::{BriefingRepository, CreditLedger, NewsItemRepository, ReportRepository, SourceRepository};
use crate::domain::{
    Briefing, BriefingId, BriefingStatus, BriefingTransition, FetchStatus, NewsItem, NewsItemId,
    NewsItemStatus, Report, Source, SourceId, SourceStatus, SourceTransition, UserId,
};

#[derive(Default)]
struct Items {
    by_id: HashMap<NewsItemId, NewsItem>,
    natural_keys: HashSet<(SourceId, String)>,
}

/// Process-local store. Each table sits behind its own lock; every call
/// commits before it returns.
#[derive(Default)]
pub struct InMemoryStore {
    sources: Mutex<HashMap<SourceId, Source>>,
    briefings: Mutex<HashMap<BriefingId, Briefing>>,
    items: Mutex<Items>,
    reports: Mutex<Vec<Report>>,
    credits: Mutex<HashSet<UserId>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant_credits(&self, user_id: UserId) {
        self.credits.lock().insert(user_id);
    }

    pub fn revoke_credits(&self, user_id: UserId) {
        self.credits.lock().remove(&user_id);
    }

    /// Replace a stored item wholesale (enrichment happens outside this crate).
    pub fn put_item(&self, item: NewsItem) {
        let mut items = self.items.lock();
        items.natural_keys.insert((item.source_id, item.natural_id.clone()));
        items.by_id.insert(item.id, item);
    }

    pub fn put_source(&self, source: Source) {
        self.sources.lock().insert(source.id, source);
    }

    pub fn put_briefing(&self, briefing: Briefing) {
        self.briefings.lock().insert(briefing.id, briefing);
    }

    pub fn item(&self, id: NewsItemId) -> Option<NewsItem> {
        self.items.lock().by_id.get(&id).cloned()
    }

    pub fn report_count(&self) -> usize {
        self.reports.lock().len()
    }
}

#[async_trait]
impl SourceRepository for InMemoryStore {
    async fn insert(&self, source: Source) -> Result<()> {
        self.put_source(source);
        Ok(())
    }

    async fn find_by_id(&self, id: SourceId) -> Result<Option<Source>> {
        Ok(self.sources.lock().get(&id).cloned())
    }

    async fn find_by_briefing(&self, briefing_id: BriefingId) -> Result<Vec<Source>> {
        Ok(self
            .sources
            .lock()
            .values()
            .filter(|s| s.briefing_id == briefing_id && s.status != SourceStatus::Deleted)
            .cloned()
            .collect())
    }

    async fn find_fetch_candidates(&self, cutoff: DateTime<Utc>) -> Result<Vec<Source>> {
        let mut out: Vec<Source> = self
            .sources
            .lock()
            .values()
            .filter(|s| s.is_fetchable() && s.fetch_status == FetchStatus::Idle)
            .filter(|s| s.last_fetched_at.map_or(true, |t| t < cutoff))
            .cloned()
            .collect();
        // Oldest first, never-fetched ahead of everything.
        out.sort_by_key(|s| s.last_fetched_at);
        Ok(out)
    }

    async fn transition(&self, id: SourceId, transition: SourceTransition) -> Result<Option<Source>> {
        let mut sources = self.sources.lock();
        let Some(source) = sources.get_mut(&id) else {
            return Ok(None);
        };
        match source.apply(transition) {
            Ok(()) => Ok(Some(source.clone())),
            Err(_) => Ok(None),
        }
    }

    async fn recover_stuck(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut sources = self.sources.lock();
        let mut n = 0;
        for s in sources.values_mut() {
            let stuck_since = match s.fetch_status {
                FetchStatus::Queued => s.queued_at,
                FetchStatus::Fetching => s.fetch_started_at,
                FetchStatus::Idle => None,
            };
            if stuck_since.is_some_and(|t| t < cutoff) && s.apply(SourceTransition::ResetIdle).is_ok() {
                n += 1;
            }
        }
        Ok(n)
    }
}

#[async_trait]
impl BriefingRepository for InMemoryStore {
    async fn insert(&self, briefing: Briefing) -> Result<()> {
        self.put_briefing(briefing);
        Ok(())
    }

    async fn find_by_id(&self, id: BriefingId) -> Result<Option<Briefing>> {
        Ok(self.briefings.lock().get(&id).cloned())
    }

    async fn find_schedule_candidates(&self, executed_before: DateTime<Utc>) -> Result<Vec<Briefing>> {
        Ok(self
            .briefings
            .lock()
            .values()
            .filter(|b| b.status == BriefingStatus::Active)
            .filter(|b| b.last_executed_at.map_or(true, |t| t < executed_before))
            .cloned()
            .collect())
    }

    async fn transition(
        &self,
        id: BriefingId,
        transition: BriefingTransition,
    ) -> Result<Option<Briefing>> {
        let mut briefings = self.briefings.lock();
        let Some(briefing) = briefings.get_mut(&id) else {
            return Ok(None);
        };
        match briefing.apply(transition) {
            Ok(()) => Ok(Some(briefing.clone())),
            Err(_) => Ok(None),
        }
    }

    async fn recover_stuck(&self, cutoff: DateTime<Utc>, message: &str) -> Result<usize> {
        let mut briefings = self.briefings.lock();
        let mut n = 0;
        for b in briefings.values_mut() {
            let stuck_since = match b.status {
                BriefingStatus::Queued => b.queued_at,
                BriefingStatus::Processing => b.processing_started_at,
                _ => None,
            };
            if stuck_since.is_some_and(|t| t < cutoff)
                && b
                    .apply(BriefingTransition::MarkStuck {
                        message: message.to_string(),
                    })
                    .is_ok()
            {
                n += 1;
            }
        }
        Ok(n)
    }
}

#[async_trait]
impl NewsItemRepository for InMemoryStore {
    async fn insert_if_absent(&self, item: NewsItem) -> Result<bool> {
        let mut items = self.items.lock();
        if !items
            .natural_keys
            .insert((item.source_id, item.natural_id.clone()))
        {
            return Ok(false);
        }
        items.by_id.insert(item.id, item);
        Ok(true)
    }

    async fn find_by_source(&self, source_id: SourceId) -> Result<Vec<NewsItem>> {
        let mut out: Vec<NewsItem> = self
            .items
            .lock()
            .by_id
            .values()
            .filter(|i| i.source_id == source_id)
            .cloned()
            .collect();
        out.sort_by_key(|i| i.created_at);
        Ok(out)
    }

    async fn top_scored(
        &self,
        source_ids: &[SourceId],
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<NewsItem>> {
        let wanted: HashSet<&SourceId> = source_ids.iter().collect();
        let mut out: Vec<NewsItem> = self
            .items
            .lock()
            .by_id
            .values()
            .filter(|i| wanted.contains(&i.source_id))
            .filter(|i| i.status == NewsItemStatus::Done && i.score.is_some())
            .filter(|i| i.created_at >= since)
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            let (sa, sb) = (a.score.unwrap_or_default(), b.score.unwrap_or_default());
            sb.total_cmp(&sa).then_with(|| b.created_at.cmp(&a.created_at))
        });
        out.truncate(limit);
        Ok(out)
    }

    async fn recover_stuck(&self, cutoff: DateTime<Utc>, message: &str) -> Result<usize> {
        let mut items = self.items.lock();
        let mut n = 0;
        for it in items.by_id.values_mut() {
            if it.status == NewsItemStatus::Processing
                && it.processing_started_at.is_some_and(|t| t < cutoff)
            {
                it.status = NewsItemStatus::Error;
                it.processing_started_at = None;
                it.error_message = Some(message.to_string());
                n += 1;
            }
        }
        Ok(n)
    }
}

#[async_trait]
impl ReportRepository for InMemoryStore {
    async fn insert(&self, report: Report) -> Result<()> {
        self.reports.lock().push(report);
        Ok(())
    }

    async fn find_by_briefing(&self, briefing_id: BriefingId) -> Result<Vec<Report>> {
        Ok(self
            .reports
            .lock()
            .iter()
            .filter(|r| r.briefing_id == briefing_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CreditLedger for InMemoryStore {
    async fn users_with_credits(&self) -> Result<HashSet<UserId>> {
        Ok(self.credits.lock().clone())
    }
}
