// src/domain/news_item.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{NewsItemId, SourceId};
use crate::ingest::types::FetchedItem;

/// Enrichment pipeline status. Only the fetch processor creates items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NewsItemStatus {
    New,
    Pending,
    Processing,
    Done,
    Error,
}

/// A fetched content unit, unique per (source, natural id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: NewsItemId,
    pub source_id: SourceId,
    pub natural_id: String,
    pub title: String,
    pub link: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub raw_content: Option<String>,
    pub clean_content: Option<String>,
    pub status: NewsItemStatus,
    /// Relevance score assigned by enrichment; `None` until scored.
    pub score: Option<f32>,
    pub created_at: DateTime<Utc>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl NewsItem {
    pub fn from_fetched(
        source_id: SourceId,
        fetched: FetchedItem,
        status: NewsItemStatus,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_id,
            natural_id: fetched.natural_id,
            title: fetched.title,
            link: fetched.link,
            author: fetched.author,
            published_at: fetched.published_at,
            raw_content: fetched.raw_content,
            clean_content: fetched.clean_content,
            status,
            score: None,
            created_at: now,
            processing_started_at: None,
            error_message: None,
        }
    }
}
