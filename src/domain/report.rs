// src/domain/report.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{BriefingId, NewsItem, NewsItemId, ReportId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    Generated,
}

/// Immutable snapshot produced by one briefing execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub briefing_id: BriefingId,
    pub status: ReportStatus,
    pub window_start: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    pub items: Vec<ReportItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportItem {
    pub news_item_id: NewsItemId,
    pub title: String,
    pub link: Option<String>,
    pub score: f32,
    /// 1-based rank.
    pub position: u32,
}

impl Report {
    /// Build a report from items already ordered by score, highest first.
    pub fn from_ranked(
        briefing_id: BriefingId,
        window_start: DateTime<Utc>,
        generated_at: DateTime<Utc>,
        ranked: &[NewsItem],
    ) -> Self {
        let items = ranked
            .iter()
            .enumerate()
            .map(|(idx, it)| ReportItem {
                news_item_id: it.id,
                title: it.title.clone(),
                link: it.link.clone(),
                score: it.score.unwrap_or_default(),
                position: idx as u32 + 1,
            })
            .collect();

        Self {
            id: Uuid::new_v4(),
            briefing_id,
            status: ReportStatus::Generated,
            window_start,
            generated_at,
            items,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
