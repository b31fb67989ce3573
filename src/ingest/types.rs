// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::domain::{Source, SourceType};

/// Candidate item returned by a fetcher, before persistence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FetchedItem {
    /// Stable id within the source (guid, post id, hash).
    pub natural_id: String,
    pub title: String,
    pub link: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub raw_content: Option<String>,
    pub clean_content: Option<String>,
}

impl FetchedItem {
    pub fn new(natural_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            natural_id: natural_id.into(),
            title: title.into(),
            link: None,
            author: None,
            published_at: None,
            raw_content: None,
            clean_content: None,
        }
    }
}

/// Outcome of checking a locator before a source is created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ValidationResult {
    pub valid: bool,
    pub title: Option<String>,
    pub description: Option<String>,
    pub error: Option<String>,
}

impl ValidationResult {
    pub fn ok(title: Option<String>, description: Option<String>) -> Self {
        Self {
            valid: true,
            title,
            description,
            error: None,
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Per-type fetch strategy.
#[async_trait::async_trait]
pub trait SourceFetcher: Send + Sync {
    fn source_type(&self) -> SourceType;

    async fn validate(&self, locator: &str) -> Result<ValidationResult>;

    /// Items for `source`; `since` is the previous successful fetch, if any.
    async fn fetch(&self, source: &Source, since: Option<DateTime<Utc>>) -> Result<Vec<FetchedItem>>;
}

// --- Test helpers ---

/// Returns a fixed item list and records every `since` it was called with.
pub struct StaticFetcher {
    source_type: SourceType,
    pub items: Mutex<Vec<FetchedItem>>,
    pub calls: Mutex<Vec<Option<DateTime<Utc>>>>,
}

impl StaticFetcher {
    pub fn new(source_type: SourceType, items: Vec<FetchedItem>) -> Self {
        Self {
            source_type,
            items: Mutex::new(items),
            calls: Mutex::new(vec![]),
        }
    }

    pub fn set_items(&self, items: Vec<FetchedItem>) {
        *self.items.lock() = items;
    }
}

#[async_trait::async_trait]
impl SourceFetcher for StaticFetcher {
    fn source_type(&self) -> SourceType {
        self.source_type
    }

    async fn validate(&self, _locator: &str) -> Result<ValidationResult> {
        Ok(ValidationResult::ok(Some("static".into()), None))
    }

    async fn fetch(&self, _source: &Source, since: Option<DateTime<Utc>>) -> Result<Vec<FetchedItem>> {
        self.calls.lock().push(since);
        Ok(self.items.lock().clone())
    }
}

/// Always fails with the configured message.
pub struct FailingFetcher {
    source_type: SourceType,
    message: String,
}

impl FailingFetcher {
    pub fn new(source_type: SourceType, message: impl Into<String>) -> Self {
        Self {
            source_type,
            message: message.into(),
        }
    }
}

#[async_trait::async_trait]
impl SourceFetcher for FailingFetcher {
    fn source_type(&self) -> SourceType {
        self.source_type
    }

    async fn validate(&self, _locator: &str) -> Result<ValidationResult> {
        Ok(ValidationResult::invalid(self.message.clone()))
    }

    async fn fetch(&self, _source: &Source, _since: Option<DateTime<Utc>>) -> Result<Vec<FetchedItem>> {
        anyhow::bail!("{}", self.message)
    }
}
