// src/ingest/registry.rs
use std::sync::Arc;

use crate::domain::SourceType;
use crate::ingest::types::SourceFetcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no fetcher registered for source type {0}")]
pub struct UnsupportedSourceType(pub SourceType);

/// One slot per source type, filled once at startup.
#[derive(Default, Clone)]
pub struct FetcherRegistry {
    rss: Option<Arc<dyn SourceFetcher>>,
    website: Option<Arc<dyn SourceFetcher>>,
    reddit: Option<Arc<dyn SourceFetcher>>,
    email: Option<Arc<dyn SourceFetcher>>,
}

impl FetcherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under the fetcher's own type; a later registration replaces an earlier one.
    pub fn with(mut self, fetcher: Arc<dyn SourceFetcher>) -> Self {
        let kind = fetcher.source_type();
        *self.slot_mut(kind) = Some(fetcher);
        self
    }

    pub fn resolve(&self, kind: SourceType) -> Result<&Arc<dyn SourceFetcher>, UnsupportedSourceType> {
        let slot = match kind {
            SourceType::Rss => &self.rss,
            SourceType::Website => &self.website,
            SourceType::Reddit => &self.reddit,
            SourceType::Email => &self.email,
        };
        slot.as_ref().ok_or(UnsupportedSourceType(kind))
    }

    pub fn registered(&self) -> Vec<SourceType> {
        [
            SourceType::Rss,
            SourceType::Website,
            SourceType::Reddit,
            SourceType::Email,
        ]
        .into_iter()
        .filter(|k| self.resolve(*k).is_ok())
        .collect()
    }

    fn slot_mut(&mut self, kind: SourceType) -> &mut Option<Arc<dyn SourceFetcher>> {
        match kind {
            SourceType::Rss => &mut self.rss,
            SourceType::Website => &mut self.website,
            SourceType::Reddit => &mut self.reddit,
            SourceType::Email => &mut self.email,
        }
    }
}
