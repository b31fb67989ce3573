// src/processor/mod.rs
//! Per-entity job processors invoked by the worker pools.
//!
//! A processor owns the transitions out of QUEUED for the entity it is
//! handed. Failures of the work itself are recorded on the entity and the
//! call still returns `Ok`; an `Err` means the store could not be reached.

pub mod briefing;
pub mod fetch;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

pub use briefing::BriefingWorker;
pub use fetch::FetchWorker;

#[async_trait]
pub trait JobProcessor: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn process(&self, id: Uuid) -> Result<()>;
}
