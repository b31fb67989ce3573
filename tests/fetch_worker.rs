// tests/fetch_worker.rs
//
// Fetch processor against the in-memory store with scripted fetchers.
//
// Covered:
// - first import stores backlog as DONE, later fetches as NEW
// - re-fetching the same items creates nothing new
// - fetch failure: ERROR + IDLE, lastFetchedAt untouched
// - non-active source is reset to IDLE without fetching
// - unregistered source type is recorded as a fetch error

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use briefing_orchestrator::domain::{FetchStatus, NewsItemStatus, Source, SourceStatus, SourceType};
use briefing_orchestrator::ingest::types::{FailingFetcher, StaticFetcher};
use briefing_orchestrator::ingest::{FetchedItem, FetcherRegistry};
use briefing_orchestrator::processor::FetchWorker;
use briefing_orchestrator::store::{InMemoryStore, NewsItemRepository, SourceRepository};

fn rss_source() -> Source {
    Source::new(Uuid::new_v4(), Uuid::new_v4(), SourceType::Rss, "https://example.com/feed")
}

fn items(ids: &[&str]) -> Vec<FetchedItem> {
    ids.iter().map(|id| FetchedItem::new(*id, format!("title {id}"))).collect()
}

fn worker(store: &Arc<InMemoryStore>, registry: FetcherRegistry) -> FetchWorker {
    FetchWorker::new(store.clone(), store.clone(), registry)
}

#[tokio::test]
async fn first_import_is_done_then_new_items_are_new() {
    let store = Arc::new(InMemoryStore::new());
    let fetcher = Arc::new(StaticFetcher::new(SourceType::Rss, items(&["a", "b"])));
    let w = worker(&store, FetcherRegistry::new().with(fetcher.clone()));

    let source = rss_source();
    let id = source.id;
    store.put_source(source);

    w.process_source(id).await.unwrap();

    let after_first = SourceRepository::find_by_id(store.as_ref(), id).await.unwrap().unwrap();
    assert_eq!(after_first.fetch_status, FetchStatus::Idle);
    assert_eq!(after_first.status, SourceStatus::Active);
    assert!(after_first.last_fetched_at.is_some());
    assert!(after_first.timestamps_consistent());

    let stored = store.find_by_source(id).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().all(|i| i.status == NewsItemStatus::Done));

    fetcher.set_items(items(&["a", "b", "c"]));
    w.process_source(id).await.unwrap();

    let stored = store.find_by_source(id).await.unwrap();
    assert_eq!(stored.len(), 3, "a and b must not be duplicated");
    let c = stored.iter().find(|i| i.natural_id == "c").unwrap();
    assert_eq!(c.status, NewsItemStatus::New);

    // second call received the first fetch's timestamp as `since`
    let calls = fetcher.calls.lock().clone();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], None);
    assert_eq!(calls[1], after_first.last_fetched_at);
}

#[tokio::test]
async fn refetch_of_known_items_creates_nothing() {
    let store = Arc::new(InMemoryStore::new());
    let fetcher = Arc::new(StaticFetcher::new(SourceType::Rss, items(&["x"])));
    let w = worker(&store, FetcherRegistry::new().with(fetcher));

    let source = rss_source();
    let id = source.id;
    store.put_source(source);

    for _ in 0..3 {
        w.process_source(id).await.unwrap();
    }
    assert_eq!(store.find_by_source(id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn failure_marks_error_and_keeps_last_fetched() {
    let store = Arc::new(InMemoryStore::new());
    let w = worker(
        &store,
        FetcherRegistry::new().with(Arc::new(FailingFetcher::new(SourceType::Rss, "HTTP 503"))),
    );

    let last = Utc::now() - chrono::Duration::hours(2);
    let source = rss_source().with_last_fetched_at(last);
    let id = source.id;
    store.put_source(source);

    w.process_source(id).await.unwrap();

    let s = SourceRepository::find_by_id(store.as_ref(), id).await.unwrap().unwrap();
    assert_eq!(s.status, SourceStatus::Error);
    assert_eq!(s.fetch_status, FetchStatus::Idle);
    assert_eq!(s.last_fetched_at, Some(last));
    assert!(s.last_error.as_deref().unwrap().contains("HTTP 503"));
    assert!(s.timestamps_consistent());
}

#[tokio::test]
async fn paused_source_is_reset_without_fetching() {
    let store = Arc::new(InMemoryStore::new());
    let fetcher = Arc::new(StaticFetcher::new(SourceType::Rss, items(&["a"])));
    let w = worker(&store, FetcherRegistry::new().with(fetcher.clone()));

    let mut source = rss_source();
    source.status = SourceStatus::Paused;
    source.fetch_status = FetchStatus::Queued;
    source.queued_at = Some(Utc::now());
    let id = source.id;
    store.put_source(source);

    w.process_source(id).await.unwrap();

    let s = SourceRepository::find_by_id(store.as_ref(), id).await.unwrap().unwrap();
    assert_eq!(s.status, SourceStatus::Paused);
    assert_eq!(s.fetch_status, FetchStatus::Idle);
    assert!(s.queued_at.is_none());
    assert!(fetcher.calls.lock().is_empty());
}

#[tokio::test]
async fn unregistered_type_is_a_fetch_error() {
    let store = Arc::new(InMemoryStore::new());
    let w = worker(&store, FetcherRegistry::new());

    let source = Source::new(Uuid::new_v4(), Uuid::new_v4(), SourceType::Website, "https://example.com");
    let id = source.id;
    store.put_source(source);

    w.process_source(id).await.unwrap();

    let s = SourceRepository::find_by_id(store.as_ref(), id).await.unwrap().unwrap();
    assert_eq!(s.status, SourceStatus::Error);
    assert_eq!(s.fetch_status, FetchStatus::Idle);
    assert!(s.last_error.unwrap().contains("no fetcher registered"));
}

#[tokio::test]
async fn unknown_source_id_is_ignored() {
    let store = Arc::new(InMemoryStore::new());
    let w = worker(&store, FetcherRegistry::new());
    w.process_source(Uuid::new_v4()).await.unwrap();
}
