// tests/briefing_worker.rs
//
// Briefing processor: status flow, report contents, mail isolation.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, NaiveTime, Utc};
use uuid::Uuid;

use briefing_orchestrator::domain::{
    Briefing, BriefingId, BriefingStatus, Frequency, NewsItem, NewsItemStatus, Report,
    ReportStatus, Source, SourceType, MAX_ERROR_LEN,
};
use briefing_orchestrator::ingest::FetchedItem;
use briefing_orchestrator::notify::RecordingMailer;
use briefing_orchestrator::processor::BriefingWorker;
use briefing_orchestrator::store::{BriefingRepository, InMemoryStore, ReportRepository};

fn worker(store: &Arc<InMemoryStore>, mailer: Arc<RecordingMailer>, top: usize) -> BriefingWorker {
    BriefingWorker::new(store.clone(), store.clone(), store.clone(), store.clone(), mailer, top)
}

fn queued_briefing() -> Briefing {
    let mut b = Briefing::new(Uuid::new_v4(), Frequency::Daily, NaiveTime::MIN);
    b.status = BriefingStatus::Queued;
    b.queued_at = Some(Utc::now());
    b
}

fn scored_item(source_id: Uuid, natural_id: &str, score: f32) -> NewsItem {
    let mut it = NewsItem::from_fetched(
        source_id,
        FetchedItem::new(natural_id, format!("item {natural_id}")),
        NewsItemStatus::Done,
        Utc::now(),
    );
    it.score = Some(score);
    it
}

async fn stored_briefing(store: &InMemoryStore, id: Uuid) -> Briefing {
    BriefingRepository::find_by_id(store, id).await.unwrap().unwrap()
}

#[tokio::test]
async fn briefing_without_content_still_generates_a_report() {
    let store = Arc::new(InMemoryStore::new());
    let mailer = Arc::new(RecordingMailer::new());
    let w = worker(&store, mailer.clone(), 10);

    let b = queued_briefing();
    let id = b.id;
    store.put_briefing(b);

    let before = Utc::now();
    w.process_briefing(id).await.unwrap();

    let b = stored_briefing(&store, id).await;
    assert_eq!(b.status, BriefingStatus::Active);
    assert!(b.last_executed_at.unwrap() >= before);
    assert!(b.timestamps_consistent());

    let reports = ReportRepository::find_by_briefing(store.as_ref(), id).await.unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].status, ReportStatus::Generated);
    assert!(reports[0].is_empty());
    assert_eq!(mailer.sent.lock().len(), 1);
}

#[tokio::test]
async fn report_holds_top_items_in_score_order() {
    let store = Arc::new(InMemoryStore::new());
    let w = worker(&store, Arc::new(RecordingMailer::new()), 2);

    let b = queued_briefing();
    let id = b.id;
    let source = Source::new(id, b.user_id, SourceType::Rss, "https://example.com/feed");
    let sid = source.id;
    store.put_briefing(b);
    store.put_source(source);

    store.put_item(scored_item(sid, "low", 0.1));
    store.put_item(scored_item(sid, "high", 0.9));
    store.put_item(scored_item(sid, "mid", 0.5));
    let mut unscored = scored_item(sid, "unscored", 0.0);
    unscored.score = None;
    store.put_item(unscored);
    let mut pending = scored_item(sid, "pending", 1.0);
    pending.status = NewsItemStatus::Pending;
    store.put_item(pending);
    let mut stale = scored_item(sid, "stale", 0.99);
    stale.created_at = Utc::now() - Duration::days(3);
    store.put_item(stale);

    w.process_briefing(id).await.unwrap();

    let reports = ReportRepository::find_by_briefing(store.as_ref(), id).await.unwrap();
    let items = &reports[0].items;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].title, "item high");
    assert_eq!(items[0].position, 1);
    assert_eq!(items[1].title, "item mid");
    assert_eq!(items[1].position, 2);
}

#[tokio::test]
async fn email_failure_does_not_undo_completion() {
    let store = Arc::new(InMemoryStore::new());
    let mailer = Arc::new(RecordingMailer::failing());
    let w = worker(&store, mailer.clone(), 10);

    let b = queued_briefing();
    let id = b.id;
    store.put_briefing(b);

    w.process_briefing(id).await.unwrap();

    let b = stored_briefing(&store, id).await;
    assert_eq!(b.status, BriefingStatus::Active);
    assert!(b.error_message.is_none());
    assert_eq!(store.report_count(), 1);
    assert_eq!(mailer.sent.lock().len(), 1);
}

#[tokio::test]
async fn stale_pop_of_non_queued_briefing_is_ignored() {
    let store = Arc::new(InMemoryStore::new());
    let mailer = Arc::new(RecordingMailer::new());
    let w = worker(&store, mailer.clone(), 10);

    let b = Briefing::new(Uuid::new_v4(), Frequency::Daily, NaiveTime::MIN);
    let id = b.id;
    store.put_briefing(b);

    w.process_briefing(id).await.unwrap();

    let b = stored_briefing(&store, id).await;
    assert_eq!(b.status, BriefingStatus::Active);
    assert!(b.last_executed_at.is_none());
    assert_eq!(store.report_count(), 0);
    assert!(mailer.sent.lock().is_empty());
}

#[tokio::test]
async fn execute_now_leaves_status_alone() {
    let store = Arc::new(InMemoryStore::new());
    let mailer = Arc::new(RecordingMailer::new());
    let w = worker(&store, mailer.clone(), 10);

    let b = Briefing::new(Uuid::new_v4(), Frequency::Weekly, NaiveTime::MIN);
    let id = b.id;
    store.put_briefing(b);

    let report = w.execute_now(id).await.unwrap().expect("briefing exists");
    assert_eq!(report.briefing_id, id);

    let b = stored_briefing(&store, id).await;
    assert_eq!(b.status, BriefingStatus::Active);
    assert!(b.last_executed_at.is_none());
    assert_eq!(store.report_count(), 1);
    assert!(mailer.sent.lock().is_empty());

    assert!(w.execute_now(Uuid::new_v4()).await.unwrap().is_none());
}

/// Report table that is down.
struct BrokenReports;

#[async_trait]
impl ReportRepository for BrokenReports {
    async fn insert(&self, _report: Report) -> Result<()> {
        anyhow::bail!("report table unavailable: {}", "x".repeat(800))
    }

    async fn find_by_briefing(&self, _briefing_id: BriefingId) -> Result<Vec<Report>> {
        Ok(vec![])
    }
}

#[tokio::test]
async fn report_failure_marks_briefing_error_without_email() {
    let store = Arc::new(InMemoryStore::new());
    let mailer = Arc::new(RecordingMailer::new());
    let w = BriefingWorker::new(
        store.clone(),
        store.clone(),
        store.clone(),
        Arc::new(BrokenReports),
        mailer.clone(),
        10,
    );

    let b = queued_briefing();
    let id = b.id;
    store.put_briefing(b);

    w.process_briefing(id).await.unwrap();

    let b = stored_briefing(&store, id).await;
    assert_eq!(b.status, BriefingStatus::Error);
    assert!(b.last_executed_at.is_none());
    assert!(b.timestamps_consistent());
    let message = b.error_message.expect("error recorded");
    assert!(message.starts_with("report table unavailable"));
    assert_eq!(message.chars().count(), MAX_ERROR_LEN);
    assert_eq!(store.report_count(), 0);
    assert!(mailer.sent.lock().is_empty());
}

/// Stores reports, but recovery fires against the briefing while the report is written.
struct RecoveryDuringInsert {
    store: Arc<InMemoryStore>,
}

#[async_trait]
impl ReportRepository for RecoveryDuringInsert {
    async fn insert(&self, report: Report) -> Result<()> {
        BriefingRepository::recover_stuck(
            self.store.as_ref(),
            Utc::now() + Duration::minutes(1),
            "stuck for more than 15 minutes",
        )
        .await?;
        ReportRepository::insert(self.store.as_ref(), report).await
    }

    async fn find_by_briefing(&self, briefing_id: BriefingId) -> Result<Vec<Report>> {
        ReportRepository::find_by_briefing(self.store.as_ref(), briefing_id).await
    }
}

#[tokio::test]
async fn completion_lost_to_recovery_sends_no_email() {
    let store = Arc::new(InMemoryStore::new());
    let mailer = Arc::new(RecordingMailer::new());
    let w = BriefingWorker::new(
        store.clone(),
        store.clone(),
        store.clone(),
        Arc::new(RecoveryDuringInsert { store: store.clone() }),
        mailer.clone(),
        10,
    );

    let b = queued_briefing();
    let id = b.id;
    store.put_briefing(b);

    w.process_briefing(id).await.unwrap();

    let b = stored_briefing(&store, id).await;
    assert_eq!(b.status, BriefingStatus::Error);
    assert!(b.last_executed_at.is_none());
    assert_eq!(store.report_count(), 1);
    assert!(mailer.sent.lock().is_empty());
}
