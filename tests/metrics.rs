// tests/metrics.rs
//
// The recorder is installed before the jobs start, so the first cycle's series are exported.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;
use uuid::Uuid;

use briefing_orchestrator::config::OrchestratorConfig;
use briefing_orchestrator::domain::{Source, SourceType};
use briefing_orchestrator::ingest::types::StaticFetcher;
use briefing_orchestrator::ingest::{FetchedItem, FetcherRegistry};
use briefing_orchestrator::metrics::Metrics;
use briefing_orchestrator::notify::RecordingMailer;
use briefing_orchestrator::store::InMemoryStore;
use briefing_orchestrator::OrchestratorDeps;

async fn scrape(app: &axum::Router) -> String {
    let resp = app
        .clone()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), 1 << 20).await.unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

#[tokio::test]
async fn first_cycle_series_reach_the_metrics_route() {
    let metrics = Metrics::init().unwrap();

    let mut cfg = OrchestratorConfig::default();
    cfg.queues.poll_timeout_ms = 20;
    cfg.queues.shutdown_grace_secs = 2;

    let store = Arc::new(InMemoryStore::new());
    let owner = Uuid::new_v4();
    store.grant_credits(owner);
    store.put_source(Source::new(
        Uuid::new_v4(),
        owner,
        SourceType::Rss,
        "https://example.com/feed",
    ));

    let fetcher = Arc::new(StaticFetcher::new(SourceType::Rss, vec![FetchedItem::new("a", "first")]));
    let (app, handle) = briefing_orchestrator::app(
        &cfg,
        OrchestratorDeps {
            sources: store.clone(),
            briefings: store.clone(),
            items: store.clone(),
            reports: store.clone(),
            credits: store.clone(),
            fetchers: FetcherRegistry::new().with(fetcher),
            mailer: Arc::new(RecordingMailer::new()),
        },
        &metrics,
    );

    let text = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let text = scrape(&app).await;
            if text.contains("worker_jobs_total") {
                break text;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("fetch job never recorded");

    assert!(text.contains("scheduler_queued_total{queue=\"fetch\"}"));
    let worker_line = text
        .lines()
        .find(|l| l.starts_with("worker_jobs_total{"))
        .expect("worker series");
    assert!(worker_line.contains("queue=\"fetch\""));
    assert!(worker_line.contains("outcome=\"ok\""));

    handle.shutdown().await;
}
