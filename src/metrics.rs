use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "scheduler_candidates_total",
            "Entities returned by the scheduler candidate queries."
        );
        describe_counter!("scheduler_queued_total", "Entities moved to QUEUED and enqueued.");
        describe_counter!(
            "scheduler_credit_skipped_total",
            "Due entities skipped because the owner has no credits."
        );
        describe_counter!(
            "scheduler_enqueue_rejected_total",
            "QUEUED transitions reverted because the queue refused the id."
        );
        describe_counter!("worker_jobs_total", "Processor invocations by queue and outcome.");
        describe_gauge!("queue_depth", "Ids waiting in an in-memory queue.");
        describe_counter!("recovery_repaired_total", "Entities forced out of a stuck state.");
        describe_counter!("fetch_items_created_total", "Content items created by fetches.");
        describe_counter!("briefing_reports_total", "Reports generated by briefing executions.");
        describe_histogram!("fetch_parse_ms", "Fetcher parse time in milliseconds.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder for this process.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder()?;
        ensure_metrics_described();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics::counter;
    use tower::ServiceExt;

    #[tokio::test]
    async fn metrics_route_renders_recorded_series() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            counter!("recovery_repaired_total", "kind" => "source").increment(2);
        });

        let app = Metrics { handle }.router();
        let resp = app
            .oneshot(
                axum::http::Request::get("/metrics")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), axum::http::StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), 1 << 20).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("recovery_repaired_total{kind=\"source\"} 2"));
    }
}
