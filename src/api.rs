use std::sync::Arc;

use serde::Serialize;
use shuttle_axum::axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::processor::BriefingWorker;
use crate::queue::JobQueue;
use crate::runtime::OrchestratorHandle;

#[derive(Clone)]
pub struct AppState {
    pub fetch_queue: Arc<JobQueue>,
    pub briefing_queue: Arc<JobQueue>,
    pub briefing_worker: Arc<BriefingWorker>,
}

impl AppState {
    pub fn from_handle(handle: &OrchestratorHandle) -> Self {
        Self {
            fetch_queue: handle.fetch_queue(),
            briefing_queue: handle.briefing_queue(),
            briefing_worker: handle.briefing_worker(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/queues", get(queue_stats))
        .route("/api/briefings/{id}/execute", post(execute_briefing))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct QueueStats {
    name: &'static str,
    size: usize,
    capacity: usize,
    can_accept: bool,
}

impl From<&JobQueue> for QueueStats {
    fn from(q: &JobQueue) -> Self {
        Self {
            name: q.name(),
            size: q.size(),
            capacity: q.capacity(),
            can_accept: q.can_accept(),
        }
    }
}

async fn queue_stats(State(state): State<AppState>) -> Json<Vec<QueueStats>> {
    Json(vec![
        QueueStats::from(state.fetch_queue.as_ref()),
        QueueStats::from(state.briefing_queue.as_ref()),
    ])
}

async fn execute_briefing(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.briefing_worker.execute_now(id).await {
        Ok(Some(report)) => (StatusCode::OK, Json(report)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "briefing not found" })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(target: "briefing", briefing_id = %id, error = %format!("{e:#}"), "on-demand execution failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "briefing execution failed" })),
            )
                .into_response()
        }
    }
}
