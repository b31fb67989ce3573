// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod config;
pub mod domain;
pub mod ingest;
pub mod logging;
pub mod metrics;
pub mod notify;
pub mod processor;
pub mod queue;
pub mod recovery;
pub mod runtime;
pub mod scheduler;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::config::OrchestratorConfig;
pub use crate::runtime::{Orchestrator, OrchestratorDeps, OrchestratorHandle};

use shuttle_axum::axum::Router;

use crate::api::AppState;
use crate::metrics::Metrics;

/// Start the background jobs and build the full HTTP surface (API + `/metrics`).
///
/// Takes the installed `Metrics` so the recorder exists before the first
/// scheduler cycle or worker records anything.
pub fn app(
    cfg: &OrchestratorConfig,
    deps: OrchestratorDeps,
    metrics: &Metrics,
) -> (Router, OrchestratorHandle) {
    let handle = Orchestrator::start(cfg, deps);
    let router = api::router(AppState::from_handle(&handle)).merge(metrics.router());
    (router, handle)
}
