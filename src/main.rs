//! Briefing orchestrator: binary entrypoint.
//! Boots the background jobs and the Axum HTTP surface on Shuttle.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use shuttle_axum::ShuttleAxum;

use briefing_orchestrator::{
    config::OrchestratorConfig,
    ingest::{providers::RedditFetcher, providers::RssFetcher, FetcherRegistry},
    logging,
    metrics::Metrics,
    notify::{NoopMailer, ReportMailer, SmtpReportMailer},
    store::InMemoryStore,
    OrchestratorDeps,
};

fn build_mailer(cfg: &OrchestratorConfig) -> anyhow::Result<Arc<dyn ReportMailer>> {
    if !cfg.email.enabled {
        return Ok(Arc::new(NoopMailer));
    }
    Ok(Arc::new(SmtpReportMailer::from_config(&cfg.email)?))
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    logging::init_tracing();

    let cfg = OrchestratorConfig::load_default().context("loading orchestrator config")?;

    let client = reqwest::Client::builder()
        .user_agent(cfg.http.user_agent.clone())
        .timeout(Duration::from_secs(cfg.http.request_timeout_secs))
        .build()
        .context("building http client")?;
    let fetchers = FetcherRegistry::new()
        .with(Arc::new(RssFetcher::new(client.clone())))
        .with(Arc::new(RedditFetcher::new(client)));

    let store = Arc::new(InMemoryStore::new());
    let deps = OrchestratorDeps {
        sources: store.clone(),
        briefings: store.clone(),
        items: store.clone(),
        reports: store.clone(),
        credits: store,
        fetchers,
        mailer: build_mailer(&cfg)?,
    };

    let metrics = Metrics::init()?;
    let (router, handle) = briefing_orchestrator::app(&cfg, deps, &metrics);

    // The handle owns the pools; dropping it would abort the workers.
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "ctrl-c listener failed");
            return;
        }
        let report = handle.shutdown().await;
        tracing::info!(?report, "background jobs stopped");
    });

    Ok(router.into())
}
