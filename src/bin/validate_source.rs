//! Check a source locator the same way the service would before saving it.
//!
//! Usage: validate_source <rss|reddit> <url-or-subreddit>

use std::sync::Arc;
use std::time::Duration;

use briefing_orchestrator::config::OrchestratorConfig;
use briefing_orchestrator::domain::SourceType;
use briefing_orchestrator::ingest::providers::{RedditFetcher, RssFetcher};
use briefing_orchestrator::ingest::FetcherRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let mut args = std::env::args().skip(1);
    let (Some(kind), Some(locator)) = (args.next(), args.next()) else {
        eprintln!("usage: validate_source <rss|reddit> <url-or-subreddit>");
        std::process::exit(2);
    };
    let kind: SourceType = kind.parse().map_err(anyhow::Error::msg)?;

    let http = OrchestratorConfig::default().http;
    let client = reqwest::Client::builder()
        .user_agent(http.user_agent)
        .timeout(Duration::from_secs(http.request_timeout_secs))
        .build()?;
    let registry = FetcherRegistry::new()
        .with(Arc::new(RssFetcher::new(client.clone())))
        .with(Arc::new(RedditFetcher::new(client)));

    let result = registry.resolve(kind)?.validate(&locator).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    if !result.valid {
        std::process::exit(1);
    }
    Ok(())
}
