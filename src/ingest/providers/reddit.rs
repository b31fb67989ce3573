// src/ingest/providers/reddit.rs
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::Deserialize;

use crate::domain::{Source, SourceType};
use crate::ingest::clean_text;
use crate::ingest::providers::rss::retain_since;
use crate::ingest::types::{FetchedItem, SourceFetcher, ValidationResult};

const REDDIT_BASE: &str = "https://www.reddit.com";
const LISTING_LIMIT: u32 = 50;

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Post,
}

#[derive(Debug, Deserialize)]
struct Post {
    id: String,
    title: String,
    #[serde(default)]
    permalink: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    created_utc: Option<f64>,
    #[serde(default)]
    selftext: Option<String>,
    #[serde(default)]
    selftext_html: Option<String>,
}

#[derive(Debug, Deserialize)]
struct About {
    data: AboutData,
}

#[derive(Debug, Deserialize)]
struct AboutData {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    public_description: Option<String>,
}

/// Accepts `rust`, `r/rust` or `/r/rust/`; returns the bare name when valid.
pub fn normalize_subreddit(locator: &str) -> Option<String> {
    static RE_NAME: OnceCell<Regex> = OnceCell::new();
    let re = RE_NAME.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_]{1,20}$").unwrap());

    let name = locator
        .trim()
        .trim_matches('/')
        .trim_start_matches("r/")
        .trim_matches('/');
    re.is_match(name).then(|| name.to_string())
}

/// Parse a `/new.json` listing into fetched items keyed by post id.
pub fn parse_listing(json: &str) -> Result<Vec<FetchedItem>> {
    let listing: Listing = serde_json::from_str(json).context("parsing reddit listing json")?;
    Ok(listing
        .data
        .children
        .into_iter()
        .map(|c| {
            let p = c.data;
            let raw = p.selftext_html.or(p.selftext.clone()).filter(|s| !s.is_empty());
            FetchedItem {
                natural_id: p.id,
                title: clean_text(&p.title),
                link: p.permalink.map(|l| format!("{REDDIT_BASE}{l}")),
                author: p.author,
                published_at: p
                    .created_utc
                    .and_then(|ts| DateTime::<Utc>::from_timestamp(ts as i64, 0)),
                clean_content: raw.as_deref().map(clean_text).filter(|s| !s.is_empty()),
                raw_content: raw,
            }
        })
        .collect())
}

pub struct RedditFetcher {
    client: reqwest::Client,
}

impl RedditFetcher {
    /// Reddit rejects requests without a descriptive user agent; set it on `client`.
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn get_json(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url}"))?;
        resp.text().await.context("reddit .text()")
    }
}

#[async_trait]
impl SourceFetcher for RedditFetcher {
    fn source_type(&self) -> SourceType {
        SourceType::Reddit
    }

    async fn validate(&self, locator: &str) -> Result<ValidationResult> {
        let Some(name) = normalize_subreddit(locator) else {
            return Ok(ValidationResult::invalid("invalid subreddit name"));
        };
        let url = format!("{REDDIT_BASE}/r/{name}/about.json");
        let body = match self.get_json(&url).await {
            Ok(b) => b,
            Err(e) => return Ok(ValidationResult::invalid(format!("{e:#}"))),
        };
        Ok(match serde_json::from_str::<About>(&body) {
            Ok(about) => ValidationResult::ok(about.data.title, about.data.public_description),
            Err(e) => ValidationResult::invalid(format!("unexpected about.json: {e}")),
        })
    }

    async fn fetch(&self, source: &Source, since: Option<DateTime<Utc>>) -> Result<Vec<FetchedItem>> {
        let name = normalize_subreddit(&source.url)
            .ok_or_else(|| anyhow!("invalid subreddit name: {}", source.url))?;
        let url = format!("{REDDIT_BASE}/r/{name}/new.json?limit={LISTING_LIMIT}");
        let body = self.get_json(&url).await?;
        Ok(retain_since(parse_listing(&body)?, since))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subreddit_names_are_normalized() {
        assert_eq!(normalize_subreddit("rust").as_deref(), Some("rust"));
        assert_eq!(normalize_subreddit("/r/rust/").as_deref(), Some("rust"));
        assert_eq!(normalize_subreddit("r/Rust_Gamedev").as_deref(), Some("Rust_Gamedev"));
        assert!(normalize_subreddit("r/").is_none());
        assert!(normalize_subreddit("no spaces").is_none());
    }

    #[test]
    fn listing_maps_posts_to_items() {
        let json = r#"{"data":{"children":[
            {"data":{"id":"abc","title":"Hello &amp; welcome","permalink":"/r/rust/comments/abc/hello/",
                     "author":"ferris","created_utc":1757149200.0,"selftext":"body text"}},
            {"data":{"id":"def","title":"Link post","selftext":""}}
        ]}}"#;
        let items = parse_listing(json).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].natural_id, "abc");
        assert_eq!(items[0].title, "Hello & welcome");
        assert_eq!(
            items[0].link.as_deref(),
            Some("https://www.reddit.com/r/rust/comments/abc/hello/")
        );
        assert_eq!(items[0].clean_content.as_deref(), Some("body text"));
        assert!(items[0].published_at.is_some());
        assert!(items[1].raw_content.is_none());
    }
}
