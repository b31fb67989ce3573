// src/ingest/providers/rss.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::histogram;
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use crate::domain::{Source, SourceType};
use crate::ingest::types::{FetchedItem, SourceFetcher, ValidationResult};
use crate::ingest::{clean_text, hashed_natural_id};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    title: Option<String>,
    description: Option<String>,
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    guid: Option<Guid>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    author: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Guid {
    #[serde(rename = "$text", default)]
    value: String,
}

/// Channel metadata plus entries of one RSS document.
#[derive(Debug, Clone)]
pub struct ParsedFeed {
    pub title: Option<String>,
    pub description: Option<String>,
    pub items: Vec<FetchedItem>,
}

/// RFC 2822 first (RSS 2.0), then RFC 3339 as some feeds emit ISO dates.
pub fn parse_feed_date(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    if let Ok(dt) = OffsetDateTime::parse(ts, &Rfc2822) {
        return DateTime::<Utc>::from_timestamp(dt.unix_timestamp(), 0);
    }
    DateTime::parse_from_rfc3339(ts)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Parse an RSS 2.0 document. Entries without any title or link are skipped.
pub fn parse_feed(xml: &str) -> Result<ParsedFeed> {
    let t0 = std::time::Instant::now();
    let rss: Rss = from_str(xml).context("parsing rss xml")?;

    let mut items = Vec::with_capacity(rss.channel.item.len());
    for it in rss.channel.item {
        let title = non_empty(it.title);
        let link = non_empty(it.link);
        if title.is_none() && link.is_none() {
            continue;
        }
        let title = title.map(|t| clean_text(&t)).unwrap_or_default();
        let published_at = it.pub_date.as_deref().and_then(parse_feed_date);

        let natural_id = non_empty(it.guid.map(|g| g.value))
            .or_else(|| link.clone())
            .unwrap_or_else(|| hashed_natural_id(&[&title, it.pub_date.as_deref().unwrap_or("")]));

        let raw_content = non_empty(it.description);
        let clean_content = raw_content.as_deref().map(clean_text).filter(|c| !c.is_empty());

        items.push(FetchedItem {
            natural_id,
            title,
            link,
            author: non_empty(it.author),
            published_at,
            raw_content,
            clean_content,
        });
    }

    histogram!("fetch_parse_ms", "type" => "rss").record(t0.elapsed().as_secs_f64() * 1_000.0);

    Ok(ParsedFeed {
        title: non_empty(rss.channel.title),
        description: non_empty(rss.channel.description),
        items,
    })
}

/// Keep entries without a date and entries published at or after `since`.
pub fn retain_since(items: Vec<FetchedItem>, since: Option<DateTime<Utc>>) -> Vec<FetchedItem> {
    match since {
        None => items,
        Some(since) => items
            .into_iter()
            .filter(|it| it.published_at.map_or(true, |p| p >= since))
            .collect(),
    }
}

pub struct RssFetcher {
    client: reqwest::Client,
}

impl RssFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn download(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url}"))?;
        resp.text().await.context("rss .text()")
    }
}

#[async_trait]
impl SourceFetcher for RssFetcher {
    fn source_type(&self) -> SourceType {
        SourceType::Rss
    }

    async fn validate(&self, locator: &str) -> Result<ValidationResult> {
        match reqwest::Url::parse(locator) {
            Ok(u) if matches!(u.scheme(), "http" | "https") => {}
            _ => return Ok(ValidationResult::invalid("feed url must be http(s)")),
        }
        let body = match self.download(locator).await {
            Ok(b) => b,
            Err(e) => return Ok(ValidationResult::invalid(format!("{e:#}"))),
        };
        Ok(match parse_feed(&body) {
            Ok(feed) => ValidationResult::ok(feed.title, feed.description),
            Err(e) => ValidationResult::invalid(format!("{e:#}")),
        })
    }

    async fn fetch(&self, source: &Source, since: Option<DateTime<Utc>>) -> Result<Vec<FetchedItem>> {
        let body = self.download(&source.url).await?;
        let feed = parse_feed(&body)?;
        Ok(retain_since(feed.items, since))
    }
}
