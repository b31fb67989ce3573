// src/ingest/providers/mod.rs
pub mod reddit;
pub mod rss;

pub use reddit::RedditFetcher;
pub use rss::RssFetcher;
