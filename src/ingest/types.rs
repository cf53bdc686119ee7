// src/ingest/types.rs
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct Item {
    pub guid: String, // feed guid, falls back to link
    pub title: String,
    pub link: String,
    pub description: String,
    pub published_at: i64, // unix millis
    pub image: Option<String>,
}

#[async_trait::async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Fetch and parse the feed at `url` into items, in document order.
    async fn fetch(&self, url: &str) -> Result<Vec<Item>>;
    fn name(&self) -> &'static str;
}

// --- Test helper ---

/// Serves canned items per URL and records every URL it was asked for.
/// URLs without an entry fail like an unreachable feed.
pub struct StaticFetcher {
    feeds: HashMap<String, std::result::Result<Vec<Item>, String>>,
    pub calls: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self {
            feeds: HashMap::new(),
            calls: Mutex::new(vec![]),
        }
    }

    pub fn with_items(mut self, url: &str, items: Vec<Item>) -> Self {
        self.feeds.insert(url.to_string(), Ok(items));
        self
    }

    pub fn with_error(mut self, url: &str, msg: &str) -> Self {
        self.feeds.insert(url.to_string(), Err(msg.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl Default for StaticFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl FeedFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<Item>> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(url.to_string());
        }
        match self.feeds.get(url) {
            Some(Ok(items)) => Ok(items.clone()),
            Some(Err(msg)) => Err(anyhow!("{msg}")),
            None => Err(anyhow!("no such feed: {url}")),
        }
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
