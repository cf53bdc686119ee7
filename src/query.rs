// src/query.rs
//! Read side: recent-items listing with presentation fields, summaries by GUID.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Timelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::ingest::types::Item;
use crate::store::{ItemStore, StoreError};
use crate::summary::{Summarizer, Summary, SummaryError};

/// Shown for items with neither an image nor an `src="..."` in their description
/// (in practice the Hacker News feed).
pub const PLACEHOLDER_IMAGE: &str =
    "https://uxwing.com/wp-content/themes/uxwing/download/brands-and-social-media/hacker-news-icon.png";

static IMG_SRC: Lazy<Regex> = Lazy::new(|| Regex::new(r#"src="(.*?)""#).expect("src regex"));
static COMMENTS_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"Comments URL: <a href="(.*?)">"#).expect("comments regex"));

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("no item with guid {0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Summary(#[from] SummaryError),
}

/// One listing row: the stored item plus derived display fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListedItem {
    pub guid: String,
    pub title: String,
    pub link: String,
    pub description: String,
    pub published_at: i64,
    /// `d/m/yyyy`
    pub date: String,
    /// `H:MM`
    pub time: String,
    pub ago: String,
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

/// "N seconds/minutes/hours/days ago", rounded to the nearest unit.
pub fn time_ago(elapsed_secs: f64) -> String {
    let d = elapsed_secs.max(0.0);
    if d < 60.0 {
        format!("{} seconds ago", d.round())
    } else if d < 3600.0 {
        format!("{} minutes ago", (d / 60.0).round())
    } else if d < 86_400.0 {
        format!("{} hours ago", (d / 3600.0).round())
    } else {
        format!("{} days ago", (d / 86_400.0).round())
    }
}

/// Display image and, when the placeholder is used, the discussion link.
pub fn derive_image(image: Option<&str>, description: &str) -> (String, Option<String>) {
    if let Some(img) = image.filter(|s| !s.is_empty()) {
        return (img.to_string(), None);
    }
    if let Some(src) = IMG_SRC.captures(description).and_then(|c| c.get(1)) {
        return (src.as_str().to_string(), None);
    }
    (PLACEHOLDER_IMAGE.to_string(), extract_comments(description))
}

pub fn extract_comments(description: &str) -> Option<String> {
    COMMENTS_URL
        .captures(description)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn list_item(item: Item, now: DateTime<Utc>) -> ListedItem {
    let (date, time, ago) = match DateTime::<Utc>::from_timestamp_millis(item.published_at) {
        Some(at) => (
            format!("{}/{}/{}", at.day(), at.month(), at.year()),
            format!("{}:{:02}", at.hour(), at.minute()),
            time_ago((now - at).num_milliseconds() as f64 / 1000.0),
        ),
        None => (String::new(), String::new(), String::new()),
    };
    let (image, comments) = derive_image(item.image.as_deref(), &item.description);
    ListedItem {
        guid: item.guid,
        title: item.title,
        link: item.link,
        description: item.description,
        published_at: item.published_at,
        date,
        time,
        ago,
        image,
        comments,
    }
}

pub struct QueryService {
    store: Arc<dyn ItemStore>,
    summarizer: Arc<Summarizer>,
}

impl QueryService {
    pub fn new(store: Arc<dyn ItemStore>, summarizer: Arc<Summarizer>) -> Self {
        Self { store, summarizer }
    }

    pub async fn list_recent(
        &self,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<ListedItem>, QueryError> {
        let items = self.store.query_recent(limit).await?;
        Ok(items.into_iter().map(|it| list_item(it, now)).collect())
    }

    /// Summary of the article behind `guid`. Unknown GUIDs never reach the pipeline.
    pub async fn get_summary(&self, guid: &str) -> Result<Summary, QueryError> {
        let item = self
            .store
            .get_by_guid(guid)
            .await?
            .ok_or_else(|| QueryError::NotFound(guid.to_string()))?;
        debug!(target: "summary", guid, link = %item.link, "summary requested");
        Ok(self.summarizer.summarize(&item.link).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn ago_buckets_round_to_nearest_unit() {
        assert_eq!(time_ago(0.0), "0 seconds ago");
        assert_eq!(time_ago(59.4), "59 seconds ago");
        assert_eq!(time_ago(60.0), "1 minutes ago");
        assert_eq!(time_ago(90.0), "2 minutes ago");
        assert_eq!(time_ago(3599.0), "60 minutes ago");
        assert_eq!(time_ago(3600.0 * 2.4), "2 hours ago");
        assert_eq!(time_ago(86_400.0 * 3.6), "4 days ago");
    }

    #[test]
    fn future_timestamps_read_as_zero_seconds() {
        assert_eq!(time_ago(-30.0), "0 seconds ago");
    }

    #[test]
    fn image_prefers_item_then_description_then_placeholder() {
        assert_eq!(
            derive_image(Some("https://img/x.png"), r#"<img src="https://img/y.png">"#),
            ("https://img/x.png".into(), None)
        );
        assert_eq!(
            derive_image(None, r#"<p><img src="https://img/y.png" alt=""></p>"#),
            ("https://img/y.png".into(), None)
        );
        let hn = r#"<p>Article URL: <a href="https://a.example">x</a></p>
<p>Comments URL: <a href="https://news.ycombinator.com/item?id=1">y</a></p>
<p>Points: 120</p>"#;
        assert_eq!(
            derive_image(None, hn),
            (
                PLACEHOLDER_IMAGE.into(),
                Some("https://news.ycombinator.com/item?id=1".into())
            )
        );
    }

    #[test]
    fn empty_description_is_tolerated() {
        assert_eq!(derive_image(None, ""), (PLACEHOLDER_IMAGE.into(), None));
    }

    #[test]
    fn listing_fields_use_utc_day_month_year() {
        let at = Utc.with_ymd_and_hms(2023, 7, 17, 9, 5, 0).unwrap();
        let now = at + chrono::Duration::hours(2);
        let item = Item {
            guid: "g".into(),
            title: "t".into(),
            link: "https://x".into(),
            description: String::new(),
            published_at: at.timestamp_millis(),
            image: None,
        };
        let row = list_item(item, now);
        assert_eq!(row.date, "17/7/2023");
        assert_eq!(row.time, "9:05");
        assert_eq!(row.ago, "2 hours ago");
    }
}
