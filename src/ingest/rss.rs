// src/ingest/rss.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::histogram;
use quick_xml::de::from_str;
use serde::Deserialize;
use std::time::Duration;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

use crate::ingest::normalize_title;
use crate::ingest::types::{FeedFetcher, Item};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<RawItem>,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    guid: Option<Guid>,
    // Vec: media feeds repeat these elements per item.
    #[serde(default)]
    enclosure: Vec<MediaRef>,
    // The deserializer keys elements by local name: `<media:content>` arrives
    // as `content`, and so does `<content:encoded>` (no `url`, skipped below).
    #[serde(rename = "content", default)]
    media_content: Vec<MediaRef>,
}

#[derive(Debug, Deserialize)]
struct Guid {
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct MediaRef {
    #[serde(rename = "@url")]
    url: Option<String>,
}

fn parse_date_to_millis(ts: &str) -> Option<i64> {
    let ts = ts.trim();
    OffsetDateTime::parse(ts, &Rfc2822)
        .or_else(|_| OffsetDateTime::parse(ts, &Rfc3339))
        .ok()
        .map(|dt| (dt.unix_timestamp_nanos() / 1_000_000) as i64)
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Parse an RSS 2.0 document. `fetched_at` (unix millis) stands in for a missing
/// or unparseable `pubDate`.
pub fn parse_feed(xml: &str, fetched_at: i64) -> Result<Vec<Item>> {
    let t0 = std::time::Instant::now();
    let xml_clean = scrub_html_entities_for_xml(xml);
    let rss: Rss = from_str(&xml_clean).context("parsing rss xml")?;

    let mut out = Vec::with_capacity(rss.channel.item.len());
    for it in rss.channel.item {
        let link = non_empty(it.link).unwrap_or_default();
        // An item with neither guid nor link keeps an empty guid; the store rejects it.
        let guid = non_empty(it.guid.map(|g| g.value)).unwrap_or_else(|| link.clone());
        let image = it
            .enclosure
            .into_iter()
            .chain(it.media_content)
            .find_map(|m| non_empty(m.url));

        out.push(Item {
            guid,
            title: normalize_title(it.title.as_deref().unwrap_or_default()),
            link,
            description: it.description.unwrap_or_default(),
            published_at: it
                .pub_date
                .as_deref()
                .and_then(parse_date_to_millis)
                .unwrap_or(fetched_at),
            image,
        });
    }

    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("ingest_parse_ms").record(ms);
    Ok(out)
}

/// Feed-mode content fetcher over plain HTTP.
pub struct RssFetcher {
    client: reqwest::Client,
}

impl RssFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("feed-digest/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()
            .context("building rss http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedFetcher for RssFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<Item>> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("rss http get {url}"))?
            .error_for_status()
            .with_context(|| format!("rss http status {url}"))?;
        let body = resp.text().await.context("rss http .text()")?;
        parse_feed(&body, chrono::Utc::now().timestamp_millis())
    }

    fn name(&self) -> &'static str {
        "rss"
    }
}

const CDATA_OPEN: &str = "<![CDATA[";
const CDATA_CLOSE: &str = "]]>";

// Entities that are legal in HTML but undefined in XML show up in real feeds.
// CDATA sections are copied untouched: they are never entity-decoded, so their
// text reaches the stored description exactly as published.
fn scrub_html_entities_for_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find(CDATA_OPEN) {
        out.push_str(&scrub_entities(&rest[..start]));
        let section = &rest[start..];
        match section.find(CDATA_CLOSE) {
            Some(end) => {
                let end = end + CDATA_CLOSE.len();
                out.push_str(&section[..end]);
                rest = &section[end..];
            }
            None => {
                out.push_str(section);
                rest = "";
            }
        }
    }
    out.push_str(&scrub_entities(rest));
    out
}

fn scrub_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}
