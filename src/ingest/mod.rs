// src/ingest/mod.rs
pub mod filter;
pub mod rss;
pub mod types;

use crate::config::sources::SourceSpec;
use crate::ingest::types::{FeedFetcher, Item};
use crate::store::ItemStore;
use anyhow::Result;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_items_fetched_total", "Items parsed from feeds.");
        describe_counter!(
            "ingest_items_filtered_total",
            "Items dropped by a source filter."
        );
        describe_counter!(
            "ingest_items_inserted_total",
            "Items that were new to the store."
        );
        describe_counter!(
            "ingest_insert_errors_total",
            "Individual item inserts that failed."
        );
        describe_counter!(
            "ingest_source_errors_total",
            "Source fetch/parse failures."
        );
        describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
        describe_histogram!(
            "ingest_cycle_duration_ms",
            "Wall time of one scheduler cycle in milliseconds."
        );
        describe_gauge!(
            "ingest_last_cycle_ts",
            "Unix ts when the scheduler last finished a cycle."
        );
    });
}

/// Normalize a feed title: decode entities, strip tags, collapse whitespace.
pub fn normalize_title(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out.trim().to_string()
}

/// Outcome of one source's fetch-and-ingest step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub source: String,
    pub fetched: usize,
    pub kept: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub failed: usize,
}

/// Apply the source's filter then its normalizers, in that order.
pub fn select_items(source: &SourceSpec, items: Vec<Item>, fetched_at: i64) -> Vec<Item> {
    items
        .into_iter()
        .filter(|it| source.filter.as_ref().map_or(true, |f| f.keep(it)))
        .map(|it| {
            source
                .normalize
                .iter()
                .fold(it, |acc, n| n.apply(acc, fetched_at))
        })
        .collect()
}

/// Fetch one source and insert its surviving items.
///
/// A fetch/parse failure is returned to the caller. A failing insert only
/// skips that item.
pub async fn ingest_source(
    fetcher: &dyn FeedFetcher,
    store: &dyn ItemStore,
    source: &SourceSpec,
    fetched_at: i64,
) -> Result<IngestReport> {
    ensure_metrics_described();

    let raw = fetcher.fetch(&source.url).await?;
    let fetched = raw.len();
    let kept = select_items(source, raw, fetched_at);

    let mut report = IngestReport {
        source: source.url.clone(),
        fetched,
        kept: kept.len(),
        ..Default::default()
    };

    for item in &kept {
        match store.insert_if_absent(item).await {
            Ok(true) => report.inserted += 1,
            Ok(false) => report.duplicates += 1,
            Err(e) => {
                report.failed += 1;
                tracing::warn!(
                    target: "ingest",
                    error = %e,
                    source = %source.url,
                    guid = %item.guid,
                    "item insert failed"
                );
            }
        }
    }

    counter!("ingest_items_fetched_total").increment(fetched as u64);
    counter!("ingest_items_filtered_total").increment((fetched - report.kept) as u64);
    counter!("ingest_items_inserted_total").increment(report.inserted as u64);
    counter!("ingest_insert_errors_total").increment(report.failed as u64);

    Ok(report)
}
