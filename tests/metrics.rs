// tests/metrics.rs
use std::sync::Arc;

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use feed_digest::config::sources::SourceSpec;
use feed_digest::config::summary::SummaryConfig;
use feed_digest::ingest::types::{Item, StaticFetcher};
use feed_digest::metrics::Metrics;
use feed_digest::summary::completion::ScriptedCompletion;
use feed_digest::summary::render::FixtureRenderer;
use feed_digest::{Scheduler, SchedulerCfg, SqliteStore, Summarizer};
use tower::ServiceExt;

// Single test per binary: the recorder is process-global.
#[tokio::test]
async fn metrics_endpoint_exposes_ingest_and_summary_series() {
    let metrics = Metrics::init(7).expect("install recorder");

    let fetcher = Arc::new(StaticFetcher::new().with_items(
        "https://a.example/rss",
        vec![Item {
            guid: "g".into(),
            title: "t".into(),
            link: "https://a.example/1".into(),
            description: String::new(),
            published_at: 0,
            image: None,
        }],
    ));
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let mut sched = Scheduler::new(
        vec![SourceSpec::new("https://a.example/rss")],
        fetcher,
        store,
        SchedulerCfg::immediate(),
    );
    sched.run_cycle().await;

    let summarizer = Summarizer::new(
        SummaryConfig::default(),
        Arc::new(FixtureRenderer::new().with_page("https://a.example/1", "<article><p>x</p></article>")),
        Arc::new(ScriptedCompletion::replying("- y")),
    );
    summarizer.summarize("https://a.example/1").await.unwrap();
    summarizer.summarize("https://a.example/1").await.unwrap();

    let resp = metrics
        .router()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap(); // 1 MiB
    let text = String::from_utf8(body.to_vec()).unwrap();

    for series in [
        "ingest_items_fetched_total",
        "ingest_items_inserted_total",
        "ingest_cycle_duration_ms",
        "summary_cache_hits_total",
        "summary_cache_misses_total",
        "summary_cache_capacity",
    ] {
        assert!(text.contains(series), "missing {series} in:\n{text}");
    }
}
