//! Run exactly one polling cycle against the configured sources and database,
//! print the per-source report and exit. With `FEED_POLLING_DISABLED` set the
//! cycle fetches nothing and every source is reported as disabled.

use std::sync::Arc;

use anyhow::Context;
use feed_digest::config::sources::load_sources_default;
use feed_digest::config::AppConfig;
use feed_digest::ingest::rss::RssFetcher;
use feed_digest::{Scheduler, SchedulerCfg, SqliteStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    feed_digest::init_tracing();

    let cfg = AppConfig::from_env();
    let store = Arc::new(SqliteStore::open(&cfg.db_path).context("open item store")?);
    let sources = load_sources_default().context("load sources")?;

    let sched_cfg = SchedulerCfg {
        inter_source_delay: std::time::Duration::from_secs(1),
        ..SchedulerCfg::default()
    };
    let mut scheduler = Scheduler::new(sources, Arc::new(RssFetcher::new()?), store.clone(), sched_cfg)
        .with_app_config(&cfg);
    let report = scheduler.run_cycle().await;

    for r in &report.ingested {
        println!(
            "{:<60} fetched={:<4} kept={:<4} inserted={:<4} duplicates={:<4} failed={}",
            r.source, r.fetched, r.kept, r.inserted, r.duplicates, r.failed
        );
    }
    for (url, err) in &report.failed {
        println!("{url:<60} ERROR {err}");
    }
    println!(
        "poll-once done: polled={} inserted={} disabled={} rows={}",
        report.polled(),
        report.inserted(),
        report.disabled,
        store.count().await?
    );
    Ok(())
}
