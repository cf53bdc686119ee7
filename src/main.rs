//! Feed digest service: binary entrypoint.
//! Starts the polling scheduler and the proxy refresh ticker, then serves the
//! listing/summary HTTP surface plus `/metrics`.

use std::sync::Arc;

use anyhow::Context;
use shuttle_axum::ShuttleAxum;
use tokio_util::sync::CancellationToken;
use tracing::info;

use feed_digest::config::sources::load_sources_default;
use feed_digest::config::summary::SummaryConfig;
use feed_digest::config::AppConfig;
use feed_digest::ingest::rss::RssFetcher;
use feed_digest::metrics::Metrics;
use feed_digest::summary::completion::OpenAiCompletion;
use feed_digest::summary::proxy::{ProxyContext, StaticProxyList};
use feed_digest::summary::render::BrowserlessRenderer;
use feed_digest::{create_router, AppState, QueryService, Scheduler, SchedulerCfg, SqliteStore, Summarizer};

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    feed_digest::init_tracing();

    let cfg = AppConfig::from_env();
    let summary_cfg = SummaryConfig::load_default().context("load summary config")?;

    let store = Arc::new(SqliteStore::open(&cfg.db_path).context("open item store")?);

    let cancel = CancellationToken::new();

    // --- Scheduler ---
    let sources = load_sources_default().context("load sources")?;
    let fetcher = Arc::new(RssFetcher::new()?);
    let scheduler = Scheduler::new(sources, fetcher, store.clone(), SchedulerCfg::default())
        .with_app_config(&cfg);
    scheduler.spawn(cancel.child_token());

    // --- Summaries ---
    let proxy = Arc::new(ProxyContext::new(
        Arc::new(StaticProxyList(cfg.proxies.clone())),
        cfg.user_agent.clone(),
    ));
    proxy.clone().spawn_refresh(cancel.child_token());

    let renderer = BrowserlessRenderer::new(&cfg.browserless_url, cfg.browserless_token.as_deref())
        .context("build page renderer")?;
    let completion = OpenAiCompletion::new(summary_cfg.api_key.clone())
        .context("build completion client")?;
    let metrics = Metrics::init(summary_cfg.cache_capacity)?;
    let summarizer = Summarizer::new(summary_cfg, Arc::new(renderer), Arc::new(completion))
        .with_proxy(proxy);

    let state = AppState {
        query: Arc::new(QueryService::new(store, Arc::new(summarizer))),
        list_limit: cfg.list_limit,
    };
    let router = create_router(state).merge(metrics.router());

    info!(db = %cfg.db_path.display(), "feed digest ready");
    Ok(router.into())
}
