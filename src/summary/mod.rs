// src/summary/mod.rs
//! Article summaries: render → extract → token gate → completion → cache.

pub mod cache;
pub mod completion;
pub mod extract;
pub mod proxy;
pub mod render;
pub mod tokens;

use std::sync::Arc;

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::summary::SummaryConfig;
use cache::SummaryCache;
use completion::{parse_bullets, CompletionClient, CompletionError};
use proxy::ProxyContext;
use render::{PageRenderer, RenderError};
use tokens::{choose_model, ModelChoice, TokenCounter};

/// Single bullet returned instead of calling the backend for oversized articles.
pub const TOO_LONG_MESSAGE: &str = "Article too long to summarize";

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("summary_cache_hits_total", "Summaries served from cache.");
        describe_counter!(
            "summary_cache_misses_total",
            "Summary requests that ran the pipeline."
        );
        describe_counter!(
            "summary_cache_evictions_total",
            "Entries evicted from the summary cache."
        );
        describe_counter!(
            "summary_too_long_total",
            "Articles over the token budget."
        );
        describe_counter!(
            "summary_completion_errors_total",
            "Failed completion backend calls."
        );
    });
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SummarySource {
    Cache,
    Completion { model: String, tokens: usize },
    TooLong { tokens: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub url: String,
    pub bullets: Vec<String>,
    pub source: SummarySource,
}

#[derive(Debug, thiserror::Error)]
pub enum SummaryError {
    #[error("page render failed: {0}")]
    Render(#[from] RenderError),
    #[error("no readable text on page")]
    NoText,
    #[error("completion failed: {0}")]
    Completion(#[from] CompletionError),
}

pub struct Summarizer {
    cfg: SummaryConfig,
    cache: Arc<SummaryCache>,
    renderer: Arc<dyn PageRenderer>,
    completion: Arc<dyn CompletionClient>,
    tokens: Arc<dyn TokenCounter>,
    proxy: Arc<ProxyContext>,
}

impl Summarizer {
    pub fn new(
        cfg: SummaryConfig,
        renderer: Arc<dyn PageRenderer>,
        completion: Arc<dyn CompletionClient>,
    ) -> Self {
        let cache = Arc::new(SummaryCache::with_capacity(cfg.cache_capacity));
        Self {
            cfg,
            cache,
            renderer,
            completion,
            tokens: tokens::default_counter(),
            proxy: Arc::new(ProxyContext::direct()),
        }
    }

    pub fn with_token_counter(mut self, tokens: Arc<dyn TokenCounter>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn with_proxy(mut self, proxy: Arc<ProxyContext>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_cache(mut self, cache: Arc<SummaryCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &Arc<SummaryCache> {
        &self.cache
    }

    /// Summary for `url`, from cache when present.
    ///
    /// Only successful completions are cached. Oversized articles get the
    /// single `TOO_LONG_MESSAGE` bullet without a backend call.
    pub async fn summarize(&self, url: &str) -> Result<Summary, SummaryError> {
        ensure_metrics_described();

        if let Some(bullets) = self.cache.get(url) {
            debug!(target: "summary", url, "cache hit");
            counter!("summary_cache_hits_total").increment(1);
            return Ok(Summary {
                url: url.to_string(),
                bullets,
                source: SummarySource::Cache,
            });
        }
        debug!(target: "summary", url, "cache miss");
        counter!("summary_cache_misses_total").increment(1);

        let opts = self.proxy.render_options().await;
        let html = self.renderer.render(url, &opts).await.map_err(|e| {
            warn!(target: "summary", url, renderer = self.renderer.name(), error = %e, "render failed");
            e
        })?;

        let text = extract::readable_text(&html, url);
        if text.is_empty() {
            return Err(SummaryError::NoText);
        }

        let tokens = self.tokens.count(&text);
        let model = match choose_model(tokens, &self.cfg) {
            ModelChoice::TooLong => {
                info!(target: "summary", url, tokens, budget = self.cfg.token_budget, "article too long");
                counter!("summary_too_long_total").increment(1);
                return Ok(Summary {
                    url: url.to_string(),
                    bullets: vec![TOO_LONG_MESSAGE.to_string()],
                    source: SummarySource::TooLong { tokens },
                });
            }
            ModelChoice::Model(m) => m,
        };

        let prompt = format!("{}{}", self.cfg.prompt, text);
        let body = self
            .completion
            .complete(&model, &prompt)
            .await
            .map_err(|e| {
                warn!(target: "summary", url, model = %model, error = %e, "completion failed");
                counter!("summary_completion_errors_total").increment(1);
                e
            })?;

        let bullets = parse_bullets(&body);
        if bullets.is_empty() {
            counter!("summary_completion_errors_total").increment(1);
            return Err(CompletionError::EmptyResponse.into());
        }

        if let Some(evicted) = self.cache.put(url, bullets.clone()) {
            debug!(target: "summary", evicted = %evicted, "cache eviction");
        }
        info!(target: "summary", url, model = %model, tokens, bullets = bullets.len(), "summarized");

        Ok(Summary {
            url: url.to_string(),
            bullets,
            source: SummarySource::Completion { model, tokens },
        })
    }
}
