// src/summary/proxy.rs
//! Outbound proxy + user-agent context for page rendering.
//!
//! The proxy list is refreshed on a fixed 24h ticker, independent of how many
//! pages are rendered. The render path only reads it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use rand::Rng;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::summary::render::RenderOptions;

pub const PROXY_REFRESH_INTERVAL: Duration = Duration::from_secs(24 * 3600);

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// Opaque source of proxy addresses.
#[async_trait]
pub trait ProxyProvider: Send + Sync {
    async fn proxies(&self) -> Result<Vec<String>>;
}

/// Fixed list (possibly empty, meaning "no proxy").
#[derive(Debug, Clone, Default)]
pub struct StaticProxyList(pub Vec<String>);

#[async_trait]
impl ProxyProvider for StaticProxyList {
    async fn proxies(&self) -> Result<Vec<String>> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Default)]
struct ProxyState {
    proxies: Vec<String>,
    refreshed_at: Option<Instant>,
}

pub struct ProxyContext {
    provider: Arc<dyn ProxyProvider>,
    user_agent: String,
    state: RwLock<ProxyState>,
}

impl ProxyContext {
    pub fn new(provider: Arc<dyn ProxyProvider>, user_agent: Option<String>) -> Self {
        Self {
            provider,
            user_agent: user_agent.unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            state: RwLock::new(ProxyState::default()),
        }
    }

    /// No proxy, default user agent.
    pub fn direct() -> Self {
        Self::new(Arc::new(StaticProxyList::default()), None)
    }

    /// Re-read the provider. On failure the previous list stays in place.
    pub async fn refresh(&self) -> Result<usize> {
        let fresh = self.provider.proxies().await?;
        let n = fresh.len();
        let mut st = self.state.write().await;
        st.proxies = fresh;
        st.refreshed_at = Some(Instant::now());
        Ok(n)
    }

    /// A random proxy from the current list; fills the list on first use.
    pub async fn pick(&self) -> Option<String> {
        let never_refreshed = self.state.read().await.refreshed_at.is_none();
        if never_refreshed {
            if let Err(e) = self.refresh().await {
                warn!(error = ?e, "proxy list refresh failed");
            }
        }
        let st = self.state.read().await;
        if st.proxies.is_empty() {
            return None;
        }
        let idx = rand::rng().random_range(0..st.proxies.len());
        Some(st.proxies[idx].clone())
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub async fn render_options(&self) -> RenderOptions {
        RenderOptions {
            proxy: self.pick().await,
            user_agent: Some(self.user_agent.clone()),
        }
    }

    /// Refresh every `PROXY_REFRESH_INTERVAL` until cancelled.
    pub fn spawn_refresh(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(PROXY_REFRESH_INTERVAL);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        match self.refresh().await {
                            Ok(n) => info!(proxies = n, "proxy list refreshed"),
                            Err(e) => warn!(error = ?e, "proxy list refresh failed"),
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_list_means_direct_connection() {
        let ctx = ProxyContext::direct();
        assert_eq!(ctx.pick().await, None);
        let opts = ctx.render_options().await;
        assert_eq!(opts.user_agent.as_deref(), Some(DEFAULT_USER_AGENT));
    }

    #[tokio::test]
    async fn pick_draws_from_provider_list() {
        let list = vec!["10.0.0.1:80".to_string(), "10.0.0.2:80".to_string()];
        let ctx = ProxyContext::new(
            Arc::new(StaticProxyList(list.clone())),
            Some("UA".into()),
        );
        for _ in 0..10 {
            let p = ctx.pick().await.unwrap();
            assert!(list.contains(&p));
        }
        assert_eq!(ctx.user_agent(), "UA");
    }

    struct Failing;

    #[async_trait]
    impl ProxyProvider for Failing {
        async fn proxies(&self) -> Result<Vec<String>> {
            anyhow::bail!("list host down")
        }
    }

    #[tokio::test]
    async fn failed_refresh_is_not_fatal() {
        let ctx = ProxyContext::new(Arc::new(Failing), None);
        assert!(ctx.refresh().await.is_err());
        assert_eq!(ctx.pick().await, None);
    }
}
