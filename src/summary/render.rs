// src/summary/render.rs
//! Page-render mode of the content fetcher: fully rendered markup for one URL.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

/// Affirmative labels of cookie/consent buttons, matched case-insensitively
/// against the whole trimmed button text.
pub const CONSENT_LABELS: &[&str] = &["Accept all", "Accept", "I understand", "Agree", "Okay", "OK"];

/// Navigation budget for one page load.
pub const PAGE_LOAD_TIMEOUT: Duration = Duration::from_secs(10);

pub fn is_consent_label(text: &str) -> bool {
    let t = text.trim();
    CONSENT_LABELS.iter().any(|l| l.eq_ignore_ascii_case(t))
}

/// Script injected into the page: clicks the first `button`/`a` whose text is a consent label.
pub fn consent_script() -> String {
    let alternation = CONSENT_LABELS.join("|");
    format!(
        r#"(function () {{
  var re = /^({alternation})$/i;
  function dismiss() {{
    var els = document.querySelectorAll('button, a');
    for (var i = 0; i < els.length; i++) {{
      if (re.test((els[i].textContent || '').trim())) {{ els[i].click(); return; }}
    }}
  }}
  if (document.readyState === 'loading') {{
    document.addEventListener('DOMContentLoaded', dismiss);
  }} else {{
    dismiss();
  }}
}})();"#
    )
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// `host:port` of an outbound HTTP proxy.
    pub proxy: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("network error: {0}")]
    Network(String),
    #[error("page load timed out")]
    Timeout,
    #[error("render api error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("invalid render endpoint: {0}")]
    Endpoint(String),
}

impl From<reqwest::Error> for RenderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RenderError::Timeout
        } else {
            RenderError::Network(err.to_string())
        }
    }
}

#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &str, opts: &RenderOptions) -> Result<String, RenderError>;
    fn name(&self) -> &'static str;
}

/// Headless Chrome behind a Browserless `/content` endpoint.
pub struct BrowserlessRenderer {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl BrowserlessRenderer {
    pub fn new(base_url: &str, token: Option<&str>) -> Result<Self, RenderError> {
        let client = reqwest::Client::builder()
            // navigation budget plus the service's own overhead
            .timeout(PAGE_LOAD_TIMEOUT + Duration::from_secs(10))
            .build()?;
        info!(base_url, "Using BrowserlessRenderer");
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
        })
    }

    fn endpoint(&self, opts: &RenderOptions) -> Result<reqwest::Url, RenderError> {
        let mut endpoint = reqwest::Url::parse(&format!("{}/content", self.base_url))
            .map_err(|e| RenderError::Endpoint(e.to_string()))?;
        {
            let mut q = endpoint.query_pairs_mut();
            if let Some(ref token) = self.token {
                q.append_pair("token", token);
            }
            if let Some(ref proxy) = opts.proxy {
                q.append_pair("--proxy-server", &format!("http={proxy}"));
            }
        }
        Ok(endpoint)
    }

    fn body(url: &str, opts: &RenderOptions) -> serde_json::Value {
        let timeout_ms = PAGE_LOAD_TIMEOUT.as_millis() as u64;
        let mut body = serde_json::json!({
            "url": url,
            "gotoOptions": { "waitUntil": "domcontentloaded", "timeout": timeout_ms },
            "waitForSelector": { "selector": "body", "timeout": timeout_ms },
            "addScriptTag": [ { "content": consent_script() } ],
        });
        if let Some(ref ua) = opts.user_agent {
            body["userAgent"] = serde_json::Value::String(ua.clone());
        }
        body
    }
}

#[async_trait]
impl PageRenderer for BrowserlessRenderer {
    async fn render(&self, url: &str, opts: &RenderOptions) -> Result<String, RenderError> {
        let endpoint = self.endpoint(opts)?;
        debug!(url, proxied = opts.proxy.is_some(), "rendering page");

        let resp = self
            .client
            .post(endpoint)
            .json(&Self::body(url, opts))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(RenderError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp.text().await?)
    }

    fn name(&self) -> &'static str {
        "browserless"
    }
}

// --- Test helper ---

/// Serves canned markup per URL; unknown URLs fail like an unreachable page.
pub struct FixtureRenderer {
    pages: HashMap<String, String>,
    pub calls: Mutex<Vec<(String, RenderOptions)>>,
}

impl FixtureRenderer {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            calls: Mutex::new(vec![]),
        }
    }

    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }
}

impl Default for FixtureRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageRenderer for FixtureRenderer {
    async fn render(&self, url: &str, opts: &RenderOptions) -> Result<String, RenderError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((url.to_string(), opts.clone()));
        }
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| RenderError::Network(format!("no fixture for {url}")))
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}
