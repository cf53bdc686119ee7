// src/summary/completion.rs
//! Completion backend: provider abstraction, OpenAI chat adapter, bullet parsing.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("completion backend has no api key configured")]
    MissingApiKey,
    #[error("network error: {0}")]
    Network(String),
    #[error("api error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("completion response had no content")]
    EmptyResponse,
}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        CompletionError::Network(err.to_string())
    }
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Single user-message completion; returns the raw response text.
    async fn complete(&self, model: &str, prompt: &str) -> Result<String, CompletionError>;
    fn name(&self) -> &'static str;
}

/// OpenAI provider (uses Chat Completions API).
pub struct OpenAiCompletion {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl OpenAiCompletion {
    pub fn new(api_key: impl Into<String>) -> Result<Self, CompletionError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("feed-digest/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            endpoint: "https://api.openai.com/v1/chat/completions".into(),
        })
    }

    /// Point at an OpenAI-compatible endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompletion {
    async fn complete(&self, model: &str, prompt: &str) -> Result<String, CompletionError> {
        if self.api_key.is_empty() {
            return Err(CompletionError::MissingApiKey);
        }

        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: Option<String>,
        }

        let req = Req {
            model,
            messages: vec![Msg {
                role: "user",
                content: prompt,
            }],
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(CompletionError::Api {
                status: status.as_u16(),
                message,
            });
        }
        let body: Resp = resp.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(CompletionError::EmptyResponse)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

fn strip_bullet_marker(line: &str) -> Option<&str> {
    if matches!(line, "-" | "*" | "•" | "–") {
        return Some("");
    }
    for marker in ["- ", "* ", "• ", "– "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return Some(rest);
        }
    }
    // "1. " / "12) "
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(r) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return Some(r);
        }
    }
    None
}

/// Split a bullet-list response into trimmed, non-empty bullets. Lines without
/// a marker continue the previous bullet.
pub fn parse_bullets(body: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for line in body.lines() {
        let t = line.trim();
        if t.is_empty() {
            continue;
        }
        match strip_bullet_marker(t) {
            Some(rest) => {
                let rest = rest.trim();
                if !rest.is_empty() {
                    out.push(rest.to_string());
                }
            }
            None => match out.last_mut() {
                Some(last) => {
                    last.push(' ');
                    last.push_str(t);
                }
                None => out.push(t.to_string()),
            },
        }
    }
    out
}

// --- Test helper ---

/// Replays a fixed response (or error message) and records (model, prompt) per call.
pub struct ScriptedCompletion {
    response: Result<String, String>,
    pub calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedCompletion {
    pub fn replying(body: &str) -> Self {
        Self {
            response: Ok(body.to_string()),
            calls: Mutex::new(vec![]),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
            calls: Mutex::new(vec![]),
        }
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletion {
    async fn complete(&self, model: &str, prompt: &str) -> Result<String, CompletionError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((model.to_string(), prompt.to_string()));
        }
        self.response.clone().map_err(|message| CompletionError::Api {
            status: 500,
            message,
        })
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
