// src/config/summary.rs
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

pub const DEFAULT_SUMMARY_CONFIG_PATH: &str = "config/summary.json";
pub const ENV_SUMMARY_CONFIG_PATH: &str = "SUMMARY_CONFIG_PATH";

fn default_small_model() -> String {
    "gpt-3.5-turbo".into()
}
fn default_large_model() -> String {
    "gpt-3.5-turbo-16k".into()
}
fn default_token_budget() -> usize {
    16_000
}
fn default_large_threshold() -> usize {
    4_000
}
fn default_cache_capacity() -> usize {
    100
}
fn default_prompt() -> String {
    "Summarize the article below in bullet-point TLDR form, in the same language as the article is written in.\n\n".into()
}
fn default_api_key() -> String {
    "ENV".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    /// "ENV" means: read from OPENAI_API_KEY
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_small_model")]
    pub small_model: String,
    #[serde(default = "default_large_model")]
    pub large_model: String,
    /// Texts above this many tokens are not sent to the backend.
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,
    /// Texts above this many tokens use `large_model`.
    #[serde(default = "default_large_threshold")]
    pub large_model_threshold: usize,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    #[serde(default = "default_prompt")]
    pub prompt: String,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            api_key: default_api_key(),
            small_model: default_small_model(),
            large_model: default_large_model(),
            token_budget: default_token_budget(),
            large_model_threshold: default_large_threshold(),
            cache_capacity: default_cache_capacity(),
            prompt: default_prompt(),
        }
    }
}

impl SummaryConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading summary config {}", path.display()))?;
        let cfg: SummaryConfig =
            serde_json::from_str(&data).context("parsing summary config json")?;
        Ok(cfg.sanitized())
    }

    /// `$SUMMARY_CONFIG_PATH` or `config/summary.json`; defaults when the file is absent.
    pub fn load_default() -> anyhow::Result<Self> {
        let path = env::var(ENV_SUMMARY_CONFIG_PATH)
            .unwrap_or_else(|_| DEFAULT_SUMMARY_CONFIG_PATH.to_string());
        if Path::new(&path).exists() {
            Self::load_from_file(&path)
        } else {
            Ok(Self::default().sanitized())
        }
    }

    fn sanitized(mut self) -> Self {
        // Resolve api key if "ENV"; an empty key makes the completion client fail per request.
        if self.api_key.trim().eq_ignore_ascii_case("env") {
            self.api_key = env::var("OPENAI_API_KEY").unwrap_or_default();
        }
        if self.cache_capacity == 0 {
            self.cache_capacity = default_cache_capacity();
        }
        if self.large_model_threshold > self.token_budget {
            self.large_model_threshold = self.token_budget;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg: SummaryConfig =
            serde_json::from_str(r#"{"api_key":"sk-test","cache_capacity":25}"#).unwrap();
        let cfg = cfg.sanitized();
        assert_eq!(cfg.api_key, "sk-test");
        assert_eq!(cfg.cache_capacity, 25);
        assert_eq!(cfg.token_budget, 16_000);
        assert_eq!(cfg.large_model_threshold, 4_000);
        assert_eq!(cfg.small_model, "gpt-3.5-turbo");
    }

    #[test]
    fn zero_capacity_falls_back_to_default() {
        let cfg: SummaryConfig =
            serde_json::from_str(r#"{"api_key":"k","cache_capacity":0}"#).unwrap();
        assert_eq!(cfg.sanitized().cache_capacity, 100);
    }
}
