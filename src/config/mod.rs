// src/config/mod.rs
pub mod sources;
pub mod summary;

use std::env;
use std::path::PathBuf;

pub const ENV_DB_PATH: &str = "FEED_DB_PATH";
pub const ENV_POLLING_DISABLED: &str = "FEED_POLLING_DISABLED";
pub const ENV_LIST_LIMIT: &str = "FEED_LIST_LIMIT";
pub const ENV_BROWSERLESS_URL: &str = "BROWSERLESS_URL";
pub const ENV_BROWSERLESS_TOKEN: &str = "BROWSERLESS_TOKEN";
pub const ENV_PROXY_LIST: &str = "FEED_PROXY_LIST";
pub const ENV_USER_AGENT: &str = "FEED_USER_AGENT";

/// Process-level settings read from the environment (after `.env` is loaded).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    /// Offline/test mode: sources are loaded but never polled.
    pub polling_disabled: bool,
    pub list_limit: usize,
    pub browserless_url: String,
    pub browserless_token: Option<String>,
    pub proxies: Vec<String>,
    pub user_agent: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/feed.db"),
            polling_disabled: false,
            list_limit: 100,
            browserless_url: "http://localhost:3001".into(),
            browserless_token: None,
            proxies: Vec::new(),
            user_agent: None,
        }
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

fn env_non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl AppConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            db_path: env_non_empty(ENV_DB_PATH)
                .map(PathBuf::from)
                .unwrap_or(d.db_path),
            polling_disabled: env_flag(ENV_POLLING_DISABLED),
            list_limit: env_non_empty(ENV_LIST_LIMIT)
                .and_then(|v| v.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(d.list_limit),
            browserless_url: env_non_empty(ENV_BROWSERLESS_URL).unwrap_or(d.browserless_url),
            browserless_token: env_non_empty(ENV_BROWSERLESS_TOKEN),
            proxies: env_non_empty(ENV_PROXY_LIST)
                .map(|v| {
                    v.split(',')
                        .map(|p| p.trim().to_string())
                        .filter(|p| !p.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            user_agent: env_non_empty(ENV_USER_AGENT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[serial_test::serial]
    #[test]
    fn env_overrides_and_flags() {
        env::set_var(ENV_POLLING_DISABLED, "true");
        env::set_var(ENV_LIST_LIMIT, "25");
        env::set_var(ENV_PROXY_LIST, " 10.0.0.1:8080, ,10.0.0.2:3128 ");
        env::remove_var(ENV_DB_PATH);

        let cfg = AppConfig::from_env();
        assert!(cfg.polling_disabled);
        assert_eq!(cfg.list_limit, 25);
        assert_eq!(cfg.proxies, vec!["10.0.0.1:8080", "10.0.0.2:3128"]);
        assert_eq!(cfg.db_path, PathBuf::from("data/feed.db"));

        env::set_var(ENV_LIST_LIMIT, "0");
        assert_eq!(AppConfig::from_env().list_limit, 100);

        env::remove_var(ENV_POLLING_DISABLED);
        env::remove_var(ENV_LIST_LIMIT);
        env::remove_var(ENV_PROXY_LIST);
        assert!(!AppConfig::from_env().polling_disabled);
    }
}
