// src/config/sources.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::filter::{ItemFilter, ItemNormalizer};

pub const ENV_SOURCES_PATH: &str = "FEED_SOURCES_PATH";
pub const ENV_BRIDGE_URL: &str = "FEED_BRIDGE_URL";
pub const DEFAULT_REFRESH_SECS: u64 = 300;

fn default_refresh_secs() -> u64 {
    DEFAULT_REFRESH_SECS
}

fn default_enabled() -> bool {
    true
}

/// One configured feed endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceSpec {
    pub url: String,
    #[serde(default = "default_refresh_secs")]
    pub refresh_interval_secs: u64,
    #[serde(default)]
    pub filter: Option<ItemFilter>,
    #[serde(default)]
    pub normalize: Vec<ItemNormalizer>,
    /// Disabled sources are never polled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl SourceSpec {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            refresh_interval_secs: DEFAULT_REFRESH_SECS,
            filter: None,
            normalize: Vec::new(),
            enabled: true,
        }
    }

    pub fn with_interval(mut self, secs: u64) -> Self {
        self.refresh_interval_secs = secs;
        self
    }

    pub fn with_filter(mut self, filter: ItemFilter) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// Load sources from an explicit path. Supports TOML or JSON formats.
pub fn load_sources_from(path: &Path) -> Result<Vec<SourceSpec>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading sources from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_sources(&content, ext.as_str())
}

/// Load sources using env var + fallbacks:
/// 1) $FEED_SOURCES_PATH
/// 2) config/sources.toml
/// 3) config/sources.json
/// 4) built-in seed list
pub fn load_sources_default() -> Result<Vec<SourceSpec>> {
    if let Ok(p) = std::env::var(ENV_SOURCES_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_sources_from(&pb);
        } else {
            return Err(anyhow!("FEED_SOURCES_PATH points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/sources.toml");
    if toml_p.exists() {
        return load_sources_from(&toml_p);
    }
    let json_p = PathBuf::from("config/sources.json");
    if json_p.exists() {
        return load_sources_from(&json_p);
    }
    let bridge = std::env::var(ENV_BRIDGE_URL).unwrap_or_else(|_| "http://localhost:3000".into());
    Ok(default_seed(&bridge))
}

#[derive(Deserialize)]
struct SourcesFile {
    sources: Vec<SourceSpec>,
}

fn parse_sources(s: &str, hint_ext: &str) -> Result<Vec<SourceSpec>> {
    let parsed = if hint_ext == "toml" {
        toml::from_str::<SourcesFile>(s)
            .map(|f| f.sources)
            .context("parsing sources toml")?
    } else if hint_ext == "json" {
        parse_json(s)?
    } else {
        match toml::from_str::<SourcesFile>(s) {
            Ok(f) => f.sources,
            Err(_) => parse_json(s)?,
        }
    };
    Ok(clean_list(parsed))
}

fn parse_json(s: &str) -> Result<Vec<SourceSpec>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum JsonSources {
        List(Vec<SourceSpec>),
        Wrapped(SourcesFile),
    }
    let v: JsonSources = serde_json::from_str(s).context("parsing sources json")?;
    Ok(match v {
        JsonSources::List(l) => l,
        JsonSources::Wrapped(f) => f.sources,
    })
}

/// Trim URLs, drop blanks, keep the first occurrence of each URL.
fn clean_list(items: Vec<SourceSpec>) -> Vec<SourceSpec> {
    use std::collections::HashSet;
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for mut it in items {
        it.url = it.url.trim().to_string();
        if it.url.is_empty() || !seen.insert(it.url.clone()) {
            continue;
        }
        out.push(it);
    }
    out
}

fn twitter_feed(bridge: &str, username: &str) -> SourceSpec {
    SourceSpec::new(format!(
        "{bridge}/?action=display&bridge=TwitterBridge&context=By+username&u={username}&noretweet=on&format=Mrss"
    ))
    .with_interval(3600)
}

fn youtube_feed(bridge: &str, channel: &str) -> SourceSpec {
    SourceSpec::new(format!(
        "{bridge}/?action=display&bridge=YoutubeBridge&context=By+custom+name&custom=%40{channel}&duration_min=&duration_max=&format=Mrss"
    ))
    .with_interval(3600)
}

/// Built-in source list used when no config file is present.
pub fn default_seed(bridge: &str) -> Vec<SourceSpec> {
    let bridge = bridge.trim_end_matches('/');
    let mut out = vec![
        SourceSpec::new("https://feeds.nos.nl/nosnieuwsalgemeen"),
        SourceSpec::new("https://www.nu.nl/rss/Economie"),
        SourceSpec::new("https://hnrss.org/frontpage")
            .with_filter(ItemFilter::MinPoints { threshold: 100 }),
    ];
    out.extend(
        ["karpathy", "sama", "OpenAI", "VitalikButerin"]
            .iter()
            .map(|u| twitter_feed(bridge, u)),
    );
    out.extend(
        [
            "AndrejKarpathy",
            "CGPGrey",
            "SebastianLague",
            "smartereveryday",
            "TomScottGo",
            "Wendoverproductions",
        ]
        .iter()
        .map(|c| youtube_feed(bridge, c)),
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    #[test]
    fn toml_sources_with_defaults_and_dedup() {
        let toml = r#"
[[sources]]
url = " https://hnrss.org/frontpage "
refresh_interval_secs = 600
filter = { kind = "min_points", threshold = 100 }

[[sources]]
url = "https://hnrss.org/frontpage"

[[sources]]
url = ""

[[sources]]
url = "https://feeds.nos.nl/nosnieuwsalgemeen"
enabled = false
normalize = [{ kind = "stamp_fetch_time" }]
"#;
        let out = parse_sources(toml, "toml").unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].url, "https://hnrss.org/frontpage");
        assert_eq!(out[0].refresh_interval_secs, 600);
        assert_eq!(out[0].filter, Some(ItemFilter::MinPoints { threshold: 100 }));
        assert_eq!(out[1].refresh_interval_secs, DEFAULT_REFRESH_SECS);
        assert!(!out[1].enabled);
        assert_eq!(out[1].normalize, vec![ItemNormalizer::StampFetchTime]);
    }

    #[test]
    fn json_list_and_wrapped_forms() {
        let list = r#"[{"url":"https://a.example/rss"}]"#;
        let wrapped = r#"{"sources":[{"url":"https://b.example/rss","refresh_interval_secs":60}]}"#;
        assert_eq!(parse_sources(list, "json").unwrap()[0].url, "https://a.example/rss");
        let w = parse_sources(wrapped, "").unwrap();
        assert_eq!(w[0].refresh_interval_secs, 60);
    }

    #[test]
    fn invalid_filter_regex_rejects_file() {
        let json = r#"[{"url":"https://a.example/rss","filter":{"kind":"title_matches","pattern":"("}}]"#;
        assert!(parse_sources(json, "json").is_err());
    }

    #[test]
    fn seed_has_filtered_hn_and_hourly_bridges() {
        let seed = default_seed("http://bridge.local/");
        let hn = seed
            .iter()
            .find(|s| s.url.contains("hnrss"))
            .expect("hn source");
        assert_eq!(hn.filter, Some(ItemFilter::MinPoints { threshold: 100 }));
        assert!(seed
            .iter()
            .filter(|s| s.url.starts_with("http://bridge.local/?action=display"))
            .all(|s| s.refresh_interval_secs == 3600));
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();

        env::remove_var(ENV_SOURCES_PATH);

        // No files in temp CWD → built-in seed
        let v = load_sources_default().unwrap();
        assert!(v.iter().any(|s| s.url.contains("hnrss")));

        // Env takes precedence
        let p_json = tmp.path().join("mine.json");
        fs::write(&p_json, r#"[{"url":"https://x.example/rss"}]"#).unwrap();
        env::set_var(ENV_SOURCES_PATH, p_json.display().to_string());
        let v2 = load_sources_default().unwrap();
        assert_eq!(v2.len(), 1);
        assert_eq!(v2[0].url, "https://x.example/rss");

        env::set_var(ENV_SOURCES_PATH, tmp.path().join("missing.toml"));
        assert!(load_sources_default().is_err());
        env::remove_var(ENV_SOURCES_PATH);

        env::set_current_dir(&old).unwrap();
    }
}
