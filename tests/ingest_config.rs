// tests/ingest_config.rs
use std::fs;

use feed_digest::config::sources::load_sources_from;
use feed_digest::config::summary::SummaryConfig;
use feed_digest::ingest::filter::ItemFilter;
use feed_digest::scheduler::SourceState;

#[test]
fn sources_file_round_trips_into_scheduler_state() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("sources.toml");
    fs::write(
        &p,
        r#"
[[sources]]
url = "https://hnrss.org/frontpage"
filter = { kind = "min_points", threshold = 100 }

[[sources]]
url = "https://www.nu.nl/rss/Economie"
refresh_interval_secs = 900
filter = { kind = "description_contains", needle = "rente" }

[[sources]]
url = "https://feeds.nos.nl/nosnieuwsalgemeen"
enabled = false
"#,
    )
    .unwrap();

    let specs = load_sources_from(&p).unwrap();
    assert_eq!(specs.len(), 3);
    assert_eq!(specs[0].refresh_interval_secs, 300);
    assert_eq!(
        specs[1].filter,
        Some(ItemFilter::DescriptionContains {
            needle: "rente".into()
        })
    );

    let states: Vec<SourceState> = specs.into_iter().map(SourceState::new).collect();
    assert!(!states[0].disabled);
    assert!(states[2].disabled);
}

#[test]
fn missing_sources_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_sources_from(&dir.path().join("nope.toml")).is_err());
}

#[test]
fn summary_config_file_overrides_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("summary.json");
    fs::write(
        &p,
        r#"{ "api_key": "sk-test", "large_model_threshold": 2000, "cache_capacity": 25 }"#,
    )
    .unwrap();

    let cfg = SummaryConfig::load_from_file(&p).unwrap();
    assert_eq!(cfg.api_key, "sk-test");
    assert_eq!(cfg.large_model_threshold, 2000);
    assert_eq!(cfg.cache_capacity, 25);
    assert_eq!(cfg.token_budget, 16_000);
    assert_eq!(cfg.small_model, "gpt-3.5-turbo");
}
