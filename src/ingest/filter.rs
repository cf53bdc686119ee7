// src/ingest/filter.rs
//! Per-source item predicates and normalizers, kept as plain data so source
//! lists can live in TOML/JSON files.

use std::fmt;

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ingest::types::Item;

/// Pure keep/drop decision for one item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemFilter {
    /// Keep items whose description carries `Points: N` with `N > threshold`.
    MinPoints { threshold: u64 },
    /// Keep items whose title matches the regex.
    TitleMatches { pattern: TitlePattern },
    /// Case-insensitive substring match on the description.
    DescriptionContains { needle: String },
}

/// Title regex, compiled once when the source list is parsed. Invalid
/// patterns fail deserialization, so a loaded filter always evaluates.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TitlePattern(Regex);

impl TitlePattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_match(&self, title: &str) -> bool {
        self.0.is_match(title)
    }
}

impl TryFrom<String> for TitlePattern {
    type Error = regex::Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(&s)
    }
}

impl From<TitlePattern> for String {
    fn from(p: TitlePattern) -> Self {
        p.as_str().to_string()
    }
}

impl PartialEq for TitlePattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for TitlePattern {}

impl fmt::Debug for TitlePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TitlePattern").field(&self.as_str()).finish()
    }
}

/// Field rewrite applied to items that passed the filter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemNormalizer {
    /// Replace `published_at` with the time the feed was fetched.
    StampFetchTime,
}

fn points_regex() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"Points: (\d+)").expect("points regex"))
}

/// Extract the `Points: N` score embedded in aggregator descriptions.
pub fn points_in(description: &str) -> Option<u64> {
    points_regex()
        .captures(description)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

impl ItemFilter {
    pub fn keep(&self, item: &Item) -> bool {
        match self {
            ItemFilter::MinPoints { threshold } => {
                points_in(&item.description).is_some_and(|p| p > *threshold)
            }
            ItemFilter::TitleMatches { pattern } => pattern.is_match(&item.title),
            ItemFilter::DescriptionContains { needle } => item
                .description
                .to_lowercase()
                .contains(&needle.to_lowercase()),
        }
    }
}

impl ItemNormalizer {
    pub fn apply(&self, mut item: Item, fetched_at: i64) -> Item {
        match self {
            ItemNormalizer::StampFetchTime => item.published_at = fetched_at,
        }
        item
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str, description: &str) -> Item {
        Item {
            guid: "g".into(),
            title: title.into(),
            link: "https://example.com".into(),
            description: description.into(),
            published_at: 1,
            image: None,
        }
    }

    #[test]
    fn min_points_is_strictly_greater() {
        let f = ItemFilter::MinPoints { threshold: 100 };
        assert!(!f.keep(&item("a", "Points: 50")));
        assert!(!f.keep(&item("a", "Points: 100")));
        assert!(f.keep(&item("a", "<p>Points: 101</p>")));
        assert!(!f.keep(&item("a", "no score here")));
    }

    #[test]
    fn title_and_description_filters() {
        let t = ItemFilter::TitleMatches {
            pattern: TitlePattern::new("(?i)^show hn").unwrap(),
        };
        assert!(t.keep(&item("Show HN: a thing", "")));
        assert!(!t.keep(&item("Ask HN: a question", "")));

        let d = ItemFilter::DescriptionContains {
            needle: "RUST".into(),
        };
        assert!(d.keep(&item("x", "written in rust")));
        assert!(!d.keep(&item("x", "written in go")));
    }

    #[test]
    fn bad_regex_fails_to_deserialize() {
        assert!(TitlePattern::new("(unclosed").is_err());
        let parsed: Result<ItemFilter, _> =
            serde_json::from_str(r#"{"kind":"title_matches","pattern":"(unclosed"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn deserialized_title_pattern_is_compiled_and_reusable() {
        let f: ItemFilter =
            toml::from_str("kind = \"title_matches\"\npattern = \"^(Show|Launch) HN\"").unwrap();
        assert!(f.keep(&item("Show HN: a thing", "")));
        assert!(f.keep(&item("Launch HN: another", "")));
        assert!(!f.keep(&item("Ask HN: a question", "")));

        let ItemFilter::TitleMatches { pattern } = &f else {
            panic!("expected title filter, got {f:?}");
        };
        assert_eq!(pattern.as_str(), "^(Show|Launch) HN");
        let json = serde_json::to_string(&f).unwrap();
        assert_eq!(json, r#"{"kind":"title_matches","pattern":"^(Show|Launch) HN"}"#);
    }

    #[test]
    fn stamp_fetch_time_overwrites_date_only() {
        let it = ItemNormalizer::StampFetchTime.apply(item("t", "d"), 99);
        assert_eq!(it.published_at, 99);
        assert_eq!(it.title, "t");
    }

    #[test]
    fn filters_deserialize_from_tagged_json() {
        let f: ItemFilter =
            serde_json::from_str(r#"{"kind":"min_points","threshold":100}"#).unwrap();
        assert_eq!(f, ItemFilter::MinPoints { threshold: 100 });
    }
}
