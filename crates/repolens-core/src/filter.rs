//! Keyword Fallback Filter for non-code listings.
//!
//! An item matches when any keyword is a case-insensitive substring of any
//! of its search fields. Listings arrive most-recent-first and keep that
//! order. When no keywords are given the listing is returned truncated;
//! when nothing matches, the most recent items are returned instead and the
//! mode says so.

use serde::{Deserialize, Serialize};

use crate::listing::ListingItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Items fetched from the source host per listing.
    pub fetch_limit: usize,
    /// Cap when there are no keywords (and on matched results).
    pub max_unfiltered: usize,
    /// Items returned when keywords match nothing.
    pub fallback_recent: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            fetch_limit: 100,
            max_unfiltered: 50,
            fallback_recent: 20,
        }
    }
}

/// How a filtered listing was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    /// At least one item matched a keyword.
    Matched,
    /// No keywords were given; the listing is unfiltered.
    NoKeywords,
    /// Keywords matched nothing; these are the most recent items.
    RecentFallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Filtered<T> {
    pub items: Vec<T>,
    pub mode: FilterMode,
    /// Listing length before filtering.
    pub total: usize,
}

/// Filter `items` by `keywords`.
#[must_use]
pub fn filter_by_keywords<T: ListingItem>(
    mut items: Vec<T>,
    keywords: &[String],
    config: &FilterConfig,
) -> Filtered<T> {
    let total = items.len();
    let needles: Vec<String> = keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();

    if needles.is_empty() {
        items.truncate(config.max_unfiltered);
        return Filtered {
            items,
            mode: FilterMode::NoKeywords,
            total,
        };
    }

    let (mut matched, mut rest): (Vec<T>, Vec<T>) = items.into_iter().partition(|item| {
        item.search_fields().iter().any(|field| {
            let field = field.to_lowercase();
            needles.iter().any(|n| field.contains(n.as_str()))
        })
    });

    if matched.is_empty() {
        tracing::debug!(total, keywords = ?needles, "no listing item matched, using most recent");
        rest.truncate(config.fallback_recent);
        return Filtered {
            items: rest,
            mode: FilterMode::RecentFallback,
            total,
        };
    }

    matched.truncate(config.max_unfiltered);
    Filtered {
        items: matched,
        mode: FilterMode::Matched,
        total,
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use repolens_source::Issue;

    use super::*;

    fn issue(number: u64, title: &str, labels: &[&str]) -> Issue {
        Issue {
            number,
            title: title.into(),
            state: "open".into(),
            author: "octocat".into(),
            labels: labels.iter().map(|s| (*s).to_owned()).collect(),
            ..Issue::default()
        }
    }

    fn kw(words: &[&str]) -> Vec<String> {
        words.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn matches_any_keyword_in_any_field_preserving_order() {
        let items = vec![
            issue(5, "Crash on startup", &[]),
            issue(4, "Docs typo", &["documentation"]),
            issue(3, "Startup is slow", &["perf"]),
        ];
        let out = filter_by_keywords(items, &kw(&["STARTUP", "docs"]), &FilterConfig::default());
        assert_eq!(out.mode, FilterMode::Matched);
        let numbers: Vec<_> = out.items.iter().map(|i| i.number).collect();
        assert_eq!(numbers, vec![5, 4, 3]);
    }

    #[test]
    fn labels_are_searched() {
        let items = vec![issue(2, "Something", &["security"]), issue(1, "Other", &[])];
        let out = filter_by_keywords(items, &kw(&["security"]), &FilterConfig::default());
        assert_eq!(out.items.len(), 1);
        assert_eq!(out.items[0].number, 2);
    }

    #[test]
    fn no_keywords_truncates_to_max_unfiltered() {
        let items: Vec<_> = (0..80).map(|n| issue(n, "x", &[])).collect();
        let out = filter_by_keywords(items, &kw(&["", "  "]), &FilterConfig::default());
        assert_eq!(out.mode, FilterMode::NoKeywords);
        assert_eq!(out.items.len(), 50);
        assert_eq!(out.total, 80);
    }

    #[test]
    fn no_match_falls_back_to_most_recent() {
        let items: Vec<_> = (0..30).rev().map(|n| issue(n, "feature request", &[])).collect();
        let out = filter_by_keywords(items, &kw(&["security"]), &FilterConfig::default());
        assert_eq!(out.mode, FilterMode::RecentFallback);
        assert_eq!(out.items.len(), 20);
        assert_eq!(out.items[0].number, 29);
        assert_eq!(out.items[19].number, 10);
    }

    proptest! {
        #[test]
        fn never_grows_and_fallback_is_bounded(
            titles in prop::collection::vec("[a-z ]{0,20}", 0..120),
            keywords in prop::collection::vec("[a-z]{0,4}", 0..4),
            fallback in 1usize..40,
        ) {
            let items: Vec<_> = titles.iter().enumerate().map(|(i, t)| issue(i as u64, t, &[])).collect();
            let config = FilterConfig { fallback_recent: fallback, ..FilterConfig::default() };
            let out = filter_by_keywords(items.clone(), &keywords, &config);
            prop_assert!(out.items.len() <= items.len());
            if out.mode == FilterMode::RecentFallback {
                prop_assert!(out.items.len() <= fallback);
                let expected: Vec<_> = items.iter().take(fallback).cloned().collect();
                prop_assert_eq!(out.items, expected);
            }
        }
    }
}
