//! kubedeck search: fuzzy filter and ranking over a screen's items.
//!
//! Each item is reduced to one lowercase search string (its search fields read
//! through [`kubedeck_core::field`], joined by a space) and matched with the
//! skim matcher. A leading `!` negates the pattern.

#![forbid(unsafe_code)]

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use kubedeck_core::{field, Item, Resource};
use tracing::trace;

/// Search fields used when a screen declares none.
pub const DEFAULT_SEARCH_FIELDS: &[&str] = &["Namespace", "Name"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    /// Index into the input item list.
    pub index: usize,
    pub score: i64,
}

/// Parsed filter text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    All,
    Match(String),
    Exclude(String),
}

impl Query {
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if text.is_empty() {
            return Query::All;
        }
        match text.strip_prefix('!') {
            Some(rest) => Query::Exclude(rest.trim().to_lowercase()),
            None => Query::Match(text.to_lowercase()),
        }
    }
}

/// Lowercase search string of one item.
pub fn search_string(item: &dyn Resource, fields: &[String]) -> String {
    let parts: Vec<String> = if fields.is_empty() {
        DEFAULT_SEARCH_FIELDS.iter().map(|f| field::get_string(item, f)).collect()
    } else {
        fields.iter().map(|f| field::get_string(item, f)).collect()
    };
    parts.join(" ").to_lowercase()
}

/// Ordering keys read once per item.
struct SortKey {
    age: Option<DateTime<Utc>>,
    name: String,
}

impl SortKey {
    fn of(item: &dyn Resource) -> Self {
        Self { age: field::get(item, "Age").as_time(), name: field::get_string(item, "Name").to_lowercase() }
    }
}

/// Newest first; items without a timestamp sort after timestamped ones, then by name.
fn by_age_then_name(a: &SortKey, b: &SortKey) -> Ordering {
    let age = match (a.age, b.age) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    age.then_with(|| a.name.cmp(&b.name))
}

pub struct FilterEngine {
    matcher: SkimMatcherV2,
}

impl Default for FilterEngine {
    fn default() -> Self { Self::new() }
}

impl FilterEngine {
    pub fn new() -> Self { Self { matcher: SkimMatcherV2::default().ignore_case() } }

    fn score(&self, haystack: &str, pattern: &str) -> Option<i64> {
        if pattern.is_empty() {
            return Some(0);
        }
        self.matcher.fuzzy_match(haystack, pattern)
    }

    /// Ranked hits for `text` over `items`. An empty filter returns every item
    /// in input order with score 0.
    pub fn hits(&self, items: &[Item], fields: &[String], text: &str) -> Vec<Hit> {
        let started = std::time::Instant::now();
        let query = Query::parse(text);
        let hits: Vec<Hit> = match &query {
            Query::All => (0..items.len()).map(|index| Hit { index, score: 0 }).collect(),
            Query::Match(pattern) => {
                let mut hits: Vec<(Hit, SortKey)> = items
                    .iter()
                    .enumerate()
                    .filter_map(|(index, it)| {
                        let score = self.score(&search_string(it.as_ref(), fields), pattern)?;
                        Some((Hit { index, score }, SortKey::of(it.as_ref())))
                    })
                    .collect();
                hits.sort_by(|(ha, ka), (hb, kb)| hb.score.cmp(&ha.score).then_with(|| by_age_then_name(ka, kb)));
                hits.into_iter().map(|(h, _)| h).collect()
            }
            Query::Exclude(pattern) => {
                let mut rest: Vec<(Hit, SortKey)> = items
                    .iter()
                    .enumerate()
                    .filter(|(_, it)| self.score(&search_string(it.as_ref(), fields), pattern).is_none())
                    .map(|(index, it)| (Hit { index, score: 0 }, SortKey::of(it.as_ref())))
                    .collect();
                rest.sort_by(|(_, ka), (_, kb)| by_age_then_name(ka, kb));
                rest.into_iter().map(|(h, _)| h).collect()
            }
        };
        let ms = started.elapsed().as_secs_f64() * 1_000.0;
        metrics::histogram!("filter_eval_ms", ms);
        trace!(items = items.len(), hits = hits.len(), took_ms = ms, "filter: evaluated");
        hits
    }

    /// Filtered view of `items` for `text`.
    pub fn filter(&self, items: &[Item], fields: &[String], text: &str) -> Vec<Item> {
        self.hits(items, fields, text).into_iter().map(|h| items[h.index].clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_parsing() {
        assert_eq!(Query::parse(""), Query::All);
        assert_eq!(Query::parse("   "), Query::All);
        assert_eq!(Query::parse("Prod"), Query::Match("prod".into()));
        assert_eq!(Query::parse("!Prod"), Query::Exclude("prod".into()));
        assert_eq!(Query::parse("!"), Query::Exclude(String::new()));
    }

    #[test]
    fn age_ordering_is_total() {
        let now = Utc::now();
        let older = SortKey { age: Some(now - chrono::Duration::hours(1)), name: "b".into() };
        let newer = SortKey { age: Some(now), name: "z".into() };
        let none_a = SortKey { age: None, name: "a".into() };
        assert_eq!(by_age_then_name(&newer, &older), Ordering::Less);
        assert_eq!(by_age_then_name(&older, &none_a), Ordering::Less);
        assert_eq!(by_age_then_name(&none_a, &SortKey { age: None, name: "b".into() }), Ordering::Less);
    }
}
