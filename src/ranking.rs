//! Tiered ranking shared by section search and glossary search.
//!
//! Inclusion: the query must start the descriptor, follow a space or hyphen,
//! or follow one of the prefixes `in`, `un`, `re`, `co` (themselves after a
//! space). This catches "notice" inside "renotice" without a stemmer.
//!
//! Ranking, highest tier first:
//! 1. the query equals the descriptor's first token
//! 2. the query is a prefix of the first token
//! 3. the query equals some standalone token
//! 4. more references first
//!
//! Remaining ties keep the input order, so results are deterministic.

use regex::Regex;
use std::cmp::Reverse;

/// Prefixes a match may hide behind.
const MORPHOLOGICAL_PREFIXES: [&str; 4] = ["in", "un", "re", "co"];

/// Something the ranking engine can search.
pub trait Searchable {
    /// Lower-case text the query is matched against.
    fn search_key(&self) -> &str;

    /// How often the item is referenced in the document.
    fn reference_count(&self) -> u32;
}

impl<T: Searchable + ?Sized> Searchable for &T {
    fn search_key(&self) -> &str {
        (**self).search_key()
    }

    fn reference_count(&self) -> u32 {
        (**self).reference_count()
    }
}

/// A compiled query.
#[derive(Debug, Clone)]
pub struct RankQuery {
    needle: String,
    inclusion: Regex,
    standalone: Regex,
}

/// Per-item ranking key; larger sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct RankKey {
    exact_first: bool,
    prefix_first: bool,
    standalone: bool,
    references: u32,
}

impl RankQuery {
    /// Compile a query. Blank queries match nothing and yield `None`.
    pub fn new(query: &str) -> Option<Self> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }

        let escaped = regex::escape(&needle);
        let inclusion = Regex::new(&format!(
            r"(?:^|[ \-]| (?:{})){}",
            MORPHOLOGICAL_PREFIXES.join("|"),
            escaped
        ))
        .ok()?;
        let standalone = Regex::new(&format!(r"(?:^|\W){}(?:\W|$)", escaped)).ok()?;

        Some(Self {
            needle,
            inclusion,
            standalone,
        })
    }

    /// Normalised query text.
    pub fn needle(&self) -> &str {
        &self.needle
    }

    /// Whether an item passes the inclusion filter.
    pub fn includes(&self, key: &str) -> bool {
        self.inclusion.is_match(key)
    }

    fn rank_key<T: Searchable>(&self, item: &T) -> RankKey {
        let key = item.search_key();
        let first = key
            .split_whitespace()
            .next()
            .map(|token| token.trim_matches(|c: char| !c.is_alphanumeric()))
            .unwrap_or("");

        RankKey {
            exact_first: first == self.needle,
            prefix_first: first.starts_with(&self.needle),
            standalone: self.standalone.is_match(key),
            references: item.reference_count(),
        }
    }

    /// Indices of the included items, best first.
    pub fn rank<T: Searchable>(&self, items: &[T]) -> Vec<usize> {
        let mut ranked: Vec<(RankKey, usize)> = items
            .iter()
            .enumerate()
            .filter(|(_, item)| self.includes(item.search_key()))
            .map(|(i, item)| (self.rank_key(item), i))
            .collect();

        // Stable: equal keys keep input order.
        ranked.sort_by_key(|(key, _)| Reverse(*key));
        ranked.into_iter().map(|(_, i)| i).collect()
    }
}

/// Rank `items` against `query`, returning indices into `items`.
pub fn rank<T: Searchable>(query: &str, items: &[T]) -> Vec<usize> {
    match RankQuery::new(query) {
        Some(compiled) => compiled.rank(items),
        None => Vec::new(),
    }
}

/// Rank `items` against `query`, returning the matching items in order.
pub fn filter_and_rank<'a, T: Searchable>(query: &str, items: &'a [T]) -> Vec<&'a T> {
    rank(query, items).into_iter().map(|i| &items[i]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    struct Item(&'static str, u32);

    impl Searchable for Item {
        fn search_key(&self) -> &str {
            self.0
        }

        fn reference_count(&self) -> u32 {
            self.1
        }
    }

    fn keys(ranked: Vec<&Item>) -> Vec<&'static str> {
        ranked.into_iter().map(|item| item.0).collect()
    }

    #[test]
    fn test_inclusion_boundaries() {
        let query = RankQuery::new("notice").unwrap();
        assert!(query.includes("notice of default"));
        assert!(query.includes("default notice"));
        assert!(query.includes("pre-notice period"));
        assert!(query.includes("the renotice rules"));
        assert!(!query.includes("prenotice rules"));
        assert!(!query.includes("nonotice"));
    }

    #[test]
    fn test_prefix_needs_leading_space() {
        let query = RankQuery::new("form").unwrap();
        assert!(query.includes("the reform clause"));
        assert!(query.includes("the inform clause"));
        assert!(!query.includes("theinform clause"));
        assert!(!query.includes("the platform"));
    }

    #[test]
    fn test_query_is_literal() {
        let query = RankQuery::new("1.1").unwrap();
        assert!(query.includes("1.1 definitions"));
        assert!(!query.includes("1x1 definitions"));
    }

    #[test]
    fn test_first_token_outranks_inner_match() {
        let items = [
            Item("default notice of termination", 50),
            Item("notice of default", 1),
        ];
        let ranked = keys(filter_and_rank("notice", &items));
        assert_eq!(ranked, vec!["notice of default", "default notice of termination"]);
    }

    #[test]
    fn test_tiers_in_order() {
        let items = [
            Item("the renotice provisions", 90),
            Item("notices generally", 5),
            Item("default notice", 40),
            Item("notice", 1),
            Item("unrelated", 100),
        ];
        let ranked = keys(filter_and_rank("notice", &items));
        assert_eq!(
            ranked,
            vec![
                "notice",
                "notices generally",
                "default notice",
                "the renotice provisions"
            ]
        );
    }

    #[test]
    fn test_references_break_ties() {
        let items = [
            Item("events of default", 2),
            Item("default interest", 9),
            Item("default rate", 4),
        ];
        let ranked = keys(filter_and_rank("default", &items));
        assert_eq!(ranked, vec!["default interest", "default rate", "events of default"]);
    }

    #[test]
    fn test_ranking_is_deterministic() {
        let items = [
            Item("term loan", 3),
            Item("term sofr", 3),
            Item("terminated lender", 3),
            Item("the term", 3),
        ];
        let first = rank("term", &items);
        for _ in 0..10 {
            assert_eq!(rank("term", &items), first);
        }
        assert_eq!(first, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_query_is_case_insensitive_and_trimmed() {
        let items = [Item("borrower", 1)];
        assert_eq!(rank("  BORROWER ", &items), vec![0]);
    }

    #[test]
    fn test_blank_query_matches_nothing() {
        let items = [Item("borrower", 1)];
        assert!(rank("   ", &items).is_empty());
        assert!(RankQuery::new("").is_none());
    }

    #[derive(Debug, Clone)]
    struct Owned(String, u32);

    impl Searchable for Owned {
        fn search_key(&self) -> &str {
            &self.0
        }

        fn reference_count(&self) -> u32 {
            self.1
        }
    }

    fn items_strategy() -> impl Strategy<Value = Vec<Owned>> {
        prop::collection::vec(
            ("[a-z]{1,6}([ -](re|co|un|in)?[a-z]{1,6}){0,3}", 0u32..4).prop_map(|(key, refs)| Owned(key, refs)),
            0..16,
        )
    }

    proptest! {
        #[test]
        fn test_rank_is_deterministic_for_any_input(items in items_strategy(), query in "[a-z]{1,4}") {
            let first = rank(&query, &items);
            prop_assert_eq!(rank(&query, &items), first.clone());

            let compiled = RankQuery::new(&query).unwrap();
            let mut returned = first.clone();
            returned.sort_unstable();
            let included: Vec<usize> = (0..items.len()).filter(|i| compiled.includes(&items[*i].0)).collect();
            prop_assert_eq!(returned, included);
        }

        #[test]
        fn test_equal_items_keep_input_order(key in "[a-z]{1,6}", refs in 0u32..4, copies in 1usize..6) {
            let items = vec![Owned(key.clone(), refs); copies];
            prop_assert_eq!(rank(&key, &items), (0..copies).collect::<Vec<_>>());
        }
    }
}
