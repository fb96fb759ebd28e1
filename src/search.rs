//! Section search.
//!
//! Sections are matched on their lower-case full descriptor
//! (`"section 1.1: permitted encumbrances"`) with the shared tiered ranking.
//! Before ranking, sections that share a full title are collapsed to the one
//! earliest in the document, so repeated subsection titles do not crowd out
//! distinct sections.

use crate::config::SearchSettings;
use crate::engine::OutlineSnapshot;
use crate::error::SectionId;
use crate::ranking::{RankQuery, Searchable};
use crate::section::Section;
use std::collections::HashSet;
use tracing::debug;

impl Searchable for Section {
    fn search_key(&self) -> &str {
        self.lower_case_full_descriptor()
    }

    fn reference_count(&self) -> u32 {
        self.num_refs()
    }
}

/// Search options.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Maximum number of results to return.
    pub max_results: usize,
    /// Whether sections hidden from the outline are searched too.
    pub include_hidden: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_results: 20,
            include_hidden: false,
        }
    }
}

impl From<&SearchSettings> for SearchOptions {
    fn from(settings: &SearchSettings) -> Self {
        Self {
            max_results: settings.max_results,
            ..Self::default()
        }
    }
}

/// Ranked search over sections given in document order.
#[derive(Debug, Clone, Default)]
pub struct SectionSearcher {
    options: SearchOptions,
}

impl SectionSearcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom options.
    pub fn with_options(options: SearchOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    /// Search `sections`, which must be in document order.
    ///
    /// Returns copies of the matching sections, best first. The input is
    /// left untouched.
    pub fn search(&self, sections: &[Section], query: &str) -> Vec<Section> {
        let Some(compiled) = RankQuery::new(query) else {
            return Vec::new();
        };

        let visible: Vec<&Section> = sections
            .iter()
            .filter(|section| self.options.include_hidden || section.show_bookmark())
            .collect();
        let candidates = dedupe_by_full_title(&visible);

        let results: Vec<Section> = compiled
            .rank(&candidates)
            .into_iter()
            .take(self.options.max_results)
            .map(|i| candidates[i].clone())
            .collect();

        debug!(
            query = compiled.needle(),
            candidates = candidates.len(),
            results = results.len(),
            "section search"
        );
        results
    }

    /// Like [`search`](Self::search) but returns ids only.
    pub fn search_ids(&self, sections: &[Section], query: &str) -> Vec<SectionId> {
        self.search(sections, query).iter().map(Section::id).collect()
    }

    /// Search the sections of a published snapshot.
    pub fn search_snapshot(&self, snapshot: &OutlineSnapshot, query: &str) -> Vec<Section> {
        self.search(&snapshot.document_order(), query)
    }
}

/// Keep the first section for every distinct full title.
///
/// With `sections` in document order, the survivor is the earliest one.
pub fn dedupe_by_full_title<'a>(sections: &[&'a Section]) -> Vec<&'a Section> {
    let mut seen = HashSet::new();
    sections
        .iter()
        .copied()
        .filter(|section| seen.insert(section.full_title()))
        .collect()
}

/// Convenience function to search the sections of a snapshot.
pub fn search_sections(snapshot: &OutlineSnapshot, query: &str, options: &SearchOptions) -> Vec<Section> {
    SectionSearcher::with_options(options.clone()).search_snapshot(snapshot, query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutlineSettings;
    use crate::engine::OutlineEngine;
    use crate::section::SectionType;
    use crate::tree::{RawOutlineItem, build_roots};

    fn item(id: SectionId, qualified: &str, title: &str, refs: u32, page: u32) -> RawOutlineItem {
        RawOutlineItem {
            qualified: Some(qualified.to_string()),
            section_type: Some(SectionType::Section),
            num_refs: refs,
            ..RawOutlineItem::new(id, title, page, 0.0)
        }
    }

    fn sections(items: &[RawOutlineItem]) -> Vec<Section> {
        items.iter().map(Section::from_raw).collect()
    }

    #[test]
    fn test_search_options_default() {
        let options = SearchOptions::default();
        assert_eq!(options.max_results, 20);
        assert!(!options.include_hidden);

        let options = SearchOptions::from(&SearchSettings { max_results: 3 });
        assert_eq!(options.max_results, 3);
    }

    #[test]
    fn test_dedupe_keeps_earliest() {
        let all = sections(&[
            item(1, "1", "Permitted Encumbrances", 3, 4),
            item(2, "1.1", "Permitted Encumbrances", 1, 9),
        ]);
        assert_eq!(all[0].full_descriptor(), "Section 1: Permitted Encumbrances");

        let ids = SectionSearcher::new().search_ids(&all, "permitted");
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn test_first_token_beats_inner_match() {
        let all = sections(&[
            RawOutlineItem {
                num_refs: 50,
                ..RawOutlineItem::new(1, "Default Notice of Termination", 0, 0.0)
            },
            RawOutlineItem::new(2, "Notices", 1, 0.0),
            RawOutlineItem::new(3, "Notice", 2, 0.0),
        ]);

        let ids = SectionSearcher::new().search_ids(&all, "notice");
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn test_max_results_and_blank_query() {
        let all = sections(&[
            RawOutlineItem::new(1, "Taxes", 0, 0.0),
            RawOutlineItem::new(2, "Tax Gross-Up", 1, 0.0),
            RawOutlineItem::new(3, "Withholding Taxes", 2, 0.0),
        ]);
        let searcher = SectionSearcher::with_options(SearchOptions {
            max_results: 2,
            include_hidden: false,
        });

        assert_eq!(searcher.search(&all, "tax").len(), 2);
        assert!(searcher.search(&all, "   ").is_empty());
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_hidden_sections_excluded_by_default() {
        let all = sections(&[
            RawOutlineItem {
                show_bookmark: false,
                ..RawOutlineItem::new(1, "Assignments", 0, 0.0)
            },
            RawOutlineItem::new(2, "Assignment and Transfer", 1, 0.0),
        ]);

        assert_eq!(SectionSearcher::new().search_ids(&all, "assign"), vec![2]);

        let searcher = SectionSearcher::with_options(SearchOptions {
            include_hidden: true,
            ..SearchOptions::default()
        });
        assert_eq!(searcher.search_ids(&all, "assign"), vec![1, 2]);
    }

    #[test]
    fn test_search_snapshot_reflects_renames() {
        let roots = build_roots(&[
            RawOutlineItem::new(1, "Representations", 0, 0.0),
            RawOutlineItem::new(2, "Covenants", 3, 0.0),
        ]);
        let mut engine = OutlineEngine::detached(roots, Vec::new(), OutlineSettings::default());
        let before = engine.snapshot();
        engine.rename(2, "Undertakings").unwrap();

        let options = SearchOptions::default();
        let found = search_sections(&before, "covenants", &options);
        assert_eq!(found.iter().map(Section::id).collect::<Vec<_>>(), vec![2]);

        // Renames change the bookmark title, not the searchable descriptor.
        let found = search_sections(&engine.snapshot(), "covenants", &options);
        assert_eq!(found.len(), 1);
    }
}
