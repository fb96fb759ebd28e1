//! Nearest section for a reading position.

use crate::error::SectionId;
use crate::index::OutlineIndices;
use crate::section::Section;
use std::collections::HashMap;

/// Whether `section` is the active one at `(page, y)`.
///
/// A section is active from its own position up to, but not including, the
/// position of the next section in document order. The last section stays
/// active through the rest of the document.
pub fn should_display(section: &Section, next: Option<&Section>, page: u32, y: f64) -> bool {
    if !section.is_at_or_before(page, y) {
        return false;
    }

    match next {
        Some(next) => page < next.page() || (page == next.page() && y < next.y()),
        None => true,
    }
}

/// The section considered current at `(page, y)`.
///
/// The active section furthest down `page` wins. Failing that, the closest
/// earlier page with any sections yields the section inserted last on it.
/// `None` when nothing precedes the position.
pub fn nearest_section(indices: &OutlineIndices, page: u32, y: f64) -> Option<Section> {
    let successors = indices.successors();

    if let Some(found) = active_on_page(indices, &successors, page, y) {
        return Some(found.clone());
    }

    indices
        .page_to_section()
        .range(..page)
        .rev()
        .find_map(|(_, sections)| sections.last_inserted())
        .cloned()
}

fn active_on_page<'a>(
    indices: &'a OutlineIndices,
    successors: &HashMap<SectionId, SectionId>,
    page: u32,
    y: f64,
) -> Option<&'a Section> {
    let sections = indices.page(page)?;
    sections
        .by_y()
        .into_iter()
        .rev()
        .find(|section| {
            let next = successors
                .get(&section.id())
                .and_then(|next| indices.section(*next));
            should_display(section, next, page, y)
        })
}
