//! Derived lookup indices over an outline tree.
//!
//! Four indices are kept next to every published tree:
//! id to section, id to path, page to (y to section) and id to the nearest
//! ancestor title. They are rebuilt together from scratch after every
//! structural edit; a rename alone already changes the nearest-title index.

use crate::error::SectionId;
use crate::section::Section;
use crate::tree::{NodePath, OutlineNode};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Sections on one page, keyed by their y offset.
///
/// Insertion order is kept; a second section at the same y replaces the first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageSections {
    entries: Vec<(f64, Section)>,
}

impl PageSections {
    fn insert(&mut self, y: f64, section: Section) {
        match self.entries.iter_mut().find(|(existing, _)| *existing == y) {
            Some(slot) => slot.1 = section,
            None => self.entries.push((y, section)),
        }
    }

    /// Sections in increasing y order.
    pub fn by_y(&self) -> Vec<&Section> {
        let mut entries: Vec<&(f64, Section)> = self.entries.iter().collect();
        entries.sort_by(|a, b| a.0.total_cmp(&b.0));
        entries.into_iter().map(|(_, section)| section).collect()
    }

    /// Sections in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.entries.iter().map(|(_, section)| section)
    }

    /// The section inserted last.
    pub fn last_inserted(&self) -> Option<&Section> {
        self.entries.last().map(|(_, section)| section)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The four indices derived from one tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutlineIndices {
    id_to_section: HashMap<SectionId, Section>,
    id_to_path: HashMap<SectionId, NodePath>,
    page_to_section: BTreeMap<u32, PageSections>,
    id_to_nearest_title: HashMap<SectionId, String>,
}

impl OutlineIndices {
    /// Compute all four indices for a root list.
    pub fn build(roots: &[OutlineNode]) -> Self {
        let indices = Self {
            id_to_section: compute_id_to_section(roots),
            id_to_path: compute_id_to_path(roots),
            page_to_section: compute_page_to_section(roots),
            id_to_nearest_title: compute_id_to_nearest_title(roots),
        };
        debug!(
            sections = indices.id_to_section.len(),
            pages = indices.page_to_section.len(),
            "rebuilt outline indices"
        );
        indices
    }

    pub fn section(&self, id: SectionId) -> Option<&Section> {
        self.id_to_section.get(&id)
    }

    pub fn path(&self, id: SectionId) -> Option<&NodePath> {
        self.id_to_path.get(&id)
    }

    pub fn nearest_title(&self, id: SectionId) -> Option<&str> {
        self.id_to_nearest_title.get(&id).map(String::as_str)
    }

    pub fn page(&self, page: u32) -> Option<&PageSections> {
        self.page_to_section.get(&page)
    }

    pub fn page_to_section(&self) -> &BTreeMap<u32, PageSections> {
        &self.page_to_section
    }

    pub fn id_to_section(&self) -> &HashMap<SectionId, Section> {
        &self.id_to_section
    }

    pub fn id_to_path(&self) -> &HashMap<SectionId, NodePath> {
        &self.id_to_path
    }

    pub fn contains(&self, id: SectionId) -> bool {
        self.id_to_section.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.id_to_section.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_section.is_empty()
    }

    /// Sections in document (pre-order) order.
    ///
    /// Paths compare lexicographically in pre-order, so sorting the path
    /// index is enough; the tree itself is not walked.
    pub fn document_order(&self) -> Vec<&Section> {
        let mut paths: Vec<(&NodePath, SectionId)> =
            self.id_to_path.iter().map(|(id, path)| (path, *id)).collect();
        paths.sort();
        paths
            .into_iter()
            .filter_map(|(_, id)| self.id_to_section.get(&id))
            .collect()
    }

    /// Section following `id` in document order.
    pub fn next_section(&self, id: SectionId) -> Option<&Section> {
        let order = self.document_order();
        let position = order.iter().position(|s| s.id() == id)?;
        order.get(position + 1).copied()
    }

    /// Section preceding `id` in document order.
    pub fn prev_section(&self, id: SectionId) -> Option<&Section> {
        let order = self.document_order();
        let position = order.iter().position(|s| s.id() == id)?;
        position.checked_sub(1).and_then(|p| order.get(p).copied())
    }

    /// `id -> next id` for every section that has a successor.
    pub fn successors(&self) -> HashMap<SectionId, SectionId> {
        self.document_order()
            .windows(2)
            .map(|pair| (pair[0].id(), pair[1].id()))
            .collect()
    }
}

/// Pre-order walk over every node, handing each visitor its path.
fn walk<'a>(nodes: &'a [OutlineNode], path: &mut Vec<usize>, visit: &mut impl FnMut(&'a OutlineNode, &[usize])) {
    for (index, node) in nodes.iter().enumerate() {
        path.push(index);
        visit(node, path);
        walk(&node.children, path, visit);
        path.pop();
    }
}

/// id to section. A repeated id keeps the last node visited.
pub fn compute_id_to_section(roots: &[OutlineNode]) -> HashMap<SectionId, Section> {
    let mut index = HashMap::new();
    walk(roots, &mut Vec::new(), &mut |node, _| {
        if index.insert(node.id(), node.section.clone()).is_some() {
            warn!(id = node.id(), "duplicate section id in outline");
        }
    });
    index
}

/// id to path.
pub fn compute_id_to_path(roots: &[OutlineNode]) -> HashMap<SectionId, NodePath> {
    let mut index = HashMap::new();
    walk(roots, &mut Vec::new(), &mut |node, path| {
        index.insert(node.id(), NodePath::new(path.to_vec()));
    });
    index
}

/// page to (y to section). Sections without a finite y are logged and left out.
pub fn compute_page_to_section(roots: &[OutlineNode]) -> BTreeMap<u32, PageSections> {
    let mut index: BTreeMap<u32, PageSections> = BTreeMap::new();
    walk(roots, &mut Vec::new(), &mut |node, _| {
        let section = &node.section;
        if !section.y().is_finite() {
            warn!(
                id = section.id(),
                page = section.page(),
                "section has a non-numeric y offset; left out of the page index"
            );
            return;
        }
        index
            .entry(section.page())
            .or_default()
            .insert(section.y(), section.clone());
    });
    index
}

/// id to nearest ancestor title.
///
/// The nearest non-empty bookmark title among a node's ancestors. A node
/// with no such ancestor maps to its own title, preferring its bookmark
/// title when that is non-empty.
pub fn compute_id_to_nearest_title(roots: &[OutlineNode]) -> HashMap<SectionId, String> {
    fn visit(nodes: &[OutlineNode], inherited: Option<&str>, index: &mut HashMap<SectionId, String>) {
        for node in nodes {
            let bookmark = node.section.bookmark_title().filter(|title| !title.is_empty());
            let nearest = inherited.or(bookmark).unwrap_or(node.section.title_cased());
            index.insert(node.id(), nearest.to_string());

            visit(&node.children, bookmark.or(inherited), index);
        }
    }

    let mut index = HashMap::new();
    visit(roots, None, &mut index);
    index
}
