//! Outline tree structure.
//!
//! An outline is a forest of [`OutlineNode`]s in reading order. Nodes are
//! addressed by [`NodePath`]: the sibling indices from the root list down to
//! the node. Paths are derived data and go stale after any structural edit.

use crate::error::{OutlineError, SectionId};
use crate::glossary::RawTerm;
use crate::section::{Section, SectionType};
use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;
use uuid::Uuid;

/// Which of the two outline sources is on display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutlineMode {
    /// Outline generated from the document structure.
    #[default]
    AiToc,
    /// Outline authored by the reader.
    Bookmarks,
}

impl OutlineMode {
    /// The mode a switch moves to.
    pub fn other(self) -> Self {
        match self {
            OutlineMode::AiToc => OutlineMode::Bookmarks,
            OutlineMode::Bookmarks => OutlineMode::AiToc,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutlineMode::AiToc => "ai-toc",
            OutlineMode::Bookmarks => "bookmarks",
        }
    }
}

impl fmt::Display for OutlineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutlineMode {
    type Err = OutlineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ai-toc" | "toc" => Ok(OutlineMode::AiToc),
            "bookmarks" | "bookmark" => Ok(OutlineMode::Bookmarks),
            other => Err(OutlineError::Config(format!(
                "unknown outline mode '{}', expected 'ai-toc' or 'bookmarks'",
                other
            ))),
        }
    }
}

/// Sibling indices from the root list to a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    pub fn new(indices: Vec<usize>) -> Self {
        Self(indices)
    }

    /// Path of the parent node; the empty path stands for the root list.
    pub fn parent(&self) -> NodePath {
        let mut indices = self.0.clone();
        indices.pop();
        Self(indices)
    }

    /// Path of this node's `index`-th child.
    pub fn child(&self, index: usize) -> NodePath {
        let mut indices = self.0.clone();
        indices.push(index);
        Self(indices)
    }

    /// Index among siblings (`None` for the empty path).
    pub fn index(&self) -> Option<usize> {
        self.0.last().copied()
    }

    /// Every proper prefix, shortest first.
    pub fn ancestors(&self) -> impl Iterator<Item = NodePath> + '_ {
        (1..self.0.len()).map(|len| NodePath(self.0[..len].to_vec()))
    }
}

impl Deref for NodePath {
    type Target = [usize];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// A node in the outline: a section plus its ordered children.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlineNode {
    /// The section shown at this node.
    pub section: Section,

    /// Child nodes in reading order.
    pub children: Vec<OutlineNode>,

    /// Node identity when the same section is shown as a separate node.
    pub node_uuid: Option<Uuid>,
}

impl OutlineNode {
    /// Create a leaf node.
    pub fn new(section: Section) -> Self {
        Self {
            section,
            children: Vec::new(),
            node_uuid: None,
        }
    }

    /// Attach children.
    pub fn with_children(mut self, children: Vec<OutlineNode>) -> Self {
        self.children = children;
        self
    }

    pub fn id(&self) -> SectionId {
        self.section.id()
    }

    /// Add a child node.
    pub fn add_child(&mut self, child: OutlineNode) {
        self.children.push(child);
    }

    /// Check if this node has children.
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Recursively count all nodes in this subtree (including self).
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(|n| n.node_count()).sum::<usize>()
    }

    /// Ids of this subtree in pre-order.
    pub fn subtree_ids(&self) -> Vec<SectionId> {
        let mut ids = vec![self.id()];
        for child in &self.children {
            ids.extend(child.subtree_ids());
        }
        ids
    }

    /// Build a node (and its subtree) from a persisted item.
    ///
    /// Soft-deleted items are skipped together with everything below them.
    pub fn from_raw(item: &RawOutlineItem) -> Option<Self> {
        if !item.show_bookmark {
            return None;
        }
        let children = item.children.iter().filter_map(OutlineNode::from_raw).collect();
        Some(OutlineNode::new(Section::from_raw(item)).with_children(children))
    }

    /// Convert back into the persisted form.
    pub fn to_raw(&self) -> RawOutlineItem {
        RawOutlineItem {
            children: self.children.iter().map(OutlineNode::to_raw).collect(),
            ..self.section.to_raw()
        }
    }

    /// Format the subtree as indented text.
    pub fn format_tree(&self, indent: usize) -> String {
        let prefix = "  ".repeat(indent);
        let section = &self.section;
        let qualified = if section.qualified().is_empty() {
            String::new()
        } else {
            format!("{} ", section.qualified())
        };

        let mut result = format!(
            "{}{}{} [page {}, y {}] #{}\n",
            prefix,
            qualified,
            section.display_title(),
            section.page(),
            section.y(),
            section.id()
        );

        for child in &self.children {
            result.push_str(&child.format_tree(indent + 1));
        }

        result
    }
}

/// Build the root list from persisted items.
pub fn build_roots(items: &[RawOutlineItem]) -> Vec<OutlineNode> {
    items.iter().filter_map(OutlineNode::from_raw).collect()
}

/// Convert a root list back into persisted items.
pub fn to_raw_items(roots: &[OutlineNode]) -> Vec<RawOutlineItem> {
    roots.iter().map(OutlineNode::to_raw).collect()
}

/// Resolve a path to a node.
pub fn node_at<'a>(roots: &'a [OutlineNode], path: &[usize]) -> Option<&'a OutlineNode> {
    let (first, rest) = path.split_first()?;
    let mut node = roots.get(*first)?;
    for index in rest {
        node = node.children.get(*index)?;
    }
    Some(node)
}

/// Resolve a path to a mutable node.
pub fn node_at_mut<'a>(roots: &'a mut [OutlineNode], path: &[usize]) -> Option<&'a mut OutlineNode> {
    let (first, rest) = path.split_first()?;
    let mut node = roots.get_mut(*first)?;
    for index in rest {
        node = node.children.get_mut(*index)?;
    }
    Some(node)
}

/// The child list addressed by `parent`; the empty path is the root list.
pub fn children_at_mut<'a>(
    roots: &'a mut Vec<OutlineNode>,
    parent: &[usize],
) -> Option<&'a mut Vec<OutlineNode>> {
    if parent.is_empty() {
        return Some(roots);
    }
    node_at_mut(roots, parent).map(|node| &mut node.children)
}

/// Maximum depth of a root list.
pub fn max_depth(roots: &[OutlineNode]) -> usize {
    fn depth(node: &OutlineNode) -> usize {
        1 + node.children.iter().map(depth).max().unwrap_or(0)
    }

    roots.iter().map(depth).max().unwrap_or(0)
}

/// Persisted outline item as supplied by the outline source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct RawOutlineItem {
    /// Section id, unique within its outline.
    pub id: SectionId,

    /// Raw (possibly entity-escaped) title.
    pub title: String,

    /// Author-supplied numbering string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub literal: Option<String>,

    /// 0-based page index.
    pub page: u32,

    /// Vertical offset on the page.
    pub y: f64,

    /// Numbering used for display (e.g. "1.2").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualified: Option<String>,

    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub section_type: Option<SectionType>,

    /// Title prefixed by ancestor titles, when the source provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_title: Option<String>,

    #[serde(default)]
    pub num_refs: u32,

    /// `false` marks a soft-deleted entry.
    #[serde(default = "default_show_bookmark")]
    pub show_bookmark: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bookmark_title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RawOutlineItem>,
}

fn default_show_bookmark() -> bool {
    true
}

impl RawOutlineItem {
    /// A visible leaf item with no numbering.
    pub fn new(id: SectionId, title: impl Into<String>, page: u32, y: f64) -> Self {
        Self {
            id,
            title: title.into(),
            literal: None,
            page,
            y,
            qualified: None,
            section_type: None,
            full_title: None,
            num_refs: 0,
            show_bookmark: true,
            bookmark_title: None,
            uuid: None,
            children: Vec::new(),
        }
    }

    /// Add a child item.
    pub fn with_child(mut self, child: RawOutlineItem) -> Self {
        self.children.push(child);
        self
    }
}

/// Both outlines of one document plus its glossary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct OutlineDocument {
    /// Document name.
    pub name: String,

    /// Total page count.
    #[serde(default)]
    pub total_pages: u32,

    /// Outline generated from the document structure.
    #[serde(default)]
    pub ai_toc: Vec<RawOutlineItem>,

    /// Reader bookmarks.
    #[serde(default)]
    pub bookmarks: Vec<RawOutlineItem>,

    /// Glossary terms.
    #[serde(default)]
    pub terms: Vec<RawTerm>,
}

impl OutlineDocument {
    /// Create an empty outline document.
    pub fn new(name: impl Into<String>, total_pages: u32) -> Self {
        Self {
            name: name.into(),
            total_pages,
            ai_toc: Vec::new(),
            bookmarks: Vec::new(),
            terms: Vec::new(),
        }
    }

    /// Persisted items for one outline source.
    pub fn items(&self, mode: OutlineMode) -> &[RawOutlineItem] {
        match mode {
            OutlineMode::AiToc => &self.ai_toc,
            OutlineMode::Bookmarks => &self.bookmarks,
        }
    }

    pub fn items_mut(&mut self, mode: OutlineMode) -> &mut Vec<RawOutlineItem> {
        match mode {
            OutlineMode::AiToc => &mut self.ai_toc,
            OutlineMode::Bookmarks => &mut self.bookmarks,
        }
    }

    /// Visible tree for one outline source.
    pub fn roots(&self, mode: OutlineMode) -> Vec<OutlineNode> {
        build_roots(self.items(mode))
    }

    /// Every persisted section of one outline, hidden ones included, in
    /// document order.
    pub fn sections(&self, mode: OutlineMode) -> Vec<Section> {
        fn collect(items: &[RawOutlineItem], out: &mut Vec<Section>) {
            for item in items {
                out.push(Section::from_raw(item));
                collect(&item.children, out);
            }
        }

        let mut sections = Vec::new();
        collect(self.items(mode), &mut sections);
        sections
    }

    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_items() -> Vec<RawOutlineItem> {
        vec![
            RawOutlineItem::new(1, "Definitions", 0, 10.0)
                .with_child(RawOutlineItem::new(2, "Defined Terms", 0, 200.0))
                .with_child(RawOutlineItem::new(3, "Interpretation", 1, 40.0)),
            RawOutlineItem::new(4, "The Loans", 2, 10.0),
        ]
    }

    #[test]
    fn test_build_roots() {
        let roots = build_roots(&sample_items());
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0].node_count(), 3);
        assert!(roots[0].has_children());
        assert!(!roots[1].has_children());
        assert_eq!(max_depth(&roots), 2);
    }

    #[test]
    fn test_build_roots_skips_hidden_subtrees() {
        let mut items = sample_items();
        items[0].show_bookmark = false;
        let roots = build_roots(&items);
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].id(), 4);
    }

    #[test]
    fn test_node_at_paths() {
        let roots = build_roots(&sample_items());
        assert_eq!(node_at(&roots, &[0, 1]).map(|n| n.id()), Some(3));
        assert_eq!(node_at(&roots, &[1]).map(|n| n.id()), Some(4));
        assert!(node_at(&roots, &[]).is_none());
        assert!(node_at(&roots, &[0, 5]).is_none());
    }

    #[test]
    fn test_children_at_mut_root_list() {
        let mut roots = build_roots(&sample_items());
        assert_eq!(children_at_mut(&mut roots, &[]).map(|c| c.len()), Some(2));
        assert_eq!(children_at_mut(&mut roots, &[0]).map(|c| c.len()), Some(2));
        assert!(children_at_mut(&mut roots, &[9]).is_none());
    }

    #[test]
    fn test_node_path_helpers() {
        let path = NodePath::new(vec![2, 0, 3]);
        assert_eq!(path.parent(), NodePath::new(vec![2, 0]));
        assert_eq!(path.child(1), NodePath::new(vec![2, 0, 3, 1]));
        assert_eq!(path.index(), Some(3));
        let ancestors: Vec<NodePath> = path.ancestors().collect();
        assert_eq!(ancestors, vec![NodePath::new(vec![2]), NodePath::new(vec![2, 0])]);
        assert_eq!(path.to_string(), "[2, 0, 3]");
    }

    #[test]
    fn test_sections_include_hidden() {
        let mut doc = OutlineDocument::new("Lease", 30);
        doc.bookmarks = sample_items();
        doc.bookmarks[0].show_bookmark = false;

        let ids: Vec<SectionId> = doc.sections(OutlineMode::Bookmarks).iter().map(Section::id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(doc.roots(OutlineMode::Bookmarks).len(), 1);
    }

    #[test]
    fn test_subtree_ids_preorder() {
        let roots = build_roots(&sample_items());
        assert_eq!(roots[0].subtree_ids(), vec![1, 2, 3]);
    }

    #[test]
    fn test_raw_roundtrip() {
        let roots = build_roots(&sample_items());
        let raw = to_raw_items(&roots);
        let rebuilt = build_roots(&raw);
        assert_eq!(rebuilt, roots);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("ai-toc".parse::<OutlineMode>().ok(), Some(OutlineMode::AiToc));
        assert_eq!("Bookmarks".parse::<OutlineMode>().ok(), Some(OutlineMode::Bookmarks));
        assert!("chapters".parse::<OutlineMode>().is_err());
        assert_eq!(OutlineMode::AiToc.other(), OutlineMode::Bookmarks);
    }

    #[test]
    fn test_document_json_roundtrip() {
        let mut doc = OutlineDocument::new("Credit Agreement", 120);
        doc.ai_toc = sample_items();

        let json = doc.to_json().unwrap();
        let parsed = OutlineDocument::from_json(&json).unwrap();

        assert_eq!(parsed, doc);
        assert_eq!(parsed.roots(OutlineMode::AiToc).len(), 2);
        assert!(parsed.roots(OutlineMode::Bookmarks).is_empty());
    }

    #[test]
    fn test_format_tree() {
        let roots = build_roots(&sample_items());
        let text = roots[0].format_tree(0);
        assert!(text.starts_with("Definitions [page 0, y 10] #1\n"));
        assert!(text.contains("  Defined Terms [page 0, y 200] #2\n"));
    }
}
