//! Outline mutation engine.
//!
//! The engine owns the displayed tree and its indices. Each edit works on a
//! copy of the current tree, has the change mirrored by the sync adapter and
//! only then publishes a fresh [`OutlineSnapshot`]. Readers hold an
//! `Arc<OutlineSnapshot>` and never see a half-applied edit.
//!
//! Edits that cannot be applied (unknown id, stale path, invalid position,
//! nothing to indent) are logged and reported as [`EditOutcome::Abandoned`];
//! the published snapshot stays as it was. Only a sync desync is returned as
//! an error.

use crate::config::{DeletePolicy, OutlineSettings};
use crate::error::{OutlineError, Result, SectionId};
use crate::index::OutlineIndices;
use crate::locator;
use crate::section::Section;
use crate::sync::{NoopSync, SyncAdapter, SyncChange, SyncError};
use crate::tree::{
    NodePath, OutlineDocument, OutlineMode, OutlineNode, children_at_mut, node_at, node_at_mut,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Result of an edit that did not fail fatally.
#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    /// The edit was applied; carries the id of the edited section.
    Applied(SectionId),
    /// The edit was abandoned and nothing changed.
    Abandoned(OutlineError),
}

impl EditOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, EditOutcome::Applied(_))
    }

    /// Id of the edited section, if the edit was applied.
    pub fn applied_id(&self) -> Option<SectionId> {
        match self {
            EditOutcome::Applied(id) => Some(*id),
            EditOutcome::Abandoned(_) => None,
        }
    }
}

/// Immutable view of the displayed outline.
#[derive(Debug, Clone)]
pub struct OutlineSnapshot {
    mode: OutlineMode,
    roots: Vec<OutlineNode>,
    indices: OutlineIndices,
    expanded: BTreeSet<SectionId>,
}

impl OutlineSnapshot {
    fn build(mode: OutlineMode, roots: Vec<OutlineNode>, expanded: BTreeSet<SectionId>) -> Self {
        let indices = OutlineIndices::build(&roots);
        let expanded = expanded.into_iter().filter(|id| indices.contains(*id)).collect();
        Self {
            mode,
            roots,
            indices,
            expanded,
        }
    }

    pub fn mode(&self) -> OutlineMode {
        self.mode
    }

    pub fn roots(&self) -> &[OutlineNode] {
        &self.roots
    }

    pub fn indices(&self) -> &OutlineIndices {
        &self.indices
    }

    /// Number of sections in the outline.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Copy of the section with `id`.
    pub fn section(&self, id: SectionId) -> Option<Section> {
        self.indices.section(id).cloned()
    }

    pub fn path(&self, id: SectionId) -> Option<NodePath> {
        self.indices.path(id).cloned()
    }

    /// Copy of the node (with its subtree) at `path`.
    pub fn node_at(&self, path: &[usize]) -> Option<OutlineNode> {
        node_at(&self.roots, path).cloned()
    }

    /// Copies of the sections on `page`, top to bottom.
    pub fn sections_on_page(&self, page: u32) -> Vec<Section> {
        self.indices
            .page(page)
            .map(|sections| sections.by_y().into_iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn nearest_title(&self, id: SectionId) -> Option<String> {
        self.indices.nearest_title(id).map(str::to_string)
    }

    /// Ancestors of the section with `uuid`, outermost first.
    pub fn ancestors_by_uuid(&self, uuid: Uuid) -> Vec<Section> {
        let Some(section) = self
            .indices
            .id_to_section()
            .values()
            .find(|section| section.uuid() == uuid)
        else {
            return Vec::new();
        };
        let Some(path) = self.indices.path(section.id()) else {
            return Vec::new();
        };

        path.ancestors()
            .filter_map(|prefix| node_at(&self.roots, &prefix))
            .map(|node| node.section.clone())
            .collect()
    }

    /// Copies of every section in document order.
    pub fn document_order(&self) -> Vec<Section> {
        self.indices.document_order().into_iter().cloned().collect()
    }

    /// The section current at a reading position.
    pub fn nearest_section(&self, page: u32, y: f64) -> Option<Section> {
        locator::nearest_section(&self.indices, page, y)
    }

    pub fn next_section(&self, id: SectionId) -> Option<Section> {
        self.indices.next_section(id).cloned()
    }

    pub fn prev_section(&self, id: SectionId) -> Option<Section> {
        self.indices.prev_section(id).cloned()
    }

    /// Whether the node with `id` is open in the outline view.
    pub fn is_expanded(&self, id: SectionId) -> bool {
        self.expanded.contains(&id)
    }

    pub fn expanded(&self) -> &BTreeSet<SectionId> {
        &self.expanded
    }

    /// Format the outline as indented text.
    pub fn format(&self) -> String {
        let mut result = format!("Outline: {} ({} sections)\n", self.mode, self.len());
        result.push_str(&"─".repeat(50));
        result.push('\n');

        for node in &self.roots {
            result.push_str(&node.format_tree(0));
        }

        result
    }
}

/// A prepared edit: the new tree, nodes to open and the deltas to mirror.
struct Draft {
    id: SectionId,
    roots: Vec<OutlineNode>,
    expand: Vec<SectionId>,
    changes: Vec<SyncChange>,
}

/// Single writer over the displayed outline.
pub struct OutlineEngine<A: SyncAdapter = NoopSync> {
    ai_toc: Vec<OutlineNode>,
    bookmarks: Vec<OutlineNode>,
    current: Arc<OutlineSnapshot>,
    settings: OutlineSettings,
    adapter: A,
}

impl OutlineEngine<NoopSync> {
    /// Engine without persistence.
    pub fn detached(ai_toc: Vec<OutlineNode>, bookmarks: Vec<OutlineNode>, settings: OutlineSettings) -> Self {
        Self::new(ai_toc, bookmarks, settings, NoopSync)
    }
}

impl<A: SyncAdapter> OutlineEngine<A> {
    /// Create an engine over two loaded outlines, showing `settings.default_mode`.
    pub fn new(
        ai_toc: Vec<OutlineNode>,
        bookmarks: Vec<OutlineNode>,
        settings: OutlineSettings,
        adapter: A,
    ) -> Self {
        let mode = settings.default_mode;
        let roots = match mode {
            OutlineMode::AiToc => ai_toc.clone(),
            OutlineMode::Bookmarks => bookmarks.clone(),
        };
        let expanded = default_expanded(&roots, &settings);
        let current = Arc::new(OutlineSnapshot::build(mode, roots, expanded));

        Self {
            ai_toc,
            bookmarks,
            current,
            settings,
            adapter,
        }
    }

    /// Create an engine over both outlines of a persisted document.
    pub fn from_document(document: &OutlineDocument, settings: OutlineSettings, adapter: A) -> Self {
        Self::new(
            document.roots(OutlineMode::AiToc),
            document.roots(OutlineMode::Bookmarks),
            settings,
            adapter,
        )
    }

    /// The published snapshot.
    pub fn snapshot(&self) -> Arc<OutlineSnapshot> {
        Arc::clone(&self.current)
    }

    pub fn mode(&self) -> OutlineMode {
        self.current.mode
    }

    pub fn settings(&self) -> &OutlineSettings {
        &self.settings
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn into_adapter(self) -> A {
        self.adapter
    }

    /// Promote a node one level.
    ///
    /// The node leaves its parent, takes its younger siblings as its own
    /// last children and is placed right after its former parent.
    pub fn left_indent(&mut self, id: SectionId) -> Result<EditOutcome> {
        self.commit("left-indent", |snapshot| {
            let path = resolve(snapshot, id)?;
            if path.len() < 2 {
                return Err(OutlineError::NotIndentable {
                    id,
                    reason: "already at the top level",
                });
            }

            let parent_path = path.parent();
            let grand_path = parent_path.parent();
            let (Some(index), Some(parent_index)) = (path.index(), parent_path.index()) else {
                return Err(OutlineError::PathNotFound(path));
            };
            let new_parent_id = node_at(&snapshot.roots, &grand_path).map(OutlineNode::id);

            let mut roots = snapshot.roots.clone();
            let siblings = children_at_mut(&mut roots, &parent_path)
                .ok_or(OutlineError::MissingParent(id))?;
            let mut node = siblings.remove(index);
            let younger: Vec<OutlineNode> = siblings.drain(index..).collect();
            let new_children_ids = younger.iter().map(OutlineNode::id).collect();
            node.children.extend(younger);

            let grand_siblings = children_at_mut(&mut roots, &grand_path)
                .ok_or(OutlineError::MissingParent(id))?;
            grand_siblings.insert(parent_index + 1, node);

            Ok(Draft {
                id,
                roots,
                expand: vec![id],
                changes: vec![SyncChange::LeftIndent {
                    id,
                    new_parent_id,
                    new_children_ids,
                }],
            })
        })
    }

    /// Demote a node one level: it becomes the last child of its preceding
    /// sibling.
    pub fn right_indent(&mut self, id: SectionId) -> Result<EditOutcome> {
        self.commit("right-indent", |snapshot| {
            let path = resolve(snapshot, id)?;
            let index = path.index().ok_or_else(|| OutlineError::PathNotFound(path.clone()))?;
            if index == 0 {
                return Err(OutlineError::NotIndentable {
                    id,
                    reason: "no preceding sibling",
                });
            }

            let mut roots = snapshot.roots.clone();
            let siblings = children_at_mut(&mut roots, &path.parent())
                .ok_or(OutlineError::MissingParent(id))?;
            let node = siblings.remove(index);
            let new_parent = &mut siblings[index - 1];
            let new_parent_id = new_parent.id();
            new_parent.children.push(node);

            Ok(Draft {
                id,
                roots,
                expand: vec![new_parent_id],
                changes: vec![SyncChange::RightIndent { id, new_parent_id }],
            })
        })
    }

    /// Remove a node from the outline.
    ///
    /// Nodes with children are refused under [`DeletePolicy::Reject`]; under
    /// [`DeletePolicy::DropSubtree`] the whole subtree goes and every removed
    /// entry is hidden in the persisted outline.
    pub fn delete(&mut self, id: SectionId) -> Result<EditOutcome> {
        let policy = self.settings.delete_policy;
        self.commit("delete", |snapshot| {
            let path = resolve(snapshot, id)?;
            let index = path.index().ok_or_else(|| OutlineError::PathNotFound(path.clone()))?;
            let node = node_at(&snapshot.roots, &path)
                .ok_or_else(|| OutlineError::PathNotFound(path.clone()))?;

            if node.has_children() {
                match policy {
                    DeletePolicy::Reject => {
                        return Err(OutlineError::HasChildren {
                            id,
                            children: node.children.len(),
                        });
                    }
                    DeletePolicy::DropSubtree => {
                        warn!(id, descendants = node.node_count() - 1, "deleting section with its subtree");
                    }
                }
            }
            let removed = node.subtree_ids();

            let mut roots = snapshot.roots.clone();
            let siblings = children_at_mut(&mut roots, &path.parent())
                .ok_or(OutlineError::MissingParent(id))?;
            siblings.remove(index);

            Ok(Draft {
                id,
                roots,
                expand: Vec::new(),
                changes: removed.into_iter().map(|id| SyncChange::Delete { id }).collect(),
            })
        })
    }

    /// Replace the bookmark title of a section.
    pub fn rename(&mut self, id: SectionId, title: impl Into<String>) -> Result<EditOutcome> {
        let title = title.into();
        self.commit("rename", |snapshot| {
            let path = resolve(snapshot, id)?;

            let mut roots = snapshot.roots.clone();
            let node = node_at_mut(&mut roots, &path).ok_or_else(|| OutlineError::PathNotFound(path.clone()))?;
            node.section = node.section.with_bookmark_title(Some(title.clone()));

            Ok(Draft {
                id,
                roots,
                expand: Vec::new(),
                changes: vec![SyncChange::Rename { id, title }],
            })
        })
    }

    /// Add a bookmark at `(page, y)`.
    ///
    /// The bookmark becomes the first child of the nearest section at or
    /// before that position, or the first root when nothing precedes it.
    /// The new node's ancestors are opened.
    pub fn insert_bookmark(&mut self, title: impl Into<String>, page: u32, y: f64) -> Result<EditOutcome> {
        self.insert_bookmark_with(title.into(), page, y, rand::random::<SectionId>)
    }

    fn insert_bookmark_with<R>(&mut self, title: String, page: u32, y: f64, draw: R) -> Result<EditOutcome>
    where
        R: FnMut() -> SectionId,
    {
        let mode = self.current.mode;
        let id = fresh_id(
            |id| self.current.indices.contains(id) || self.adapter.knows_id(mode, id),
            draw,
        );

        self.commit("insert", |snapshot| {
            if !y.is_finite() {
                return Err(OutlineError::InvalidPosition { page, y });
            }

            let section = Section::new_bookmark(id, title, page, y);

            let mut nearest: Option<&Section> = None;
            for candidate in snapshot.indices.document_order() {
                if !candidate.is_at_or_before(page, y) {
                    continue;
                }
                let closer = nearest.is_none_or(|best| {
                    candidate.page() > best.page()
                        || (candidate.page() == best.page() && candidate.y() > best.y())
                });
                if closer {
                    nearest = Some(candidate);
                }
            }

            let mut roots = snapshot.roots.clone();
            let node = OutlineNode::new(section.clone());
            let (parent_id, expand) = match nearest {
                Some(parent) => {
                    let parent_path = resolve(snapshot, parent.id())?;
                    let siblings = children_at_mut(&mut roots, &parent_path)
                        .ok_or(OutlineError::MissingParent(id))?;
                    siblings.insert(0, node);

                    let mut expand: Vec<SectionId> = parent_path
                        .ancestors()
                        .filter_map(|prefix| node_at(&snapshot.roots, &prefix).map(OutlineNode::id))
                        .collect();
                    expand.push(parent.id());
                    (Some(parent.id()), expand)
                }
                None => {
                    roots.insert(0, node);
                    (None, Vec::new())
                }
            };

            Ok(Draft {
                id,
                roots,
                expand,
                changes: vec![SyncChange::Insert {
                    section,
                    parent_id,
                    insert_index: Some(0),
                }],
            })
        })
    }

    /// Show the other outline.
    ///
    /// The displayed tree, edits included, is kept as its mode's original and
    /// replaced by a deep copy of the other original. Open state is reset.
    pub fn switch_mode(&mut self) -> OutlineMode {
        let from = self.current.mode;
        let to = from.other();

        let edited = self.current.roots.clone();
        match from {
            OutlineMode::AiToc => self.ai_toc = edited,
            OutlineMode::Bookmarks => self.bookmarks = edited,
        }

        let roots = match to {
            OutlineMode::AiToc => self.ai_toc.clone(),
            OutlineMode::Bookmarks => self.bookmarks.clone(),
        };
        let expanded = default_expanded(&roots, &self.settings);
        self.current = Arc::new(OutlineSnapshot::build(to, roots, expanded));

        debug!(from = %from, to = %to, sections = self.current.len(), "switched outline mode");
        to
    }

    /// Show `mode`, switching only if it is not already shown.
    pub fn set_mode(&mut self, mode: OutlineMode) -> OutlineMode {
        if self.current.mode != mode {
            self.switch_mode();
        }
        self.current.mode
    }

    /// Open or close a node in the outline view. Returns the new state, or
    /// `None` for an unknown id.
    pub fn toggle_expanded(&mut self, id: SectionId) -> Option<bool> {
        if !self.current.indices.contains(id) {
            return None;
        }
        let mut snapshot = (*self.current).clone();
        let open = if snapshot.expanded.remove(&id) {
            false
        } else {
            snapshot.expanded.insert(id);
            true
        };
        self.current = Arc::new(snapshot);
        Some(open)
    }

    /// Run one edit: plan it against the current snapshot, mirror it, publish.
    fn commit<F>(&mut self, op: &'static str, plan: F) -> Result<EditOutcome>
    where
        F: FnOnce(&OutlineSnapshot) -> Result<Draft>,
    {
        let snapshot = Arc::clone(&self.current);
        let draft = match plan(&*snapshot) {
            Ok(draft) => draft,
            Err(err) => {
                warn!(op, mode = %snapshot.mode, error = %err, "outline edit abandoned");
                return Ok(EditOutcome::Abandoned(err));
            }
        };

        match self.adapter.apply_all(snapshot.mode, &draft.changes) {
            Ok(()) => {}
            Err(SyncError::Desync(message)) => {
                warn!(op, id = draft.id, %message, "sync adapter out of sync; edit not published");
                return Err(OutlineError::SyncDesync(message));
            }
            Err(err @ SyncError::Rejected(_)) => {
                warn!(op, id = draft.id, error = %err, "sync adapter rejected change");
            }
        }

        let mut expanded = snapshot.expanded.clone();
        expanded.extend(draft.expand);
        self.current = Arc::new(OutlineSnapshot::build(snapshot.mode, draft.roots, expanded));

        debug!(op, id = draft.id, sections = self.current.len(), "outline edit applied");
        Ok(EditOutcome::Applied(draft.id))
    }
}

/// Path for `id`, checked against the tree.
fn resolve(snapshot: &OutlineSnapshot, id: SectionId) -> Result<NodePath> {
    let path = snapshot
        .indices
        .path(id)
        .cloned()
        .ok_or(OutlineError::UnknownSection(id))?;
    match node_at(&snapshot.roots, &path) {
        Some(node) if node.id() == id => Ok(path),
        _ => Err(OutlineError::PathNotFound(path)),
    }
}

/// First non-zero drawn id that is not `taken`.
fn fresh_id<T, R>(taken: T, mut draw: R) -> SectionId
where
    T: Fn(SectionId) -> bool,
    R: FnMut() -> SectionId,
{
    loop {
        let id = draw();
        if id != 0 && !taken(id) {
            return id;
        }
    }
}

/// A lone top-level item starts open.
fn default_expanded(roots: &[OutlineNode], settings: &OutlineSettings) -> BTreeSet<SectionId> {
    match roots {
        [only] if settings.auto_expand_single_root => BTreeSet::from([only.id()]),
        _ => BTreeSet::new(),
    }
}
