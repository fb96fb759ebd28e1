//! Mirroring outline edits into the persisted outline.
//!
//! After every structural edit the engine describes the delta as a
//! [`SyncChange`] and hands it to a [`SyncAdapter`]. Adapters are
//! fire-and-forget except for [`SyncError::Desync`]: when the adapter's
//! backing structure no longer has the entries an edit refers to, carrying on
//! would corrupt the persisted outline, so the edit is refused.

use crate::error::SectionId;
use crate::section::Section;
use crate::tree::{OutlineDocument, OutlineMode, RawOutlineItem};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

/// One structural delta.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncChange {
    Rename {
        id: SectionId,
        title: String,
    },
    Delete {
        id: SectionId,
    },
    LeftIndent {
        id: SectionId,
        new_parent_id: Option<SectionId>,
        new_children_ids: Vec<SectionId>,
    },
    RightIndent {
        id: SectionId,
        new_parent_id: SectionId,
    },
    Insert {
        section: Section,
        parent_id: Option<SectionId>,
        insert_index: Option<usize>,
    },
}

impl SyncChange {
    /// Id of the section the change is about.
    pub fn id(&self) -> SectionId {
        match self {
            SyncChange::Rename { id, .. }
            | SyncChange::Delete { id }
            | SyncChange::LeftIndent { id, .. }
            | SyncChange::RightIndent { id, .. } => *id,
            SyncChange::Insert { section, .. } => section.id(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SyncChange::Rename { .. } => "rename",
            SyncChange::Delete { .. } => "delete",
            SyncChange::LeftIndent { .. } => "left-indent",
            SyncChange::RightIndent { .. } => "right-indent",
            SyncChange::Insert { .. } => "insert",
        }
    }
}

/// Failure reported by an adapter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    /// The backing structure lacks an entry the change refers to.
    #[error("persisted outline is missing {0}")]
    Desync(String),

    /// The adapter declined the change; the edit still stands.
    #[error("change rejected: {0}")]
    Rejected(String),
}

/// Receiver of outline deltas.
pub trait SyncAdapter {
    fn apply(&mut self, mode: OutlineMode, change: &SyncChange) -> Result<(), SyncError>;

    /// Mirror every change of one edit, in order.
    ///
    /// Rejected changes are logged and skipped. The first desync stops the
    /// batch; this default cannot undo the changes already forwarded, so
    /// adapters with state of their own override it to apply all or nothing.
    fn apply_all(&mut self, mode: OutlineMode, changes: &[SyncChange]) -> Result<(), SyncError> {
        for change in changes {
            match self.apply(mode, change) {
                Err(err @ SyncError::Rejected(_)) => {
                    warn!(mode = %mode, id = change.id(), error = %err, "sync adapter rejected change");
                }
                result => result?,
            }
        }
        Ok(())
    }

    /// Whether the backing structure already holds an entry with `id`,
    /// hidden ones included. New ids are drawn to avoid these.
    fn knows_id(&self, _mode: OutlineMode, _id: SectionId) -> bool {
        false
    }
}

/// Adapter that discards every change.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSync;

impl SyncAdapter for NoopSync {
    fn apply(&mut self, _mode: OutlineMode, _change: &SyncChange) -> Result<(), SyncError> {
        Ok(())
    }
}

/// Adapter that mirrors changes into an [`OutlineDocument`].
///
/// Deletes are soft: the entry stays in place with `show_bookmark = false`.
#[derive(Debug, Clone)]
pub struct PersistedOutline {
    document: OutlineDocument,
    applied: usize,
}

impl PersistedOutline {
    pub fn new(document: OutlineDocument) -> Self {
        Self {
            document,
            applied: 0,
        }
    }

    pub fn document(&self) -> &OutlineDocument {
        &self.document
    }

    pub fn into_document(self) -> OutlineDocument {
        self.document
    }

    /// Number of changes mirrored so far.
    pub fn applied_changes(&self) -> usize {
        self.applied
    }
}

impl SyncAdapter for PersistedOutline {
    fn apply(&mut self, mode: OutlineMode, change: &SyncChange) -> Result<(), SyncError> {
        self.apply_all(mode, std::slice::from_ref(change))
    }

    /// Applies the batch to a copy of the outline and keeps the copy only
    /// when every change went through.
    fn apply_all(&mut self, mode: OutlineMode, changes: &[SyncChange]) -> Result<(), SyncError> {
        let mut items = self.document.items(mode).to_vec();
        for change in changes {
            apply_change(&mut items, change)?;
            debug!(mode = %mode, op = change.kind(), id = change.id(), "mirrored outline change");
        }

        *self.document.items_mut(mode) = items;
        self.applied += changes.len();
        Ok(())
    }

    fn knows_id(&self, mode: OutlineMode, id: SectionId) -> bool {
        find_path(self.document.items(mode), id).is_some()
    }
}

fn apply_change(items: &mut Vec<RawOutlineItem>, change: &SyncChange) -> Result<(), SyncError> {
    match change {
        SyncChange::Rename { id, title } => {
            item_mut(items, *id)?.bookmark_title = Some(title.clone());
        }
        SyncChange::Delete { id } => {
            item_mut(items, *id)?.show_bookmark = false;
        }
        SyncChange::RightIndent { id, new_parent_id } => {
            require(items, *new_parent_id)?;
            let node = take(items, *id)?;
            let parent_path = require(items, *new_parent_id)?;
            let parent = item_at_mut(items, &parent_path)
                .ok_or_else(|| missing(*new_parent_id))?;
            parent.children.push(node);
        }
        SyncChange::LeftIndent {
            id,
            new_children_ids,
            ..
        } => {
            let path = require(items, *id)?;
            if path.len() < 2 {
                return Err(SyncError::Desync(format!("a parent for entry {}", id)));
            }
            let old_parent_id = item_at(items, &path[..path.len() - 1])
                .map(|parent| parent.id)
                .ok_or_else(|| missing(*id))?;
            for child in new_children_ids {
                require(items, *child)?;
            }

            let mut node = take(items, *id)?;
            for child in new_children_ids {
                node.children.push(take(items, *child)?);
            }

            let parent_path = require(items, old_parent_id)?;
            let (index, grand_path) = parent_path
                .split_last()
                .ok_or_else(|| missing(old_parent_id))?;
            let siblings = siblings_mut(items, grand_path).ok_or_else(|| missing(old_parent_id))?;
            siblings.insert(index + 1, node);
        }
        SyncChange::Insert {
            section,
            parent_id,
            insert_index,
        } => {
            if find_path(items, section.id()).is_some() {
                return Err(SyncError::Desync(format!(
                    "a free slot for new entry {} (id already present)",
                    section.id()
                )));
            }
            let siblings = match parent_id {
                Some(parent_id) => {
                    let path = require(items, *parent_id)?;
                    &mut item_at_mut(items, &path)
                        .ok_or_else(|| missing(*parent_id))?
                        .children
                }
                None => items,
            };
            let index = insert_index.unwrap_or(siblings.len()).min(siblings.len());
            siblings.insert(index, section.to_raw());
        }
    }
    Ok(())
}

fn missing(id: SectionId) -> SyncError {
    SyncError::Desync(format!("entry {}", id))
}

fn find_path(items: &[RawOutlineItem], id: SectionId) -> Option<Vec<usize>> {
    for (index, item) in items.iter().enumerate() {
        if item.id == id {
            return Some(vec![index]);
        }
        if let Some(mut rest) = find_path(&item.children, id) {
            rest.insert(0, index);
            return Some(rest);
        }
    }
    None
}

fn require(items: &[RawOutlineItem], id: SectionId) -> Result<Vec<usize>, SyncError> {
    find_path(items, id).ok_or_else(|| missing(id))
}

fn item_at<'a>(items: &'a [RawOutlineItem], path: &[usize]) -> Option<&'a RawOutlineItem> {
    let (first, rest) = path.split_first()?;
    let mut item = items.get(*first)?;
    for index in rest {
        item = item.children.get(*index)?;
    }
    Some(item)
}

fn item_at_mut<'a>(items: &'a mut [RawOutlineItem], path: &[usize]) -> Option<&'a mut RawOutlineItem> {
    let (first, rest) = path.split_first()?;
    let mut item = items.get_mut(*first)?;
    for index in rest {
        item = item.children.get_mut(*index)?;
    }
    Some(item)
}

fn item_mut(items: &mut [RawOutlineItem], id: SectionId) -> Result<&mut RawOutlineItem, SyncError> {
    let path = require(items, id)?;
    item_at_mut(items, &path).ok_or_else(|| missing(id))
}

fn siblings_mut<'a>(
    items: &'a mut Vec<RawOutlineItem>,
    parent: &[usize],
) -> Option<&'a mut Vec<RawOutlineItem>> {
    if parent.is_empty() {
        return Some(items);
    }
    item_at_mut(items, parent).map(|item| &mut item.children)
}

/// Remove the entry (and its subtree) with `id`.
fn take(items: &mut Vec<RawOutlineItem>, id: SectionId) -> Result<RawOutlineItem, SyncError> {
    let path = require(items, id)?;
    let (index, parent) = path.split_last().ok_or_else(|| missing(id))?;
    let siblings = siblings_mut(items, parent).ok_or_else(|| missing(id))?;
    Ok(siblings.remove(*index))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document() -> OutlineDocument {
        let mut doc = OutlineDocument::new("Agreement", 40);
        doc.bookmarks = vec![
            RawOutlineItem::new(1, "A", 0, 0.0)
                .with_child(RawOutlineItem::new(2, "B", 1, 0.0))
                .with_child(RawOutlineItem::new(3, "C", 2, 0.0))
                .with_child(RawOutlineItem::new(4, "D", 3, 0.0)),
            RawOutlineItem::new(5, "E", 4, 0.0),
        ];
        doc
    }

    fn shape(items: &[RawOutlineItem]) -> String {
        items
            .iter()
            .map(|item| {
                if item.children.is_empty() {
                    item.title.clone()
                } else {
                    format!("{}>[{}]", item.title, shape(&item.children))
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    #[test]
    fn test_rename_and_soft_delete() {
        let mut store = PersistedOutline::new(document());
        store
            .apply(OutlineMode::Bookmarks, &SyncChange::Rename { id: 3, title: "Gamma".into() })
            .unwrap();
        store
            .apply(OutlineMode::Bookmarks, &SyncChange::Delete { id: 4 })
            .unwrap();

        let items = &store.document().bookmarks;
        assert_eq!(items[0].children[1].bookmark_title.as_deref(), Some("Gamma"));
        assert!(!items[0].children[2].show_bookmark);
        assert_eq!(items[0].children.len(), 3);
        assert_eq!(store.applied_changes(), 2);
    }

    #[test]
    fn test_left_indent() {
        let mut store = PersistedOutline::new(document());
        store
            .apply(
                OutlineMode::Bookmarks,
                &SyncChange::LeftIndent {
                    id: 3,
                    new_parent_id: None,
                    new_children_ids: vec![4],
                },
            )
            .unwrap();
        assert_eq!(shape(&store.document().bookmarks), "A>[B], C>[D], E");
    }

    #[test]
    fn test_right_indent() {
        let mut store = PersistedOutline::new(document());
        store
            .apply(
                OutlineMode::Bookmarks,
                &SyncChange::RightIndent { id: 3, new_parent_id: 2 },
            )
            .unwrap();
        assert_eq!(shape(&store.document().bookmarks), "A>[B>[C], D], E");
    }

    #[test]
    fn test_insert() {
        let mut store = PersistedOutline::new(document());
        let section = Section::new_bookmark(9, "Note", 1, 5.0);
        store
            .apply(
                OutlineMode::Bookmarks,
                &SyncChange::Insert {
                    section,
                    parent_id: Some(2),
                    insert_index: Some(0),
                },
            )
            .unwrap();
        assert_eq!(shape(&store.document().bookmarks), "A>[B>[Note], C, D], E");
    }

    #[test]
    fn test_missing_entry_is_desync() {
        let mut store = PersistedOutline::new(document());
        let result = store.apply(OutlineMode::Bookmarks, &SyncChange::Delete { id: 42 });
        assert!(matches!(result, Err(SyncError::Desync(_))));

        // The other outline is empty, so even a known id is missing there.
        let result = store.apply(OutlineMode::AiToc, &SyncChange::Delete { id: 1 });
        assert!(matches!(result, Err(SyncError::Desync(_))));
        assert_eq!(store.applied_changes(), 0);
    }

    #[test]
    fn test_failed_right_indent_leaves_document_untouched() {
        let mut store = PersistedOutline::new(document());
        let before = store.document().clone();
        let result = store.apply(
            OutlineMode::Bookmarks,
            &SyncChange::RightIndent { id: 3, new_parent_id: 77 },
        );
        assert!(result.is_err());
        assert_eq!(store.document(), &before);
    }

    #[test]
    fn test_batch_with_late_desync_leaves_document_untouched() {
        let mut store = PersistedOutline::new(document());
        let before = store.document().clone();
        let changes = [
            SyncChange::Delete { id: 1 },
            SyncChange::Delete { id: 2 },
            SyncChange::Delete { id: 42 },
        ];

        let result = store.apply_all(OutlineMode::Bookmarks, &changes);
        assert!(matches!(result, Err(SyncError::Desync(_))));
        assert_eq!(store.document(), &before);
        assert!(store.document().bookmarks[0].show_bookmark);
        assert_eq!(store.applied_changes(), 0);
    }

    #[test]
    fn test_batch_applies_in_order() {
        let mut store = PersistedOutline::new(document());
        let changes = [
            SyncChange::RightIndent { id: 3, new_parent_id: 2 },
            SyncChange::Rename { id: 3, title: "Gamma".into() },
        ];

        store.apply_all(OutlineMode::Bookmarks, &changes).unwrap();
        assert_eq!(shape(&store.document().bookmarks), "A>[B>[C], D], E");
        assert_eq!(
            store.document().bookmarks[0].children[0].children[0].bookmark_title.as_deref(),
            Some("Gamma")
        );
        assert_eq!(store.applied_changes(), 2);
    }

    #[test]
    fn test_knows_hidden_ids() {
        let mut store = PersistedOutline::new(document());
        store
            .apply(OutlineMode::Bookmarks, &SyncChange::Delete { id: 4 })
            .unwrap();

        assert!(store.knows_id(OutlineMode::Bookmarks, 4));
        assert!(store.knows_id(OutlineMode::Bookmarks, 5));
        assert!(!store.knows_id(OutlineMode::Bookmarks, 42));
        assert!(!store.knows_id(OutlineMode::AiToc, 4));
        assert!(!NoopSync.knows_id(OutlineMode::Bookmarks, 4));
    }

    /// Adapter that records changes and rejects one id.
    #[derive(Default)]
    struct Picky {
        seen: Vec<SectionId>,
        reject: Option<SectionId>,
    }

    impl SyncAdapter for Picky {
        fn apply(&mut self, _mode: OutlineMode, change: &SyncChange) -> Result<(), SyncError> {
            if self.reject == Some(change.id()) {
                return Err(SyncError::Rejected(format!("entry {}", change.id())));
            }
            self.seen.push(change.id());
            Ok(())
        }
    }

    #[test]
    fn test_default_batch_skips_rejected_changes() {
        let mut adapter = Picky {
            reject: Some(2),
            ..Picky::default()
        };
        let changes = [
            SyncChange::Delete { id: 1 },
            SyncChange::Delete { id: 2 },
            SyncChange::Delete { id: 3 },
        ];

        adapter.apply_all(OutlineMode::Bookmarks, &changes).unwrap();
        assert_eq!(adapter.seen, vec![1, 3]);
    }

    #[test]
    fn test_change_serializes_with_op_tag() {
        let json = serde_json::to_string(&SyncChange::Delete { id: 7 }).unwrap();
        assert_eq!(json, r#"{"op":"DELETE","id":7}"#);
    }
}
