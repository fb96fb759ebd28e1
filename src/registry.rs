//! Per-document store registry.
//!
//! Stores (term stores, outline engines) exist once per document. A consumer
//! acquires the store for a document id, which creates it on first use, and
//! releases it when done; the store is dropped when its last consumer
//! releases it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

struct Entry<S> {
    store: Arc<S>,
    consumers: usize,
}

/// Registry of stores keyed by document id.
pub struct Registry<S> {
    entries: Mutex<HashMap<String, Entry<S>>>,
}

impl<S> Default for Registry<S> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<S> Registry<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the store for `document_id`, creating it with `init` on first use.
    pub fn acquire(&self, document_id: &str, init: impl FnOnce() -> S) -> Arc<S> {
        let mut entries = self.lock();
        let entry = entries.entry(document_id.to_string()).or_insert_with(|| {
            debug!(document = document_id, "creating document store");
            Entry {
                store: Arc::new(init()),
                consumers: 0,
            }
        });
        entry.consumers += 1;
        Arc::clone(&entry.store)
    }

    /// Give up one consumer's hold. Returns `true` when the store was dropped.
    pub fn release(&self, document_id: &str) -> bool {
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(document_id) else {
            return false;
        };

        entry.consumers = entry.consumers.saturating_sub(1);
        if entry.consumers == 0 {
            entries.remove(document_id);
            debug!(document = document_id, "dropped document store");
            true
        } else {
            false
        }
    }

    /// The store for `document_id` without taking a hold on it.
    pub fn get(&self, document_id: &str) -> Option<Arc<S>> {
        self.lock()
            .get(document_id)
            .map(|entry| Arc::clone(&entry.store))
    }

    /// Current number of consumers for `document_id`.
    pub fn consumers(&self, document_id: &str) -> usize {
        self.lock()
            .get(document_id)
            .map_or(0, |entry| entry.consumers)
    }

    /// Number of live stores.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry<S>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glossary::{RawTerm, TermStore};

    #[test]
    fn test_acquire_creates_once() {
        let registry: Registry<TermStore> = Registry::new();
        let first = registry.acquire("doc", || TermStore::new("doc"));
        let second = registry.acquire("doc", || panic!("store should already exist"));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.consumers("doc"), 2);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_release_drops_on_last_consumer() {
        let registry: Registry<TermStore> = Registry::new();
        registry.acquire("doc", || TermStore::new("doc"));
        registry.acquire("doc", || TermStore::new("doc"));

        assert!(!registry.release("doc"));
        assert!(registry.get("doc").is_some());
        assert!(registry.release("doc"));
        assert!(registry.get("doc").is_none());
        assert!(registry.is_empty());
        assert!(!registry.release("doc"));
    }

    #[test]
    fn test_shared_store_loads_once() {
        let registry: Registry<TermStore> = Registry::new();
        let a = registry.acquire("doc", || TermStore::new("doc"));
        let b = registry.acquire("doc", || TermStore::new("doc"));

        let terms = || {
            Ok(vec![RawTerm {
                id: 1,
                term: "Borrower".into(),
                definition: None,
                num_refs: 1,
            }])
        };
        assert!(a.load(terms).unwrap());
        assert!(!b.load(terms).unwrap());
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn test_documents_are_independent() {
        let registry: Registry<TermStore> = Registry::new();
        let a = registry.acquire("a", || TermStore::new("a"));
        let b = registry.acquire("b", || TermStore::new("b"));
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(b.document_id(), "b");
    }
}
