//! Glossary terms and their search store.
//!
//! A [`TermStore`] holds the defined terms of one document. It is filled
//! once by [`TermStore::load`]; later loads are no-ops. Searches use the same
//! tiered ranking as section search.

use crate::error::Result;
use crate::ranking::{RankQuery, Searchable};
use crate::section::decode_entities;
use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

/// Glossary term as supplied by the term source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct RawTerm {
    pub id: u64,
    pub term: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    #[serde(default)]
    pub num_refs: u32,
}

/// A defined term.
#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    pub id: u64,
    /// Entity-decoded term text.
    pub term: String,
    pub definition: Option<String>,
    pub num_refs: u32,
    search_key: String,
}

impl Term {
    pub fn from_raw(raw: &RawTerm) -> Self {
        let term = decode_entities(&raw.term).into_owned();
        Self {
            id: raw.id,
            search_key: term.to_lowercase(),
            term,
            definition: raw
                .definition
                .as_deref()
                .map(|d| decode_entities(d).into_owned()),
            num_refs: raw.num_refs,
        }
    }
}

impl Searchable for Term {
    fn search_key(&self) -> &str {
        &self.search_key
    }

    fn reference_count(&self) -> u32 {
        self.num_refs
    }
}

#[derive(Debug, Default)]
struct Glossary {
    terms: Vec<Term>,
    by_id: HashMap<u64, usize>,
}

#[derive(Debug)]
enum LoadState {
    Empty,
    Loaded(Glossary),
}

/// Read-only term index for one document.
#[derive(Debug)]
pub struct TermStore {
    document_id: String,
    state: Mutex<LoadState>,
}

impl TermStore {
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            state: Mutex::new(LoadState::Empty),
        }
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    /// Fill the store from `loader`.
    ///
    /// Returns `Ok(true)` when this call loaded the terms and `Ok(false)` when
    /// the store was already loaded. Concurrent callers wait for the first
    /// load and then see it as done. A failed load leaves the store empty.
    pub fn load<F>(&self, loader: F) -> Result<bool>
    where
        F: FnOnce() -> Result<Vec<RawTerm>>,
    {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(*state, LoadState::Loaded(_)) {
            debug!(document = %self.document_id, "glossary already loaded");
            return Ok(false);
        }

        let raw = loader().inspect_err(|e| {
            warn!(document = %self.document_id, error = %e, "glossary load failed");
        })?;

        let mut glossary = Glossary::default();
        for item in &raw {
            if glossary.by_id.contains_key(&item.id) {
                warn!(document = %self.document_id, id = item.id, "duplicate term id; keeping the first");
                continue;
            }
            glossary.by_id.insert(item.id, glossary.terms.len());
            glossary.terms.push(Term::from_raw(item));
        }

        debug!(document = %self.document_id, terms = glossary.terms.len(), "glossary loaded");
        *state = LoadState::Loaded(glossary);
        Ok(true)
    }

    pub fn is_loaded(&self) -> bool {
        matches!(*self.lock(), LoadState::Loaded(_))
    }

    /// Number of loaded terms.
    pub fn len(&self) -> usize {
        match &*self.lock() {
            LoadState::Loaded(glossary) => glossary.terms.len(),
            LoadState::Empty => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look a term up by id.
    pub fn term(&self, id: u64) -> Option<Term> {
        match &*self.lock() {
            LoadState::Loaded(glossary) => glossary
                .by_id
                .get(&id)
                .map(|&i| glossary.terms[i].clone()),
            LoadState::Empty => None,
        }
    }

    /// All terms in load order.
    pub fn terms(&self) -> Vec<Term> {
        match &*self.lock() {
            LoadState::Loaded(glossary) => glossary.terms.clone(),
            LoadState::Empty => Vec::new(),
        }
    }

    /// Ranked search over the terms; at most `limit` results.
    pub fn search(&self, query: &str, limit: usize) -> Vec<Term> {
        let Some(compiled) = RankQuery::new(query) else {
            return Vec::new();
        };

        match &*self.lock() {
            LoadState::Loaded(glossary) => compiled
                .rank(&glossary.terms)
                .into_iter()
                .take(limit)
                .map(|i| glossary.terms[i].clone())
                .collect(),
            LoadState::Empty => Vec::new(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LoadState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
