//! Rust Page Outline - outline trees for navigating paginated documents.
//!
//! A document carries two outlines: one generated from its structure
//! ("ai-toc") and one of reader bookmarks. This library keeps whichever is on
//! display as a tree of [`Section`]s, derives lookup indices from it, edits it
//! (indent, outdent, delete, rename, add bookmark) and answers "which section
//! am I in" and "find me that section" queries.
//!
//! # Quick Start
//!
//! ```no_run
//! use rust_page_outline::{
//!     config::Config,
//!     engine::OutlineEngine,
//!     persistence::{load_document, save_document},
//!     search::{SearchOptions, search_sections},
//!     sync::PersistedOutline,
//! };
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     config.validate()?;
//!
//!     // Load both outlines of a document
//!     let path = Path::new("outline.json");
//!     let document = load_document(path)?;
//!
//!     // Edits are mirrored into the persisted outline
//!     let adapter = PersistedOutline::new(document.clone());
//!     let mut engine = OutlineEngine::from_document(&document, config.outline.clone(), adapter);
//!     engine.rename(42, "Pricing")?;
//!
//!     // Readers work on an immutable snapshot
//!     let snapshot = engine.snapshot();
//!     if let Some(section) = snapshot.nearest_section(3, 250.0) {
//!         println!("reading: {}", section.display_title());
//!     }
//!     for section in search_sections(&snapshot, "notice", &SearchOptions::from(&config.search)) {
//!         println!("{}", section.full_descriptor());
//!     }
//!
//!     save_document(&engine.into_adapter().into_document(), path)?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **Section**: immutable outline entry with derived display strings
//! - **OutlineNode**: a section plus its ordered children
//! - **OutlineIndices**: id, path, page and nearest-title lookups
//! - **OutlineEngine**: single writer publishing `Arc<OutlineSnapshot>`s
//! - **Locator**: nearest section for a reading position
//! - **Ranking**: tiered search shared by sections and glossary terms

pub mod config;
pub mod engine;
pub mod error;
pub mod glossary;
pub mod index;
pub mod locator;
pub mod persistence;
pub mod ranking;
pub mod registry;
pub mod search;
pub mod section;
pub mod sync;
pub mod tree;

// Re-export commonly used types
pub use config::Config;
pub use engine::{EditOutcome, OutlineEngine, OutlineSnapshot};
pub use error::{OutlineError, Result, SectionId};
pub use glossary::{Term, TermStore};
pub use index::OutlineIndices;
pub use persistence::{load_document, save_document};
pub use registry::Registry;
pub use search::{SearchOptions, SectionSearcher};
pub use section::Section;
pub use sync::{NoopSync, PersistedOutline, SyncAdapter, SyncChange};
pub use tree::{NodePath, OutlineDocument, OutlineMode, OutlineNode};
