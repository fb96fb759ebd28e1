//! Error types for the outline engine.

use crate::tree::NodePath;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our custom error.
pub type Result<T> = std::result::Result<T, OutlineError>;

/// Section identifier, unique within one outline source.
pub type SectionId = u64;

/// Errors that can occur while loading, editing or querying an outline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OutlineError {
    /// Error reading or writing files.
    #[error("I/O error for path '{path}': {message}")]
    Io { path: PathBuf, message: String },

    /// Error during serialization/deserialization.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The outline document does not exist.
    #[error("Outline document not found at '{0}'")]
    DocumentNotFound(PathBuf),

    /// Configuration file error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A position field is not a finite number.
    #[error("Invalid position (page {page}, y {y})")]
    InvalidPosition { page: u32, y: f64 },

    /// The parent an edit needs is missing from the tree.
    #[error("Section {0} has no parent to move under")]
    MissingParent(SectionId),

    /// The id is absent from the id index.
    #[error("Unknown section id {0}")]
    UnknownSection(SectionId),

    /// A path taken from the index no longer resolves in the tree.
    #[error("Path {0} does not resolve to a node")]
    PathNotFound(NodePath),

    /// Indent/outdent would leave the hierarchy unchanged or invalid.
    #[error("Section {id} cannot be indented: {reason}")]
    NotIndentable { id: SectionId, reason: &'static str },

    /// Deleting this node would orphan its children.
    #[error("Section {id} has {children} children and the delete policy is 'reject'")]
    HasChildren { id: SectionId, children: usize },

    /// The sync adapter lost its backing structure.
    #[error("Sync adapter out of sync: {0}")]
    SyncDesync(String),

    /// The glossary loader failed.
    #[error("Glossary load failed: {0}")]
    GlossaryLoad(String),
}

impl OutlineError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: source.to_string(),
        }
    }

    /// Fatal errors propagate to the caller; everything else abandons the
    /// operation and is only logged.
    pub fn is_fatal(&self) -> bool {
        matches!(self, OutlineError::SyncDesync(_))
    }
}

impl From<serde_json::Error> for OutlineError {
    fn from(err: serde_json::Error) -> Self {
        OutlineError::Serialization(err.to_string())
    }
}
