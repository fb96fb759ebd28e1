//! Persistence layer for saving/loading outline documents.
//!
//! Supports both JSON (human-readable) and bincode (efficient binary) formats.
//! Soft-deleted entries are stored as-is; they drop out when a tree is built
//! from the loaded document.

use crate::error::{OutlineError, Result};
use crate::tree::OutlineDocument;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Save format for outline documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveFormat {
    /// JSON format (human-readable, larger).
    Json,
    /// Bincode format (binary, compact).
    Bincode,
}

impl SaveFormat {
    /// Determine format from file extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("bin") | Some("bincode") => SaveFormat::Bincode,
            _ => SaveFormat::Json,
        }
    }
}

/// Save an outline document, picking the format from the extension.
pub fn save_document(document: &OutlineDocument, path: &Path) -> Result<()> {
    save_document_with_format(document, path, SaveFormat::from_path(path))
}

/// Save an outline document with a specific format.
pub fn save_document_with_format(document: &OutlineDocument, path: &Path, format: SaveFormat) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| OutlineError::io(parent, e))?;
        }
    }

    let data = match format {
        SaveFormat::Json => document.to_json()?.into_bytes(),
        SaveFormat::Bincode => bincode::encode_to_vec(document, bincode::config::standard())
            .map_err(|e| OutlineError::Serialization(e.to_string()))?,
    };

    fs::write(path, &data).map_err(|e| OutlineError::io(path, e))?;
    debug!(path = %path.display(), bytes = data.len(), ?format, "saved outline document");

    Ok(())
}

/// Load an outline document, picking the format from the extension.
pub fn load_document(path: &Path) -> Result<OutlineDocument> {
    if !path.exists() {
        return Err(OutlineError::DocumentNotFound(path.to_path_buf()));
    }

    load_document_with_format(path, SaveFormat::from_path(path))
}

/// Load an outline document with a specific format.
pub fn load_document_with_format(path: &Path, format: SaveFormat) -> Result<OutlineDocument> {
    let data = fs::read(path).map_err(|e| OutlineError::io(path, e))?;

    let document = match format {
        SaveFormat::Json => {
            let json = String::from_utf8(data).map_err(|e| OutlineError::Serialization(e.to_string()))?;
            OutlineDocument::from_json(&json)?
        }
        SaveFormat::Bincode => {
            let (document, _): (OutlineDocument, usize) =
                bincode::decode_from_slice(&data, bincode::config::standard())
                    .map_err(|e| OutlineError::Serialization(e.to_string()))?;
            document
        }
    };

    debug!(
        path = %path.display(),
        ai_toc = document.ai_toc.len(),
        bookmarks = document.bookmarks.len(),
        terms = document.terms.len(),
        "loaded outline document"
    );
    Ok(document)
}

/// Check if a document file exists at the given path.
pub fn document_exists(path: &Path) -> bool {
    path.is_file()
}

/// Get the size of a document file in bytes.
pub fn document_size(path: &Path) -> Result<u64> {
    let metadata = fs::metadata(path).map_err(|e| OutlineError::io(path, e))?;
    Ok(metadata.len())
}
