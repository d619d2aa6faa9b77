//! Document source abstraction
//!
//! The decoder that turns on-disk skill files into canonical
//! [`SkillDocument`]s is an external collaborator. The engine only depends on
//! the [`DocumentSource`] trait; `JsonDirSource` is the reference
//! implementation for corpora that are already stored in the canonical JSON
//! shape (no dialect decoding).

use crate::document::SkillDocument;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors raised while loading documents
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Filesystem access failed
    #[error("failed to read {path}: {error}")]
    Io { path: PathBuf, error: String },

    /// A document file did not parse as canonical JSON
    #[error("failed to parse {path}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Result type for document loading
pub type DocumentResult<T> = Result<T, DocumentError>;

/// Supplier of decoded skill documents
///
/// `load` returns the full corpus; incremental change detection happens
/// downstream via content hashes, so a source may simply re-read everything.
pub trait DocumentSource: Send + Sync {
    /// Load every document in the corpus
    fn load(&self) -> DocumentResult<Vec<SkillDocument>>;
}

/// A fixed in-memory corpus; useful for tests and embedding callers
pub struct StaticSource {
    documents: Vec<SkillDocument>,
}

impl StaticSource {
    /// Wrap an already-decoded corpus
    pub fn new(documents: Vec<SkillDocument>) -> Self {
        Self { documents }
    }
}

impl DocumentSource for StaticSource {
    fn load(&self) -> DocumentResult<Vec<SkillDocument>> {
        Ok(self.documents.clone())
    }
}

/// Reads canonical-shape JSON documents from a directory
///
/// Every `*.json` file directly under the directory is one document. Files
/// that fail to read or parse are skipped with a warning so one bad file
/// cannot take down a whole reload.
pub struct JsonDirSource {
    dir: PathBuf,
}

impl JsonDirSource {
    /// Create a source over the given directory
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn load_file(path: &Path) -> DocumentResult<SkillDocument> {
        let content = std::fs::read_to_string(path).map_err(|e| DocumentError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let mut doc: SkillDocument =
            serde_json::from_str(&content).map_err(|e| DocumentError::Parse {
                path: path.to_path_buf(),
                error: e.to_string(),
            })?;

        // Keep the raw text around for line anchoring and context extraction
        if doc.source_text.is_none() {
            doc.source_text = Some(content);
        }
        Ok(doc)
    }
}

impl DocumentSource for JsonDirSource {
    fn load(&self) -> DocumentResult<Vec<SkillDocument>> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| DocumentError::Io {
            path: self.dir.clone(),
            error: e.to_string(),
        })?;

        let mut documents = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::load_file(&path) {
                Ok(doc) => {
                    debug!(file = %path.display(), tracks = doc.tracks.len(), "loaded document");
                    documents.push(doc);
                }
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "skipping unreadable document");
                }
            }
        }

        // Deterministic ordering regardless of directory iteration order
        documents.sort_by(|a, b| a.file_path.cmp(&b.file_path));
        Ok(documents)
    }
}
