//! Fine-grained action catalogue
//!
//! The catalogue is the flat, path-addressable view of every action record in
//! the corpus that both the structured query engine and the keyword indexer
//! consume:
//!
//! ```text
//! SkillDocument (decoder) → FineGrainedIndexer → Catalogue
//!                                                 ├─ StructuredQueryEngine (linear scan)
//!                                                 └─ Bm25Index (summary + parameter text)
//! ```
//!
//! Records are immutable once created; a changed source file produces a
//! brand-new [`SkillDocumentIndex`] that replaces the old one wholesale.

mod indexer;

pub use indexer::{simplify_type_name, FineGrainedIndexer};

use crate::document::ParamValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One catalogued action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Simplified action type name (assembly suffix and namespace stripped)
    pub action_type: String,
    /// Position within the owning track
    pub action_index: usize,
    /// Deterministic address of this record within its document:
    /// `tracks[<track_index>].actions[<action_index>]`
    pub json_path: String,
    /// Best-effort 1-based line number in the raw source; `None` when the
    /// anchor could not be located
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
    /// Frame at which the action fires
    pub frame: i64,
    /// Duration in frames
    pub duration: i64,
    /// Action parameters as decoded
    pub parameters: BTreeMap<String, ParamValue>,
    /// Human-readable per-category summary
    pub summary: String,
}

/// One catalogued track and its actions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    /// Track name from the document
    pub track_name: String,
    /// Position of the track within the document
    pub track_index: usize,
    /// Deterministic address of the track: `tracks[<track_index>]`
    pub track_path: String,
    /// Actions in document order
    pub actions: Vec<ActionRecord>,
}

/// Per-file index entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillDocumentIndex {
    /// Content hash the entry was built from
    pub file_hash: String,
    /// Human-readable skill name
    pub skill_name: String,
    /// Total actions across all tracks
    pub total_actions: usize,
    /// When this entry was (re)built
    pub last_modified: DateTime<Utc>,
    /// Tracks in document order
    pub tracks: Vec<TrackRecord>,
    /// Raw source text, kept for context extraction in action details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_text: Option<String>,
}

/// The full in-memory catalogue, keyed by file path
///
/// Built wholesale by [`FineGrainedIndexer::index_all`] and swapped in
/// atomically; never mutated in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalogue {
    /// file path → document index
    pub files: BTreeMap<String, SkillDocumentIndex>,
}

impl Catalogue {
    /// Total actions across every file
    pub fn total_actions(&self) -> usize {
        self.files.values().map(|f| f.total_actions).sum()
    }

    /// Number of indexed files
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Look up one file's entry
    pub fn get(&self, file_path: &str) -> Option<&SkillDocumentIndex> {
        self.files.get(file_path)
    }

    /// Iterate every action with its file/track context, in deterministic
    /// (file path, track, action) order
    pub fn iter_actions(&self) -> impl Iterator<Item = CataloguedAction<'_>> {
        self.files.iter().flat_map(|(file_path, doc)| {
            doc.tracks.iter().flat_map(move |track| {
                track.actions.iter().map(move |record| CataloguedAction {
                    file_path,
                    skill_name: &doc.skill_name,
                    track_name: &track.track_name,
                    record,
                })
            })
        })
    }
}

/// A record paired with its file and track context
#[derive(Debug, Clone, Copy)]
pub struct CataloguedAction<'a> {
    /// Owning file path
    pub file_path: &'a str,
    /// Owning skill name
    pub skill_name: &'a str,
    /// Owning track name
    pub track_name: &'a str,
    /// The record itself
    pub record: &'a ActionRecord,
}

impl CataloguedAction<'_> {
    /// Stable corpus-wide id for this record, used as the BM25 doc id
    pub fn doc_id(&self) -> String {
        format!("{}#{}", self.file_path, self.record.json_path)
    }
}

/// Per-file indexing failure diagnostic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexErrorEntry {
    /// File the failure belongs to
    pub file: String,
    /// What went wrong
    pub error: String,
}

/// Outcome of one indexing run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Documents seen in the batch
    pub total_files: usize,
    /// Documents (re)indexed this run
    pub indexed_files: usize,
    /// Documents skipped because their hash was unchanged
    pub skipped_files: usize,
    /// Total actions in the resulting catalogue
    pub total_actions: usize,
    /// Per-file failures; never aborts the run
    pub errors: Vec<IndexErrorEntry>,
}
