//! Fine-grained document indexer
//!
//! Walks decoded skill documents and builds the flat catalogue of action
//! records. Per document:
//!
//! 1. Compute the content hash (decoder-supplied, else CRC32 of the raw
//!    text); carry the previous entry forward when unchanged and not forced
//! 2. Address every record with a deterministic `json_path`
//! 3. Estimate a source line number by anchor search (heuristic, see below)
//! 4. Render a per-category summary
//!
//! A malformed document is recorded as a diagnostic and skipped; one bad
//! file never aborts the batch.
//!
//! # Line anchoring
//!
//! The anchor is the record's `id`/`guid` parameter when present, else its
//! `frame` value, searched as a whole token in the raw source text. When two
//! records share an anchor value the estimate can point at the wrong line;
//! exact offsets would need a byte-offset-preserving decoder.

use crate::document::{ParamValue, SkillAction, SkillDocument};
use crate::index::{
    ActionRecord, Catalogue, IndexErrorEntry, IndexStats, SkillDocumentIndex, TrackRecord,
};
use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use tracing::{info, warn};

/// Builds catalogues from decoded documents
#[derive(Debug, Default)]
pub struct FineGrainedIndexer;

impl FineGrainedIndexer {
    /// Create an indexer
    pub fn new() -> Self {
        Self
    }

    /// Index a batch of documents into a fresh catalogue
    ///
    /// `previous` enables hash-based skipping: an unchanged document's entry
    /// is carried forward untouched unless `force` is set. The returned
    /// catalogue fully replaces any prior one.
    pub fn index_all(
        &self,
        documents: &[SkillDocument],
        previous: Option<&Catalogue>,
        force: bool,
    ) -> (Catalogue, IndexStats) {
        let mut catalogue = Catalogue::default();
        let mut stats = IndexStats::default();
        let mut seen_paths: HashSet<&str> = HashSet::new();

        for doc in documents {
            stats.total_files += 1;

            if doc.file_path.trim().is_empty() {
                stats.errors.push(IndexErrorEntry {
                    file: doc.skill_name.clone(),
                    error: "document has an empty file path".to_string(),
                });
                continue;
            }
            if !seen_paths.insert(doc.file_path.as_str()) {
                stats.errors.push(IndexErrorEntry {
                    file: doc.file_path.clone(),
                    error: "duplicate file path in batch".to_string(),
                });
                continue;
            }

            let hash = content_hash(doc);
            if !force {
                if let Some(existing) = previous.and_then(|c| c.get(&doc.file_path)) {
                    if existing.file_hash == hash {
                        catalogue
                            .files
                            .insert(doc.file_path.clone(), existing.clone());
                        stats.skipped_files += 1;
                        continue;
                    }
                }
            }

            let entry = index_document(doc, hash);
            stats.indexed_files += 1;
            catalogue.files.insert(doc.file_path.clone(), entry);
        }

        stats.total_actions = catalogue.total_actions();
        info!(
            total_files = stats.total_files,
            indexed = stats.indexed_files,
            skipped = stats.skipped_files,
            actions = stats.total_actions,
            errors = stats.errors.len(),
            "catalogue rebuilt"
        );
        if !stats.errors.is_empty() {
            for e in &stats.errors {
                warn!(file = %e.file, error = %e.error, "document skipped");
            }
        }

        (catalogue, stats)
    }
}

/// Build one file's index entry
fn index_document(doc: &SkillDocument, file_hash: String) -> SkillDocumentIndex {
    let tracks: Vec<TrackRecord> = doc
        .tracks
        .iter()
        .map(|track| {
            let track_path = format!("tracks[{}]", track.track_index);
            let actions = track
                .actions
                .iter()
                .enumerate()
                .map(|(action_index, action)| {
                    build_record(action, &track_path, action_index, doc.source_text.as_deref())
                })
                .collect();
            TrackRecord {
                track_name: track.track_name.clone(),
                track_index: track.track_index,
                track_path,
                actions,
            }
        })
        .collect();

    let total_actions = tracks.iter().map(|t| t.actions.len()).sum();
    SkillDocumentIndex {
        file_hash,
        skill_name: doc.skill_name.clone(),
        total_actions,
        last_modified: Utc::now(),
        tracks,
        source_text: doc.source_text.clone(),
    }
}

fn build_record(
    action: &SkillAction,
    track_path: &str,
    action_index: usize,
    source_text: Option<&str>,
) -> ActionRecord {
    let action_type = simplify_type_name(&action.type_name);
    let json_path = format!("{}.actions[{}]", track_path, action_index);
    let line_number = source_text.and_then(|text| {
        let anchor = anchor_token(action);
        locate_line(text, &anchor)
    });
    let summary = build_summary(&action_type, action);

    ActionRecord {
        action_type,
        action_index,
        json_path,
        line_number,
        frame: action.frame,
        duration: action.duration,
        parameters: action.parameters.clone(),
        summary,
    }
}

/// Content hash for change detection: the decoder's hash when present, else
/// CRC32 of the raw text (else of the canonical serialization)
fn content_hash(doc: &SkillDocument) -> String {
    if let Some(hash) = &doc.file_hash {
        return hash.clone();
    }
    let mut hasher = crc32fast::Hasher::new();
    match &doc.source_text {
        Some(text) => hasher.update(text.as_bytes()),
        None => {
            let serialized = serde_json::to_vec(doc).unwrap_or_default();
            hasher.update(&serialized);
        }
    }
    format!("{:08x}", hasher.finalize())
}

/// Reduce a fully-qualified type string to its bare type name
///
/// `"Game.Skills.DamageAction, Assembly-CSharp"` → `"DamageAction"`;
/// generic arguments are dropped.
pub fn simplify_type_name(type_name: &str) -> String {
    let without_assembly = type_name.split(',').next().unwrap_or(type_name).trim();
    let without_generics = without_assembly
        .split(['<', '`'])
        .next()
        .unwrap_or(without_assembly);
    without_generics
        .rsplit('.')
        .next()
        .unwrap_or(without_generics)
        .trim()
        .to_string()
}

/// Pick the anchor token for line estimation
fn anchor_token(action: &SkillAction) -> String {
    for key in ["id", "guid"] {
        if let Some(value) = action.parameters.get(key) {
            if !value.is_null() {
                return value.as_str_lossy();
            }
        }
    }
    action.frame.to_string()
}

/// Locate `anchor` as a whole token in `source`, returning its 1-based line
///
/// Heuristic by design: the first occurrence wins, so duplicate anchor
/// values across records can yield a wrong line.
fn locate_line(source: &str, anchor: &str) -> Option<u32> {
    if anchor.is_empty() {
        return None;
    }
    let pattern = format!(r"\b{}\b", regex::escape(anchor));
    let re = regex::Regex::new(&pattern).ok()?;
    let m = re.find(source)?;
    let line = source[..m.start()].bytes().filter(|b| *b == b'\n').count() + 1;
    u32::try_from(line).ok()
}

fn first_param<'a>(
    parameters: &'a BTreeMap<String, ParamValue>,
    keys: &[&str],
) -> Option<&'a ParamValue> {
    keys.iter()
        .find_map(|k| parameters.get(*k))
        .filter(|v| !v.is_null())
}

/// Render the per-category one-line summary for a record
fn build_summary(action_type: &str, action: &SkillAction) -> String {
    let params = &action.parameters;
    let lowered = action_type.to_ascii_lowercase();

    if lowered.contains("damage") {
        let amount = first_param(params, &["baseDamage", "damage", "damageValue"])
            .map(|v| v.as_str_lossy());
        let kind = first_param(params, &["damageType", "elementType"]).map(|v| v.as_str_lossy());
        return match (amount, kind) {
            (Some(a), Some(k)) => {
                format!("Deals {} {} damage at frame {}", a, k, action.frame)
            }
            (Some(a), None) => format!("Deals {} damage at frame {}", a, action.frame),
            _ => format!("Deals damage at frame {}", action.frame),
        };
    }
    if lowered.contains("anim") {
        let clip = first_param(params, &["animationClipName", "clipName", "clip"])
            .map(|v| v.as_str_lossy())
            .unwrap_or_else(|| "<unnamed>".to_string());
        return format!(
            "Plays animation '{}' at frame {} for {} frames",
            clip, action.frame, action.duration
        );
    }
    if lowered.contains("effect") || lowered.contains("particle") {
        let effect = first_param(params, &["effectPath", "effectName", "prefabPath"])
            .map(|v| v.as_str_lossy())
            .unwrap_or_else(|| "<unnamed>".to_string());
        return format!("Spawns effect '{}' at frame {}", effect, action.frame);
    }
    if lowered.contains("audio") || lowered.contains("sound") {
        let clip = first_param(params, &["audioClipName", "soundName", "clipName"])
            .map(|v| v.as_str_lossy())
            .unwrap_or_else(|| "<unnamed>".to_string());
        return format!("Plays sound '{}' at frame {}", clip, action.frame);
    }
    if lowered.contains("move") {
        let distance =
            first_param(params, &["distance", "displacement", "speed"]).map(|v| v.as_str_lossy());
        return match distance {
            Some(d) => format!(
                "Moves {} over {} frames starting at frame {}",
                d, action.duration, action.frame
            ),
            None => format!("Moves for {} frames starting at frame {}", action.duration, action.frame),
        };
    }
    if lowered.contains("camera") {
        return format!("Camera action at frame {} for {} frames", action.frame, action.duration);
    }

    format!(
        "{} at frame {} (duration {}, {} parameters)",
        action_type,
        action.frame,
        action.duration,
        params.len()
    )
}
