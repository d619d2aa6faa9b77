//! Core data types for skill documents
//!
//! This module defines the canonical document shape handed over by the
//! external decoder:
//! - `SkillDocument`: one decoded skill file
//! - `SkillTrack`: a named track of actions within a skill
//! - `SkillAction`: a single typed action entry
//! - `ParamValue`: the tagged union for action parameters

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single action parameter value
///
/// Parameters arrive as arbitrary key→value maps; this union covers every
/// scalar shape the decoder emits plus nested sub-maps. All coercions are
/// total and return `Option` — a mismatched coercion is the caller's signal,
/// never a panic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Null / absent value
    Null,
    /// Boolean flag
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    Str(String),
    /// Nested parameter map
    Nested(BTreeMap<String, ParamValue>),
}

impl ParamValue {
    /// Coerce to f64 (ints, floats, numeric strings, bools as 0/1)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(i) => Some(*i as f64),
            ParamValue::Float(f) => Some(*f),
            ParamValue::Str(s) => s.trim().parse::<f64>().ok(),
            ParamValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            ParamValue::Null | ParamValue::Nested(_) => None,
        }
    }

    /// Coerce to i64, truncating floats
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(i) => Some(*i),
            ParamValue::Float(f) => Some(*f as i64),
            ParamValue::Str(s) => s.trim().parse::<i64>().ok(),
            ParamValue::Bool(b) => Some(i64::from(*b)),
            ParamValue::Null | ParamValue::Nested(_) => None,
        }
    }

    /// Coerce to bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            ParamValue::Int(i) => Some(*i != 0),
            ParamValue::Str(s) => match s.to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Render as a display string; never fails
    ///
    /// Nested maps render as compact JSON so they remain searchable.
    pub fn as_str_lossy(&self) -> String {
        match self {
            ParamValue::Null => "null".to_string(),
            ParamValue::Bool(b) => b.to_string(),
            ParamValue::Int(i) => i.to_string(),
            ParamValue::Float(f) => {
                // Render whole floats without a trailing ".0" so "150" and
                // 150.0 compare equal as strings
                if f.fract() == 0.0 && f.is_finite() {
                    format!("{}", *f as i64)
                } else {
                    f.to_string()
                }
            }
            ParamValue::Str(s) => s.clone(),
            ParamValue::Nested(map) => {
                serde_json::to_string(map).unwrap_or_else(|_| "{}".to_string())
            }
        }
    }

    /// True for the Null variant
    pub fn is_null(&self) -> bool {
        matches!(self, ParamValue::Null)
    }

    /// Nested sub-map access
    pub fn as_nested(&self) -> Option<&BTreeMap<String, ParamValue>> {
        match self {
            ParamValue::Nested(map) => Some(map),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for ParamValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => ParamValue::Null,
            serde_json::Value::Bool(b) => ParamValue::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    ParamValue::Int(i)
                } else {
                    ParamValue::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => ParamValue::Str(s),
            serde_json::Value::Array(items) => {
                // The canonical decoder emits no arrays, but the conversion
                // stays total: fold elements into a map keyed by index
                let map = items
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| (i.to_string(), ParamValue::from(v)))
                    .collect();
                ParamValue::Nested(map)
            }
            serde_json::Value::Object(obj) => {
                let map = obj
                    .into_iter()
                    .map(|(k, v)| (k, ParamValue::from(v)))
                    .collect();
                ParamValue::Nested(map)
            }
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

/// One typed action entry inside a track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillAction {
    /// Action type as emitted by the decoder, possibly fully qualified
    /// (e.g. "Game.Skills.DamageAction, Assembly-CSharp")
    pub type_name: String,
    /// Frame at which the action fires
    #[serde(default)]
    pub frame: i64,
    /// Duration in frames (0 for instantaneous actions)
    #[serde(default)]
    pub duration: i64,
    /// Arbitrary action parameters
    #[serde(default)]
    pub parameters: BTreeMap<String, ParamValue>,
}

impl SkillAction {
    /// Create a new action with the given type and frame
    pub fn new(type_name: impl Into<String>, frame: i64) -> Self {
        Self {
            type_name: type_name.into(),
            frame,
            duration: 0,
            parameters: BTreeMap::new(),
        }
    }

    /// Builder method: set duration
    pub fn duration(mut self, duration: i64) -> Self {
        self.duration = duration;
        self
    }

    /// Builder method: add a parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// A named track of actions within a skill document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillTrack {
    /// Track name (e.g. "DamageTrack")
    pub track_name: String,
    /// Position of the track within the document
    pub track_index: usize,
    /// Actions in document order
    #[serde(default)]
    pub actions: Vec<SkillAction>,
}

impl SkillTrack {
    /// Create an empty track
    pub fn new(track_name: impl Into<String>, track_index: usize) -> Self {
        Self {
            track_name: track_name.into(),
            track_index,
            actions: Vec::new(),
        }
    }

    /// Builder method: append an action
    pub fn action(mut self, action: SkillAction) -> Self {
        self.actions.push(action);
        self
    }
}

/// One decoded skill document in the canonical shape
///
/// The decoder collaborator reduces whatever on-disk dialect it handles to
/// this shape; nothing downstream ever sees the raw dialect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillDocument {
    /// Source file path; the catalogue key
    pub file_path: String,
    /// Content hash supplied by the decoder; computed from `source_text`
    /// when absent
    #[serde(default)]
    pub file_hash: Option<String>,
    /// Human-readable skill name
    pub skill_name: String,
    /// Tracks in document order
    #[serde(default)]
    pub tracks: Vec<SkillTrack>,
    /// Raw text of the source file, when the decoder preserves it;
    /// enables line anchoring and context extraction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_text: Option<String>,
}

impl SkillDocument {
    /// Create an empty document
    pub fn new(file_path: impl Into<String>, skill_name: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            file_hash: None,
            skill_name: skill_name.into(),
            tracks: Vec::new(),
            source_text: None,
        }
    }

    /// Builder method: append a track
    pub fn track(mut self, track: SkillTrack) -> Self {
        self.tracks.push(track);
        self
    }

    /// Builder method: attach raw source text
    pub fn source_text(mut self, text: impl Into<String>) -> Self {
        self.source_text = Some(text.into());
        self
    }

    /// Builder method: set the content hash
    pub fn hash(mut self, hash: impl Into<String>) -> Self {
        self.file_hash = Some(hash.into());
        self
    }

    /// Total number of actions across all tracks
    pub fn action_count(&self) -> usize {
        self.tracks.iter().map(|t| t.actions.len()).sum()
    }
}
