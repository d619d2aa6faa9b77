//! Canonical skill document model
//!
//! The shapes every decoder collaborator reduces its on-disk dialect to:
//!
//! - **SkillDocument**: one decoded skill file with its tracks
//! - **SkillTrack / SkillAction**: nested track and action entries
//! - **ParamValue**: tagged union for action parameters, with total coercions
//! - **DocumentSource**: the seam between decoders and the indexer

mod source;
mod types;

pub use source::{DocumentError, DocumentResult, DocumentSource, JsonDirSource, StaticSource};
pub use types::{ParamValue, SkillAction, SkillDocument, SkillTrack};
