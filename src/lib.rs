//! # Skilldex
//!
//! A retrieval backend over structured skill documents — nested records of
//! tracks containing typed action entries with numeric/string parameters.
//!
//! ## Features
//!
//! - **Fine-grained indexing**: a flat, path-addressable catalogue of every
//!   action record, with hash-based change detection
//! - **Structured queries**: a small SQL-like language with boolean nesting
//!   and aggregation, evaluated by linear scan
//! - **Keyword search**: a hand-rolled BM25 inverted index with a shared
//!   mixed-script tokenizer
//! - **Hybrid ranking**: reciprocal-rank / weighted fusion of BM25 and
//!   externally supplied vector-similarity rankings
//! - **Response caching**: LRU caches with hit-rate counters in front of both
//!   queries and statistics
//!
//! ## Modules
//!
//! - [`document`]: the canonical document model and the decoder seam
//! - [`index`]: the catalogue and the fine-grained indexer
//! - [`query`]: the query language (AST, parser, evaluator) and the engine
//! - [`search`]: tokenizer, BM25 index, and rank fusion
//! - [`cache`]: the LRU response cache
//!
//! ## Quick Start
//!
//! ```rust
//! use skilldex::document::{SkillAction, SkillDocument, SkillTrack, StaticSource};
//! use skilldex::query::StructuredQueryEngine;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let corpus = vec![SkillDocument::new("skills/fireball.skill", "Fireball").track(
//!     SkillTrack::new("DamageTrack", 0).action(
//!         SkillAction::new("DamageAction", 10)
//!             .param("baseDamage", 250i64)
//!             .param("damageType", "Fire"),
//!     ),
//! )];
//!
//! let engine = StructuredQueryEngine::new(Arc::new(StaticSource::new(corpus)));
//! engine.rebuild_index(false)?;
//!
//! let response = engine.query("DamageAction where baseDamage > 200", 100, true);
//! assert_eq!(response.total_matches, 1);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod document;
pub mod index;
pub mod query;
pub mod search;

// Re-export top-level types for convenience
pub use document::{
    DocumentError, DocumentResult, DocumentSource, JsonDirSource, ParamValue, SkillAction,
    SkillDocument, SkillTrack, StaticSource,
};

pub use index::{
    ActionRecord, Catalogue, CataloguedAction, FineGrainedIndexer, IndexErrorEntry, IndexStats,
    SkillDocumentIndex, TrackRecord,
};

pub use query::{
    ActionDetail, ActionHit, AggregateClause, AggregateFunc, ConditionNode, EngineCacheStats,
    EngineConfig, GroupByClause, LogicalOp, Operator, OrderByClause, QueryCondition, QueryError,
    QueryExpression, QueryResponse, QueryResult, QueryResultItem, StatisticsReport,
    StructuredQueryEngine,
};

pub use search::{Bm25Index, FusedHit, FusionMethod, HybridConfig, HybridSearchEngine};

pub use cache::{CacheStats, LruQueryCache};

pub use config::{Config, ConfigError};
