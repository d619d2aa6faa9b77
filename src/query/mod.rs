//! Skill Query Engine
//!
//! A SQL-like query language over catalogued action records:
//!
//! - **AST**: expression and condition types
//! - **Parser**: simple and extended surface grammars (never fails — see
//!   [`parser::parse`])
//! - **Evaluator**: condition walking, grouping, aggregation
//! - **Engine**: the orchestrator exposing query/statistics/detail/rebuild
//!
//! # Query Language
//!
//! ```text
//! DamageAction where baseDamage > 200
//! baseDamage between 100 and 300
//! animationClipName contains Attack
//! SELECT COUNT(*), AVG(baseDamage) FROM DamageAction GROUP BY damageType
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! use skilldex::query::StructuredQueryEngine;
//!
//! let engine = StructuredQueryEngine::new(source);
//! engine.rebuild_index(false)?;
//!
//! let response = engine.query("DamageAction where baseDamage > 200", 100, true);
//! println!("{} matches", response.total_matches);
//!
//! let stats = engine.get_statistics(None, "action_type")?;
//! ```

mod ast;
mod engine;
mod error;
mod evaluator;
mod parser;

pub use ast::{
    AggregateClause, AggregateFunc, ConditionNode, GroupByClause, LogicalOp, Operator,
    OrderByClause, QueryCondition, QueryExpression,
};
pub use engine::{
    ActionDetail, ActionHit, EngineCacheStats, EngineConfig, GroupStats, QueryResponse,
    QueryResultItem, StatisticsReport, StructuredQueryEngine,
};
pub use error::{QueryError, QueryResult};
pub use evaluator::{aggregate, evaluate, AggregateRow, FieldLookup};
pub use parser::{parse, parse_extended, parse_simple};
