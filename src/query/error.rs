//! Query error types
//!
//! Malformed query text and type mismatches never raise — they degrade (an
//! empty expression, a non-matching condition). Only structurally invalid
//! calls surface here.

use thiserror::Error;

/// Errors that can surface from the query engine
#[derive(Debug, Error)]
pub enum QueryError {
    /// A `group_by` field that exists on no record
    #[error("unknown field: {0}")]
    UnknownField(String),

    /// The document source failed to load the corpus
    #[error("document source error: {0}")]
    Document(#[from] crate::document::DocumentError),
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;
