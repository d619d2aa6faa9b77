//! Keyword search and rank fusion
//!
//! - **tokenizer**: shared unigram/bigram tokenizer for mixed-script text
//! - **bm25**: hand-rolled inverted index with Okapi BM25 scoring
//! - **hybrid**: reciprocal-rank / weighted fusion of BM25 and
//!   vector-similarity rankings
//!
//! The vector side is supplied by an external collaborator as a
//! `[(doc_id, similarity)]` list sorted descending; this module never owns
//! embeddings.

mod bm25;
mod hybrid;
mod tokenizer;

pub use bm25::{Bm25Index, DEFAULT_B, DEFAULT_K1};
pub use hybrid::{FusedHit, FusionMethod, HybridConfig, HybridSearchEngine};
pub use tokenizer::tokenize;
