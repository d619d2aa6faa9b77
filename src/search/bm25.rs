//! BM25 keyword index
//!
//! Hand-rolled inverted index with Okapi BM25 scoring, so the scoring
//! formula is exact and under our control:
//!
//! ```text
//! idf(t)     = ln((N - df(t) + 0.5) / (df(t) + 0.5) + 1)
//! score(d,q) = Σ_t idf(t) · tf·(k1+1) / (tf + k1·(1 - b + b·len(d)/avgLen))
//! ```
//!
//! IDF values are memoized per term; the memo is invalidated on every
//! mutation of the index.

use crate::search::tokenizer::tokenize;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Default BM25 term-frequency saturation parameter
pub const DEFAULT_K1: f32 = 1.5;

/// Default BM25 length-normalization parameter
pub const DEFAULT_B: f32 = 0.75;

/// Inverted index with BM25 ranking
pub struct Bm25Index {
    k1: f32,
    b: f32,
    /// term → (doc id → term frequency)
    postings: HashMap<String, HashMap<String, u32>>,
    /// doc id → token count
    doc_lengths: HashMap<String, usize>,
    total_length: usize,
    /// Memoized per-term IDF; cleared on every mutation
    idf_cache: Mutex<HashMap<String, f32>>,
}

impl Bm25Index {
    /// Create an empty index with default parameters
    pub fn new() -> Self {
        Self::with_params(DEFAULT_K1, DEFAULT_B)
    }

    /// Create an empty index with explicit `k1`/`b`
    pub fn with_params(k1: f32, b: f32) -> Self {
        Self {
            k1,
            b,
            postings: HashMap::new(),
            doc_lengths: HashMap::new(),
            total_length: 0,
            idf_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Index one document (upsert semantics)
    pub fn add_document(&mut self, id: impl Into<String>, text: &str) {
        let id = id.into();
        if self.doc_lengths.contains_key(&id) {
            self.remove_document(&id);
        }

        let tokens = tokenize(text);
        let length = tokens.len();

        let mut term_freq: HashMap<String, u32> = HashMap::new();
        for token in tokens {
            *term_freq.entry(token).or_insert(0) += 1;
        }
        for (term, tf) in term_freq {
            self.postings.entry(term).or_default().insert(id.clone(), tf);
        }

        self.doc_lengths.insert(id, length);
        self.total_length += length;
        self.idf_cache.lock().clear();
    }

    /// Index a batch of `(id, text)` documents
    pub fn add_documents(&mut self, docs: &[(String, String)]) {
        for (id, text) in docs {
            self.add_document(id.clone(), text);
        }
        debug!(documents = docs.len(), indexed = self.len(), "bm25 batch indexed");
    }

    /// Remove a document; returns false if the id was unknown
    pub fn remove_document(&mut self, id: &str) -> bool {
        let Some(length) = self.doc_lengths.remove(id) else {
            return false;
        };
        self.total_length -= length;
        self.postings.retain(|_, docs| {
            docs.remove(id);
            !docs.is_empty()
        });
        self.idf_cache.lock().clear();
        true
    }

    /// Drop every document
    pub fn clear(&mut self) {
        self.postings.clear();
        self.doc_lengths.clear();
        self.total_length = 0;
        self.idf_cache.lock().clear();
    }

    /// Number of indexed documents
    pub fn len(&self) -> usize {
        self.doc_lengths.len()
    }

    /// True when nothing is indexed
    pub fn is_empty(&self) -> bool {
        self.doc_lengths.is_empty()
    }

    fn idf(&self, term: &str) -> f32 {
        if let Some(cached) = self.idf_cache.lock().get(term) {
            return *cached;
        }
        let n = self.doc_lengths.len() as f32;
        let df = self.postings.get(term).map_or(0, HashMap::len) as f32;
        let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
        self.idf_cache.lock().insert(term.to_string(), idf);
        idf
    }

    /// Rank documents against `query`, best first
    ///
    /// `id_filter` restricts scoring to the given candidate ids. Ties break
    /// on doc id so repeated searches return identical orderings.
    pub fn search(
        &self,
        query: &str,
        top_k: usize,
        id_filter: Option<&HashSet<String>>,
    ) -> Vec<(String, f32)> {
        if self.doc_lengths.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let mut terms = tokenize(query);
        terms.sort_unstable();
        terms.dedup();
        if terms.is_empty() {
            return Vec::new();
        }

        let avg_length = self.total_length as f32 / self.doc_lengths.len() as f32;
        let mut scores: HashMap<&str, f32> = HashMap::new();

        for term in &terms {
            let Some(docs) = self.postings.get(term) else {
                continue;
            };
            let idf = self.idf(term);
            for (id, tf) in docs {
                if let Some(filter) = id_filter {
                    if !filter.contains(id) {
                        continue;
                    }
                }
                let length = self.doc_lengths.get(id).copied().unwrap_or(0) as f32;
                let tf = *tf as f32;
                let denom = tf + self.k1 * (1.0 - self.b + self.b * length / avg_length.max(1e-6));
                *scores.entry(id.as_str()).or_insert(0.0) += idf * tf * (self.k1 + 1.0) / denom;
            }
        }

        let mut ranked: Vec<(String, f32)> = scores
            .into_iter()
            .map(|(id, score)| (id.to_string(), score))
            .collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        ranked.truncate(top_k);
        ranked
    }
}

impl Default for Bm25Index {
    fn default() -> Self {
        Self::new()
    }
}
