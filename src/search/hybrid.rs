//! Hybrid rank fusion
//!
//! Fuses the BM25 keyword ranking with an externally supplied
//! vector-similarity ranking into a single list. Two methods:
//!
//! - **Reciprocal Rank Fusion**: `score(d) = Σ_list 1/(k + rank + 1)` over
//!   each list the document appears in (0-based rank, `k` = 60 by default).
//!   A document absent from a list contributes nothing from that list.
//! - **Weighted score fusion**: each list's raw scores are normalized by that
//!   list's own maximum, then combined as
//!   `bm25_weight·norm_bm25 + vector_weight·norm_vector`.
//!
//! Each side's candidate pool is clamped to `min(top_k·3, 100)` before
//! fusion. Equal fused scores tie-break on the vector-side rank (vector
//! evidence is the richer signal), then on doc id, so orderings are
//! deterministic across runs.

use crate::search::bm25::Bm25Index;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Hard ceiling on the per-side candidate pool
const MAX_CANDIDATE_POOL: usize = 100;

/// How the two ranked lists are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionMethod {
    /// Rank-based reciprocal rank fusion
    ReciprocalRank,
    /// Max-normalized weighted score fusion
    WeightedScore,
}

/// Fusion parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridConfig {
    /// RRF constant `k`; higher values flatten the rank curve
    pub rrf_k: f32,
    /// Weight for the normalized BM25 score (weighted fusion)
    pub bm25_weight: f32,
    /// Weight for the normalized vector score (weighted fusion)
    pub vector_weight: f32,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            rrf_k: 60.0,
            bm25_weight: 1.0,
            vector_weight: 1.0,
        }
    }
}

/// A fused result with per-side provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedHit {
    /// Document id
    pub doc_id: String,
    /// Combined score (reciprocal-rank sum or weighted normalized sum)
    pub score: f32,
    /// 0-based rank in the BM25 list, when present
    pub bm25_rank: Option<usize>,
    /// 0-based rank in the vector list, when present
    pub vector_rank: Option<usize>,
    /// Raw BM25 score, when present
    pub bm25_score: Option<f32>,
    /// Raw vector similarity, when present
    pub vector_score: Option<f32>,
}

#[derive(Default)]
struct FusionSlot {
    score: f32,
    bm25_rank: Option<usize>,
    vector_rank: Option<usize>,
    bm25_score: Option<f32>,
    vector_score: Option<f32>,
}

/// Fuses keyword and vector rankings
pub struct HybridSearchEngine {
    config: HybridConfig,
}

impl HybridSearchEngine {
    /// Create an engine with default parameters
    pub fn new() -> Self {
        Self::with_config(HybridConfig::default())
    }

    /// Create an engine with explicit parameters
    pub fn with_config(config: HybridConfig) -> Self {
        Self { config }
    }

    /// Current fusion parameters
    pub fn config(&self) -> &HybridConfig {
        &self.config
    }

    /// Per-side candidate pool for a requested `top_k`
    fn candidate_pool(top_k: usize) -> usize {
        (top_k.saturating_mul(3)).min(MAX_CANDIDATE_POOL)
    }

    /// Run the BM25 side against `index` and fuse with `vector_ranked`
    ///
    /// `vector_ranked` must be sorted by similarity descending, as returned
    /// by the vector-store collaborator.
    pub fn search(
        &self,
        index: &Bm25Index,
        query: &str,
        vector_ranked: &[(String, f32)],
        top_k: usize,
        method: FusionMethod,
    ) -> Vec<FusedHit> {
        let pool = Self::candidate_pool(top_k);
        let bm25_ranked = index.search(query, pool, None);
        debug!(
            query,
            bm25_candidates = bm25_ranked.len(),
            vector_candidates = vector_ranked.len().min(pool),
            "hybrid search"
        );
        self.fuse(&bm25_ranked, vector_ranked, top_k, method)
    }

    /// Fuse two pre-ranked lists into the final top-k
    pub fn fuse(
        &self,
        bm25_ranked: &[(String, f32)],
        vector_ranked: &[(String, f32)],
        top_k: usize,
        method: FusionMethod,
    ) -> Vec<FusedHit> {
        let pool = Self::candidate_pool(top_k);
        let bm25_ranked = &bm25_ranked[..bm25_ranked.len().min(pool)];
        let vector_ranked = &vector_ranked[..vector_ranked.len().min(pool)];

        let mut slots: HashMap<&str, FusionSlot> = HashMap::new();

        for (rank, (id, score)) in bm25_ranked.iter().enumerate() {
            let slot = slots.entry(id.as_str()).or_default();
            slot.bm25_rank = Some(rank);
            slot.bm25_score = Some(*score);
        }
        for (rank, (id, score)) in vector_ranked.iter().enumerate() {
            let slot = slots.entry(id.as_str()).or_default();
            slot.vector_rank = Some(rank);
            slot.vector_score = Some(*score);
        }

        match method {
            FusionMethod::ReciprocalRank => {
                for slot in slots.values_mut() {
                    let mut score = 0.0;
                    if let Some(rank) = slot.bm25_rank {
                        score += 1.0 / (self.config.rrf_k + rank as f32 + 1.0);
                    }
                    if let Some(rank) = slot.vector_rank {
                        score += 1.0 / (self.config.rrf_k + rank as f32 + 1.0);
                    }
                    slot.score = score;
                }
            }
            FusionMethod::WeightedScore => {
                let bm25_max = bm25_ranked
                    .iter()
                    .map(|(_, s)| *s)
                    .fold(0.0_f32, f32::max);
                let vector_max = vector_ranked
                    .iter()
                    .map(|(_, s)| *s)
                    .fold(0.0_f32, f32::max);

                for slot in slots.values_mut() {
                    let mut score = 0.0;
                    if let Some(raw) = slot.bm25_score {
                        if bm25_max > 0.0 {
                            score += self.config.bm25_weight * raw / bm25_max;
                        }
                    }
                    if let Some(raw) = slot.vector_score {
                        if vector_max > 0.0 {
                            score += self.config.vector_weight * raw / vector_max;
                        }
                    }
                    slot.score = score;
                }
            }
        }

        let mut hits: Vec<FusedHit> = slots
            .into_iter()
            .map(|(id, slot)| FusedHit {
                doc_id: id.to_string(),
                score: slot.score,
                bm25_rank: slot.bm25_rank,
                vector_rank: slot.vector_rank,
                bm25_score: slot.bm25_score,
                vector_score: slot.vector_score,
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    let a_rank = a.vector_rank.unwrap_or(usize::MAX);
                    let b_rank = b.vector_rank.unwrap_or(usize::MAX);
                    a_rank.cmp(&b_rank)
                })
                .then_with(|| a.doc_id.cmp(&b.doc_id))
        });
        hits.truncate(top_k);
        hits
    }
}

impl Default for HybridSearchEngine {
    fn default() -> Self {
        Self::new()
    }
}
