//! Reciprocal Rank Fusion (RRF).
//!
//! RRF combines ranked lists using ranks only, so BM25 scores and cosine
//! similarities never have to be put on a common scale:
//!
//! ```text
//! fused(d) = w_dense / (K + rank_dense(d)) + w_sparse / (K + rank_sparse(d))
//! ```
//!
//! Ranks are 1-based. A list that does not contain `d` contributes nothing,
//! so an item found by only one retriever keeps a positive score.
//!
//! Reference: Cormack, Clarke and Buettcher, "Reciprocal Rank Fusion
//! outperforms Condorcet and individual Rank Learning Methods" (SIGIR 2009).

use crate::config::{validate_weights, DEFAULT_DENSE_WEIGHT, DEFAULT_SPARSE_WEIGHT};
use crate::error::SearchError;
use std::collections::HashMap;
use std::hash::Hash;

/// Standard RRF k parameter value from academic literature.
///
/// Smaller values put more emphasis on the top ranks; 60 is the value
/// recommended by the original paper.
pub const RRF_K: usize = 60;

/// Unweighted RRF over two ranked lists.
///
/// RRF Formula: `RRF_score(d) = sum_r 1 / (k + rank_r(d))`
///
/// Items are returned by score descending. Equal scores keep the order in
/// which items first appeared (list `a` before list `b`).
pub fn reciprocal_rank_fusion<T: Clone + Eq + Hash>(
    results_a: &[(T, f32)],
    results_b: &[(T, f32)],
    k: usize,
) -> Vec<(T, f32)> {
    let k_param = k as f32;
    let mut order: Vec<T> = Vec::new();
    let mut rrf_scores: HashMap<T, f32> = HashMap::new();

    for list in [results_a, results_b] {
        for (rank, (item, _score)) in list.iter().enumerate() {
            let contribution = 1.0 / (k_param + (rank + 1) as f32);
            match rrf_scores.get_mut(item) {
                Some(score) => *score += contribution,
                None => {
                    order.push(item.clone());
                    rrf_scores.insert(item.clone(), contribution);
                }
            }
        }
    }

    let mut combined: Vec<(T, f32)> = order
        .into_iter()
        .map(|item| {
            let score = rrf_scores.get(&item).copied().unwrap_or(0.0);
            (item, score)
        })
        .collect();
    // Stable sort keeps first-appearance order for ties
    combined.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    combined
}

/// One fused item with its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct FusionCandidate<T> {
    pub id: T,
    /// 1-based rank in the dense list
    pub dense_rank: Option<usize>,
    pub dense_score: Option<f32>,
    /// 1-based rank in the sparse list
    pub sparse_rank: Option<usize>,
    pub sparse_score: Option<f32>,
    pub fused_score: f32,
}

impl<T> FusionCandidate<T> {
    /// Best (lowest) rank across both lists.
    pub fn best_rank(&self) -> usize {
        match (self.dense_rank, self.sparse_rank) {
            (Some(d), Some(s)) => d.min(s),
            (Some(r), None) | (None, Some(r)) => r,
            (None, None) => usize::MAX,
        }
    }
}

/// Weighted RRF combiner for a dense and a sparse ranking.
///
/// Weights are normalized to sum to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankFusion {
    k: usize,
    dense_weight: f32,
    sparse_weight: f32,
}

impl RankFusion {
    /// Creates a combiner.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if a weight is negative or non-finite, or both are 0.
    pub fn new(k: usize, dense_weight: f32, sparse_weight: f32) -> Result<Self, SearchError> {
        let mut fusion = Self {
            k,
            dense_weight: DEFAULT_DENSE_WEIGHT,
            sparse_weight: DEFAULT_SPARSE_WEIGHT,
        };
        fusion.set_weights(dense_weight, sparse_weight)?;
        Ok(fusion)
    }

    /// Replaces both weights. On error the previous weights are kept.
    pub fn set_weights(&mut self, dense_weight: f32, sparse_weight: f32) -> Result<(), SearchError> {
        validate_weights(dense_weight, sparse_weight)?;
        let total = dense_weight + sparse_weight;
        self.dense_weight = dense_weight / total;
        self.sparse_weight = sparse_weight / total;
        Ok(())
    }

    /// Normalized `(dense, sparse)` weights.
    pub fn weights(&self) -> (f32, f32) {
        (self.dense_weight, self.sparse_weight)
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Fuses two ranked lists into at most `limit` candidates.
    ///
    /// Both lists must already be ordered best first. Candidates are sorted
    /// by fused score descending; ties go to the better best-rank, then to
    /// the candidate seen first (dense list before sparse list).
    ///
    /// With an empty sparse list the dense order passes through unchanged.
    pub fn fuse<T: Clone + Eq + Hash>(
        &self,
        dense: &[(T, f32)],
        sparse: &[(T, f32)],
        limit: usize,
    ) -> Vec<FusionCandidate<T>> {
        let k = self.k as f32;
        let mut candidates: Vec<FusionCandidate<T>> = Vec::with_capacity(dense.len() + sparse.len());
        let mut position: HashMap<T, usize> = HashMap::with_capacity(dense.len() + sparse.len());

        for (i, (id, score)) in dense.iter().enumerate() {
            if position.contains_key(id) {
                continue;
            }
            let rank = i + 1;
            position.insert(id.clone(), candidates.len());
            candidates.push(FusionCandidate {
                id: id.clone(),
                dense_rank: Some(rank),
                dense_score: Some(*score),
                sparse_rank: None,
                sparse_score: None,
                fused_score: self.dense_weight / (k + rank as f32),
            });
        }

        for (i, (id, score)) in sparse.iter().enumerate() {
            let rank = i + 1;
            let contribution = self.sparse_weight / (k + rank as f32);
            match position.get(id) {
                Some(&pos) => {
                    let candidate = &mut candidates[pos];
                    if candidate.sparse_rank.is_none() {
                        candidate.sparse_rank = Some(rank);
                        candidate.sparse_score = Some(*score);
                        candidate.fused_score += contribution;
                    }
                }
                None => {
                    position.insert(id.clone(), candidates.len());
                    candidates.push(FusionCandidate {
                        id: id.clone(),
                        dense_rank: None,
                        dense_score: None,
                        sparse_rank: Some(rank),
                        sparse_score: Some(*score),
                        fused_score: contribution,
                    });
                }
            }
        }

        if !sparse.is_empty() {
            // Stable: equal scores and best ranks keep first-appearance order
            candidates.sort_by(|a, b| {
                b.fused_score
                    .partial_cmp(&a.fused_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.best_rank().cmp(&b.best_rank()))
            });
        }
        candidates.truncate(limit);
        candidates
    }
}

impl Default for RankFusion {
    fn default() -> Self {
        Self {
            k: RRF_K,
            dense_weight: DEFAULT_DENSE_WEIGHT,
            sparse_weight: DEFAULT_SPARSE_WEIGHT,
        }
    }
}
