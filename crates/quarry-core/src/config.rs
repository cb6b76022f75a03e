//! Index and search configuration.
//!
//! Default values are exposed as constants so benchmarks and tests can refer
//! to the same numbers the engine uses. [`HybridSearchConfig`] derives serde
//! with `#[serde(default)]`, so a partial JSON or TOML document only needs to
//! name the options it overrides.
//!
//! ```
//! use quarry_core::config::{HybridSearchConfig, DEFAULT_EF_SEARCH};
//!
//! let config: HybridSearchConfig = serde_json::from_str(r#"{ "dimension": 384 }"#).unwrap();
//! assert_eq!(config.dimension, Some(384));
//! assert_eq!(config.ef_search, DEFAULT_EF_SEARCH);
//! config.validate().unwrap();
//! ```

use crate::error::SearchError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// =============================================================================
// Dense index (HNSW)
// =============================================================================

/// Bidirectional links per node at layers > 0.
pub const DEFAULT_M: usize = 16;

/// Candidate list size while inserting into the graph.
pub const DEFAULT_EF_CONSTRUCTION: usize = 100;

/// Candidate list size while searching the graph.
pub const DEFAULT_EF_SEARCH: usize = 50;

/// Lower bound for the runtime `ef_search` setting.
pub const MIN_EF_SEARCH: usize = 10;

/// Upper bound for the runtime `ef_search` setting.
pub const MAX_EF_SEARCH: usize = 500;

/// Maximum number of elements (including tombstoned ones) per generation.
pub const DEFAULT_MAX_ELEMENTS: usize = 1_000_000;

/// Extra candidates requested from the graph so id filtering and tombstones
/// still leave `k` results.
pub const DEFAULT_FILTER_OVERSAMPLE: usize = 2;

// =============================================================================
// Fusion
// =============================================================================

/// Weight of the dense (vector) ranking in RRF.
pub const DEFAULT_DENSE_WEIGHT: f32 = 0.6;

/// Weight of the sparse (BM25) ranking in RRF.
pub const DEFAULT_SPARSE_WEIGHT: f32 = 0.4;

// =============================================================================
// Coordinator
// =============================================================================

/// Relative divergence between the store and the dense index that triggers a
/// synchronous rebuild before a query is answered.
pub const DEFAULT_SKEW_THRESHOLD: f64 = 0.10;

/// Candidates retrieved from each index per requested result.
pub const DEFAULT_OVERSAMPLE_FACTOR: usize = 5;

/// Floor for the number of candidates retrieved from each index.
pub const DEFAULT_MIN_CANDIDATES: usize = 50;

/// Tombstone ratio above which `compact_if_needed` rebuilds.
pub const DEFAULT_COMPACTION_THRESHOLD: f32 = 0.3;

// =============================================================================
// BM25
// =============================================================================

/// BM25 term frequency saturation.
pub const DEFAULT_BM25_K1: f32 = 1.5;

/// BM25 document length normalization.
pub const DEFAULT_BM25_B: f32 = 0.75;

/// Configuration for one corpus (one [`IndexCoordinator`](crate::search::IndexCoordinator)).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridSearchConfig {
    /// HNSW node degree. Must match the backend's compile-time degree.
    pub m: usize,
    /// HNSW construction candidate list size
    pub ef_construction: usize,
    /// HNSW search candidate list size, in `[MIN_EF_SEARCH, MAX_EF_SEARCH]`
    pub ef_search: usize,
    /// Dense ranking weight (normalized together with `sparse_weight`)
    pub dense_weight: f32,
    /// Sparse ranking weight (normalized together with `dense_weight`)
    pub sparse_weight: f32,
    /// RRF rank constant
    pub rrf_k: usize,
    /// Dense index capacity
    pub max_elements: usize,
    /// Embedding dimension. `None` locks the dimension on first insert.
    pub dimension: Option<usize>,
    /// Store/index divergence that triggers a rebuild (0.0 - 1.0)
    pub skew_threshold: f64,
    /// Candidates per requested result retrieved from each index
    pub oversample_factor: usize,
    /// Minimum candidates retrieved from each index
    pub min_candidates: usize,
    /// Dense index oversampling to absorb filtering
    pub filter_oversample: usize,
    /// BM25 k1
    pub bm25_k1: f32,
    /// BM25 b
    pub bm25_b: f32,
    /// Tombstone ratio that makes `compact_if_needed` rebuild
    pub compaction_threshold: f32,
    /// Directory holding the persisted dense index. `None` keeps it in memory.
    pub index_dir: Option<PathBuf>,
}

impl Default for HybridSearchConfig {
    fn default() -> Self {
        Self {
            m: DEFAULT_M,
            ef_construction: DEFAULT_EF_CONSTRUCTION,
            ef_search: DEFAULT_EF_SEARCH,
            dense_weight: DEFAULT_DENSE_WEIGHT,
            sparse_weight: DEFAULT_SPARSE_WEIGHT,
            rrf_k: crate::search::fusion::RRF_K,
            max_elements: DEFAULT_MAX_ELEMENTS,
            dimension: None,
            skew_threshold: DEFAULT_SKEW_THRESHOLD,
            oversample_factor: DEFAULT_OVERSAMPLE_FACTOR,
            min_candidates: DEFAULT_MIN_CANDIDATES,
            filter_oversample: DEFAULT_FILTER_OVERSAMPLE,
            bm25_k1: DEFAULT_BM25_K1,
            bm25_b: DEFAULT_BM25_B,
            compaction_threshold: DEFAULT_COMPACTION_THRESHOLD,
            index_dir: None,
        }
    }
}

impl HybridSearchConfig {
    /// Convenience constructor with a fixed embedding dimension.
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: Some(dimension),
            ..Self::default()
        }
    }

    /// Sets the on-disk location of the dense index.
    pub fn index_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.index_dir = Some(dir.into());
        self
    }

    /// Checks every option for a usable value.
    pub fn validate(&self) -> Result<(), SearchError> {
        fn invalid(msg: String) -> Result<(), SearchError> {
            Err(SearchError::InvalidConfig(msg))
        }

        if self.m < 2 {
            return invalid(format!("m must be at least 2, got {}", self.m));
        }
        if self.ef_construction == 0 {
            return invalid("ef_construction must be greater than 0".to_string());
        }
        validate_ef_search(self.ef_search)?;
        validate_weights(self.dense_weight, self.sparse_weight)?;
        if self.max_elements == 0 {
            return invalid("max_elements must be greater than 0".to_string());
        }
        if self.dimension == Some(0) {
            return invalid("dimension must be greater than 0".to_string());
        }
        if !(self.skew_threshold >= 0.0 && self.skew_threshold.is_finite()) {
            return invalid(format!(
                "skew_threshold must be a non-negative number, got {}",
                self.skew_threshold
            ));
        }
        if self.oversample_factor == 0 || self.filter_oversample == 0 {
            return invalid("oversampling factors must be at least 1".to_string());
        }
        if !(self.bm25_k1 >= 0.0 && self.bm25_k1.is_finite()) {
            return invalid(format!("bm25_k1 must be non-negative, got {}", self.bm25_k1));
        }
        if !(0.0..=1.0).contains(&self.bm25_b) {
            return invalid(format!("bm25_b must be in [0, 1], got {}", self.bm25_b));
        }
        if !(0.0..=1.0).contains(&self.compaction_threshold) {
            return invalid(format!(
                "compaction_threshold must be in [0, 1], got {}",
                self.compaction_threshold
            ));
        }
        Ok(())
    }
}

/// Validates a runtime `ef_search` value.
pub fn validate_ef_search(ef_search: usize) -> Result<(), SearchError> {
    if (MIN_EF_SEARCH..=MAX_EF_SEARCH).contains(&ef_search) {
        Ok(())
    } else {
        Err(SearchError::InvalidConfig(format!(
            "ef_search must be in [{}, {}], got {}",
            MIN_EF_SEARCH, MAX_EF_SEARCH, ef_search
        )))
    }
}

/// Validates a pair of fusion weights: finite, non-negative, not both zero.
pub fn validate_weights(dense: f32, sparse: f32) -> Result<(), SearchError> {
    let usable = |w: f32| w.is_finite() && w >= 0.0;
    if !usable(dense) || !usable(sparse) {
        return Err(SearchError::InvalidConfig(format!(
            "fusion weights must be finite and non-negative, got {} / {}",
            dense, sparse
        )));
    }
    if dense == 0.0 && sparse == 0.0 {
        return Err(SearchError::InvalidConfig(
            "fusion weights cannot both be zero".to_string(),
        ));
    }
    Ok(())
}
