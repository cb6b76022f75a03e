//! Approximate nearest neighbor backends.
//!
//! [`DenseIndex`](super::DenseIndex) talks to its graph through the
//! [`AnnBackend`] trait: insert a vector and get back a sequential label,
//! query for the nearest labels, save and load. Two implementations exist:
//!
//! - [`HnswBackend`]: rust-cv/hnsw graph, the default
//! - [`ExactBackend`]: brute-force cosine scan, for small corpora and as a
//!   reference in tests
//!
//! Both persist the same vector file (see [`persistence`](super::persistence)).

use super::persistence;
use crate::error::SearchError;
use hnsw::{Hnsw, Params, Searcher};
use rand::rngs::StdRng;
use space::{Metric, Neighbor};
use std::path::Path;

/// Graph construction parameters shared by all backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnParams {
    /// Node degree
    pub m: usize,
    /// Construction candidate list size
    pub ef_construction: usize,
}

impl Default for AnnParams {
    fn default() -> Self {
        Self {
            m: crate::config::DEFAULT_M,
            ef_construction: crate::config::DEFAULT_EF_CONSTRUCTION,
        }
    }
}

/// Nearest neighbor structure keyed by sequential labels.
///
/// Labels are assigned by `insert` in order `0, 1, 2, ...` and never reused.
/// Distances are cosine distances in `[0, 2]`.
pub trait AnnBackend: Send + Sync + Sized {
    /// Creates an empty structure for vectors of `dimension` components.
    fn open(params: &AnnParams, dimension: usize) -> Result<Self, SearchError>;

    /// Inserts a vector and returns its label.
    fn insert(&mut self, vector: Vec<f32>) -> usize;

    /// Returns up to `k` `(label, distance)` pairs, closest first.
    ///
    /// `ef` is the search candidate list size; backends without a graph
    /// ignore it.
    fn search(&self, query: &[f32], k: usize, ef: usize) -> Vec<(usize, f32)>;

    /// Number of inserted vectors.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes all vectors to `path` in label order.
    fn save(&self, path: &Path) -> Result<(), SearchError>;

    /// Restores a structure saved by [`save`](Self::save).
    ///
    /// Fails with [`SearchError::Corrupted`] when the file is invalid or its
    /// dimension differs from `dimension`.
    fn load(path: &Path, params: &AnnParams, dimension: usize) -> Result<Self, SearchError>;
}

/// Cosine distance `1 - cos(a, b)`, in `[0, 2]`.
///
/// Zero vectors are maximally distant from everything.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(&x, &y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|y| y * y).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 2.0;
    }

    (1.0 - dot / (mag_a * mag_b)).clamp(0.0, 2.0)
}

fn load_checked(path: &Path, dimension: usize) -> Result<Vec<Vec<f32>>, SearchError> {
    let (stored_dim, vectors) = persistence::read_vectors(path)?;
    if !vectors.is_empty() && stored_dim != dimension {
        return Err(SearchError::Corrupted(format!(
            "index file holds {}-d vectors, expected {}",
            stored_dim, dimension
        )));
    }
    Ok(vectors)
}

/// Cosine distance scaled to u32 for the HNSW graph.
///
/// Distance `[0, 2]` maps onto `[0, u32::MAX]`.
struct CosineDistance;

const DISTANCE_SCALE: f32 = u32::MAX as f32 / 2.0;

impl Metric<Box<[f32]>> for CosineDistance {
    type Unit = u32;

    fn distance(&self, a: &Box<[f32]>, b: &Box<[f32]>) -> u32 {
        (cosine_distance(a, b) * DISTANCE_SCALE) as u32
    }
}

/// HNSW graph from rust-cv/hnsw.
///
/// `M` is the number of bidirectional links per node at layers > 0 and `M0`
/// the number at layer 0 (conventionally `2 * M`). They are compile-time
/// parameters of the graph type, so [`AnnParams::m`] must equal `M`.
///
/// The graph owns each embedding as a `Box<[f32]>`, a stable heap allocation
/// that does not move when the graph grows. The RNG is seeded
/// deterministically, so loading a saved index by re-inserting its vectors in
/// label order reproduces the labels exactly.
pub struct HnswBackend<const M: usize = 16, const M0: usize = 32> {
    graph: Hnsw<CosineDistance, Box<[f32]>, StdRng, M, M0>,
    params: AnnParams,
}

impl<const M: usize, const M0: usize> HnswBackend<M, M0> {
    fn empty(params: &AnnParams) -> Result<Self, SearchError> {
        if params.m != M {
            return Err(SearchError::InvalidConfig(format!(
                "m = {} but the HNSW backend is compiled for m = {}",
                params.m, M
            )));
        }
        if params.ef_construction == 0 {
            return Err(SearchError::InvalidConfig(
                "ef_construction must be greater than 0".to_string(),
            ));
        }
        let graph = Hnsw::new_params(
            CosineDistance,
            Params::new().ef_construction(params.ef_construction),
        );
        Ok(Self {
            graph,
            params: *params,
        })
    }

    /// Construction parameters this graph was built with.
    pub fn params(&self) -> AnnParams {
        self.params
    }
}

impl<const M: usize, const M0: usize> AnnBackend for HnswBackend<M, M0> {
    fn open(params: &AnnParams, _dimension: usize) -> Result<Self, SearchError> {
        Self::empty(params)
    }

    fn insert(&mut self, vector: Vec<f32>) -> usize {
        let mut searcher = Searcher::default();
        self.graph.insert(vector.into_boxed_slice(), &mut searcher)
    }

    fn search(&self, query: &[f32], k: usize, ef: usize) -> Vec<(usize, f32)> {
        let k = k.min(self.graph.len());
        if k == 0 {
            return Vec::new();
        }

        let mut neighbors = vec![
            Neighbor {
                index: !0,
                distance: !0
            };
            k
        ];
        let mut searcher = Searcher::default();
        let query: Box<[f32]> = query.to_vec().into_boxed_slice();

        self.graph
            .nearest(&query, ef.max(k), &mut searcher, &mut neighbors)
            .iter()
            .filter(|n| n.index != !0)
            .map(|n| (n.index, n.distance as f32 / DISTANCE_SCALE))
            .collect()
    }

    fn len(&self) -> usize {
        self.graph.len()
    }

    fn save(&self, path: &Path) -> Result<(), SearchError> {
        let count = self.graph.len();
        let dimension = if count == 0 {
            0
        } else {
            self.graph.feature(0).len()
        };
        let vectors = (0..count).map(|label| &**self.graph.feature(label));
        persistence::write_vectors(path, dimension, vectors)?;
        Ok(())
    }

    fn load(path: &Path, params: &AnnParams, dimension: usize) -> Result<Self, SearchError> {
        let vectors = load_checked(path, dimension)?;
        let mut backend = Self::empty(params)?;
        let mut searcher = Searcher::default();
        for vector in vectors {
            backend
                .graph
                .insert(vector.into_boxed_slice(), &mut searcher);
        }
        Ok(backend)
    }
}

/// Exhaustive cosine scan.
///
/// Exact results at O(n) per query.
#[derive(Debug, Default)]
pub struct ExactBackend {
    vectors: Vec<Box<[f32]>>,
}

impl AnnBackend for ExactBackend {
    fn open(_params: &AnnParams, _dimension: usize) -> Result<Self, SearchError> {
        Ok(Self::default())
    }

    fn insert(&mut self, vector: Vec<f32>) -> usize {
        self.vectors.push(vector.into_boxed_slice());
        self.vectors.len() - 1
    }

    fn search(&self, query: &[f32], k: usize, _ef: usize) -> Vec<(usize, f32)> {
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(label, v)| (label, cosine_distance(query, v)))
            .collect();
        scored.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);
        scored
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }

    fn save(&self, path: &Path) -> Result<(), SearchError> {
        let dimension = self.vectors.first().map_or(0, |v| v.len());
        persistence::write_vectors(path, dimension, self.vectors.iter().map(|v| &**v))?;
        Ok(())
    }

    fn load(path: &Path, _params: &AnnParams, dimension: usize) -> Result<Self, SearchError> {
        let vectors = load_checked(path, dimension)?;
        Ok(Self {
            vectors: vectors.into_iter().map(Vec::into_boxed_slice).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fill<B: AnnBackend>(backend: &mut B) {
        for i in 0..100 {
            let angle = (i as f32) * 0.01;
            assert_eq!(backend.insert(vec![angle.cos(), angle.sin(), 0.0]), i);
        }
    }

    #[test]
    fn test_cosine_distance() {
        assert!(cosine_distance(&[1.0, 0.0], &[1.0, 0.0]).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 2.0);
    }

    #[test]
    fn test_hnsw_rejects_mismatched_degree() {
        let params = AnnParams {
            m: 8,
            ef_construction: 100,
        };
        assert!(matches!(
            HnswBackend::<16, 32>::open(&params, 3),
            Err(SearchError::InvalidConfig(_))
        ));
        assert!(HnswBackend::<8, 16>::open(&params, 3).is_ok());
    }

    #[test]
    fn test_hnsw_nearest_matches_exact() {
        let params = AnnParams::default();
        let mut hnsw: HnswBackend = HnswBackend::open(&params, 3).unwrap();
        let mut exact = ExactBackend::open(&params, 3).unwrap();
        fill(&mut hnsw);
        fill(&mut exact);

        let query = [0.5f32, 0.5, 0.0];
        let approx = hnsw.search(&query, 10, 50);
        let truth = exact.search(&query, 10, 50);

        assert_eq!(approx.len(), 10);
        assert_eq!(approx[0].0, truth[0].0);
        for pair in approx.windows(2) {
            assert!(pair[0].1 <= pair[1].1, "results should be closest first");
        }
    }

    #[test]
    fn test_search_more_than_len() {
        let params = AnnParams::default();
        let mut hnsw: HnswBackend = HnswBackend::open(&params, 2).unwrap();
        hnsw.insert(vec![1.0, 0.0]);
        hnsw.insert(vec![0.0, 1.0]);

        assert_eq!(hnsw.search(&[1.0, 0.0], 10, 50).len(), 2);
        assert!(hnsw.search(&[1.0, 0.0], 0, 50).is_empty());
    }

    #[test]
    fn test_hnsw_save_load_preserves_labels() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dense.index");
        let params = AnnParams::default();

        let mut original: HnswBackend = HnswBackend::open(&params, 3).unwrap();
        fill(&mut original);
        original.save(&path).unwrap();

        let loaded: HnswBackend = HnswBackend::load(&path, &params, 3).unwrap();
        assert_eq!(loaded.len(), 100);

        let query = [0.9f32, 0.1, 0.0];
        assert_eq!(
            original.search(&query, 5, 50),
            loaded.search(&query, 5, 50)
        );
    }

    #[test]
    fn test_load_rejects_wrong_dimension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dense.index");
        let params = AnnParams::default();

        let mut exact = ExactBackend::default();
        exact.insert(vec![1.0, 2.0, 3.0]);
        exact.save(&path).unwrap();

        assert!(matches!(
            ExactBackend::load(&path, &params, 4),
            Err(SearchError::Corrupted(_))
        ));
    }
}
