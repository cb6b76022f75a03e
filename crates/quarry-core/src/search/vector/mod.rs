//! Dense vector index with crash-safe persistence.
//!
//! [`DenseIndex`] maps chunk ids onto the sequential labels of an
//! [`AnnBackend`] (HNSW by default) and adds what the graph itself lacks:
//!
//! - **Dimension lock**: the first vector fixes the dimension for the whole
//!   generation (unless configured up front). Mismatched vectors are rejected,
//!   never truncated or padded.
//! - **Tombstones**: HNSW has no deletion. Removed labels stay in the graph and
//!   are filtered from results until the next rebuild drops them.
//! - **Persistence**: [`save`](DenseIndex::save) writes the vector file and a
//!   JSON sidecar atomically. [`initialize`](DenseIndex::initialize) validates
//!   both before loading and falls back to an empty index on any problem.
//!
//! # Labels
//!
//! Labels are `0..len()` in insertion order. A chunk re-added with a new
//! vector gets a new label and its old one is tombstoned.

pub mod backend;
pub mod persistence;

pub use backend::{AnnBackend, AnnParams, ExactBackend, HnswBackend};

use self::persistence::{IndexPaths, Sidecar};
use super::types::{validate_dimension, validate_finite, BatchOutcome, ChunkId};
use crate::config::{validate_ef_search, HybridSearchConfig};
use crate::error::SearchError;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, instrument, warn};

/// What [`DenseIndex::initialize`] found on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitializeOutcome {
    /// A persisted generation was loaded
    pub loaded: bool,
    /// Persisted files were invalid and have been discarded
    pub corrupted: bool,
    /// Why the files were discarded
    pub reason: Option<String>,
    /// Elements (including tombstoned) after initialization
    pub element_count: usize,
}

/// Chunk-id keyed wrapper around an ANN backend.
pub struct DenseIndex<B: AnnBackend = HnswBackend> {
    /// Created once the dimension is known
    backend: Option<B>,
    params: AnnParams,
    /// Dimension fixed by configuration, restored by `clear`
    configured_dimension: Option<usize>,
    /// Dimension of the current generation
    dimension: Option<usize>,
    /// label -> chunk id
    labels: Vec<ChunkId>,
    /// chunk id -> live label
    label_of: HashMap<ChunkId, usize>,
    tombstones: HashSet<usize>,
    ef_search: AtomicUsize,
    capacity: usize,
    filter_oversample: usize,
    paths: Option<IndexPaths>,
}

impl<B: AnnBackend> DenseIndex<B> {
    /// Creates an index that is never written to disk.
    pub fn in_memory(config: &HybridSearchConfig) -> Self {
        Self::with_paths(config, None)
    }

    /// Creates an index persisted under `dir`.
    ///
    /// Nothing is read until [`initialize`](Self::initialize).
    pub fn open(dir: impl Into<PathBuf>, config: &HybridSearchConfig) -> Self {
        Self::with_paths(config, Some(IndexPaths::new(dir)))
    }

    fn with_paths(config: &HybridSearchConfig, paths: Option<IndexPaths>) -> Self {
        Self {
            backend: None,
            params: AnnParams {
                m: config.m,
                ef_construction: config.ef_construction,
            },
            configured_dimension: config.dimension,
            dimension: config.dimension,
            labels: Vec::new(),
            label_of: HashMap::new(),
            tombstones: HashSet::new(),
            ef_search: AtomicUsize::new(config.ef_search),
            capacity: config.max_elements,
            filter_oversample: config.filter_oversample.max(1),
            paths,
        }
    }

    /// Creates an empty index with the same settings and location.
    ///
    /// Used by rebuilds to prepare a fresh generation.
    pub fn fresh_generation(&self) -> Self {
        Self {
            backend: None,
            params: self.params,
            configured_dimension: self.configured_dimension,
            dimension: self.configured_dimension,
            labels: Vec::new(),
            label_of: HashMap::new(),
            tombstones: HashSet::new(),
            ef_search: AtomicUsize::new(self.ef_search()),
            capacity: self.capacity,
            filter_oversample: self.filter_oversample,
            paths: self.paths.clone(),
        }
    }

    /// Loads the persisted generation, or starts empty.
    ///
    /// Leftover temp files are deleted first. Invalid files are deleted and
    /// reported through [`InitializeOutcome::corrupted`]; corruption is never
    /// returned as an error. Only filesystem failures while cleaning up are.
    #[instrument(skip_all)]
    pub fn initialize(&mut self) -> Result<InitializeOutcome, SearchError> {
        self.reset();
        let Some(paths) = self.paths.clone() else {
            return Ok(InitializeOutcome::default());
        };

        paths.remove_temp_files()?;
        if !paths.any_exists() {
            debug!("No persisted dense index in {}", paths.dir().display());
            return Ok(InitializeOutcome::default());
        }

        match self.load_from(&paths) {
            Ok(()) => {
                info!(
                    "Loaded dense index: {} elements ({} tombstoned), dimension {:?}",
                    self.labels.len(),
                    self.tombstones.len(),
                    self.dimension
                );
                Ok(InitializeOutcome {
                    loaded: true,
                    corrupted: false,
                    reason: None,
                    element_count: self.labels.len(),
                })
            }
            Err(err) => {
                let reason = err.to_string();
                warn!("Discarding dense index in {}: {}", paths.dir().display(), reason);
                self.reset();
                paths.remove_all()?;
                Ok(InitializeOutcome {
                    loaded: false,
                    corrupted: true,
                    reason: Some(reason),
                    element_count: 0,
                })
            }
        }
    }

    fn load_from(&mut self, paths: &IndexPaths) -> Result<(), SearchError> {
        if !paths.index().exists() || !paths.sidecar().exists() {
            return Err(SearchError::Corrupted(
                "index file and sidecar must both be present".to_string(),
            ));
        }

        let sidecar = persistence::read_sidecar(paths.sidecar())?;
        if let (Some(configured), Some(stored)) = (self.configured_dimension, sidecar.dimension) {
            if configured != stored {
                return Err(SearchError::Corrupted(format!(
                    "persisted dimension {} differs from configured {}",
                    stored, configured
                )));
            }
        }
        if sidecar.element_count > self.capacity {
            return Err(SearchError::Corrupted(format!(
                "{} elements exceed capacity {}",
                sidecar.element_count, self.capacity
            )));
        }

        let dimension = sidecar.dimension.or(self.configured_dimension);
        let backend = match dimension {
            Some(dim) => {
                let backend = B::load(paths.index(), &self.params, dim)?;
                if backend.len() != sidecar.element_count {
                    return Err(SearchError::Corrupted(format!(
                        "index file holds {} vectors, sidecar declares {}",
                        backend.len(),
                        sidecar.element_count
                    )));
                }
                Some(backend)
            }
            None => {
                // Nothing was ever inserted; the file must still be well formed
                let (_, vectors) = persistence::read_vectors(paths.index())?;
                if !vectors.is_empty() {
                    return Err(SearchError::Corrupted(
                        "vectors present without a dimension".to_string(),
                    ));
                }
                None
            }
        };

        let labels = sidecar.chunk_ids_by_label();
        let tombstones: HashSet<usize> = sidecar.tombstones.iter().copied().collect();
        let mut label_of = HashMap::with_capacity(labels.len());
        for (label, &chunk_id) in labels.iter().enumerate() {
            if !tombstones.contains(&label) {
                label_of.insert(chunk_id, label);
            }
        }

        self.backend = backend;
        self.dimension = dimension;
        self.labels = labels;
        self.label_of = label_of;
        self.tombstones = tombstones;
        Ok(())
    }

    /// Drops all in-memory state.
    fn reset(&mut self) {
        self.backend = None;
        self.dimension = self.configured_dimension;
        self.labels.clear();
        self.label_of.clear();
        self.tombstones.clear();
    }

    /// Checks a vector against the current generation without inserting it.
    pub fn validate_vector(&self, embedding: &[f32]) -> Result<(), SearchError> {
        if embedding.is_empty() {
            return Err(SearchError::InvalidVector("vector is empty".to_string()));
        }
        if let Some(dim) = self.dimension {
            validate_dimension(dim, embedding.len())?;
        }
        validate_finite(embedding)
    }

    /// Inserts one vector and returns its label.
    ///
    /// # Errors
    ///
    /// - `DimensionMismatch` if the length differs from the locked dimension
    /// - `InvalidVector` for empty vectors or non-finite components
    /// - `IndexFull` when `capacity()` elements exist (tombstoned included)
    #[instrument(skip_all, fields(chunk_id = %chunk_id, index_size = self.labels.len()))]
    pub fn add_point(&mut self, chunk_id: ChunkId, embedding: Vec<f32>) -> Result<usize, SearchError> {
        self.validate_vector(&embedding)?;
        if self.labels.len() >= self.capacity {
            return Err(SearchError::IndexFull {
                capacity: self.capacity,
            });
        }

        if self.backend.is_none() {
            let dim = embedding.len();
            self.backend = Some(B::open(&self.params, dim)?);
            self.dimension = Some(dim);
        }
        let Some(backend) = self.backend.as_mut() else {
            return Err(SearchError::IndexError("backend not initialized".to_string()));
        };

        if let Some(old) = self.label_of.remove(&chunk_id) {
            self.tombstones.insert(old);
        }

        let label = backend.insert(embedding);
        debug_assert_eq!(label, self.labels.len());
        self.labels.push(chunk_id);
        self.label_of.insert(chunk_id, label);
        Ok(label)
    }

    /// Inserts a batch, skipping items that fail validation.
    ///
    /// Returns [`SearchError::BatchRejected`] only when a non-empty batch had
    /// no successful item.
    #[instrument(skip_all)]
    pub fn add_points<I>(&mut self, items: I) -> Result<BatchOutcome, SearchError>
    where
        I: IntoIterator<Item = (ChunkId, Vec<f32>)>,
    {
        let mut outcome = BatchOutcome::default();
        for (chunk_id, embedding) in items {
            match self.add_point(chunk_id, embedding) {
                Ok(_) => outcome.added += 1,
                Err(err) => {
                    warn!("Skipping chunk {}: {}", chunk_id, err);
                    outcome.record_failure(chunk_id, err);
                }
            }
        }
        outcome.into_result()
    }

    /// Returns up to `k` `(ChunkId, cosine similarity)` pairs, most similar first.
    ///
    /// Tombstoned labels and ids outside `id_filter` are skipped. Because they
    /// are skipped after the graph query, `k * filter_oversample` candidates
    /// are requested from the graph.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        id_filter: Option<&HashSet<ChunkId>>,
    ) -> Result<Vec<(ChunkId, f32)>, SearchError> {
        self.validate_vector(query)?;

        let Some(backend) = self.backend.as_ref() else {
            return Ok(Vec::new());
        };
        if k == 0 || backend.is_empty() {
            return Ok(Vec::new());
        }

        let candidates = k.saturating_mul(self.filter_oversample).min(backend.len());
        let ef = self.ef_search().max(candidates);

        let mut results: Vec<(ChunkId, f32)> = backend
            .search(query, candidates, ef)
            .into_iter()
            .filter(|(label, _)| !self.tombstones.contains(label))
            .filter_map(|(label, distance)| {
                let chunk_id = *self.labels.get(label)?;
                if id_filter.is_some_and(|ids| !ids.contains(&chunk_id)) {
                    return None;
                }
                Some((chunk_id, (1.0 - distance).clamp(-1.0, 1.0)))
            })
            .collect();
        results.truncate(k);
        Ok(results)
    }

    /// Tombstones a chunk. Returns `false` if it has no live label.
    pub fn remove(&mut self, chunk_id: ChunkId) -> bool {
        match self.label_of.remove(&chunk_id) {
            Some(label) => {
                self.tombstones.insert(label);
                true
            }
            None => false,
        }
    }

    /// Persists the vector file and sidecar. No-op for in-memory indexes.
    #[instrument(skip_all, fields(elements = self.labels.len()))]
    pub fn save(&self) -> Result<(), SearchError> {
        let Some(paths) = self.paths.as_ref() else {
            return Ok(());
        };

        match self.backend.as_ref() {
            Some(backend) => backend.save(paths.index())?,
            None => persistence::write_vectors(
                paths.index(),
                self.dimension.unwrap_or(0),
                std::iter::empty(),
            )?,
        }
        let sidecar = Sidecar::new(self.dimension, &self.labels, self.tombstones.iter().copied());
        persistence::write_sidecar(paths.sidecar(), &sidecar)?;

        info!(
            "Saved dense index to {} ({} elements)",
            paths.dir().display(),
            self.labels.len()
        );
        Ok(())
    }

    /// Discards all vectors in memory and on disk.
    pub fn clear(&mut self) -> Result<(), SearchError> {
        self.reset();
        if let Some(paths) = self.paths.as_ref() {
            paths.remove_all()?;
        }
        Ok(())
    }

    /// Fixes the dimension of an empty index.
    pub fn set_dimension(&mut self, dimension: usize) -> Result<(), SearchError> {
        if dimension == 0 {
            return Err(SearchError::InvalidConfig(
                "dimension must be greater than 0".to_string(),
            ));
        }
        match self.dimension {
            Some(current) if current != dimension && !self.labels.is_empty() => {
                Err(SearchError::DimensionMismatch {
                    expected: current,
                    actual: dimension,
                })
            }
            _ => {
                if self.labels.is_empty() {
                    self.backend = None;
                }
                self.dimension = Some(dimension);
                Ok(())
            }
        }
    }

    /// Changes the search candidate list size.
    pub fn set_ef_search(&self, ef_search: usize) -> Result<(), SearchError> {
        validate_ef_search(ef_search)?;
        self.ef_search.store(ef_search, Ordering::Relaxed);
        Ok(())
    }

    pub fn ef_search(&self) -> usize {
        self.ef_search.load(Ordering::Relaxed)
    }

    /// Elements in the graph, tombstoned ones included.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Elements that can still be returned.
    pub fn live_len(&self) -> usize {
        self.label_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn tombstone_count(&self) -> usize {
        self.tombstones.len()
    }

    /// Share of elements that are tombstoned, 0.0 when empty.
    pub fn tombstone_ratio(&self) -> f32 {
        if self.labels.is_empty() {
            0.0
        } else {
            self.tombstones.len() as f32 / self.labels.len() as f32
        }
    }

    pub fn chunk_id_at(&self, label: usize) -> Option<ChunkId> {
        self.labels.get(label).copied()
    }

    /// Live label of a chunk.
    pub fn label_of(&self, chunk_id: ChunkId) -> Option<usize> {
        self.label_of.get(&chunk_id).copied()
    }

    /// Chunks with a live label, in no particular order.
    pub fn live_chunk_ids(&self) -> impl Iterator<Item = ChunkId> + '_ {
        self.label_of.keys().copied()
    }

    /// Returns `true` if the index is backed by files.
    pub fn is_persistent(&self) -> bool {
        self.paths.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::persistence::{tmp_path, INDEX_FILE, SIDECAR_FILE};
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn id(n: u64) -> ChunkId {
        ChunkId::from_u64(n)
    }

    fn config() -> HybridSearchConfig {
        HybridSearchConfig::default()
    }

    #[test]
    fn test_vector_search() {
        let mut index: DenseIndex = DenseIndex::in_memory(&config());

        index.add_point(id(1), vec![1.0, 0.0, 0.0]).unwrap();
        index.add_point(id(2), vec![0.0, 1.0, 0.0]).unwrap();
        index.add_point(id(3), vec![1.0, 0.1, 0.0]).unwrap();

        let results = index.search(&[1.0, 0.0, 0.0], 2, None).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, id(1));
        assert_eq!(results[1].0, id(3));
    }

    #[test]
    fn test_similar_vectors_rank_first() {
        // Two chunks at cosine ~0.99 to the query, one at ~0.1
        let mut index: DenseIndex = DenseIndex::in_memory(&config());
        let query = [1.0f32, 0.0, 0.0, 0.0];
        index.add_point(id(1), vec![0.99, 0.141, 0.0, 0.0]).unwrap();
        index.add_point(id(2), vec![0.1, 0.995, 0.0, 0.0]).unwrap();
        index.add_point(id(3), vec![0.995, 0.0, 0.1, 0.0]).unwrap();

        let results = index.search(&query, 2, None).unwrap();

        let ids: Vec<ChunkId> = results.iter().map(|(c, _)| *c).collect();
        assert_eq!(ids, vec![id(3), id(1)]);
        assert!(results[0].1 >= results[1].1);
        assert!(results[1].1 > 0.98);
    }

    #[test]
    fn test_exact_match_returns_high_similarity() {
        let mut index: DenseIndex = DenseIndex::in_memory(&config());
        let embedding = vec![0.5, 0.3, 0.2];
        index.add_point(id(1), embedding.clone()).unwrap();

        let results = index.search(&embedding, 1, None).unwrap();
        assert!(results[0].1 > 0.99, "got {}", results[0].1);
    }

    #[test]
    fn test_dimension_locks_on_first_insert() {
        let mut index: DenseIndex = DenseIndex::in_memory(&config());
        assert_eq!(index.dimension(), None);

        index.add_point(id(1), vec![1.0, 0.0, 0.0]).unwrap();
        assert_eq!(index.dimension(), Some(3));

        assert!(matches!(
            index.add_point(id(2), vec![1.0, 0.0]),
            Err(SearchError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
        assert!(matches!(
            index.search(&[1.0, 0.0], 1, None),
            Err(SearchError::DimensionMismatch { .. })
        ));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_rejects_non_finite_and_empty() {
        let mut index: DenseIndex = DenseIndex::in_memory(&config());
        assert!(matches!(
            index.add_point(id(1), vec![1.0, f32::NAN]),
            Err(SearchError::InvalidVector(_))
        ));
        assert!(matches!(
            index.add_point(id(1), vec![]),
            Err(SearchError::InvalidVector(_))
        ));
        // Rejected vectors do not lock the dimension
        assert_eq!(index.dimension(), None);
    }

    #[test]
    fn test_capacity() {
        let cfg = HybridSearchConfig {
            max_elements: 2,
            ..config()
        };
        let mut index: DenseIndex = DenseIndex::in_memory(&cfg);
        index.add_point(id(1), vec![1.0, 0.0]).unwrap();
        index.add_point(id(2), vec![0.0, 1.0]).unwrap();

        assert!(matches!(
            index.add_point(id(3), vec![1.0, 1.0]),
            Err(SearchError::IndexFull { capacity: 2 })
        ));
    }

    #[test]
    fn test_batch_skips_invalid_items() {
        let mut index: DenseIndex = DenseIndex::in_memory(&config());
        let mut batch: Vec<(ChunkId, Vec<f32>)> = (0..20)
            .map(|i| (id(i), vec![i as f32 + 1.0, 1.0, 0.0]))
            .collect();
        batch.push((id(100), vec![1.0, 0.0]));
        batch.push((id(101), vec![f32::INFINITY, 0.0, 0.0]));

        let outcome = index.add_points(batch).unwrap();

        assert_eq!(outcome.added, 20);
        assert_eq!(outcome.skipped, 2);
        assert_eq!(outcome.failures[0].0, id(100));
        assert_eq!(index.len(), 20);
    }

    #[test]
    fn test_batch_all_invalid_is_rejected() {
        let mut index: DenseIndex = DenseIndex::in_memory(&config());
        index.add_point(id(1), vec![1.0, 0.0, 0.0]).unwrap();

        let result = index.add_points(vec![(id(2), vec![1.0]), (id(3), vec![1.0, 2.0])]);
        assert!(matches!(
            result,
            Err(SearchError::BatchRejected { skipped: 2, .. })
        ));
        assert!(index.add_points(Vec::new()).is_ok());
    }

    #[test]
    fn test_remove_tombstones() {
        let mut index: DenseIndex = DenseIndex::in_memory(&config());
        index.add_point(id(1), vec![1.0, 0.0, 0.0]).unwrap();
        index.add_point(id(2), vec![0.9, 0.1, 0.0]).unwrap();
        index.add_point(id(3), vec![0.0, 1.0, 0.0]).unwrap();

        assert!(index.remove(id(1)));
        assert!(!index.remove(id(1)));

        let results = index.search(&[1.0, 0.0, 0.0], 10, None).unwrap();
        assert_eq!(results.len(), 2);
        assert!(!results.iter().any(|(c, _)| *c == id(1)));
        assert_eq!(index.len(), 3);
        assert_eq!(index.live_len(), 2);
        assert!((index.tombstone_ratio() - 1.0 / 3.0).abs() < 1e-6);

        let mut live: Vec<u64> = index.live_chunk_ids().map(|c| c.as_u64()).collect();
        live.sort_unstable();
        assert_eq!(live, vec![2, 3]);
    }

    #[test]
    fn test_readd_replaces_label() {
        let mut index: DenseIndex = DenseIndex::in_memory(&config());
        index.add_point(id(1), vec![1.0, 0.0]).unwrap();
        let label = index.add_point(id(1), vec![0.0, 1.0]).unwrap();

        assert_eq!(label, 1);
        assert_eq!(index.label_of(id(1)), Some(1));
        assert_eq!(index.tombstone_count(), 1);

        let results = index.search(&[1.0, 0.0], 5, None).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].1 < 0.1);
    }

    #[test]
    fn test_id_filter() {
        let mut index: DenseIndex = DenseIndex::in_memory(&config());
        for i in 0..10 {
            index.add_point(id(i), vec![1.0, i as f32 * 0.1]).unwrap();
        }
        let allowed: HashSet<ChunkId> = [id(7)].into_iter().collect();

        let results = index.search(&[1.0, 0.0], 10, Some(&allowed)).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, id(7));
    }

    #[test]
    fn test_set_ef_search_bounds() {
        let index: DenseIndex = DenseIndex::in_memory(&config());
        index.set_ef_search(200).unwrap();
        assert_eq!(index.ef_search(), 200);
        assert!(index.set_ef_search(5).is_err());
        assert!(index.set_ef_search(501).is_err());
        assert_eq!(index.ef_search(), 200);
    }

    #[test]
    fn test_set_dimension_only_when_empty() {
        let mut index: DenseIndex = DenseIndex::in_memory(&config());
        index.set_dimension(4).unwrap();
        assert!(matches!(
            index.add_point(id(1), vec![1.0, 0.0]),
            Err(SearchError::DimensionMismatch { expected: 4, .. })
        ));
        index.add_point(id(1), vec![1.0, 0.0, 0.0, 0.0]).unwrap();
        assert!(index.set_dimension(3).is_err());
    }

    #[test]
    fn test_save_and_initialize_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut index: DenseIndex = DenseIndex::open(dir.path(), &config());
        assert_eq!(index.initialize().unwrap(), InitializeOutcome::default());

        for i in 0..50 {
            let angle = i as f32 * 0.05;
            index.add_point(id(i), vec![angle.cos(), angle.sin(), 0.2]).unwrap();
        }
        index.remove(id(3));
        index.save().unwrap();

        let query = [0.8f32, 0.6, 0.2];
        let before = index.search(&query, 5, None).unwrap();

        let mut reopened: DenseIndex = DenseIndex::open(dir.path(), &config());
        let outcome = reopened.initialize().unwrap();

        assert!(outcome.loaded);
        assert!(!outcome.corrupted);
        assert_eq!(outcome.element_count, 50);
        assert_eq!(reopened.live_len(), 49);
        assert_eq!(reopened.dimension(), Some(3));
        assert_eq!(reopened.search(&query, 5, None).unwrap(), before);
    }

    #[test]
    fn test_corrupted_index_recovers_empty() {
        let dir = TempDir::new().unwrap();
        let mut index: DenseIndex = DenseIndex::open(dir.path(), &config());
        index.initialize().unwrap();
        index.add_point(id(1), vec![1.0, 0.0, 0.0]).unwrap();
        index.save().unwrap();

        // Below the minimum header size, plus a stale temp file
        fs::write(dir.path().join(INDEX_FILE), b"QRY").unwrap();
        fs::write(tmp_path(&dir.path().join(SIDECAR_FILE)), b"{").unwrap();

        let mut reopened: DenseIndex = DenseIndex::open(dir.path(), &config());
        let outcome = reopened.initialize().unwrap();

        assert!(!outcome.loaded);
        assert!(outcome.corrupted);
        assert!(outcome.reason.is_some());
        assert!(reopened.is_empty());
        assert!(!dir.path().join(INDEX_FILE).exists());
        assert!(!tmp_path(&dir.path().join(SIDECAR_FILE)).exists());

        reopened.add_point(id(2), vec![0.0, 1.0]).unwrap();
        assert_eq!(reopened.len(), 1);
    }

    #[test]
    fn test_count_mismatch_is_corruption() {
        let dir = TempDir::new().unwrap();
        let mut index: DenseIndex = DenseIndex::open(dir.path(), &config());
        index.initialize().unwrap();
        index.add_point(id(1), vec![1.0, 0.0]).unwrap();
        index.add_point(id(2), vec![0.0, 1.0]).unwrap();
        index.save().unwrap();

        let sidecar = Sidecar::new(Some(2), &[id(1)], []);
        persistence::write_sidecar(&dir.path().join(SIDECAR_FILE), &sidecar).unwrap();

        let mut reopened: DenseIndex = DenseIndex::open(dir.path(), &config());
        let outcome = reopened.initialize().unwrap();
        assert!(outcome.corrupted);
    }

    #[test]
    fn test_clear_removes_files() {
        let dir = TempDir::new().unwrap();
        let mut index: DenseIndex = DenseIndex::open(dir.path(), &config());
        index.initialize().unwrap();
        index.add_point(id(1), vec![1.0, 0.0]).unwrap();
        index.save().unwrap();

        index.clear().unwrap();

        assert!(index.is_empty());
        assert_eq!(index.dimension(), None);
        assert!(!dir.path().join(INDEX_FILE).exists());
        index.add_point(id(1), vec![1.0, 0.0, 0.0, 0.0]).unwrap();
    }

    #[test]
    fn test_exact_backend_index() {
        let mut index: DenseIndex<ExactBackend> = DenseIndex::in_memory(&config());
        index.add_point(id(1), vec![1.0, 0.0]).unwrap();
        index.add_point(id(2), vec![0.7, 0.7]).unwrap();
        index.add_point(id(3), vec![0.0, 1.0]).unwrap();

        let results = index.search(&[1.0, 0.1], 3, None).unwrap();
        let ids: Vec<ChunkId> = results.iter().map(|(c, _)| *c).collect();
        assert_eq!(ids, vec![id(1), id(2), id(3)]);
    }
}
