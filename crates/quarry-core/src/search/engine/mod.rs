//! Index coordinator keeping the dense and lexical indexes in step with the
//! chunk store.
//!
//! This module provides the [`IndexCoordinator`] which orchestrates:
//! - Ingestion: store first, then both in-memory indexes
//! - Hybrid queries: HNSW + BM25 retrieval, weighted RRF, enrichment
//! - Full rebuilds from the store when the indexes drift or go missing
//!
//! # Architecture
//!
//! - **Source of truth (store)**: chunk text, embeddings, parent metadata
//! - **Derived state (memory)**: [`DenseIndex`] and [`LexicalIndex`]. The dense
//!   index is also persisted so a restart does not need a rebuild.
//!
//! # Concurrency
//!
//! Mutations (ingest, batch ingest, delete, rebuild) are serialized by an async
//! write lock. The indexes sit behind `std::sync::RwLock`s that are only held
//! in synchronous sections, never across an `.await`, so queries run
//! concurrently with each other. While a rebuild runs, queries fail fast with
//! [`SearchError::IndexesRebuilding`]. A query that finds the indexes out of
//! sync waits for the write lock, then checks again before rebuilding.
//!
//! # Recovery
//!
//! Single ingests do not save the dense index. On open, a persisted dense
//! index is reconciled with the store: stored chunks it lacks are inserted and
//! chunks the store no longer holds are tombstoned. Stored chunks the dense
//! index rejects (wrong dimension, non-finite values, over capacity) are
//! remembered as unindexed and left out of the skew comparison.
//!
//! # Example
//!
//! ```ignore
//! use quarry_core::config::HybridSearchConfig;
//! use quarry_core::search::IndexCoordinator;
//! use quarry_core::storage::InMemoryChunkStore;
//!
//! let config = HybridSearchConfig::with_dimension(384);
//! let (coordinator, report) = IndexCoordinator::<_>::open(InMemoryChunkStore::new(), config).await?;
//!
//! coordinator.ingest(chunk, embedding).await?;
//! let results = coordinator
//!     .search(Some("rust borrow checker"), &query_embedding, 10, None)
//!     .await?;
//! ```

mod compaction;
mod rebuild;


pub use rebuild::{RebuildPhase, RebuildProgress, RebuildReport};

use super::entity_boost::EntityBoost;
use super::fusion::{FusionCandidate, RankFusion};
use super::keyword::{Bm25Params, LexicalIndex, LexicalStats};
use super::types::{
    BatchOutcome, ChunkId, ChunkRecord, DocumentId, DocumentMetadata, SearchFilter, SearchResult,
};
use super::vector::{AnnBackend, DenseIndex, HnswBackend, InitializeOutcome};
use crate::config::HybridSearchConfig;
use crate::error::SearchError;
use crate::storage::ChunkStore;
use instant::Instant;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, instrument, warn};

/// What [`IndexCoordinator::open`] found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenReport {
    /// Outcome of loading the persisted dense index
    pub dense: InitializeOutcome,
    /// Documents hydrated into the lexical index
    pub lexical_documents: usize,
    /// Chunks with embeddings in the store
    pub store_count: usize,
    /// Stored chunks inserted into a loaded dense index that lacked them
    pub dense_added: usize,
    /// Loaded dense entries tombstoned because the store no longer has them
    pub dense_removed: usize,
    /// Stored chunks the dense index rejected
    pub unindexed: usize,
}

/// Point-in-time counters of a coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexStats {
    /// Dense elements, tombstoned ones included
    pub dense_len: usize,
    /// Dense elements that can still be returned
    pub dense_live: usize,
    pub tombstones: usize,
    pub dimension: Option<usize>,
    pub lexical: LexicalStats,
    /// Chunks with embeddings in the store
    pub store_count: usize,
    /// Stored chunks the dense index rejected
    pub unindexed: usize,
    /// Incremented by every completed rebuild
    pub generation: u64,
    pub rebuilds: u64,
    pub ef_search: usize,
    /// Normalized `(dense, sparse)` fusion weights
    pub fusion_weights: (f32, f32),
}

/// Keeps a [`DenseIndex`] and a [`LexicalIndex`] consistent with a
/// [`ChunkStore`] and answers hybrid queries over them.
///
/// One coordinator per corpus. All methods take `&self`; share it with
/// `Arc<IndexCoordinator<_>>`.
pub struct IndexCoordinator<S: ChunkStore, B: AnnBackend = HnswBackend> {
    pub(crate) store: S,
    pub(crate) config: HybridSearchConfig,
    pub(crate) dense: RwLock<DenseIndex<B>>,
    pub(crate) lexical: RwLock<LexicalIndex>,
    pub(crate) fusion: RwLock<RankFusion>,
    /// Serializes mutations
    pub(crate) write_lock: tokio::sync::Mutex<()>,
    pub(crate) rebuilding: AtomicBool,
    pub(crate) generation: AtomicU64,
    pub(crate) rebuilds: AtomicU64,
    /// Stored chunks whose embedding the dense index rejected
    pub(crate) unindexed: Mutex<HashSet<ChunkId>>,
}

/// Result of matching a loaded dense index against the store.
#[derive(Debug, Default)]
struct Reconciliation {
    added: usize,
    removed: usize,
    unindexed: HashSet<ChunkId>,
}

impl<S: ChunkStore, B: AnnBackend> IndexCoordinator<S, B> {
    /// Opens a corpus.
    ///
    /// Validates `config`, loads the persisted dense index from
    /// `config.index_dir` (or starts an in-memory one) and hydrates the lexical
    /// index from the store. A loaded dense index is reconciled with the store
    /// and saved if that changed it. A missing or corrupted dense index
    /// (reported in [`OpenReport::dense`]) is left empty; the first query then
    /// rebuilds it.
    #[instrument(skip_all)]
    pub async fn open(store: S, config: HybridSearchConfig) -> Result<(Self, OpenReport), SearchError> {
        config.validate()?;
        let start = Instant::now();

        let mut dense = match config.index_dir.as_ref() {
            Some(dir) => DenseIndex::<B>::open(dir, &config),
            None => DenseIndex::<B>::in_memory(&config),
        };
        let outcome = dense.initialize()?;
        let dense_elapsed = start.elapsed();

        let chunks = store.all_chunks_with_embeddings().await?;
        let store_count = chunks.len();
        let mut lexical = LexicalIndex::new(Bm25Params {
            k1: config.bm25_k1,
            b: config.bm25_b,
        });

        let reconciliation = if dense.is_empty() {
            for (chunk, _) in &chunks {
                lexical.add(chunk.id, &chunk.text);
            }
            Reconciliation::default()
        } else {
            Self::reconcile(&mut dense, &mut lexical, chunks)?
        };

        let fusion = RankFusion::new(config.rrf_k, config.dense_weight, config.sparse_weight)?;

        info!(
            "Opened corpus in {:?} (dense: {} elements, loaded={}, corrupted={}, dense load: {:?}; lexical: {} documents)",
            start.elapsed(),
            outcome.element_count,
            outcome.loaded,
            outcome.corrupted,
            dense_elapsed,
            lexical.len()
        );

        let report = OpenReport {
            dense: outcome,
            lexical_documents: lexical.len(),
            store_count,
            dense_added: reconciliation.added,
            dense_removed: reconciliation.removed,
            unindexed: reconciliation.unindexed.len(),
        };

        let coordinator = Self {
            store,
            config,
            dense: RwLock::new(dense),
            lexical: RwLock::new(lexical),
            fusion: RwLock::new(fusion),
            write_lock: tokio::sync::Mutex::new(()),
            rebuilding: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            rebuilds: AtomicU64::new(0),
            unindexed: Mutex::new(reconciliation.unindexed),
        };
        Ok((coordinator, report))
    }

    /// Brings a loaded dense index in line with the store and fills the
    /// lexical index with every chunk the dense index holds.
    fn reconcile(
        dense: &mut DenseIndex<B>,
        lexical: &mut LexicalIndex,
        chunks: Vec<(ChunkRecord, Vec<f32>)>,
    ) -> Result<Reconciliation, SearchError> {
        let mut result = Reconciliation::default();
        let mut in_store = HashSet::with_capacity(chunks.len());

        for (chunk, embedding) in chunks {
            in_store.insert(chunk.id);
            if dense.label_of(chunk.id).is_none() {
                if let Err(err) = dense.add_point(chunk.id, embedding) {
                    warn!("Stored chunk {} cannot be indexed: {}", chunk.id, err);
                    result.unindexed.insert(chunk.id);
                    continue;
                }
                result.added += 1;
            }
            lexical.add(chunk.id, &chunk.text);
        }

        let stale: Vec<ChunkId> = dense
            .live_chunk_ids()
            .filter(|id| !in_store.contains(id))
            .collect();
        for id in &stale {
            dense.remove(*id);
        }
        result.removed = stale.len();

        if result.added > 0 || result.removed > 0 {
            info!(
                "Reconciled dense index with store: {} added, {} tombstoned",
                result.added, result.removed
            );
            dense.save()?;
        }
        Ok(result)
    }

    /// Get a reference to the chunk store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &HybridSearchConfig {
        &self.config
    }

    // =========================================================================
    // Lock helpers
    // =========================================================================
    //
    // A panic while holding an index lock leaves the index as the panicking
    // call left it; the next rebuild repairs any damage, so poisoning is
    // ignored rather than propagated.

    pub(crate) fn dense_read(&self) -> RwLockReadGuard<'_, DenseIndex<B>> {
        self.dense.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn dense_write(&self) -> RwLockWriteGuard<'_, DenseIndex<B>> {
        self.dense.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn lexical_read(&self) -> RwLockReadGuard<'_, LexicalIndex> {
        self.lexical.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn lexical_write(&self) -> RwLockWriteGuard<'_, LexicalIndex> {
        self.lexical.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn fusion_snapshot(&self) -> RankFusion {
        *self.fusion.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn unindexed(&self) -> MutexGuard<'_, HashSet<ChunkId>> {
        self.unindexed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Ingestion
    // =========================================================================

    /// Adds one chunk.
    ///
    /// The embedding is validated against the dense index, the chunk is
    /// written to the store, then both indexes are updated. The dense index
    /// is not saved; call [`persist`](Self::persist) or rely on the next batch
    /// or rebuild.
    ///
    /// # Errors
    ///
    /// - `DimensionMismatch` / `InvalidVector` / `IndexFull` before anything is stored
    /// - `StorageError` if the store rejects the chunk
    #[instrument(skip_all, fields(chunk_id = %chunk.id, text_len = chunk.text.len()))]
    pub async fn ingest(&self, chunk: ChunkRecord, embedding: Vec<f32>) -> Result<(), SearchError> {
        let _write = self.write_lock.lock().await;
        self.ingest_locked(&chunk, embedding).await
    }

    /// Adds a batch of chunks, skipping invalid items.
    ///
    /// Every item goes through the same steps as [`ingest`](Self::ingest).
    /// The dense index is saved once at the end.
    ///
    /// # Errors
    ///
    /// `BatchRejected` when a non-empty batch had no successful item.
    #[instrument(skip_all, fields(batch_size = items.len()))]
    pub async fn ingest_batch(
        &self,
        items: Vec<(ChunkRecord, Vec<f32>)>,
    ) -> Result<BatchOutcome, SearchError> {
        let _write = self.write_lock.lock().await;
        let start = Instant::now();

        let mut outcome = BatchOutcome::default();
        for (chunk, embedding) in items {
            match self.ingest_locked(&chunk, embedding).await {
                Ok(()) => outcome.added += 1,
                Err(err) => {
                    warn!("Skipping chunk {} in batch: {}", chunk.id, err);
                    outcome.record_failure(chunk.id, err);
                }
            }
        }

        if outcome.added > 0 {
            self.dense_read().save()?;
        }

        info!(
            "Ingested batch in {:?}: {} added, {} skipped",
            start.elapsed(),
            outcome.added,
            outcome.skipped
        );
        outcome.into_result()
    }

    /// Ingestion body; the caller holds the write lock.
    async fn ingest_locked(&self, chunk: &ChunkRecord, embedding: Vec<f32>) -> Result<(), SearchError> {
        {
            let dense = self.dense_read();
            dense.validate_vector(&embedding)?;
            if dense.len() >= dense.capacity() {
                return Err(SearchError::IndexFull {
                    capacity: dense.capacity(),
                });
            }
        }

        self.store.put_chunk(chunk, &embedding).await?;

        let indexed = self.dense_write().add_point(chunk.id, embedding);
        if let Err(err) = indexed {
            warn!("Chunk {} stored but not indexed: {}", chunk.id, err);
            self.unindexed().insert(chunk.id);
            return Err(err);
        }
        self.unindexed().remove(&chunk.id);
        self.lexical_write().add(chunk.id, &chunk.text);
        Ok(())
    }

    /// Stores parent document metadata used to enrich results.
    pub async fn put_parent_metadata(
        &self,
        document_id: DocumentId,
        metadata: &DocumentMetadata,
    ) -> Result<(), SearchError> {
        self.store.put_parent_metadata(document_id, metadata).await?;
        Ok(())
    }

    /// Removes a chunk from the store and the lexical index and tombstones it
    /// in the dense index.
    ///
    /// Returns `true` if the chunk was indexed or known as unindexed.
    #[instrument(skip(self))]
    pub async fn delete_chunk(&self, chunk_id: ChunkId) -> Result<bool, SearchError> {
        let _write = self.write_lock.lock().await;

        self.store.delete_chunk(chunk_id).await?;
        let tombstoned = self.dense_write().remove(chunk_id);
        let removed = self.lexical_write().remove(chunk_id);
        let was_unindexed = self.unindexed().remove(&chunk_id);

        debug!(tombstoned, removed, was_unindexed, "Deleted chunk {}", chunk_id);
        Ok(tombstoned || removed || was_unindexed)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Hybrid search.
    ///
    /// 1. Fails with `IndexesRebuilding` while a rebuild runs.
    /// 2. Rebuilds synchronously if the dense index drifted from the store.
    /// 3. Retrieves `max(k * oversample_factor, min_candidates)` candidates
    ///    from the dense index and, when `query_text` has content, from the
    ///    lexical index.
    /// 4. Fuses both rankings with weighted RRF.
    /// 5. Enriches candidates in fused order with chunk text and parent
    ///    metadata, dropping those whose lookups fail, until `k` results.
    ///
    /// # Errors
    ///
    /// - `InvalidQuery` if `k` is 0
    /// - `DimensionMismatch` / `InvalidVector` for a bad query embedding
    /// - `IndexesRebuilding` if a rebuild is running (retry later)
    #[must_use = "Search results should be used or errors handled"]
    #[instrument(skip_all, fields(k = k, has_text = query_text.is_some()))]
    pub async fn search(
        &self,
        query_text: Option<&str>,
        query_embedding: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<SearchResult>, SearchError> {
        self.retrieve(query_text, query_embedding, k, filter, k).await
    }

    /// Hybrid search with entity-boosted re-ranking.
    ///
    /// The boost is applied to every enriched candidate, not only the top
    /// `k`, so a strong entity match just below the cut can still surface.
    /// The result is then truncated to `k`.
    #[must_use = "Search results should be used or errors handled"]
    pub async fn search_with_entities(
        &self,
        query_text: Option<&str>,
        query_embedding: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
        boost: &EntityBoost,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let pool = self.candidate_size(k);
        let mut results = self
            .retrieve(query_text, query_embedding, k, filter, pool)
            .await?;
        boost.apply(&mut results);
        results.truncate(k);
        Ok(results)
    }

    fn candidate_size(&self, k: usize) -> usize {
        k.saturating_mul(self.config.oversample_factor)
            .max(self.config.min_candidates)
    }

    /// Query path shared by both searches; enriches up to `keep` candidates.
    async fn retrieve(
        &self,
        query_text: Option<&str>,
        query_embedding: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
        keep: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        if k == 0 {
            return Err(SearchError::InvalidQuery(
                "Number of results (k) must be greater than 0".to_string(),
            ));
        }
        self.ensure_not_rebuilding()?;
        self.sync_if_skewed().await?;

        let start = Instant::now();
        let candidate_size = self.candidate_size(k);
        let id_filter = filter.and_then(|f| f.chunk_ids.as_ref());
        let query_text = query_text.filter(|t| !t.trim().is_empty());

        // Lock order: dense, then lexical
        let (fused, dense_count, sparse_count) = {
            let dense = self.dense_read();
            let dense_results = dense.search(query_embedding, candidate_size, id_filter)?;

            let sparse_results = match query_text {
                Some(text) => self.lexical_read().search(text, candidate_size, id_filter),
                None => Vec::new(),
            };

            let fused = self
                .fusion_snapshot()
                .fuse(&dense_results, &sparse_results, candidate_size);
            (fused, dense_results.len(), sparse_results.len())
        };
        let retrieval_elapsed = start.elapsed();

        let results = self.enrich(fused, keep).await;

        debug!(
            "Search: {} dense + {} sparse candidates -> {} results (retrieval {:?}, total {:?})",
            dense_count,
            sparse_count,
            results.len(),
            retrieval_elapsed,
            start.elapsed()
        );
        Ok(results)
    }

    /// Turns fused candidates into results, in fused order, stopping at `k`.
    ///
    /// Chunks are fetched with one batch lookup per window of `k` candidates;
    /// a further window is only read when lookups dropped candidates.
    async fn enrich(&self, fused: Vec<FusionCandidate<ChunkId>>, k: usize) -> Vec<SearchResult> {
        let mut results = Vec::with_capacity(k.min(fused.len()));
        let mut parents: HashMap<DocumentId, Option<DocumentMetadata>> = HashMap::new();

        for window in fused.chunks(k.max(1)) {
            if results.len() >= k {
                break;
            }

            let ids: Vec<ChunkId> = window.iter().map(|c| c.id).collect();
            let mut records: HashMap<ChunkId, ChunkRecord> =
                match self.store.get_chunks_batch(&ids).await {
                    Ok(found) => found.into_iter().map(|r| (r.id, r)).collect(),
                    Err(e) => {
                        warn!("Error fetching {} chunks: {}", ids.len(), e);
                        continue;
                    }
                };

            for candidate in window {
                if results.len() >= k {
                    break;
                }
                let Some(record) = records.remove(&candidate.id) else {
                    warn!("Chunk {} not found in store, dropping candidate", candidate.id);
                    continue;
                };

                let metadata = match parents.get(&record.document_id) {
                    Some(cached) => cached.clone(),
                    None => {
                        let fetched = match self.store.get_parent_metadata(record.document_id).await {
                            Ok(found) => found,
                            Err(e) => {
                                warn!("Error fetching document {}: {}", record.document_id, e);
                                None
                            }
                        };
                        parents.insert(record.document_id, fetched.clone());
                        fetched
                    }
                };
                let Some(metadata) = metadata else {
                    warn!(
                        "Parent document {} of chunk {} not found, dropping candidate",
                        record.document_id, candidate.id
                    );
                    continue;
                };

                results.push(SearchResult {
                    chunk_id: candidate.id,
                    document_id: record.document_id,
                    score: candidate.fused_score,
                    fused_score: candidate.fused_score,
                    dense_score: candidate.dense_score,
                    dense_rank: candidate.dense_rank,
                    sparse_score: candidate.sparse_score,
                    sparse_rank: candidate.sparse_rank,
                    entity_score: None,
                    text: record.text,
                    metadata,
                });
            }
        }
        results
    }

    fn ensure_not_rebuilding(&self) -> Result<(), SearchError> {
        if self.rebuilding.load(Ordering::Acquire) {
            Err(SearchError::IndexesRebuilding)
        } else {
            Ok(())
        }
    }

    /// Returns `true` if the dense index and the store disagree enough to
    /// warrant a rebuild.
    pub(crate) fn is_skewed(&self, store_count: usize, dense_live: usize) -> bool {
        if dense_live == 0 {
            return store_count > 0;
        }
        let divergence = store_count.abs_diff(dense_live) as f64 / store_count.max(1) as f64;
        divergence > self.config.skew_threshold
    }

    /// `(indexable store count, dense live count)` for the skew check.
    ///
    /// Stored chunks known to be unindexable are not counted, so they cannot
    /// keep the indexes permanently skewed.
    async fn sync_counts(&self) -> Result<(usize, usize), SearchError> {
        let store_count = self.store.embedded_chunk_count().await?;
        let unindexed = self.unindexed().len();
        let dense_live = self.dense_read().live_len();
        Ok((store_count.saturating_sub(unindexed), dense_live))
    }

    /// Rebuilds before answering if the indexes drifted from the store.
    ///
    /// The skew is confirmed again once the write lock is held: an ingest
    /// that was running may already have closed the gap.
    async fn sync_if_skewed(&self) -> Result<(), SearchError> {
        let (store_count, dense_live) = self.sync_counts().await?;
        if !self.is_skewed(store_count, dense_live) {
            return Ok(());
        }

        let _write = self.write_lock.lock().await;
        let (store_count, dense_live) = self.sync_counts().await?;
        if !self.is_skewed(store_count, dense_live) {
            debug!("Indexes caught up with the store while waiting, skipping rebuild");
            return Ok(());
        }

        warn!(
            "Dense index out of sync with store ({} live vs {} indexable), rebuilding",
            dense_live, store_count
        );
        match self.rebuild_locked(|_| {}).await {
            Ok(_) => Ok(()),
            Err(SearchError::AlreadyRebuilding) => Err(SearchError::IndexesRebuilding),
            Err(e) => Err(e),
        }
    }

    // =========================================================================
    // Maintenance and settings
    // =========================================================================

    /// Saves the dense index. No-op for in-memory corpora.
    pub fn persist(&self) -> Result<(), SearchError> {
        self.dense_read().save()
    }

    /// Current counters.
    pub async fn stats(&self) -> Result<IndexStats, SearchError> {
        let store_count = self.store.embedded_chunk_count().await?;
        let dense = self.dense_read();
        Ok(IndexStats {
            dense_len: dense.len(),
            dense_live: dense.live_len(),
            tombstones: dense.tombstone_count(),
            dimension: dense.dimension(),
            lexical: self.lexical_read().stats(),
            store_count,
            unindexed: self.unindexed().len(),
            generation: self.generation.load(Ordering::Acquire),
            rebuilds: self.rebuilds.load(Ordering::Acquire),
            ef_search: dense.ef_search(),
            fusion_weights: self.fusion_snapshot().weights(),
        })
    }

    /// Changes the dense search candidate list size, within `[10, 500]`.
    pub fn set_ef_search(&self, ef_search: usize) -> Result<(), SearchError> {
        self.dense_read().set_ef_search(ef_search)
    }

    /// Replaces the fusion weights. They are normalized to sum to 1.
    pub fn set_fusion_weights(&self, dense_weight: f32, sparse_weight: f32) -> Result<(), SearchError> {
        self.fusion
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .set_weights(dense_weight, sparse_weight)
    }

    /// Number of rebuilds performed since open.
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds.load(Ordering::Acquire)
    }

    /// Returns `true` while a rebuild runs.
    pub fn is_rebuilding(&self) -> bool {
        self.rebuilding.load(Ordering::Acquire)
    }

    /// Clears the store and both indexes, on disk included.
    pub async fn clear_all(&self) -> Result<(), SearchError> {
        let _write = self.write_lock.lock().await;

        self.store.clear().await?;
        self.dense_write().clear()?;
        self.lexical_write().clear();
        self.unindexed().clear();

        info!("Cleared all index data (memory and storage)");
        Ok(())
    }
}
