//! Full rebuild of both indexes from the chunk store.
//!
//! A rebuild streams every (chunk, embedding) pair out of the store into a
//! fresh generation of the dense and lexical indexes, swaps them in and
//! persists the dense index. Tombstones disappear and labels are reassigned
//! densely in chunk id order.
//!
//! A rebuild runs under the write lock, so it waits for a running ingest
//! before it starts. Once started it is exclusive: a second call fails with
//! [`SearchError::AlreadyRebuilding`] and queries fail with
//! [`SearchError::IndexesRebuilding`] until the swap is done. Ingestion waits
//! on the write lock.

use super::IndexCoordinator;
use crate::error::SearchError;
use crate::search::keyword::LexicalIndex;
use crate::search::types::ChunkId;
use crate::search::vector::AnnBackend;
use crate::storage::ChunkStore;
use instant::Instant;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, instrument, warn};

/// Indexing progress is reported every this many chunks.
const PROGRESS_INTERVAL: usize = 100;

/// Stage of a running rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildPhase {
    /// Reading chunks and embeddings from the store
    Loading,
    /// Inserting into the fresh indexes
    Indexing,
    /// Writing the dense index to disk
    Persisting,
    Complete,
}

/// Progress callback payload. `current` never decreases within a rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuildProgress {
    pub current: usize,
    pub total: usize,
    pub phase: RebuildPhase,
}

/// Summary of a finished rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildReport {
    /// Chunks in the new generation
    pub indexed: usize,
    /// Stored chunks whose embedding was rejected
    pub skipped: usize,
    pub duration_ms: u64,
    /// Generation number of the indexes now in use
    pub generation: u64,
}

/// Holds the rebuilding flag; clears it on drop, error paths included.
struct RebuildGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RebuildGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, SearchError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SearchError::AlreadyRebuilding)?;
        Ok(Self { flag })
    }
}

impl Drop for RebuildGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl<S: ChunkStore, B: AnnBackend> IndexCoordinator<S, B> {
    /// Rebuilds both indexes from the store.
    ///
    /// # Errors
    ///
    /// - `AlreadyRebuilding` if another rebuild is running
    /// - `StorageError` if the store cannot be read; the old indexes stay in use
    pub async fn rebuild_all(&self) -> Result<RebuildReport, SearchError> {
        self.rebuild_all_with_progress(|_| {}).await
    }

    /// [`rebuild_all`](Self::rebuild_all) with a progress callback.
    ///
    /// The callback runs on the rebuilding task; keep it cheap. A call made
    /// while an ingest holds the write lock waits for it; queries keep
    /// running against the current indexes until the rebuild starts.
    #[instrument(skip_all)]
    pub async fn rebuild_all_with_progress<F>(&self, progress: F) -> Result<RebuildReport, SearchError>
    where
        F: FnMut(RebuildProgress) + Send,
    {
        if self.is_rebuilding() {
            return Err(SearchError::AlreadyRebuilding);
        }
        let _write = self.write_lock.lock().await;
        self.rebuild_locked(progress).await
    }

    /// Rebuild body; the caller holds the write lock.
    pub(super) async fn rebuild_locked<F>(&self, mut progress: F) -> Result<RebuildReport, SearchError>
    where
        F: FnMut(RebuildProgress) + Send,
    {
        let _guard = RebuildGuard::acquire(&self.rebuilding)?;
        let start = Instant::now();

        let mut emit = |phase, current, total| {
            progress(RebuildProgress {
                current,
                total,
                phase,
            })
        };

        emit(RebuildPhase::Loading, 0, 0);
        let chunks = self.store.all_chunks_with_embeddings().await?;
        let total = chunks.len();
        let load_elapsed = start.elapsed();
        emit(RebuildPhase::Loading, 0, total);

        let index_start = Instant::now();
        let mut dense = self.dense_read().fresh_generation();
        let mut lexical = LexicalIndex::new(self.lexical_read().params());
        let mut indexed = 0;
        let mut rejected: HashSet<ChunkId> = HashSet::new();

        for (i, (chunk, embedding)) in chunks.into_iter().enumerate() {
            match dense.add_point(chunk.id, embedding) {
                Ok(_) => {
                    lexical.add(chunk.id, &chunk.text);
                    indexed += 1;
                }
                Err(err) => {
                    warn!("Skipping chunk {} during rebuild: {}", chunk.id, err);
                    rejected.insert(chunk.id);
                }
            }

            let current = i + 1;
            if current % PROGRESS_INTERVAL == 0 || current == total {
                emit(RebuildPhase::Indexing, current, total);
            }
        }
        let index_elapsed = index_start.elapsed();

        emit(RebuildPhase::Persisting, total, total);
        let persist_start = Instant::now();
        dense.save()?;
        let persist_elapsed = persist_start.elapsed();

        {
            let mut current_dense = self.dense_write();
            let mut current_lexical = self.lexical_write();
            *current_dense = dense;
            *current_lexical = lexical;
        }
        let skipped = rejected.len();
        *self.unindexed() = rejected;
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.rebuilds.fetch_add(1, Ordering::AcqRel);

        emit(RebuildPhase::Complete, total, total);

        let duration = start.elapsed();
        info!(
            "Rebuilt indexes (generation {}): {} chunks, {} skipped in {:?} (load: {:?}, index: {:?}, persist: {:?})",
            generation, indexed, skipped, duration, load_elapsed, index_elapsed, persist_elapsed
        );

        Ok(RebuildReport {
            indexed,
            skipped,
            duration_ms: duration.as_millis() as u64,
            generation,
        })
    }
}
