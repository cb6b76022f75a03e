//! Index compaction to reclaim space from tombstoned entries.
//!
//! Deleted chunks are tombstoned in the dense index rather than removed, since
//! the HNSW graph has no deletion. Compaction is a full rebuild, which drops
//! every tombstone and reassigns labels densely.
//!
//! # When to Compact
//!
//! Compaction is recommended when the tombstone ratio exceeds
//! `compaction_threshold` (30% by default). Use
//! [`needs_compaction`](IndexCoordinator::needs_compaction) to check.

use super::{IndexCoordinator, RebuildReport};
use crate::error::SearchError;
use crate::search::vector::AnnBackend;
use crate::storage::ChunkStore;
use tracing::info;

impl<S: ChunkStore, B: AnnBackend> IndexCoordinator<S, B> {
    /// Check if the dense index needs compaction.
    pub fn needs_compaction(&self) -> bool {
        self.dense_read().tombstone_ratio() > self.config.compaction_threshold
    }

    /// Get compaction statistics.
    ///
    /// Returns `(tombstone_count, total_count, ratio)`.
    pub fn compaction_stats(&self) -> (usize, usize, f32) {
        let dense = self.dense_read();
        (dense.tombstone_count(), dense.len(), dense.tombstone_ratio())
    }

    /// Rebuilds if the tombstone ratio is above the threshold.
    ///
    /// # Returns
    /// - `Ok(Some(report))` if compaction was performed
    /// - `Ok(None)` if compaction was not needed
    pub async fn compact_if_needed(&self) -> Result<Option<RebuildReport>, SearchError> {
        if !self.needs_compaction() {
            return Ok(None);
        }

        let (tombstones, total, ratio) = self.compaction_stats();
        info!(
            "Starting compaction: {} tombstones / {} total ({:.1}%)",
            tombstones,
            total,
            ratio * 100.0
        );
        let report = self.rebuild_all().await?;
        info!(
            "Compaction complete: {} → {} entries",
            total, report.indexed
        );
        Ok(Some(report))
    }
}
