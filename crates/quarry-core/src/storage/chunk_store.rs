//! Chunk store trait: the persisted source of truth for the indexes.
//!
//! Chunks, their embeddings and their parent document metadata live in a
//! [`ChunkStore`]. The in-memory indexes are derived state: a full rebuild
//! re-reads everything from the store, and search results are enriched from
//! it.

use crate::search::types::{ChunkId, ChunkRecord, DocumentId, DocumentMetadata};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;

/// Errors that can occur during chunk store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl<T> From<PoisonError<T>> for StoreError {
    fn from(e: PoisonError<T>) -> Self {
        StoreError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

/// Persisted chunks with embeddings and parent metadata.
///
/// # Design Notes
///
/// - A chunk and its embedding are written together by `put_chunk`; a chunk
///   never exists without its embedding.
/// - Each operation is self-contained; no transactions are exposed.
/// - Batch lookups are provided for hydrating search results.
#[async_trait::async_trait]
pub trait ChunkStore: Send + Sync {
    // =========================================================================
    // Chunk Operations
    // =========================================================================

    /// Stores a chunk and its embedding.
    ///
    /// Overwrites any existing chunk with the same ID.
    async fn put_chunk(&self, chunk: &ChunkRecord, embedding: &[f32]) -> Result<(), StoreError>;

    /// Deletes a chunk and its embedding.
    ///
    /// Returns `Ok(())` even if the chunk didn't exist.
    async fn delete_chunk(&self, id: ChunkId) -> Result<(), StoreError>;

    /// Retrieves a chunk by ID.
    ///
    /// Returns `Ok(None)` if the chunk doesn't exist.
    async fn get_chunk(&self, id: ChunkId) -> Result<Option<ChunkRecord>, StoreError>;

    /// Retrieves multiple chunks in a single operation.
    ///
    /// Returns chunks in the same order as the input IDs. Missing chunks are
    /// skipped.
    async fn get_chunks_batch(&self, ids: &[ChunkId]) -> Result<Vec<ChunkRecord>, StoreError>;

    /// Returns every chunk with its embedding, ordered by chunk ID.
    ///
    /// Used to rebuild the indexes.
    async fn all_chunks_with_embeddings(&self) -> Result<Vec<(ChunkRecord, Vec<f32>)>, StoreError>;

    /// Number of chunks that have an embedding.
    async fn embedded_chunk_count(&self) -> Result<usize, StoreError>;

    // =========================================================================
    // Parent Document Operations
    // =========================================================================

    /// Retrieves parent document metadata.
    async fn get_parent_metadata(
        &self,
        id: DocumentId,
    ) -> Result<Option<DocumentMetadata>, StoreError>;

    /// Stores parent document metadata.
    async fn put_parent_metadata(
        &self,
        id: DocumentId,
        metadata: &DocumentMetadata,
    ) -> Result<(), StoreError>;

    // =========================================================================
    // Utility Operations
    // =========================================================================

    /// Clears all data from the store.
    async fn clear(&self) -> Result<(), StoreError>;
}

/// In-memory chunk store.
///
/// Stores everything in HashMaps and persists nothing. Useful for tests and
/// ephemeral corpora.
#[derive(Default)]
pub struct InMemoryChunkStore {
    chunks: RwLock<HashMap<ChunkId, (ChunkRecord, Vec<f32>)>>,
    documents: RwLock<HashMap<DocumentId, DocumentMetadata>>,
}

impl InMemoryChunkStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ChunkStore for InMemoryChunkStore {
    async fn put_chunk(&self, chunk: &ChunkRecord, embedding: &[f32]) -> Result<(), StoreError> {
        self.chunks
            .write()?
            .insert(chunk.id, (chunk.clone(), embedding.to_vec()));
        Ok(())
    }

    async fn delete_chunk(&self, id: ChunkId) -> Result<(), StoreError> {
        self.chunks.write()?.remove(&id);
        Ok(())
    }

    async fn get_chunk(&self, id: ChunkId) -> Result<Option<ChunkRecord>, StoreError> {
        Ok(self.chunks.read()?.get(&id).map(|(c, _)| c.clone()))
    }

    async fn get_chunks_batch(&self, ids: &[ChunkId]) -> Result<Vec<ChunkRecord>, StoreError> {
        let chunks = self.chunks.read()?;
        Ok(ids
            .iter()
            .filter_map(|id| chunks.get(id).map(|(c, _)| c.clone()))
            .collect())
    }

    async fn all_chunks_with_embeddings(&self) -> Result<Vec<(ChunkRecord, Vec<f32>)>, StoreError> {
        let mut all: Vec<(ChunkRecord, Vec<f32>)> = self.chunks.read()?.values().cloned().collect();
        all.sort_unstable_by_key(|(c, _)| c.id);
        Ok(all)
    }

    async fn embedded_chunk_count(&self) -> Result<usize, StoreError> {
        Ok(self.chunks.read()?.len())
    }

    async fn get_parent_metadata(
        &self,
        id: DocumentId,
    ) -> Result<Option<DocumentMetadata>, StoreError> {
        Ok(self.documents.read()?.get(&id).cloned())
    }

    async fn put_parent_metadata(
        &self,
        id: DocumentId,
        metadata: &DocumentMetadata,
    ) -> Result<(), StoreError> {
        self.documents.write()?.insert(id, metadata.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.chunks.write()?.clear();
        self.documents.write()?.clear();
        Ok(())
    }
}

// Blanket implementation for Arc<T> where T: ChunkStore
// Lets tests keep a handle on the store the coordinator owns
#[async_trait::async_trait]
impl<T: ChunkStore + ?Sized> ChunkStore for std::sync::Arc<T> {
    async fn put_chunk(&self, chunk: &ChunkRecord, embedding: &[f32]) -> Result<(), StoreError> {
        (**self).put_chunk(chunk, embedding).await
    }

    async fn delete_chunk(&self, id: ChunkId) -> Result<(), StoreError> {
        (**self).delete_chunk(id).await
    }

    async fn get_chunk(&self, id: ChunkId) -> Result<Option<ChunkRecord>, StoreError> {
        (**self).get_chunk(id).await
    }

    async fn get_chunks_batch(&self, ids: &[ChunkId]) -> Result<Vec<ChunkRecord>, StoreError> {
        (**self).get_chunks_batch(ids).await
    }

    async fn all_chunks_with_embeddings(&self) -> Result<Vec<(ChunkRecord, Vec<f32>)>, StoreError> {
        (**self).all_chunks_with_embeddings().await
    }

    async fn embedded_chunk_count(&self) -> Result<usize, StoreError> {
        (**self).embedded_chunk_count().await
    }

    async fn get_parent_metadata(
        &self,
        id: DocumentId,
    ) -> Result<Option<DocumentMetadata>, StoreError> {
        (**self).get_parent_metadata(id).await
    }

    async fn put_parent_metadata(
        &self,
        id: DocumentId,
        metadata: &DocumentMetadata,
    ) -> Result<(), StoreError> {
        (**self).put_parent_metadata(id, metadata).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        (**self).clear().await
    }
}
