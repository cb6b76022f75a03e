//! Redb-backed chunk store.
//!
//! Uses [redb](https://github.com/cberner/redb) - a pure Rust, ACID-compliant,
//! embedded B-tree database. Provides O(log n) lookups for chunks, embeddings,
//! and parent document metadata.
//!
//! # Tables
//!
//! - `chunks`: ChunkId (u64) -> ChunkRecord (JSON)
//! - `embeddings`: ChunkId (u64) -> `Vec<f32>` (raw bytes, little-endian)
//! - `documents`: DocumentId (u64) -> DocumentMetadata (JSON)

use super::{ChunkStore, StoreError};
use crate::search::types::{ChunkId, ChunkRecord, DocumentId, DocumentMetadata};
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

const CHUNKS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("chunks");
const EMBEDDINGS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("embeddings");
const DOCUMENTS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("documents");

fn db_err<E: std::fmt::Display>(context: &'static str) -> impl FnOnce(E) -> StoreError {
    move |e| StoreError::DatabaseError(format!("{}: {}", context, e))
}

/// Redb-backed chunk store.
///
/// A chunk and its embedding are written in one transaction, so the store
/// never holds one without the other.
///
/// # Example
///
/// ```ignore
/// use quarry_core::storage::RedbChunkStore;
///
/// let store = RedbChunkStore::open("./data/chunks.redb")?;
/// store.put_chunk(&chunk, &embedding).await?;
/// ```
pub struct RedbChunkStore {
    db: Arc<Database>,
}

impl RedbChunkStore {
    /// Opens or creates a redb database at the given path.
    ///
    /// Creates the database file and all required tables if they don't exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = Database::create(path.as_ref())
            .map_err(|e| StoreError::DatabaseError(format!("Failed to open database: {}", e)))?;

        let write_txn = db
            .begin_write()
            .map_err(db_err("Failed to begin write transaction"))?;
        for table in [CHUNKS_TABLE, EMBEDDINGS_TABLE, DOCUMENTS_TABLE] {
            write_txn
                .open_table(table)
                .map_err(db_err("Failed to create table"))?;
        }
        write_txn
            .commit()
            .map_err(db_err("Failed to commit table creation"))?;

        Ok(Self { db: Arc::new(db) })
    }

    fn to_json<T: Serialize>(value: &T, what: &str) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec(value).map_err(|e| {
            StoreError::SerializationError(format!("Failed to serialize {}: {}", what, e))
        })
    }

    fn from_json<T: DeserializeOwned>(bytes: &[u8], what: &str) -> Result<T, StoreError> {
        serde_json::from_slice(bytes).map_err(|e| {
            StoreError::SerializationError(format!("Failed to deserialize {}: {}", what, e))
        })
    }

    /// Serializes an embedding to raw bytes.
    ///
    /// Format: Little-endian f32 values packed sequentially (4 bytes per value).
    /// NOTE: Endianness MUST match `deserialize_embedding()`.
    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(embedding.len() * 4);
        for &val in embedding {
            bytes.extend_from_slice(&val.to_le_bytes());
        }
        bytes
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn get_bytes(
        &self,
        table_def: TableDefinition<u64, &[u8]>,
        key: u64,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(db_err("Failed to begin read transaction"))?;
        let table = read_txn
            .open_table(table_def)
            .map_err(db_err("Failed to open table"))?;
        let value = table
            .get(key)
            .map_err(db_err("Failed to read entry"))?;
        Ok(value.map(|guard| guard.value().to_vec()))
    }
}

#[async_trait::async_trait]
impl ChunkStore for RedbChunkStore {
    async fn put_chunk(&self, chunk: &ChunkRecord, embedding: &[f32]) -> Result<(), StoreError> {
        let chunk_bytes = Self::to_json(chunk, "chunk")?;
        let embedding_bytes = Self::serialize_embedding(embedding);

        let write_txn = self
            .db
            .begin_write()
            .map_err(db_err("Failed to begin write transaction"))?;
        {
            let mut chunks = write_txn
                .open_table(CHUNKS_TABLE)
                .map_err(db_err("Failed to open chunks table"))?;
            chunks
                .insert(chunk.id.as_u64(), chunk_bytes.as_slice())
                .map_err(db_err("Failed to insert chunk"))?;

            let mut embeddings = write_txn
                .open_table(EMBEDDINGS_TABLE)
                .map_err(db_err("Failed to open embeddings table"))?;
            embeddings
                .insert(chunk.id.as_u64(), embedding_bytes.as_slice())
                .map_err(db_err("Failed to insert embedding"))?;
        }
        write_txn
            .commit()
            .map_err(db_err("Failed to commit chunk"))?;
        Ok(())
    }

    async fn delete_chunk(&self, id: ChunkId) -> Result<(), StoreError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(db_err("Failed to begin write transaction"))?;
        {
            // Remove returns Ok(None) if key didn't exist, which is fine
            for table_def in [CHUNKS_TABLE, EMBEDDINGS_TABLE] {
                let mut table = write_txn
                    .open_table(table_def)
                    .map_err(db_err("Failed to open table"))?;
                table
                    .remove(id.as_u64())
                    .map_err(db_err("Failed to delete chunk"))?;
            }
        }
        write_txn
            .commit()
            .map_err(db_err("Failed to commit chunk deletion"))?;
        Ok(())
    }

    async fn get_chunk(&self, id: ChunkId) -> Result<Option<ChunkRecord>, StoreError> {
        self.get_bytes(CHUNKS_TABLE, id.as_u64())?
            .map(|bytes| Self::from_json(&bytes, "chunk"))
            .transpose()
    }

    async fn get_chunks_batch(&self, ids: &[ChunkId]) -> Result<Vec<ChunkRecord>, StoreError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(db_err("Failed to begin read transaction"))?;
        let table = read_txn
            .open_table(CHUNKS_TABLE)
            .map_err(db_err("Failed to open chunks table"))?;

        let mut chunks = Vec::with_capacity(ids.len());
        for id in ids {
            if let Ok(Some(guard)) = table.get(id.as_u64()) {
                match Self::from_json::<ChunkRecord>(guard.value(), "chunk") {
                    Ok(chunk) => chunks.push(chunk),
                    Err(e) => warn!("Skipping unreadable chunk {}: {}", id, e),
                }
            }
        }
        Ok(chunks)
    }

    async fn all_chunks_with_embeddings(&self) -> Result<Vec<(ChunkRecord, Vec<f32>)>, StoreError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(db_err("Failed to begin read transaction"))?;
        let chunks = read_txn
            .open_table(CHUNKS_TABLE)
            .map_err(db_err("Failed to open chunks table"))?;
        let embeddings = read_txn
            .open_table(EMBEDDINGS_TABLE)
            .map_err(db_err("Failed to open embeddings table"))?;

        let iter = embeddings
            .iter()
            .map_err(db_err("Failed to iterate embeddings"))?;

        let mut all = Vec::new();
        for result in iter {
            let (key, value) =
                result.map_err(db_err("Failed to read embedding entry"))?;
            let id = key.value();
            let Some(guard) = chunks
                .get(id)
                .map_err(db_err("Failed to read chunk"))?
            else {
                warn!("Embedding {} has no chunk record, skipping", id);
                continue;
            };
            let chunk: ChunkRecord = Self::from_json(guard.value(), "chunk")?;
            all.push((chunk, Self::deserialize_embedding(value.value())));
        }
        Ok(all)
    }

    async fn embedded_chunk_count(&self) -> Result<usize, StoreError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(db_err("Failed to begin read transaction"))?;
        let table = read_txn
            .open_table(EMBEDDINGS_TABLE)
            .map_err(db_err("Failed to open embeddings table"))?;
        let count = table
            .len()
            .map_err(db_err("Failed to get embedding count"))?;
        Ok(count as usize)
    }

    async fn get_parent_metadata(
        &self,
        id: DocumentId,
    ) -> Result<Option<DocumentMetadata>, StoreError> {
        self.get_bytes(DOCUMENTS_TABLE, id.as_u64())?
            .map(|bytes| Self::from_json(&bytes, "document metadata"))
            .transpose()
    }

    async fn put_parent_metadata(
        &self,
        id: DocumentId,
        metadata: &DocumentMetadata,
    ) -> Result<(), StoreError> {
        let bytes = Self::to_json(metadata, "document metadata")?;
        let write_txn = self
            .db
            .begin_write()
            .map_err(db_err("Failed to begin write transaction"))?;
        {
            let mut table = write_txn
                .open_table(DOCUMENTS_TABLE)
                .map_err(db_err("Failed to open documents table"))?;
            table
                .insert(id.as_u64(), bytes.as_slice())
                .map_err(db_err("Failed to insert document metadata"))?;
        }
        write_txn
            .commit()
            .map_err(db_err("Failed to commit document metadata"))?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(db_err("Failed to begin write transaction"))?;

        for (table_def, name) in [
            (CHUNKS_TABLE, "chunks"),
            (EMBEDDINGS_TABLE, "embeddings"),
            (DOCUMENTS_TABLE, "documents"),
        ] {
            let mut table = write_txn
                .open_table(table_def)
                .map_err(db_err("Failed to open table"))?;
            let keys: Vec<u64> = table
                .iter()
                .map_err(db_err("Failed to iterate table"))?
                .filter_map(|r| r.ok().map(|(k, _)| k.value()))
                .collect();
            for key in keys {
                if let Err(e) = table.remove(key) {
                    warn!("Failed to remove key {} from {}: {} (continuing)", key, name, e);
                }
            }
        }

        write_txn
            .commit()
            .map_err(db_err("Failed to commit clear"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (RedbChunkStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.redb");
        let store = RedbChunkStore::open(&db_path).unwrap();
        (store, temp_dir)
    }

    fn chunk(id: u64, text: &str) -> ChunkRecord {
        ChunkRecord::new(ChunkId::from_u64(id), DocumentId::from_u64(1), text)
    }

    #[tokio::test]
    async fn test_chunk_crud() {
        let (store, _temp) = create_test_store();
        let id = ChunkId::from_u64(1);

        assert!(store.get_chunk(id).await.unwrap().is_none());

        store
            .put_chunk(&chunk(1, "Hello world"), &[1.0, -2.0, 3.5])
            .await
            .unwrap();
        assert_eq!(store.get_chunk(id).await.unwrap().unwrap().text, "Hello world");
        assert_eq!(
            store.all_chunks_with_embeddings().await.unwrap()[0].1,
            vec![1.0, -2.0, 3.5]
        );

        store.delete_chunk(id).await.unwrap();
        assert!(store.get_chunk(id).await.unwrap().is_none());
        assert_eq!(store.embedded_chunk_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_batch_get() {
        let (store, _temp) = create_test_store();
        for i in 1..=5 {
            store
                .put_chunk(&chunk(i, &format!("Chunk {}", i)), &[i as f32])
                .await
                .unwrap();
        }

        let ids = [1, 3, 99, 5].map(ChunkId::from_u64);
        let chunks = store.get_chunks_batch(&ids).await.unwrap();
        assert_eq!(chunks.len(), 3);
    }

    #[tokio::test]
    async fn test_all_chunks_and_count() {
        let (store, _temp) = create_test_store();
        for i in [3, 1, 2] {
            store
                .put_chunk(&chunk(i, "text"), &[i as f32, 0.0])
                .await
                .unwrap();
        }

        assert_eq!(store.embedded_chunk_count().await.unwrap(), 3);
        let all = store.all_chunks_with_embeddings().await.unwrap();
        let ids: Vec<u64> = all.iter().map(|(c, _)| c.id.as_u64()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(all[2].1, vec![3.0, 0.0]);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.redb");
        let doc = DocumentId::from_u64(1);
        let meta = DocumentMetadata::new("Manual", None);

        {
            let store = RedbChunkStore::open(&db_path).unwrap();
            store.put_chunk(&chunk(1, "kept"), &[1.0]).await.unwrap();
            store.put_parent_metadata(doc, &meta).await.unwrap();
        }

        let store = RedbChunkStore::open(&db_path).unwrap();
        assert_eq!(store.embedded_chunk_count().await.unwrap(), 1);
        assert_eq!(store.get_parent_metadata(doc).await.unwrap(), Some(meta));
    }

    #[tokio::test]
    async fn test_clear() {
        let (store, _temp) = create_test_store();
        store.put_chunk(&chunk(1, "test"), &[1.0, 2.0]).await.unwrap();
        store
            .put_parent_metadata(DocumentId::from_u64(1), &DocumentMetadata::new("t", None))
            .await
            .unwrap();

        store.clear().await.unwrap();

        assert_eq!(store.embedded_chunk_count().await.unwrap(), 0);
        assert!(store.get_chunk(ChunkId::from_u64(1)).await.unwrap().is_none());
        assert!(store
            .get_parent_metadata(DocumentId::from_u64(1))
            .await
            .unwrap()
            .is_none());
    }
}
