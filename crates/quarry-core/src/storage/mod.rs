//! Storage of chunks, embeddings and parent document metadata.
//!
//! The [`ChunkStore`] is the durable source of truth. The search indexes are
//! rebuilt from it whenever they are missing, corrupted or out of sync.
//!
//! # Implementations
//!
//! - [`InMemoryChunkStore`] - HashMap-backed, for tests and ephemeral corpora
//! - [`RedbChunkStore`] - redb database file (feature `redb-store`, on by default)

mod chunk_store;

#[cfg(feature = "redb-store")]
mod redb_store;

pub use chunk_store::{ChunkStore, InMemoryChunkStore, StoreError};

#[cfg(feature = "redb-store")]
pub use redb_store::RedbChunkStore;
