//! Hybrid retrieval combining vector and keyword search.
//!
//! This module implements a hybrid search system that combines:
//! - **Vector search** (semantic similarity via HNSW)
//! - **Keyword search** (exact term matching via BM25)
//! - **Weighted Reciprocal Rank Fusion** (RRF) to merge rankings
//!
//! # Architecture
//!
//! - `types`: Core types (ChunkId, ChunkRecord, SearchResult, BatchOutcome)
//! - `engine`: [`IndexCoordinator`] keeping both indexes consistent with the store
//! - `vector`: HNSW-based dense index with crash-safe persistence
//! - `keyword`: BM25 lexical index with lazily refreshed corpus statistics
//! - `fusion`: Weighted RRF for merging the two rankings
//! - `entity_boost`: Optional re-ranking by query entities
//!
//! # Usage
//!
//! ```ignore
//! use quarry_core::config::HybridSearchConfig;
//! use quarry_core::search::{ChunkId, ChunkRecord, DocumentId, IndexCoordinator};
//! use quarry_core::storage::InMemoryChunkStore;
//!
//! let config = HybridSearchConfig::with_dimension(512);
//! let (coordinator, _) = IndexCoordinator::<_>::open(InMemoryChunkStore::new(), config).await?;
//!
//! // Index chunks with pre-computed embeddings
//! let chunk = ChunkRecord::new(ChunkId::from_u64(1), DocumentId::from_u64(1), "Rust is a systems language");
//! coordinator.ingest(chunk, embedding).await?;
//!
//! // Search (vector + keyword + RRF fusion)
//! let results = coordinator.search(Some("Rust language"), &query_embedding, 10, None).await?;
//! ```
//!
//! # Algorithm Details
//!
//! **Vector Search (HNSW)**:
//! - Hierarchical graph for approximate nearest neighbor search
//! - Cosine distance, reported as similarity `1 - distance`
//! - Deletions are tombstones until the next rebuild
//!
//! **Keyword Search (BM25)**:
//! - Defaults k1=1.5, b=0.75
//! - IDF and average length recomputed lazily after mutations
//!
//! **Reciprocal Rank Fusion (RRF)**:
//! - Formula: `score = w_dense / (k + rank_dense) + w_sparse / (k + rank_sparse)`, k=60
//! - Merges rankings without score normalization

pub mod entity_boost;
pub mod types;

// Internal modules - exposed for benchmarking but hidden from docs
mod engine;
#[doc(hidden)]
pub mod fusion;
#[doc(hidden)]
pub mod keyword;
#[doc(hidden)]
pub mod vector;

// Re-export main types (public API)
pub use entity_boost::{EntityBoost, ExtractedEntity};
pub use types::{
    BatchOutcome, ChunkId, ChunkRecord, DocumentId, DocumentMetadata, SearchFilter, SearchResult,
};

pub use engine::{
    IndexCoordinator, IndexStats, OpenReport, RebuildPhase, RebuildProgress, RebuildReport,
};
pub use fusion::RankFusion;
pub use keyword::{LexicalIndex, LexicalStats};
pub use vector::{DenseIndex, InitializeOutcome};
