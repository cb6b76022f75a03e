//! # Quarry Core
//!
//! Hybrid retrieval core: an HNSW vector index and a BM25 keyword index kept
//! consistent with a persisted chunk store, queried together through weighted
//! reciprocal rank fusion.
//!
//! Embeddings are computed by the caller; this crate only indexes and ranks
//! them.
//!
//! ## Modules
//!
//! - [`search`] - Indexes, fusion, entity re-ranking and the [`IndexCoordinator`](search::IndexCoordinator)
//! - [`storage`] - Chunk store trait with in-memory and redb implementations
//! - [`config`] - Configuration with documented defaults
//! - [`error`] - Error types and their retry classes

pub mod config;
pub mod error;
pub mod search;
pub mod storage;

#[cfg(test)]
mod test_utils;
