//! End-to-end integration tests for ingestion, persistence and hybrid search.
//!
//! These tests exercise the full workflow through the public API:
//! 1. Ingestion: chunk store → dense (HNSW) + lexical (BM25) indexes
//! 2. Search: skew check → dense/BM25 retrieval → weighted RRF → enrichment
//! 3. Lifecycle: save, restart, corruption recovery, rebuild
//!
//! Run with: `cargo test -p quarry-core --test integration_tests`

use quarry_core::config::HybridSearchConfig;
use quarry_core::error::SearchError;
use quarry_core::search::{
    ChunkId, ChunkRecord, DenseIndex, DocumentId, DocumentMetadata, IndexCoordinator, LexicalIndex,
};
use quarry_core::storage::{ChunkStore, InMemoryChunkStore};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

// ============================================================================
// Fixtures
// ============================================================================

const DIM: usize = 16;

fn unit_vector(rng: &mut StdRng, dim: usize) -> Vec<f32> {
    let raw: Vec<f32> = (0..dim).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
    let norm = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
    raw.into_iter().map(|x| x / norm).collect()
}

fn record(id: u64, text: &str) -> ChunkRecord {
    ChunkRecord::new(ChunkId::from_u64(id), DocumentId::from_u64(1), text)
}

/// `count` chunks with ids `1..=count` under document 1.
fn corpus(seed: u64, count: usize, dim: usize) -> Vec<(ChunkRecord, Vec<f32>)> {
    let topics = ["storage engines", "graph search", "query planning", "async runtimes"];
    let mut rng = StdRng::seed_from_u64(seed);
    (1..=count as u64)
        .map(|id| {
            let text = format!("chunk {} about {}", id, topics[id as usize % topics.len()]);
            (record(id, &text), unit_vector(&mut rng, dim))
        })
        .collect()
}

fn query_vector(seed: u64) -> Vec<f32> {
    unit_vector(&mut StdRng::seed_from_u64(seed), DIM)
}

fn ids(results: &[quarry_core::search::SearchResult]) -> Vec<u64> {
    results.iter().map(|r| r.chunk_id.as_u64()).collect()
}

async fn with_parent<S: ChunkStore>(store: S) -> S {
    store
        .put_parent_metadata(
            DocumentId::from_u64(1),
            &DocumentMetadata::new("Handbook", Some("handbook.md".to_string())),
        )
        .await
        .unwrap();
    store
}

fn persistent_config(dir: &Path) -> HybridSearchConfig {
    HybridSearchConfig::with_dimension(DIM).index_dir(dir)
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_dense_index_ranks_similar_vectors() {
    let mut index: DenseIndex = DenseIndex::in_memory(&HybridSearchConfig::with_dimension(4));
    let query = [1.0f32, 0.0, 0.0, 0.0];

    // cos 0.99, 0.1 and 0.98 to the query
    index.add_point(ChunkId::from_u64(1), vec![0.99, 0.141, 0.0, 0.0]).unwrap();
    index.add_point(ChunkId::from_u64(2), vec![0.1, 0.995, 0.0, 0.0]).unwrap();
    index.add_point(ChunkId::from_u64(3), vec![0.98, 0.0, 0.199, 0.0]).unwrap();

    let results = index.search(&query, 2, None).unwrap();

    let got: Vec<u64> = results.iter().map(|(id, _)| id.as_u64()).collect();
    assert_eq!(got, vec![1, 3]);
    assert!(results[0].1 > results[1].1);
    assert!((results[0].1 - 0.99).abs() < 1e-3);
}

#[test]
fn test_bm25_term_frequency_ordering() {
    let mut index = LexicalIndex::default();
    index.add(
        ChunkId::from_u64(1),
        "quarry quarry quarry quarry quarry stone",
    );
    index.add(ChunkId::from_u64(2), "quarry stone stone stone stone stone");
    index.add(ChunkId::from_u64(3), "stone stone stone stone stone stone");

    let results = index.search("quarry", 10, None);

    let got: Vec<u64> = results.iter().map(|(id, _)| id.as_u64()).collect();
    assert_eq!(got, vec![1, 2]);
    assert!(results[0].1 > results[1].1);

    // Repeated calls give identical output
    assert_eq!(index.search("quarry", 10, None), results);
}

#[tokio::test]
async fn test_batch_with_wrong_dimensions() {
    let (coordinator, _) = IndexCoordinator::<_>::open(
        InMemoryChunkStore::new(),
        HybridSearchConfig::with_dimension(DIM),
    )
    .await
    .unwrap();

    let mut items = corpus(1, 1000, DIM);
    let mut rng = StdRng::seed_from_u64(2);
    for id in 1001..=1005 {
        items.push((record(id, "bad"), unit_vector(&mut rng, DIM - 1)));
    }

    let outcome = coordinator.ingest_batch(items).await.unwrap();

    assert_eq!(outcome.added, 1000);
    assert_eq!(outcome.skipped, 5);
}

#[tokio::test]
async fn test_missing_dense_index_rebuilds_once() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(with_parent(InMemoryChunkStore::new()).await);

    {
        let (coordinator, _) =
            IndexCoordinator::<_>::open(Arc::clone(&store), persistent_config(dir.path()))
                .await
                .unwrap();
        coordinator.ingest_batch(corpus(3, 500, DIM)).await.unwrap();
    }

    // Lose the persisted dense index; the store still holds 500 chunks
    fs::remove_file(dir.path().join("dense.index")).unwrap();
    fs::remove_file(dir.path().join("dense.meta.json")).unwrap();

    let (coordinator, report) =
        IndexCoordinator::<_>::open(Arc::clone(&store), persistent_config(dir.path()))
            .await
            .unwrap();
    assert!(!report.dense.loaded);
    assert_eq!(report.store_count, 500);

    let query = query_vector(4);
    let results = coordinator.search(None, &query, 10, None).await.unwrap();
    assert_eq!(results.len(), 10);
    assert_eq!(coordinator.rebuild_count(), 1);

    coordinator.search(None, &query, 10, None).await.unwrap();
    assert_eq!(coordinator.rebuild_count(), 1);

    // The rebuild persisted a fresh generation
    assert!(dir.path().join("dense.index").exists());
}

// ============================================================================
// Persistence
// ============================================================================

#[tokio::test]
async fn test_restart_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(with_parent(InMemoryChunkStore::new()).await);
    let query = query_vector(7);

    let before = {
        let (coordinator, report) =
            IndexCoordinator::<_>::open(Arc::clone(&store), persistent_config(dir.path()))
                .await
                .unwrap();
        assert!(!report.dense.loaded);
        coordinator.ingest_batch(corpus(5, 200, DIM)).await.unwrap();
        coordinator.delete_chunk(ChunkId::from_u64(17)).await.unwrap();
        coordinator.persist().unwrap();
        coordinator
            .search(Some("graph search"), &query, 10, None)
            .await
            .unwrap()
    };

    let (coordinator, report) =
        IndexCoordinator::<_>::open(Arc::clone(&store), persistent_config(dir.path()))
            .await
            .unwrap();
    assert!(report.dense.loaded);
    assert!(!report.dense.corrupted);
    assert_eq!(report.dense.element_count, 200);

    let after = coordinator
        .search(Some("graph search"), &query, 10, None)
        .await
        .unwrap();

    assert_eq!(ids(&after), ids(&before));
    assert!(!ids(&after).contains(&17));
    assert_eq!(coordinator.rebuild_count(), 0);
    let stats = coordinator.stats().await.unwrap();
    assert_eq!(stats.tombstones, 1);
}

#[test]
fn test_corrupted_index_file_recovers_empty() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("dense.index"), b"QRY").unwrap();
    fs::write(dir.path().join("dense.meta.json"), b"{}").unwrap();
    fs::write(dir.path().join("dense.index.tmp"), b"partial write").unwrap();

    let config = HybridSearchConfig::with_dimension(3);
    let mut index: DenseIndex = DenseIndex::open(dir.path(), &config);
    let outcome = index.initialize().unwrap();

    assert!(!outcome.loaded);
    assert!(outcome.corrupted);
    assert!(outcome.reason.is_some());
    assert!(!dir.path().join("dense.index.tmp").exists());
    assert!(!dir.path().join("dense.index").exists());

    index.add_point(ChunkId::from_u64(1), vec![1.0, 0.0, 0.0]).unwrap();
    assert_eq!(index.len(), 1);
}

#[tokio::test]
async fn test_coordinator_recovers_from_corruption() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(with_parent(InMemoryChunkStore::new()).await);

    {
        let (coordinator, _) =
            IndexCoordinator::<_>::open(Arc::clone(&store), persistent_config(dir.path()))
                .await
                .unwrap();
        coordinator.ingest_batch(corpus(9, 50, DIM)).await.unwrap();
    }

    // Truncate the vector payload
    let index_path = dir.path().join("dense.index");
    let bytes = fs::read(&index_path).unwrap();
    fs::write(&index_path, &bytes[..bytes.len() / 2]).unwrap();

    let (coordinator, report) =
        IndexCoordinator::<_>::open(Arc::clone(&store), persistent_config(dir.path()))
            .await
            .unwrap();
    assert!(report.dense.corrupted);

    let results = coordinator
        .search(Some("storage engines"), &query_vector(10), 5, None)
        .await
        .unwrap();
    assert_eq!(results.len(), 5);
    assert_eq!(coordinator.rebuild_count(), 1);
    assert_eq!(coordinator.stats().await.unwrap().dense_live, 50);
}

#[tokio::test]
async fn test_reopen_indexes_chunks_missing_from_saved_index() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(with_parent(InMemoryChunkStore::new()).await);
    let late = query_vector(21);

    {
        let (coordinator, _) =
            IndexCoordinator::<_>::open(Arc::clone(&store), persistent_config(dir.path()))
                .await
                .unwrap();
        coordinator.ingest_batch(corpus(13, 20, DIM)).await.unwrap();
        // Single ingests are not saved; dropped before any persist
        coordinator
            .ingest(record(21, "late arrival about query planning"), late.clone())
            .await
            .unwrap();
    }

    let (coordinator, report) =
        IndexCoordinator::<_>::open(Arc::clone(&store), persistent_config(dir.path()))
            .await
            .unwrap();
    assert!(report.dense.loaded);
    assert_eq!(report.dense.element_count, 20);
    assert_eq!(report.dense_added, 1);
    assert_eq!(report.dense_removed, 0);

    let results = coordinator.search(None, &late, 5, None).await.unwrap();
    assert_eq!(results[0].chunk_id.as_u64(), 21);
    assert_eq!(coordinator.rebuild_count(), 0);
    assert_eq!(coordinator.stats().await.unwrap().dense_live, 21);
    drop(coordinator);

    // The reconciled index was saved, so the next open has nothing to add
    let (_, report) =
        IndexCoordinator::<_>::open(Arc::clone(&store), persistent_config(dir.path()))
            .await
            .unwrap();
    assert_eq!(report.dense.element_count, 21);
    assert_eq!(report.dense_added, 0);
}

#[tokio::test]
async fn test_reopen_tombstones_chunks_deleted_from_store() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(with_parent(InMemoryChunkStore::new()).await);
    let items = corpus(14, 20, DIM);
    let gone = items[4].1.clone();

    {
        let (coordinator, _) =
            IndexCoordinator::<_>::open(Arc::clone(&store), persistent_config(dir.path()))
                .await
                .unwrap();
        coordinator.ingest_batch(items).await.unwrap();
    }

    // Removed behind the coordinator's back
    store.delete_chunk(ChunkId::from_u64(5)).await.unwrap();

    let (coordinator, report) =
        IndexCoordinator::<_>::open(Arc::clone(&store), persistent_config(dir.path()))
            .await
            .unwrap();
    assert!(report.dense.loaded);
    assert_eq!(report.dense_added, 0);
    assert_eq!(report.dense_removed, 1);

    let results = coordinator.search(None, &gone, 10, None).await.unwrap();
    assert_eq!(results.len(), 10);
    assert!(!ids(&results).contains(&5));
    assert_eq!(coordinator.rebuild_count(), 0);

    let stats = coordinator.stats().await.unwrap();
    assert_eq!(stats.dense_live, 19);
    assert_eq!(stats.tombstones, 1);
}

// ============================================================================
// Rebuild and runtime behavior
// ============================================================================

#[tokio::test]
async fn test_rebuild_twice_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let (coordinator, _) = IndexCoordinator::<_>::open(
        with_parent(InMemoryChunkStore::new()).await,
        persistent_config(dir.path()),
    )
    .await
    .unwrap();
    coordinator.ingest_batch(corpus(11, 300, DIM)).await.unwrap();

    coordinator.rebuild_all().await.unwrap();
    let first = coordinator.stats().await.unwrap();
    coordinator.rebuild_all().await.unwrap();
    let second = coordinator.stats().await.unwrap();

    assert_eq!(first.dense_len, second.dense_len);
    assert_eq!(first.lexical.vocabulary_size, second.lexical.vocabulary_size);
    assert_eq!(second.generation, 2);
}

#[tokio::test]
async fn test_fusion_weights_change_ranking() {
    let (coordinator, _) = IndexCoordinator::<_>::open(
        with_parent(InMemoryChunkStore::new()).await,
        HybridSearchConfig::with_dimension(3),
    )
    .await
    .unwrap();
    coordinator
        .ingest(record(1, "unrelated words"), vec![1.0, 0.0, 0.0])
        .await
        .unwrap();
    coordinator
        .ingest(record(2, "exact keyword hit"), vec![0.0, 1.0, 0.0])
        .await
        .unwrap();

    let query = [1.0, 0.0, 0.0];

    coordinator.set_fusion_weights(1.0, 0.0).unwrap();
    let dense_only = coordinator
        .search(Some("keyword"), &query, 2, None)
        .await
        .unwrap();
    assert_eq!(ids(&dense_only), vec![1, 2]);

    coordinator.set_fusion_weights(0.0, 1.0).unwrap();
    let sparse_only = coordinator
        .search(Some("keyword"), &query, 2, None)
        .await
        .unwrap();
    assert_eq!(sparse_only[0].chunk_id.as_u64(), 2);
}

#[tokio::test]
async fn test_errors_are_classified() {
    let (coordinator, _) = IndexCoordinator::<_>::open(
        InMemoryChunkStore::new(),
        HybridSearchConfig::with_dimension(3),
    )
    .await
    .unwrap();

    let err = coordinator
        .search(None, &[1.0, 0.0, 0.0], 0, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::InvalidQuery(_)));
    assert!(!err.is_retryable());

    let err = coordinator
        .ingest(record(1, "x"), vec![1.0, 0.0])
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::DimensionMismatch { .. }));
}

#[cfg(feature = "redb-store")]
#[tokio::test]
async fn test_redb_store_survives_restart() {
    use quarry_core::storage::RedbChunkStore;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("chunks.redb");
    let index_dir = dir.path().join("index");
    let query = query_vector(21);

    let before = {
        let store = with_parent(RedbChunkStore::open(&db_path).unwrap()).await;
        let (coordinator, _) = IndexCoordinator::<_>::open(store, persistent_config(&index_dir))
            .await
            .unwrap();
        coordinator.ingest_batch(corpus(20, 100, DIM)).await.unwrap();
        coordinator
            .search(Some("query planning"), &query, 5, None)
            .await
            .unwrap()
    };

    let store = RedbChunkStore::open(&db_path).unwrap();
    let (coordinator, report) = IndexCoordinator::<_>::open(store, persistent_config(&index_dir))
        .await
        .unwrap();
    assert!(report.dense.loaded);
    assert_eq!(report.store_count, 100);

    let after = coordinator
        .search(Some("query planning"), &query, 5, None)
        .await
        .unwrap();
    assert_eq!(ids(&after), ids(&before));
    assert_eq!(after[0].metadata.title, "Handbook");
}
