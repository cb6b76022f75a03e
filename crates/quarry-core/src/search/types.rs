use crate::error::SearchError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Returns the current Unix timestamp (seconds since UNIX_EPOCH).
///
/// If the system time is before UNIX_EPOCH (extremely unlikely),
/// returns 0 instead of panicking.
pub fn get_current_timestamp() -> u64 {
    instant::SystemTime::now()
        .duration_since(instant::SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Chunk identifier.
///
/// Ids are assigned by the ingestion side and stored in the
/// [`ChunkStore`](crate::storage::ChunkStore); the indexes never invent them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(u64);

impl ChunkId {
    /// Creates a ChunkId from a raw u64 value.
    pub fn from_u64(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw u64 value of this ID.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ChunkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parent document identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(u64);

impl DocumentId {
    /// Creates a DocumentId from a raw u64 value.
    pub fn from_u64(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw u64 value of this ID.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A text passage belonging to a parent document.
///
/// Immutable once embedded; an update is a delete followed by a new ingest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Chunk identifier
    pub id: ChunkId,
    /// Parent document
    pub document_id: DocumentId,
    /// Chunk text (indexed by BM25)
    pub text: String,
}

impl ChunkRecord {
    /// Creates a new chunk record.
    pub fn new(id: ChunkId, document_id: DocumentId, text: impl Into<String>) -> Self {
        Self {
            id,
            document_id,
            text: text.into(),
        }
    }
}

/// Parent document metadata attached to search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Display title
    pub title: String,
    /// Source path or URL
    pub source: Option<String>,
    /// Unix timestamp (seconds since UNIX_EPOCH)
    pub created_at: u64,
}

impl DocumentMetadata {
    /// Creates metadata stamped with the current time.
    pub fn new(title: impl Into<String>, source: Option<String>) -> Self {
        Self {
            title: title.into(),
            source,
            created_at: get_current_timestamp(),
        }
    }
}

/// Restricts a search to a set of chunks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilter {
    /// Only these chunks may appear in results
    pub chunk_ids: Option<HashSet<ChunkId>>,
}

impl SearchFilter {
    /// Filter admitting only the given chunk ids.
    pub fn chunk_ids(ids: impl IntoIterator<Item = ChunkId>) -> Self {
        Self {
            chunk_ids: Some(ids.into_iter().collect()),
        }
    }
}

/// Search result with relevance scores.
///
/// Returned by the [`IndexCoordinator`](super::IndexCoordinator), containing
/// the chunk, its parent metadata and the scores from each ranking stage.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// Chunk identifier
    pub chunk_id: ChunkId,
    /// Parent document identifier
    pub document_id: DocumentId,
    /// Final score (fused score, or entity-boosted score when boosting is used)
    pub score: f32,
    /// Weighted RRF score
    pub fused_score: f32,
    /// Cosine similarity from the dense index, if retrieved there
    pub dense_score: Option<f32>,
    /// 1-based rank in the dense list
    pub dense_rank: Option<usize>,
    /// BM25 score, if retrieved by the lexical index
    pub sparse_score: Option<f32>,
    /// 1-based rank in the sparse list
    pub sparse_rank: Option<usize>,
    /// Normalized entity score, when entity boosting was applied
    pub entity_score: Option<f32>,
    /// Chunk text
    pub text: String,
    /// Parent document metadata
    pub metadata: DocumentMetadata,
}

/// Result of a batch insertion where items are validated independently.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Items that were indexed
    pub added: usize,
    /// Items that were rejected
    pub skipped: usize,
    /// Rejection reason per skipped item, in batch order
    pub failures: Vec<(ChunkId, SearchError)>,
}

impl BatchOutcome {
    /// Records a rejected item.
    pub fn record_failure(&mut self, id: ChunkId, err: SearchError) {
        self.skipped += 1;
        self.failures.push((id, err));
    }

    /// Turns a batch where nothing succeeded into `BatchRejected`.
    ///
    /// Empty batches and partial failures pass through unchanged.
    pub fn into_result(self) -> Result<Self, SearchError> {
        if self.added == 0 && self.skipped > 0 {
            let first_error = self
                .failures
                .first()
                .map(|(_, e)| e.to_string())
                .unwrap_or_default();
            return Err(SearchError::BatchRejected {
                skipped: self.skipped,
                first_error,
            });
        }
        Ok(self)
    }
}

/// Validates that an embedding has the expected dimension.
///
/// Returns `Ok(())` if dimensions match, or `Err(SearchError::DimensionMismatch)` otherwise.
pub fn validate_dimension(expected: usize, actual: usize) -> Result<(), SearchError> {
    if actual == expected {
        Ok(())
    } else {
        Err(SearchError::DimensionMismatch { expected, actual })
    }
}

/// Rejects vectors with NaN or infinite components.
pub fn validate_finite(vector: &[f32]) -> Result<(), SearchError> {
    match vector.iter().position(|v| !v.is_finite()) {
        None => Ok(()),
        Some(pos) => Err(SearchError::InvalidVector(format!(
            "component {} is {}",
            pos, vector[pos]
        ))),
    }
}
