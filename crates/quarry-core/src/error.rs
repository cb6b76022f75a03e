//! Error types for quarry-core.
//!
//! Every fallible search, ingestion and index operation returns
//! [`SearchError`]. Variants fall into a small number of classes
//! (see [`ErrorClass`]) that tell the caller how to react: validation
//! errors are never retried, concurrency errors are retried with backoff,
//! corruption is recovered automatically and only reported.

use crate::storage::StoreError;
use thiserror::Error;

/// Broad category of a [`SearchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad input (dimension, non-finite vector, malformed query, bad config)
    Validation,
    /// The dense index reached its configured capacity
    Capacity,
    /// On-disk index state was invalid
    Corruption,
    /// A rebuild is in progress
    Concurrency,
    /// Every item of a batch was rejected
    Batch,
    /// Storage backend or filesystem failure
    Infrastructure,
}

/// Error types for search and indexing operations.
#[derive(Debug, Clone, Error)]
pub enum SearchError {
    /// Vector dimension mismatch (expected vs actual)
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension locked for the current index generation
        expected: usize,
        /// Dimension of the rejected vector
        actual: usize,
    },
    /// Vector contains NaN or infinite components
    #[error("Invalid vector: {0}")]
    InvalidVector(String),
    /// Invalid search query
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    /// Configuration value out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    /// Dense index is at capacity
    #[error("Index full: capacity of {capacity} elements reached")]
    IndexFull {
        /// Configured maximum number of elements
        capacity: usize,
    },
    /// Persisted index or sidecar failed validation
    #[error("Corrupted index: {0}")]
    Corrupted(String),
    /// A full rebuild is running; retry later
    #[error("Indexes are being rebuilt, retry later")]
    IndexesRebuilding,
    /// `rebuild_all` was called while another rebuild was running
    #[error("A rebuild is already in progress")]
    AlreadyRebuilding,
    /// Every item of a non-empty batch was rejected
    #[error("Batch rejected: all {skipped} items failed (first error: {first_error})")]
    BatchRejected {
        /// Number of rejected items
        skipped: usize,
        /// Message of the first rejection
        first_error: String,
    },
    /// Storage backend error
    #[error("Storage error: {0}")]
    StorageError(String),
    /// Index construction, persistence or query error
    #[error("Index error: {0}")]
    IndexError(String),
}

impl SearchError {
    /// Returns the class of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            SearchError::DimensionMismatch { .. }
            | SearchError::InvalidVector(_)
            | SearchError::InvalidQuery(_)
            | SearchError::InvalidConfig(_) => ErrorClass::Validation,
            SearchError::IndexFull { .. } => ErrorClass::Capacity,
            SearchError::Corrupted(_) => ErrorClass::Corruption,
            SearchError::IndexesRebuilding | SearchError::AlreadyRebuilding => {
                ErrorClass::Concurrency
            }
            SearchError::BatchRejected { .. } => ErrorClass::Batch,
            SearchError::StorageError(_) | SearchError::IndexError(_) => ErrorClass::Infrastructure,
        }
    }

    /// Returns `true` if the caller should retry the operation with backoff.
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Concurrency
    }
}

impl From<StoreError> for SearchError {
    fn from(err: StoreError) -> Self {
        SearchError::StorageError(err.to_string())
    }
}

impl From<std::io::Error> for SearchError {
    fn from(err: std::io::Error) -> Self {
        SearchError::IndexError(err.to_string())
    }
}
