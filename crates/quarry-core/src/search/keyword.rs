//! BM25 keyword search for exact term matching.
//!
//! BM25 (Best Matching 25) scores documents by query term frequency,
//! inverse document frequency and document length.
//!
//! # Algorithm
//!
//! For a query `q` and document `d`:
//!
//! ```text
//! score(d, q) = Σ_{t ∈ q} IDF(t) · tf(t,d)·(k1+1) / (tf(t,d) + k1·(1 − b + b·|d|/avgdl))
//! IDF(t)      = ln((N − df(t) + 0.5) / (df(t) + 0.5) + 1)
//! ```
//!
//! # Corpus statistics
//!
//! IDF values and the average document length depend on the whole corpus.
//! They are kept in a cache that every mutation marks dirty and that the next
//! search (or [`LexicalIndex::stats`]) recomputes in one linear pass over the
//! documents. Ingesting a thousand chunks therefore costs one recomputation,
//! not a thousand, and a query never recomputes per term.
//!
//! # Integration with Hybrid Search
//!
//! This index is used alongside [`DenseIndex`](super::vector::DenseIndex)
//! by the [`IndexCoordinator`](super::IndexCoordinator). Results from both
//! are combined using [`RankFusion`](super::fusion::RankFusion).

use super::types::ChunkId;
use crate::config::{DEFAULT_BM25_B, DEFAULT_BM25_K1};
use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, instrument};

/// Removed slots tolerated before the document list is renumbered.
const MIN_DEAD_SLOTS_BEFORE_COMPACT: usize = 64;

/// BM25 tuning parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    /// Term frequency saturation
    pub k1: f32,
    /// Document length normalization
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: DEFAULT_BM25_K1,
            b: DEFAULT_BM25_B,
        }
    }
}

/// Normalizes text into terms.
///
/// Lowercases, drops every character that is not a Unicode letter, digit or
/// whitespace, and splits on whitespace. Documents and queries go through the
/// same function.
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized: String = text
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();
    normalized.split_whitespace().map(str::to_owned).collect()
}

/// One indexed chunk: term frequencies plus token length.
#[derive(Debug, Clone)]
struct LexicalDocument {
    chunk_id: ChunkId,
    term_freqs: HashMap<String, u32>,
    length: usize,
}

/// Corpus-wide values derived from all live documents.
#[derive(Debug, Clone, Default)]
struct CorpusStats {
    idf: HashMap<String, f32>,
    avg_doc_len: f32,
    doc_count: usize,
}

/// Snapshot of the index size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LexicalStats {
    /// Number of live documents
    pub document_count: usize,
    /// Number of distinct terms across live documents
    pub vocabulary_size: usize,
    /// Average document length in tokens
    pub avg_doc_length: f32,
}

/// BM25-based keyword search engine.
///
/// Documents are stored under sequential internal indices (distinct from
/// dense index labels). Postings lists map each term to the documents that
/// contain it, so a query only scores documents sharing at least one term.
///
/// # Thread Safety
///
/// Mutations take `&mut self`. Searches take `&self`: the corpus statistics
/// cache is refreshed behind an internal lock, so several searches may run
/// under a shared `RwLock` read guard.
pub struct LexicalIndex {
    params: Bm25Params,
    /// Documents by internal index; `None` once removed or replaced
    documents: Vec<Option<LexicalDocument>>,
    /// Live internal index per chunk
    doc_index: HashMap<ChunkId, usize>,
    /// term -> [(internal index, tf)], live documents only
    postings: HashMap<String, Vec<(usize, u32)>>,
    /// `None` slots in `documents`
    dead_slots: usize,
    /// `None` means dirty
    stats: RwLock<Option<CorpusStats>>,
}

impl LexicalIndex {
    /// Creates an empty index.
    pub fn new(params: Bm25Params) -> Self {
        Self {
            params,
            documents: Vec::new(),
            doc_index: HashMap::new(),
            postings: HashMap::new(),
            dead_slots: 0,
            stats: RwLock::new(Some(CorpusStats::default())),
        }
    }

    /// Returns the BM25 parameters.
    pub fn params(&self) -> Bm25Params {
        self.params
    }

    /// Adds a chunk to the corpus.
    ///
    /// Re-adding a chunk id replaces the earlier document.
    #[instrument(skip_all, fields(text_len = text.len()))]
    pub fn add(&mut self, chunk_id: ChunkId, text: &str) {
        if let Some(old) = self.doc_index.remove(&chunk_id) {
            self.detach(old);
        }

        let terms = tokenize(text);
        let length = terms.len();
        let mut term_freqs: HashMap<String, u32> = HashMap::new();
        for term in terms {
            *term_freqs.entry(term).or_insert(0) += 1;
        }

        let idx = self.documents.len();
        for (term, &tf) in &term_freqs {
            self.postings
                .entry(term.clone())
                .or_default()
                .push((idx, tf));
        }
        self.documents.push(Some(LexicalDocument {
            chunk_id,
            term_freqs,
            length,
        }));
        self.doc_index.insert(chunk_id, idx);
        self.mark_dirty();
        self.compact_if_sparse();
    }

    /// Removes a chunk. Returns `false` if it was not indexed.
    pub fn remove(&mut self, chunk_id: ChunkId) -> bool {
        match self.doc_index.remove(&chunk_id) {
            Some(idx) => {
                self.detach(idx);
                self.mark_dirty();
                self.compact_if_sparse();
                true
            }
            None => false,
        }
    }

    /// Empties a document slot and drops its postings.
    fn detach(&mut self, idx: usize) {
        let Some(doc) = self.documents.get_mut(idx).and_then(Option::take) else {
            return;
        };
        for term in doc.term_freqs.keys() {
            if let Some(list) = self.postings.get_mut(term) {
                list.retain(|&(i, _)| i != idx);
                if list.is_empty() {
                    self.postings.remove(term);
                }
            }
        }
        self.dead_slots += 1;
    }

    /// Renumbers live documents once removed slots outnumber them.
    ///
    /// Relative order is preserved, so score ties still resolve in insertion
    /// order.
    fn compact_if_sparse(&mut self) {
        if self.dead_slots < MIN_DEAD_SLOTS_BEFORE_COMPACT
            || self.dead_slots <= self.doc_index.len()
        {
            return;
        }

        let mut renumbered = vec![0usize; self.documents.len()];
        let mut live = Vec::with_capacity(self.doc_index.len());
        for (old, doc) in std::mem::take(&mut self.documents).into_iter().enumerate() {
            if let Some(doc) = doc {
                renumbered[old] = live.len();
                live.push(Some(doc));
            }
        }
        for list in self.postings.values_mut() {
            for entry in list.iter_mut() {
                entry.0 = renumbered[entry.0];
            }
        }
        for idx in self.doc_index.values_mut() {
            *idx = renumbered[*idx];
        }

        debug!(
            "Compacted lexical index: dropped {} removed slots, {} documents remain",
            self.dead_slots,
            live.len()
        );
        self.documents = live;
        self.dead_slots = 0;
    }

    /// Number of postings entries across all terms.
    pub fn postings_len(&self) -> usize {
        self.postings.values().map(Vec::len).sum()
    }

    /// Returns `true` if the chunk is indexed.
    pub fn contains(&self, chunk_id: ChunkId) -> bool {
        self.doc_index.contains_key(&chunk_id)
    }

    /// Searches for chunks matching the query.
    ///
    /// Returns up to `k` `(ChunkId, score)` pairs sorted by score descending,
    /// ties in insertion order. Documents without any query term are not
    /// returned. A query with no terms left after normalization returns an
    /// empty list.
    pub fn search(
        &self,
        query: &str,
        k: usize,
        id_filter: Option<&HashSet<ChunkId>>,
    ) -> Vec<(ChunkId, f32)> {
        let terms = tokenize(query);
        if terms.is_empty() || k == 0 || self.doc_index.is_empty() {
            return Vec::new();
        }

        self.ensure_stats();
        let guard = self.stats.read().unwrap_or_else(PoisonError::into_inner);
        let Some(stats) = guard.as_ref() else {
            return Vec::new();
        };

        let Bm25Params { k1, b } = self.params;
        let avg_len = if stats.avg_doc_len > 0.0 {
            stats.avg_doc_len
        } else {
            1.0
        };

        let mut scores: HashMap<usize, f32> = HashMap::new();
        for term in &terms {
            let (Some(&idf), Some(postings)) = (stats.idf.get(term), self.postings.get(term))
            else {
                continue;
            };
            for &(idx, tf) in postings {
                let Some(doc) = self.documents[idx].as_ref() else {
                    continue;
                };
                if id_filter.is_some_and(|ids| !ids.contains(&doc.chunk_id)) {
                    continue;
                }
                let tf = tf as f32;
                let norm = k1 * (1.0 - b + b * doc.length as f32 / avg_len);
                *scores.entry(idx).or_insert(0.0) += idf * tf * (k1 + 1.0) / (tf + norm);
            }
        }

        let mut ranked: Vec<(usize, f32)> = scores.into_iter().filter(|(_, s)| *s > 0.0).collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        ranked.truncate(k);

        ranked
            .into_iter()
            .filter_map(|(idx, score)| {
                self.documents[idx]
                    .as_ref()
                    .map(|doc| (doc.chunk_id, score))
            })
            .collect()
    }

    /// Resets to an empty corpus.
    pub fn clear(&mut self) {
        self.documents.clear();
        self.doc_index.clear();
        self.postings.clear();
        self.dead_slots = 0;
        *self.stats.write().unwrap_or_else(PoisonError::into_inner) = Some(CorpusStats::default());
    }

    /// Returns document count, vocabulary size and average document length.
    pub fn stats(&self) -> LexicalStats {
        self.ensure_stats();
        let guard = self.stats.read().unwrap_or_else(PoisonError::into_inner);
        guard
            .as_ref()
            .map(|s| LexicalStats {
                document_count: s.doc_count,
                vocabulary_size: s.idf.len(),
                avg_doc_length: s.avg_doc_len,
            })
            .unwrap_or(LexicalStats {
                document_count: 0,
                vocabulary_size: 0,
                avg_doc_length: 0.0,
            })
    }

    /// Returns the number of indexed chunks.
    pub fn len(&self) -> usize {
        self.doc_index.len()
    }

    /// Returns `true` if no chunks have been indexed.
    pub fn is_empty(&self) -> bool {
        self.doc_index.is_empty()
    }

    /// Returns `true` if a mutation happened since the last refresh.
    pub fn is_dirty(&self) -> bool {
        self.stats
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    fn mark_dirty(&mut self) {
        *self.stats.get_mut().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Recomputes the corpus statistics if a mutation invalidated them.
    fn ensure_stats(&self) {
        if !self.is_dirty() {
            return;
        }
        let mut guard = self.stats.write().unwrap_or_else(PoisonError::into_inner);
        // Another search may have refreshed while we waited for the lock
        if guard.is_some() {
            return;
        }
        *guard = Some(self.compute_stats());
    }

    fn compute_stats(&self) -> CorpusStats {
        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        let mut total_len = 0usize;
        let mut doc_count = 0usize;

        for doc in self.documents.iter().flatten() {
            doc_count += 1;
            total_len += doc.length;
            for term in doc.term_freqs.keys() {
                *doc_freq.entry(term.as_str()).or_insert(0) += 1;
            }
        }

        let n = doc_count as f32;
        let idf = doc_freq
            .into_iter()
            .map(|(term, df)| {
                let df = df as f32;
                (term.to_owned(), ((n - df + 0.5) / (df + 0.5) + 1.0).ln())
            })
            .collect::<HashMap<_, _>>();

        let avg_doc_len = if doc_count > 0 {
            total_len as f32 / doc_count as f32
        } else {
            0.0
        };

        debug!(
            "Refreshed BM25 corpus statistics: {} documents, {} terms, avg length {:.1}",
            doc_count,
            idf.len(),
            avg_doc_len
        );

        CorpusStats {
            idf,
            avg_doc_len,
            doc_count,
        }
    }
}

impl Default for LexicalIndex {
    fn default() -> Self {
        Self::new(Bm25Params::default())
    }
}
