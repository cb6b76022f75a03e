//! Test utilities for quarry-core.
//!
//! Deterministic vector and corpus helpers shared by unit tests. Every
//! generator takes a seed so failures reproduce exactly. Only compiled when
//! running tests.

use crate::search::types::{ChunkId, ChunkRecord, DocumentId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Words used to build synthetic chunk texts.
const VOCABULARY: &[&str] = &[
    "rust", "graph", "index", "vector", "search", "memory", "thread", "query", "token", "store",
    "cache", "layer", "borrow", "async", "latency",
];

pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Random vector with components in `[-1, 1)`, scaled to unit length.
pub fn random_unit_vector(rng: &mut StdRng, dim: usize) -> Vec<f32> {
    let v: Vec<f32> = (0..dim).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
    normalize(v)
}

/// `count` random unit vectors from one seed.
pub fn random_vectors(seed: u64, count: usize, dim: usize) -> Vec<Vec<f32>> {
    let mut rng = seeded_rng(seed);
    (0..count).map(|_| random_unit_vector(&mut rng, dim)).collect()
}

pub fn normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    v
}

pub fn chunk(id: u64, document: u64, text: &str) -> ChunkRecord {
    ChunkRecord::new(ChunkId::from_u64(id), DocumentId::from_u64(document), text)
}

/// Synthetic corpus of `count` chunks with ids `1..=count`, all under
/// document 1, with random unit embeddings and short texts drawn from a
/// fixed vocabulary.
pub fn corpus(seed: u64, count: usize, dim: usize) -> Vec<(ChunkRecord, Vec<f32>)> {
    let mut rng = seeded_rng(seed);
    (1..=count as u64)
        .map(|id| {
            let words: Vec<&str> = (0..6)
                .map(|_| VOCABULARY[rng.gen_range(0..VOCABULARY.len())])
                .collect();
            let text = format!("chunk {} {}", id, words.join(" "));
            (chunk(id, 1, &text), random_unit_vector(&mut rng, dim))
        })
        .collect()
}
