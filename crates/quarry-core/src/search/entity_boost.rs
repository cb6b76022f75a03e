//! Entity-boosted re-ranking of fused results.
//!
//! Entities (people, places, products, ...) extracted from the query by an
//! external recognizer can lift chunks that mention them. Each chunk gets an
//! entity score, the sum of the type multipliers of the entities it
//! mentions. Both the fused scores and the entity scores are normalized by
//! their maximum, then blended:
//!
//! ```text
//! final = hybrid_weight · fused / max(fused) + entity_weight · entity / max(entity)
//! ```
//!
//! Re-ranking reorders the candidates; it never adds or drops one.

use super::keyword::tokenize;
use super::types::SearchResult;
use crate::error::SearchError;
use std::collections::HashMap;

/// Default share of the fused score in the blend.
pub const DEFAULT_HYBRID_WEIGHT: f32 = 0.7;

/// Default share of the entity score in the blend.
pub const DEFAULT_ENTITY_WEIGHT: f32 = 0.3;

/// An entity recognized in the query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedEntity {
    /// Surface form, e.g. "New York"
    pub text: String,
    /// Recognizer label, e.g. "LOCATION"
    pub entity_type: String,
}

impl ExtractedEntity {
    pub fn new(text: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            entity_type: entity_type.into(),
        }
    }
}

/// Re-ranking settings for one query.
#[derive(Debug, Clone)]
pub struct EntityBoost {
    pub entities: Vec<ExtractedEntity>,
    /// Multiplier per entity type; unlisted types count 1.0
    pub type_multipliers: HashMap<String, f32>,
    pub hybrid_weight: f32,
    pub entity_weight: f32,
}

impl EntityBoost {
    /// Boost for the given entities with default weights.
    pub fn new(entities: Vec<ExtractedEntity>) -> Self {
        Self {
            entities,
            type_multipliers: HashMap::new(),
            hybrid_weight: DEFAULT_HYBRID_WEIGHT,
            entity_weight: DEFAULT_ENTITY_WEIGHT,
        }
    }

    /// Sets the multiplier of one entity type.
    pub fn with_type_multiplier(mut self, entity_type: impl Into<String>, multiplier: f32) -> Self {
        self.type_multipliers.insert(entity_type.into(), multiplier);
        self
    }

    /// Sets the blend weights.
    pub fn with_weights(mut self, hybrid_weight: f32, entity_weight: f32) -> Result<Self, SearchError> {
        crate::config::validate_weights(hybrid_weight, entity_weight)?;
        self.hybrid_weight = hybrid_weight;
        self.entity_weight = entity_weight;
        Ok(self)
    }

    fn multiplier(&self, entity_type: &str) -> f32 {
        self.type_multipliers
            .get(entity_type)
            .copied()
            .unwrap_or(1.0)
    }

    fn entity_terms(&self) -> Vec<(Vec<String>, f32)> {
        self.entities
            .iter()
            .map(|e| (tokenize(&e.text), self.multiplier(&e.entity_type)))
            .filter(|(terms, _)| !terms.is_empty())
            .collect()
    }

    /// Raw entity score of a text (before normalization).
    pub fn entity_score(&self, text: &str) -> f32 {
        score_tokens(&tokenize(text), &self.entity_terms())
    }

    /// Rescores and reorders `results` in place.
    ///
    /// Sets `score` to the blended value and `entity_score` to the
    /// normalized entity score. Equal blended scores keep their input order.
    pub fn apply(&self, results: &mut [SearchResult]) {
        if results.is_empty() {
            return;
        }

        let entity_terms = self.entity_terms();
        let raw: Vec<f32> = results
            .iter()
            .map(|r| score_tokens(&tokenize(&r.text), &entity_terms))
            .collect();

        let max_fused = results.iter().map(|r| r.fused_score).fold(0.0f32, f32::max);
        let max_entity = raw.iter().copied().fold(0.0f32, f32::max);

        for (result, entity) in results.iter_mut().zip(raw) {
            let fused_norm = if max_fused > 0.0 {
                result.fused_score / max_fused
            } else {
                0.0
            };
            let entity_norm = if max_entity > 0.0 {
                entity / max_entity
            } else {
                0.0
            };
            result.entity_score = Some(entity_norm);
            result.score = self.hybrid_weight * fused_norm + self.entity_weight * entity_norm;
        }

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    }
}

/// Sum of multipliers of entities whose tokens occur contiguously in `tokens`.
fn score_tokens(tokens: &[String], entity_terms: &[(Vec<String>, f32)]) -> f32 {
    entity_terms
        .iter()
        .filter(|(terms, _)| tokens.windows(terms.len()).any(|w| w == terms.as_slice()))
        .map(|(_, multiplier)| multiplier)
        .sum()
}
