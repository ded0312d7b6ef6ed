//! Text and semantic similarity.
//!
//! Two metrics feed the validator:
//! - structural similarity: normalized Levenshtein over raw strings,
//!   used for memory deduplication and verbatim-repetition checks;
//! - semantic similarity: cosine distance between embedding vectors,
//!   used for the progression checks against recent scenes.
//!
//! Embedding calls run under an explicit timeout so a stalled model
//! server cannot hang a narration turn.

use crate::provider::{Embedder, EmbeddingError};
use futures::future::try_join_all;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_EMBED_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from the semantic-similarity path.
#[derive(Debug, Error)]
pub enum SimilarityError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error("Embedding call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Embedding dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },
}

/// Structural similarity between two strings in [0, 1].
///
/// 1.0 means identical; 0.0 means maximally different. Two empty
/// strings are identical.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}

/// Cosine similarity between two embedding vectors.
///
/// Returns 0.0 when either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64, SimilarityError> {
    if a.len() != b.len() {
        return Err(SimilarityError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += (*x as f64) * (*y as f64);
        norm_a += (*x as f64) * (*x as f64);
        norm_b += (*y as f64) * (*y as f64);
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// Result of comparing new text against a set of prior texts.
#[derive(Debug, Clone)]
pub struct SemanticComparison {
    /// Similarity against the closest prior text.
    pub max_similarity: f64,
    /// Mean similarity across all prior texts.
    pub average_similarity: f64,
    /// Per-prior similarity, in the order the priors were given.
    pub per_text: Vec<f64>,
}

impl SemanticComparison {
    /// Comparison against an empty prior set. Callers treat this as
    /// automatically valid: there is nothing to repeat yet.
    pub fn empty() -> Self {
        Self {
            max_similarity: 0.0,
            average_similarity: 0.0,
            per_text: Vec::new(),
        }
    }

    pub fn has_priors(&self) -> bool {
        !self.per_text.is_empty()
    }
}

/// Embeds texts and compares them, with a timeout per embedding call.
pub struct SimilarityEngine<E> {
    embedder: E,
    timeout: Duration,
}

impl<E: Embedder> SimilarityEngine<E> {
    pub fn new(embedder: E) -> Self {
        Self {
            embedder,
            timeout: DEFAULT_EMBED_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, SimilarityError> {
        match tokio::time::timeout(self.timeout, self.embedder.embed(text)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(SimilarityError::Timeout(self.timeout)),
        }
    }

    /// Compare `text` against each of `priors` in embedding space.
    pub async fn compare(
        &self,
        text: &str,
        priors: &[String],
    ) -> Result<SemanticComparison, SimilarityError> {
        if priors.is_empty() {
            return Ok(SemanticComparison::empty());
        }

        let text_vector = self.embed_one(text).await?;
        let prior_vectors =
            try_join_all(priors.iter().map(|prior| self.embed_one(prior))).await?;

        let mut per_text = Vec::with_capacity(prior_vectors.len());
        for prior_vector in &prior_vectors {
            per_text.push(cosine_similarity(&text_vector, prior_vector)?);
        }

        let max_similarity = per_text.iter().cloned().fold(f64::MIN, f64::max);
        let average_similarity = per_text.iter().sum::<f64>() / per_text.len() as f64;

        Ok(SemanticComparison {
            max_similarity,
            average_similarity,
            per_text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FixedEmbedder;

    #[test]
    fn test_text_similarity_identity() {
        assert_eq!(text_similarity("the cave mouth", "the cave mouth"), 1.0);
        assert_eq!(text_similarity("", ""), 1.0);
    }

    #[test]
    fn test_text_similarity_disjoint() {
        let similarity = text_similarity("abcd", "wxyz");
        assert_eq!(similarity, 0.0);
    }

    #[test]
    fn test_text_similarity_partial() {
        let similarity = text_similarity("goblin camp", "goblin cave");
        assert!(similarity > 0.5 && similarity < 1.0);
    }

    #[test]
    fn test_cosine_symmetry() {
        let a = vec![0.3, 0.7, 0.1];
        let b = vec![0.2, 0.5, 0.9];
        let ab = cosine_similarity(&a, &b).unwrap();
        let ba = cosine_similarity(&b, &a).unwrap();
        assert!((ab - ba).abs() < 1e-12);
    }

    #[test]
    fn test_cosine_identical_vectors() {
        let a = vec![0.3, 0.7, 0.1];
        let similarity = cosine_similarity(&a, &a).unwrap();
        assert!((similarity - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_zero_vector() {
        let a = vec![0.0, 0.0];
        let b = vec![1.0, 2.0];
        assert_eq!(cosine_similarity(&a, &b).unwrap(), 0.0);
    }

    #[test]
    fn test_cosine_dimension_mismatch() {
        let a = vec![1.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!(matches!(
            cosine_similarity(&a, &b),
            Err(SimilarityError::DimensionMismatch { left: 2, right: 3 })
        ));
    }

    #[tokio::test]
    async fn test_compare_empty_priors() {
        let engine = SimilarityEngine::new(FixedEmbedder::uniform(vec![1.0, 0.0]));
        let comparison = engine.compare("anything", &[]).await.unwrap();
        assert!(!comparison.has_priors());
        assert_eq!(comparison.max_similarity, 0.0);
    }

    #[tokio::test]
    async fn test_compare_orthogonal() {
        let embedder = FixedEmbedder::uniform(vec![0.0, 1.0])
            .with_vector("the new scene", vec![1.0, 0.0]);
        let engine = SimilarityEngine::new(embedder);
        let priors = vec!["an old scene".to_string()];
        let comparison = engine.compare("the new scene", &priors).await.unwrap();
        assert!(comparison.max_similarity.abs() < 1e-9);
        assert_eq!(comparison.per_text.len(), 1);
    }
}
