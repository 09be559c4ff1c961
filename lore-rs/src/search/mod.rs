//! Similarity retrieval over the concept taxonomy.
//!
//! Vector search itself is delegated to the [`TaxonomyStore`]; the retriever
//! enforces the similarity floor, the `[0, 1]` score range and best-first
//! ordering regardless of what the backend returns.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::driver::TaxonomyStore;
use crate::embedder::Embedding;
use crate::errors::Result;
use crate::nodes::ExistingConcept;

/// An existing concept scored against a query embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityCandidate {
    pub concept: ExistingConcept,
    /// Cosine similarity in `[0, 1]`.
    pub score: f32,
}

/// Returns candidate concepts above a similarity floor, best first.
pub struct SimilarityRetriever<'a, S> {
    store: &'a S,
    threshold: f32,
    limit: Option<usize>,
}

impl<'a, S: TaxonomyStore> SimilarityRetriever<'a, S> {
    pub fn new(store: &'a S, threshold: f32) -> Self {
        Self {
            store,
            threshold,
            limit: None,
        }
    }

    /// Cap the number of candidates returned.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Candidates scoring at least the threshold against `embedding`.
    pub async fn retrieve(&self, embedding: &Embedding) -> Result<Vec<SimilarityCandidate>> {
        let mut candidates = self
            .store
            .find_similar(embedding, self.threshold, self.limit)
            .await?;

        for c in &mut candidates {
            c.score = c.score.clamp(0.0, 1.0);
        }
        candidates.retain(|c| c.score >= self.threshold);
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        if let Some(limit) = self.limit {
            candidates.truncate(limit);
        }

        debug!(
            candidates = candidates.len(),
            threshold = self.threshold,
            best = ?candidates.first().map(|c| c.score),
            "similarity retrieval"
        );
        Ok(candidates)
    }

    /// The single best candidate, if any clears the threshold.
    pub async fn best(&self, embedding: &Embedding) -> Result<Option<SimilarityCandidate>> {
        Ok(self.retrieve(embedding).await?.into_iter().next())
    }
}
