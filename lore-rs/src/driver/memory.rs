//! In-memory taxonomy store with brute-force cosine search.

use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use tracing::debug;

use crate::driver::TaxonomyStore;
use crate::embedder::{validate_embedding, Embedding};
use crate::errors::{LoreError, Result};
use crate::nodes::{ExistingConcept, ProposedConcept};
use crate::search::SimilarityCandidate;
use crate::utils::{normalize_l2, normalized_score};

/// Concurrent in-memory [`TaxonomyStore`].
///
/// Embeddings are L2-normalised on write so a query costs one dot product per
/// stored concept.
pub struct MemoryTaxonomy {
    dim: usize,
    concepts: DashMap<String, ExistingConcept>,
    embeddings: DashMap<String, Embedding>,
    checkpoints: AtomicUsize,
}

impl MemoryTaxonomy {
    /// Create an empty store for embeddings of dimension `dim`.
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            concepts: DashMap::new(),
            embeddings: DashMap::new(),
            checkpoints: AtomicUsize::new(0),
        }
    }

    /// Number of persisted concepts.
    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }

    /// Number of [`checkpoint`](TaxonomyStore::checkpoint) calls so far.
    pub fn checkpoint_count(&self) -> usize {
        self.checkpoints.load(Ordering::SeqCst)
    }

    /// Whether `id` has a stored embedding.
    pub fn has_embedding(&self, id: &str) -> bool {
        self.embeddings.contains_key(id)
    }
}

impl TaxonomyStore for MemoryTaxonomy {
    async fn find_similar(
        &self,
        embedding: &Embedding,
        threshold: f32,
        limit: Option<usize>,
    ) -> Result<Vec<SimilarityCandidate>> {
        if embedding.len() != self.dim {
            return Err(LoreError::Store(format!(
                "query has {} dimensions, store holds {}",
                embedding.len(),
                self.dim
            )));
        }

        let query = normalize_l2(embedding);
        let mut hits: Vec<SimilarityCandidate> = self
            .embeddings
            .iter()
            .filter_map(|entry| {
                let score = normalized_score(&query, entry.value());
                if score < threshold {
                    return None;
                }
                let concept = self.concepts.get(entry.key())?.value().clone();
                Some(SimilarityCandidate { concept, score })
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.concept.id.cmp(&b.concept.id)));
        if let Some(limit) = limit {
            hits.truncate(limit);
        }
        debug!(hits = hits.len(), threshold, "memory taxonomy search");
        Ok(hits)
    }

    async fn add_concept(&self, concept: &ProposedConcept) -> Result<()> {
        self.concepts
            .insert(concept.id.clone(), ExistingConcept::from(concept));
        Ok(())
    }

    async fn store_concept_embedding(&self, id: &str, embedding: &Embedding) -> Result<()> {
        let embedding = validate_embedding(embedding.clone(), self.dim)?;
        self.embeddings.insert(id.to_string(), normalize_l2(&embedding));
        Ok(())
    }

    async fn concept(&self, id: &str) -> Result<Option<ExistingConcept>> {
        Ok(self.concepts.get(id).map(|c| c.value().clone()))
    }

    async fn checkpoint(&self) -> Result<()> {
        self.checkpoints.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
