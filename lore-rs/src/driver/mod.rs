//! Taxonomy storage abstraction.
//!
//! Defines the [`TaxonomyStore`] trait the engine drives, plus an in-memory
//! implementation. Nearest-neighbour search and persistence format belong to
//! the backend; the engine only consumes this contract.
//!
//! The engine holds no locks around a store. Callers serialise access across
//! concurrent ingestion runs when the backend is single-writer.

pub mod memory;

pub use memory::MemoryTaxonomy;

use crate::embedder::Embedding;
use crate::errors::Result;
use crate::nodes::{ExistingConcept, ProposedConcept};
use crate::search::SimilarityCandidate;

/// Trait representing a concept taxonomy backend.
#[allow(async_fn_in_trait)]
pub trait TaxonomyStore: Send + Sync {
    /// Concepts whose stored embedding scores at least `threshold` against
    /// `embedding`, best first, at most `limit` when given.
    async fn find_similar(
        &self,
        embedding: &Embedding,
        threshold: f32,
        limit: Option<usize>,
    ) -> Result<Vec<SimilarityCandidate>>;

    /// Persist an accepted concept record.
    async fn add_concept(&self, concept: &ProposedConcept) -> Result<()>;

    /// Persist the embedding that makes `id` retrievable by similarity.
    ///
    /// Written before the matching [`add_concept`](Self::add_concept); an
    /// embedding without a record must not be returned by `find_similar`.
    async fn store_concept_embedding(&self, id: &str, embedding: &Embedding) -> Result<()>;

    /// Look up a persisted concept.
    async fn concept(&self, id: &str) -> Result<Option<ExistingConcept>>;

    /// Flush pending writes to durable storage.
    async fn checkpoint(&self) -> Result<()>;
}
