//! Node types for the concept taxonomy.
//!
//! - [`ProposedConcept`] — an LLM-suggested entry awaiting deduplication
//! - [`ExistingConcept`] — an accepted, persisted entry

pub mod concept;

pub use concept::{
    validate_concept_id, ConceptIdError, ExistingConcept, ProposedConcept, DEFAULT_CATEGORIES,
};
