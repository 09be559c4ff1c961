//! # lore-rs
//!
//! Batched embedding and concept deduplication for a personal knowledge store.
//!
//! ## Architecture
//!
//! - **Batch scheduling**: items are processed in sequential batches with bounded
//!   concurrency, a checkpoint after every batch, and memory-aware batch sizing
//! - **Validated embeddings**: every vector is checked for shape and finiteness
//!   before it reaches storage; transient service failures are retried with backoff
//! - **Similarity-gated deduplication**: proposed concepts are compared against the
//!   taxonomy by cosine similarity and the best candidate is arbitrated by an LLM
//! - **Fail-open curation**: an unavailable judge never blocks new knowledge

pub mod errors;
pub mod nodes;
pub mod types;

pub mod driver;
pub mod embedder;
pub mod llm_client;

pub mod dedup;
pub mod prompts;
pub mod search;

pub mod curator;
pub mod pipeline;
pub mod utils;

pub use curator::{ConceptCurator, CurationOutcome, CurationReport, CuratorConfig};
pub use errors::{LoreError, Result};
pub use types::EngineConfig;
