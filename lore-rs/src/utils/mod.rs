//! Shared utilities.
//!
//! Includes:
//! - Vector similarity (cosine, L2 normalisation)
//! - Bounded, order-preserving fan-out (`try_join_ordered`)
//! - Text normalisation for prompts and embedding input

pub mod concurrency;
pub mod similarity;
pub mod text;

pub use concurrency::try_join_ordered;
pub use similarity::{cosine_similarity, normalize_l2, normalized_score, similarity_score};
pub use text::{concept_embedding_text, normalize_whitespace, truncate_with_ellipsis};
