//! Duplicate judgement for proposed concepts.
//!
//! A judge compares a proposal with its best-scoring existing candidate and
//! answers with a tri-state [`DedupVerdict`]. A judge that cannot be reached
//! answers [`DedupVerdict::Unknown`] instead of failing, so callers can apply
//! the fail-open policy without inspecting errors.

pub mod judge;

pub use judge::{classify_verdict, JudgeMode, LlmJudge};

use serde::{Deserialize, Serialize};

use crate::nodes::ProposedConcept;
use crate::search::SimilarityCandidate;

/// Outcome of one duplicate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupVerdict {
    /// The judge confirmed the proposal names the same concept.
    Duplicate,
    /// The judge confirmed the proposal is a different concept.
    Distinct,
    /// The judge could not be consulted.
    Unknown,
}

impl DedupVerdict {
    /// Only a confirmed duplicate blocks acceptance.
    pub fn blocks_acceptance(self) -> bool {
        matches!(self, DedupVerdict::Duplicate)
    }

    pub fn decision(self) -> DedupDecision {
        DedupDecision::from(self)
    }
}

/// Flat `{is_duplicate, available}` view of a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupDecision {
    pub is_duplicate: bool,
    /// `false` when the judge could not be consulted.
    pub available: bool,
}

impl From<DedupVerdict> for DedupDecision {
    fn from(v: DedupVerdict) -> Self {
        Self {
            is_duplicate: v == DedupVerdict::Duplicate,
            available: v != DedupVerdict::Unknown,
        }
    }
}

/// Decides whether a proposal duplicates an existing concept.
#[allow(async_fn_in_trait)]
pub trait DuplicateJudge: Send + Sync {
    /// Never fails: an unreachable judge yields [`DedupVerdict::Unknown`].
    async fn judge(&self, proposed: &ProposedConcept, candidate: &SimilarityCandidate) -> DedupVerdict;
}
