//! Concept curation: the accept/reject protocol for proposed concepts.
//!
//! Each proposal moves through
//! 1. **Validate** the identifier (no network cost on failure)
//! 2. **Embed** the label and definition
//! 3. **Retrieve** existing concepts above the dedup threshold
//! 4. **Judge** the best candidate with the [`DuplicateJudge`]
//! 5. **Persist** the concept and its embedding, or record the collision
//!
//! A judge that cannot be reached never blocks a proposal.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dedup::{DedupVerdict, DuplicateJudge};
use crate::driver::TaxonomyStore;
use crate::embedder::{validate_embedding, EmbedderClient, Embedding};
use crate::errors::Result;
use crate::nodes::{validate_concept_id, ConceptIdError, ProposedConcept, DEFAULT_CATEGORIES};
use crate::pipeline::{BatchScheduler, MemoryProbe};
use crate::search::{SimilarityCandidate, SimilarityRetriever};

/// Which retrieved candidates are shown to the judge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JudgePolicy {
    /// Only the highest-scoring candidate.
    #[default]
    TopCandidate,
    /// Every retrieved candidate, best first, until one is a duplicate.
    EachCandidate,
}

/// Curation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CuratorConfig {
    /// Minimum similarity for a concept to count as a duplicate candidate.
    pub dedup_threshold: f32,
    /// Minimum similarity for a concept to count as related context.
    pub context_threshold: f32,
    /// Allowed top-level categories of concept identifiers.
    pub categories: Vec<String>,
    pub judge_policy: JudgePolicy,
    /// Upper bound on candidates retrieved per proposal.
    pub candidate_limit: usize,
}

impl Default for CuratorConfig {
    fn default() -> Self {
        Self {
            dedup_threshold: 0.75,
            context_threshold: 0.5,
            categories: DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
            judge_policy: JudgePolicy::default(),
            candidate_limit: 5,
        }
    }
}

/// Why a proposal was turned away.
#[derive(Debug, Clone, PartialEq)]
pub enum RejectionReason {
    /// The identifier failed structural validation.
    InvalidId(ConceptIdError),
    /// The judge confirmed a collision with an existing concept.
    Duplicate { existing_id: String, score: f32 },
}

/// Terminal state of one proposal.
#[derive(Debug, Clone, PartialEq)]
pub enum CurationOutcome {
    /// Persisted. `verdict` is `None` when no candidate cleared the threshold.
    Accepted { id: String, verdict: Option<DedupVerdict> },
    Rejected { id: String, reason: RejectionReason },
}

impl CurationOutcome {
    pub fn id(&self) -> &str {
        match self {
            CurationOutcome::Accepted { id, .. } | CurationOutcome::Rejected { id, .. } => id,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, CurationOutcome::Accepted { .. })
    }

    /// Existing concept the proposal collided with, if rejected as a duplicate.
    pub fn duplicate_of(&self) -> Option<&str> {
        match self {
            CurationOutcome::Rejected {
                reason: RejectionReason::Duplicate { existing_id, .. },
                ..
            } => Some(existing_id),
            _ => None,
        }
    }
}

/// Tally of a bulk curation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurationReport {
    pub accepted: usize,
    pub rejected: usize,
    /// One outcome per proposal, in input order.
    pub outcomes: Vec<CurationOutcome>,
}

impl From<Vec<CurationOutcome>> for CurationReport {
    fn from(outcomes: Vec<CurationOutcome>) -> Self {
        let accepted = outcomes.iter().filter(|o| o.is_accepted()).count();
        Self {
            accepted,
            rejected: outcomes.len() - accepted,
            outcomes,
        }
    }
}

/// Decides whether proposed concepts enter the taxonomy.
pub struct ConceptCurator<E, S, J> {
    embedder: E,
    store: S,
    judge: J,
    config: CuratorConfig,
}

impl<E, S, J> ConceptCurator<E, S, J>
where
    E: EmbedderClient,
    S: TaxonomyStore,
    J: DuplicateJudge,
{
    pub fn new(embedder: E, store: S, judge: J, config: CuratorConfig) -> Self {
        Self {
            embedder,
            store,
            judge,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &CuratorConfig {
        &self.config
    }

    /// Run one proposal through validation, retrieval and judgement.
    ///
    /// Errors from the embedder or the store propagate; an unreachable judge
    /// does not.
    pub async fn curate(&self, proposal: &ProposedConcept) -> Result<CurationOutcome> {
        if let Err(reason) = validate_concept_id(&proposal.id, &self.config.categories) {
            info!(id = %proposal.id, %reason, "concept rejected: invalid identifier");
            return Ok(CurationOutcome::Rejected {
                id: proposal.id.clone(),
                reason: RejectionReason::InvalidId(reason),
            });
        }

        let embedding = self.embedder.embed(&proposal.embedding_text()).await?;
        let candidates = SimilarityRetriever::new(&self.store, self.config.dedup_threshold)
            .with_limit(self.config.candidate_limit.max(1))
            .retrieve(&embedding)
            .await?;

        let verdict = match self.judge_candidates(proposal, &candidates).await {
            Judgement::Duplicate(candidate) => {
                info!(
                    id = %proposal.id,
                    existing = %candidate.concept.id,
                    score = candidate.score,
                    "concept rejected: duplicate"
                );
                return Ok(CurationOutcome::Rejected {
                    id: proposal.id.clone(),
                    reason: RejectionReason::Duplicate {
                        existing_id: candidate.concept.id.clone(),
                        score: candidate.score,
                    },
                });
            }
            Judgement::NoCandidates => None,
            Judgement::Accept(verdict) => Some(verdict),
        };

        self.persist(proposal, &embedding).await?;
        info!(id = %proposal.id, ?verdict, "concept accepted");
        Ok(CurationOutcome::Accepted {
            id: proposal.id.clone(),
            verdict,
        })
    }

    /// Curate `proposals` in batches, checkpointing the store after each one.
    ///
    /// Proposals within a batch are curated concurrently, so two proposals
    /// naming the same new idea in one batch can both be accepted. Run with a
    /// concurrency of 1 when that matters.
    pub async fn curate_all<P: MemoryProbe>(
        &self,
        proposals: Vec<ProposedConcept>,
        scheduler: &BatchScheduler<P>,
    ) -> Result<CurationReport> {
        let store = &self.store;
        let summary = scheduler
            .run(
                proposals,
                move |proposal| async move { self.curate(&proposal).await },
                move || store.checkpoint(),
            )
            .await?;

        let report = CurationReport::from(summary.results);
        info!(
            accepted = report.accepted,
            rejected = report.rejected,
            "curation run finished"
        );
        Ok(report)
    }

    /// Taxonomy concepts related to `text`, for use as prompt context.
    ///
    /// Uses the broader context threshold rather than the dedup threshold.
    pub async fn related_concepts(&self, text: &str, limit: usize) -> Result<Vec<SimilarityCandidate>> {
        let embedding = self.embedder.embed(text).await?;
        SimilarityRetriever::new(&self.store, self.config.context_threshold)
            .with_limit(limit)
            .retrieve(&embedding)
            .await
    }

    async fn judge_candidates<'c>(
        &self,
        proposal: &ProposedConcept,
        candidates: &'c [SimilarityCandidate],
    ) -> Judgement<'c> {
        let shown = match self.config.judge_policy {
            JudgePolicy::TopCandidate => candidates.len().min(1),
            JudgePolicy::EachCandidate => candidates.len(),
        };
        if shown == 0 {
            debug!(id = %proposal.id, "no duplicate candidates");
            return Judgement::NoCandidates;
        }

        // Unknown only stands if no candidate is confirmed either way.
        let mut last = DedupVerdict::Unknown;
        for candidate in &candidates[..shown] {
            match self.judge.judge(proposal, candidate).await {
                DedupVerdict::Duplicate => return Judgement::Duplicate(candidate),
                DedupVerdict::Distinct => last = DedupVerdict::Distinct,
                DedupVerdict::Unknown => {}
            }
        }
        Judgement::Accept(last)
    }

    /// Write the embedding before the record: a concept is only visible once
    /// both exist, so a failed embedding write leaves nothing behind.
    async fn persist(&self, proposal: &ProposedConcept, embedding: &Embedding) -> Result<()> {
        let embedding = validate_embedding(embedding.clone(), self.embedder.dim())?;
        self.store.store_concept_embedding(&proposal.id, &embedding).await?;
        self.store.add_concept(proposal).await
    }
}

enum Judgement<'c> {
    NoCandidates,
    Duplicate(&'c SimilarityCandidate),
    Accept(DedupVerdict),
}
