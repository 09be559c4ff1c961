//! LLM-backed duplicate judge.

use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::dedup::{DedupVerdict, DuplicateJudge};
use crate::llm_client::LlmClient;
use crate::nodes::ProposedConcept;
use crate::prompts;
use crate::search::SimilarityCandidate;

/// How the judge talks to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JudgeMode {
    /// Free-text completion.
    #[default]
    Plain,
    /// Schema-constrained output `{ "verdict": "..." }`.
    Structured,
}

/// Structured judge output.
#[derive(Debug, Deserialize, JsonSchema)]
struct JudgeAnswer {
    /// Either `DUPLICATE` or `DISTINCT`.
    verdict: String,
}

/// Classify a judge answer. The literal token `DUPLICATE` is the only way to
/// obtain [`DedupVerdict::Duplicate`]; any other text counts as distinct.
pub fn classify_verdict(answer: &str) -> DedupVerdict {
    if answer.contains("DUPLICATE") {
        DedupVerdict::Duplicate
    } else {
        DedupVerdict::Distinct
    }
}

/// [`DuplicateJudge`] that asks an LLM.
pub struct LlmJudge<C> {
    client: C,
    mode: JudgeMode,
}

impl<C: LlmClient> LlmJudge<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            mode: JudgeMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: JudgeMode) -> Self {
        self.mode = mode;
        self
    }

    async fn ask(&self, proposed: &ProposedConcept, candidate: &SimilarityCandidate) -> crate::Result<String> {
        let messages = prompts::dedupe_concept(proposed, candidate);
        match self.mode {
            JudgeMode::Plain => self.client.generate(&messages).await,
            JudgeMode::Structured => Ok(self
                .client
                .generate_structured::<JudgeAnswer>(&messages)
                .await?
                .verdict),
        }
    }
}

impl<C: LlmClient> DuplicateJudge for LlmJudge<C> {
    async fn judge(&self, proposed: &ProposedConcept, candidate: &SimilarityCandidate) -> DedupVerdict {
        match self.ask(proposed, candidate).await {
            Ok(answer) => {
                let verdict = classify_verdict(&answer);
                debug!(
                    proposed = %proposed.id,
                    existing = %candidate.concept.id,
                    answer = %answer.trim(),
                    ?verdict,
                    "duplicate judge answered"
                );
                verdict
            }
            Err(e) => {
                warn!(
                    proposed = %proposed.id,
                    existing = %candidate.concept.id,
                    error = %e,
                    "duplicate judge unavailable"
                );
                DedupVerdict::Unknown
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{LlmError, LoreError};
    use crate::llm_client::Message;
    use crate::nodes::ExistingConcept;
    use chrono::Utc;
    use serde::de::DeserializeOwned;
    use std::sync::Mutex;

    /// Returns a canned answer (or error) and records the prompts it saw.
    struct ScriptedLlm {
        answer: Option<&'static str>,
        seen: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedLlm {
        fn answering(answer: &'static str) -> Self {
            Self { answer: Some(answer), seen: Mutex::new(Vec::new()) }
        }

        fn down() -> Self {
            Self { answer: None, seen: Mutex::new(Vec::new()) }
        }

        fn reply(&self, messages: &[Message]) -> crate::Result<&'static str> {
            self.seen.lock().unwrap().push(messages.to_vec());
            self.answer.ok_or(LoreError::Llm(LlmError::Api {
                status: 0,
                message: "connection refused".into(),
            }))
        }
    }

    impl LlmClient for ScriptedLlm {
        async fn generate(&self, messages: &[Message]) -> crate::Result<String> {
            self.reply(messages).map(str::to_string)
        }

        async fn generate_structured<T>(&self, messages: &[Message]) -> crate::Result<T>
        where
            T: DeserializeOwned + schemars::JsonSchema,
        {
            let text = self.reply(messages)?;
            Ok(serde_json::from_str(text)?)
        }
    }

    fn proposal() -> ProposedConcept {
        ProposedConcept::new("technology/machine-learning", "Machine Learning")
    }

    fn candidate() -> SimilarityCandidate {
        SimilarityCandidate {
            concept: ExistingConcept {
                id: "technology/ml".into(),
                label: "ML".into(),
                alt_labels: Vec::new(),
                definition: None,
                created_at: Utc::now(),
            },
            score: 0.82,
        }
    }

    #[test]
    fn classify_is_token_based() {
        assert_eq!(classify_verdict("DUPLICATE"), DedupVerdict::Duplicate);
        assert_eq!(classify_verdict("Answer: DUPLICATE."), DedupVerdict::Duplicate);
        assert_eq!(classify_verdict("DISTINCT"), DedupVerdict::Distinct);
        assert_eq!(classify_verdict("duplicate"), DedupVerdict::Distinct);
        assert_eq!(classify_verdict("I am not sure"), DedupVerdict::Distinct);
        assert_eq!(classify_verdict(""), DedupVerdict::Distinct);
    }

    #[tokio::test]
    async fn plain_mode_duplicate() {
        let judge = LlmJudge::new(ScriptedLlm::answering("DUPLICATE"));
        assert_eq!(judge.judge(&proposal(), &candidate()).await, DedupVerdict::Duplicate);

        let seen = judge.client.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0][1].content.contains("Machine Learning"));
        assert!(seen[0][1].content.contains("ML"));
    }

    #[tokio::test]
    async fn plain_mode_distinct_and_noise() {
        let judge = LlmJudge::new(ScriptedLlm::answering("DISTINCT"));
        assert_eq!(judge.judge(&proposal(), &candidate()).await, DedupVerdict::Distinct);

        let judge = LlmJudge::new(ScriptedLlm::answering("maybe?"));
        assert_eq!(judge.judge(&proposal(), &candidate()).await, DedupVerdict::Distinct);
    }

    #[tokio::test]
    async fn structured_mode_reads_verdict_field() {
        let judge = LlmJudge::new(ScriptedLlm::answering(r#"{"verdict":"DUPLICATE"}"#))
            .with_mode(JudgeMode::Structured);
        assert_eq!(judge.judge(&proposal(), &candidate()).await, DedupVerdict::Duplicate);
    }

    #[tokio::test]
    async fn structured_mode_bad_payload_is_unknown() {
        let judge = LlmJudge::new(ScriptedLlm::answering("DUPLICATE")).with_mode(JudgeMode::Structured);
        assert_eq!(judge.judge(&proposal(), &candidate()).await, DedupVerdict::Unknown);
    }

    #[tokio::test]
    async fn unreachable_judge_is_unknown() {
        let judge = LlmJudge::new(ScriptedLlm::down());
        let verdict = judge.judge(&proposal(), &candidate()).await;
        assert_eq!(verdict, DedupVerdict::Unknown);
        assert!(!verdict.decision().available);
    }
}
