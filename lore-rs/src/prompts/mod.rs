//! Prompt templates for LLM interactions.
//!
//! Prompts are Rust string literals assembled at call time.

use crate::llm_client::{Message, Role};
use crate::nodes::ProposedConcept;
use crate::search::SimilarityCandidate;
use crate::utils::{normalize_whitespace, truncate_with_ellipsis};

/// Definitions beyond this many characters are cut before prompting.
const MAX_DEFINITION_CHARS: usize = 500;

const DEDUPE_CONCEPT_SYSTEM: &str = "You maintain a controlled vocabulary of concepts used to tag \
documents in a personal knowledge base. Decide whether a newly proposed concept denotes the same \
idea as an existing concept. Synonyms, abbreviations, spelling variants and trivially narrower \
restatements are duplicates. Related but separable ideas are distinct. Answer with exactly one \
word: DUPLICATE or DISTINCT.";

fn describe(label: &str, definition: Option<&str>) -> String {
    let label = normalize_whitespace(label);
    match definition.map(normalize_whitespace).filter(|d| !d.is_empty()) {
        Some(def) => format!(
            "{label}\nDefinition: {}",
            truncate_with_ellipsis(&def, MAX_DEFINITION_CHARS)
        ),
        None => format!("{label}\nDefinition: (none)"),
    }
}

/// Messages asking whether `proposed` duplicates `candidate`.
pub fn dedupe_concept(proposed: &ProposedConcept, candidate: &SimilarityCandidate) -> Vec<Message> {
    let mut proposed_desc = describe(&proposed.label, proposed.definition.as_deref());
    if !proposed.alt_labels.is_empty() {
        proposed_desc.push_str(&format!("\nAlso known as: {}", proposed.alt_labels.join(", ")));
    }
    let existing = &candidate.concept;

    let user = format!(
        "<PROPOSED CONCEPT>\n{proposed_desc}\n</PROPOSED CONCEPT>\n\n\
         <EXISTING CONCEPT>\n{}\n</EXISTING CONCEPT>\n\n\
         Embedding similarity: {:.2}\n\n\
         Is the proposed concept a duplicate of the existing concept? \
         Reply DUPLICATE or DISTINCT.",
        describe(&existing.label, existing.definition.as_deref()),
        candidate.score,
    );

    vec![
        Message {
            role: Role::System,
            content: DEDUPE_CONCEPT_SYSTEM.to_string(),
        },
        Message {
            role: Role::User,
            content: user,
        },
    ]
}
