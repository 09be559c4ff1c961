//! Taxonomy concepts: proposals from the LLM and persisted entries.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::utils::concept_embedding_text;

/// Top-level categories a concept identifier may live under.
pub const DEFAULT_CATEGORIES: &[&str] = &[
    "technology",
    "science",
    "mathematics",
    "business",
    "health",
    "arts",
    "humanities",
    "society",
    "philosophy",
    "history",
    "education",
    "personal",
];

/// Names an LLM emits when it has nothing specific to say.
const PLACEHOLDER_NAMES: &[&str] = &["concept", "new"];

const MAX_NAME_WORDS: usize = 4;
const MAX_NAME_CHARS: usize = 30;

static NAME_RE: OnceLock<Regex> = OnceLock::new();

fn name_re() -> &'static Regex {
    NAME_RE.get_or_init(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").expect("static regex is valid"))
}

/// Why a concept identifier was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConceptIdError {
    #[error("identifier '{0}' is not of the form <category>/<name>")]
    Malformed(String),

    #[error("unknown category '{0}'")]
    UnknownCategory(String),

    #[error("name '{0}' must be lowercase words joined by hyphens")]
    BadName(String),

    #[error("name '{0}' has more than 4 words")]
    TooManyWords(String),

    #[error("name '{0}' is longer than 30 characters")]
    TooLong(String),

    #[error("name '{0}' is a placeholder")]
    Placeholder(String),
}

/// Check that `id` is `<category>/<name>` with `category` in `categories` and
/// `name` a short, specific, hyphenated lowercase slug.
pub fn validate_concept_id<S: AsRef<str>>(id: &str, categories: &[S]) -> Result<(), ConceptIdError> {
    let (category, name) = id
        .split_once('/')
        .filter(|(c, n)| !c.is_empty() && !n.is_empty() && !n.contains('/'))
        .ok_or_else(|| ConceptIdError::Malformed(id.to_string()))?;

    if !categories.iter().any(|c| c.as_ref() == category) {
        return Err(ConceptIdError::UnknownCategory(category.to_string()));
    }
    if PLACEHOLDER_NAMES.contains(&name) {
        return Err(ConceptIdError::Placeholder(name.to_string()));
    }
    if !name_re().is_match(name) {
        return Err(ConceptIdError::BadName(name.to_string()));
    }
    if name.split('-').count() > MAX_NAME_WORDS {
        return Err(ConceptIdError::TooManyWords(name.to_string()));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(ConceptIdError::TooLong(name.to_string()));
    }
    Ok(())
}

/// A concept suggested for the taxonomy, not yet accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedConcept {
    /// `<category>/<name>`, e.g. `technology/machine-learning`.
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alt_labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
}

impl ProposedConcept {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            alt_labels: Vec::new(),
            definition: None,
        }
    }

    pub fn with_definition(mut self, definition: impl Into<String>) -> Self {
        self.definition = Some(definition.into());
        self
    }

    pub fn with_alt_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.alt_labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Text whose embedding represents this concept.
    pub fn embedding_text(&self) -> String {
        concept_embedding_text(&self.label, self.definition.as_deref())
    }
}

/// A concept persisted in the taxonomy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistingConcept {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub alt_labels: Vec<String>,
    pub definition: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&ProposedConcept> for ExistingConcept {
    fn from(p: &ProposedConcept) -> Self {
        Self {
            id: p.id.clone(),
            label: p.label.clone(),
            alt_labels: p.alt_labels.clone(),
            definition: p.definition.clone(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(id: &str) -> Result<(), ConceptIdError> {
        validate_concept_id(id, DEFAULT_CATEGORIES)
    }

    #[test]
    fn accepts_well_formed_ids() {
        assert_eq!(check("technology/machine-learning"), Ok(()));
        assert_eq!(check("science/quantum-field-theory-basics"), Ok(()));
        assert_eq!(check("technology/web3"), Ok(()));
    }

    #[test]
    fn rejects_placeholder_scenario() {
        // Unknown category is reported before the placeholder name.
        assert_eq!(
            check("new/concept"),
            Err(ConceptIdError::UnknownCategory("new".into()))
        );
        assert_eq!(
            check("technology/concept"),
            Err(ConceptIdError::Placeholder("concept".into()))
        );
        assert_eq!(check("science/new"), Err(ConceptIdError::Placeholder("new".into())));
    }

    #[test]
    fn rejects_malformed_shapes() {
        for id in ["machine-learning", "/ml", "technology/", "technology/ml/extra", ""] {
            assert!(matches!(check(id), Err(ConceptIdError::Malformed(_))), "{id}");
        }
    }

    #[test]
    fn rejects_bad_names() {
        for id in ["technology/Machine-Learning", "technology/machine_learning", "technology/-ml", "technology/ml--ops", "technology/ml ops"] {
            assert!(matches!(check(id), Err(ConceptIdError::BadName(_))), "{id}");
        }
    }

    #[test]
    fn enforces_word_and_length_limits() {
        assert!(matches!(
            check("science/one-two-three-four-five"),
            Err(ConceptIdError::TooManyWords(_))
        ));
        assert!(matches!(
            check("science/abcdefghijklmnopqrstuvwxyzabcdef"),
            Err(ConceptIdError::TooLong(_))
        ));
        // Exactly 30 characters is fine.
        assert_eq!(check("science/abcdefghijklmnopqrstuvwxyzabcd"), Ok(()));
    }

    #[test]
    fn custom_category_list() {
        assert_eq!(validate_concept_id("cooking/sourdough", &["cooking".to_string()]), Ok(()));
        assert!(validate_concept_id("technology/sourdough", &["cooking"]).is_err());
    }

    #[test]
    fn embedding_text_uses_definition() {
        let p = ProposedConcept::new("technology/machine-learning", "Machine Learning")
            .with_definition("Algorithms that improve with data");
        assert_eq!(p.embedding_text(), "Machine Learning: Algorithms that improve with data");
    }

    #[test]
    fn proposal_deserializes_without_optional_fields() {
        let p: ProposedConcept = serde_json::from_value(serde_json::json!({
            "id": "science/entropy",
            "label": "Entropy",
        }))
        .unwrap();
        assert!(p.alt_labels.is_empty());
        assert!(p.definition.is_none());
    }

    #[test]
    fn existing_concept_copies_proposal() {
        let p = ProposedConcept::new("science/entropy", "Entropy").with_alt_labels(["disorder"]);
        let e = ExistingConcept::from(&p);
        assert_eq!(e.id, p.id);
        assert_eq!(e.alt_labels, vec!["disorder".to_string()]);
    }
}
