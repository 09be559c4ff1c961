//! Shared configuration types.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::curator::CuratorConfig;
use crate::errors::{LoreError, Result};
use crate::pipeline::BatchRunConfig;

/// Configuration for the in-process response caches (embeddings, LLM answers).
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries held in memory.
    pub max_capacity: u64,
    /// How long each entry lives before eviction.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 1_000,
            ttl: Duration::from_secs(3_600), // 1 hour
        }
    }
}

/// Central configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EngineConfig {
    /// Embedding service API root (e.g. `http://localhost:11434/api`).
    #[validate(length(min = 1))]
    pub embedding_url: String,

    /// Embedding model name.
    #[validate(length(min = 1))]
    pub embedding_model: String,

    /// Embedding vector dimension.
    #[validate(range(min = 1))]
    pub embedding_dim: usize,

    /// Pull the embedding model when the health check finds it missing.
    pub embedding_auto_install: bool,

    /// Timeout for each embedding / judge request.
    #[validate(range(min = 1))]
    pub request_timeout_secs: u64,

    /// Timeout for the model registry query.
    #[validate(range(min = 1))]
    pub health_timeout_secs: u64,

    /// API key for the judge LLM. Local OpenAI-compatible servers may not need one.
    pub openai_api_key: Option<String>,

    /// OpenAI-compatible base URL for the judge LLM. `None` means api.openai.com.
    pub llm_base_url: Option<String>,

    /// Judge model name.
    #[validate(length(min = 1))]
    pub judge_model: String,

    /// Similarity floor for duplicate candidates.
    #[validate(range(min = 0.0, max = 1.0))]
    pub dedup_threshold: f32,

    /// Similarity floor for related-context retrieval.
    #[validate(range(min = 0.0, max = 1.0))]
    pub context_threshold: f32,

    #[validate(range(min = 1))]
    pub batch_size: usize,

    #[validate(range(min = 1))]
    pub batch_concurrency: usize,

    pub batch_delay_ms: u64,

    pub batch_checkpoint: bool,

    pub batch_adaptive: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let batch = BatchRunConfig::default();
        let curator = CuratorConfig::default();
        Self {
            embedding_url: crate::embedder::ollama::DEFAULT_BASE_URL.to_string(),
            embedding_model: crate::embedder::ollama::DEFAULT_MODEL.to_string(),
            embedding_dim: crate::embedder::DEFAULT_EMBEDDING_DIM,
            embedding_auto_install: false,
            request_timeout_secs: 30,
            health_timeout_secs: 3,
            openai_api_key: None,
            llm_base_url: None,
            judge_model: "gpt-4o-mini".to_string(),
            dedup_threshold: curator.dedup_threshold,
            context_threshold: curator.context_threshold,
            batch_size: batch.batch_size,
            batch_concurrency: batch.concurrency,
            batch_delay_ms: batch.batch_delay.as_millis() as u64,
            batch_checkpoint: batch.checkpoint_enabled,
            batch_adaptive: batch.adaptive_sizing,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` first (non-fatal if `.env` is absent).
    /// Unset variables keep their defaults; malformed or out-of-range values
    /// return [`LoreError::Validation`].
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        let config = Self {
            embedding_url: lookup("EMBEDDING_URL").unwrap_or(d.embedding_url),
            embedding_model: lookup("EMBEDDING_MODEL").unwrap_or(d.embedding_model),
            embedding_dim: parse_var(&lookup, "EMBEDDING_DIM", d.embedding_dim)?,
            embedding_auto_install: parse_bool(&lookup, "EMBEDDING_AUTO_INSTALL", d.embedding_auto_install)?,
            request_timeout_secs: parse_var(&lookup, "REQUEST_TIMEOUT_SECS", d.request_timeout_secs)?,
            health_timeout_secs: parse_var(&lookup, "HEALTH_TIMEOUT_SECS", d.health_timeout_secs)?,
            openai_api_key: lookup("OPENAI_API_KEY").filter(|k| !k.is_empty()),
            llm_base_url: lookup("LLM_BASE_URL").filter(|u| !u.is_empty()),
            judge_model: lookup("JUDGE_MODEL").unwrap_or(d.judge_model),
            dedup_threshold: parse_var(&lookup, "DEDUP_THRESHOLD", d.dedup_threshold)?,
            context_threshold: parse_var(&lookup, "CONTEXT_THRESHOLD", d.context_threshold)?,
            batch_size: parse_var(&lookup, "BATCH_SIZE", d.batch_size)?,
            batch_concurrency: parse_var(&lookup, "BATCH_CONCURRENCY", d.batch_concurrency)?,
            batch_delay_ms: parse_var(&lookup, "BATCH_DELAY_MS", d.batch_delay_ms)?,
            batch_checkpoint: parse_bool(&lookup, "BATCH_CHECKPOINT", d.batch_checkpoint)?,
            batch_adaptive: parse_bool(&lookup, "BATCH_ADAPTIVE", d.batch_adaptive)?,
        };

        config
            .validate()
            .map_err(|e| LoreError::Validation(e.to_string()))?;

        Ok(config)
    }

    /// Scheduler settings for a batch run.
    pub fn batch_run_config(&self) -> BatchRunConfig {
        BatchRunConfig {
            batch_size: self.batch_size,
            concurrency: self.batch_concurrency,
            batch_delay: Duration::from_millis(self.batch_delay_ms),
            checkpoint_enabled: self.batch_checkpoint,
            adaptive_sizing: self.batch_adaptive,
        }
    }

    /// Deduplication settings.
    pub fn curator_config(&self) -> CuratorConfig {
        CuratorConfig {
            dedup_threshold: self.dedup_threshold,
            context_threshold: self.context_threshold,
            ..CuratorConfig::default()
        }
    }
}

fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| LoreError::Validation(format!("{name} has an invalid value '{raw}'"))),
        None => Ok(default),
    }
}

fn parse_bool<F>(lookup: &F, name: &str, default: bool) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name).as_deref().map(str::trim) {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(LoreError::Validation(format!(
            "{name} must be a boolean, got '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<EngineConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EngineConfig::from_lookup(|k| map.get(k).cloned())
    }

    fn validation_message(result: Result<EngineConfig>) -> String {
        match result {
            Err(LoreError::Validation(msg)) => msg,
            other => panic!("expected Validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = load(&[]).expect("config should load");
        assert_eq!(config.embedding_url, "http://localhost:11434/api");
        assert_eq!(config.embedding_model, "mxbai-embed-large");
        assert_eq!(config.embedding_dim, 1024);
        assert_eq!(config.dedup_threshold, 0.75);
        assert_eq!(config.context_threshold, 0.5);
        assert_eq!(config.health_timeout_secs, 3);
        assert!(config.openai_api_key.is_none());
        assert!(config.batch_checkpoint);
    }

    #[test]
    fn test_config_defaults_agree_with_component_defaults() {
        let config = load(&[]).expect("config should load");
        assert_eq!(config.batch_run_config(), BatchRunConfig::default());
        assert_eq!(config.curator_config(), CuratorConfig::default());
        assert!(config.batch_run_config().adaptive_sizing);
    }

    #[test]
    fn test_config_custom_values() {
        let config = load(&[
            ("EMBEDDING_URL", "http://gpu-box:11434/api"),
            ("EMBEDDING_MODEL", "nomic-embed-text"),
            ("EMBEDDING_DIM", "768"),
            ("EMBEDDING_AUTO_INSTALL", "true"),
            ("OPENAI_API_KEY", "sk-test"),
            ("JUDGE_MODEL", "llama3"),
            ("DEDUP_THRESHOLD", "0.8"),
            ("BATCH_SIZE", "20"),
            ("BATCH_CONCURRENCY", "2"),
            ("BATCH_DELAY_MS", "0"),
            ("BATCH_ADAPTIVE", "off"),
        ])
        .expect("config should load");

        assert_eq!(config.embedding_model, "nomic-embed-text");
        assert_eq!(config.embedding_dim, 768);
        assert!(config.embedding_auto_install);
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.judge_model, "llama3");

        let run = config.batch_run_config();
        assert_eq!(run.batch_size, 20);
        assert_eq!(run.concurrency, 2);
        assert_eq!(run.batch_delay, Duration::ZERO);
        assert!(!run.adaptive_sizing);

        assert_eq!(config.curator_config().dedup_threshold, 0.8);
    }

    #[test]
    fn test_config_invalid_number() {
        let msg = validation_message(load(&[("EMBEDDING_DIM", "not-a-number")]));
        assert!(msg.contains("EMBEDDING_DIM"));
    }

    #[test]
    fn test_config_zero_dimension() {
        assert!(load(&[("EMBEDDING_DIM", "0")]).is_err());
    }

    #[test]
    fn test_config_threshold_out_of_range() {
        assert!(load(&[("DEDUP_THRESHOLD", "1.5")]).is_err());
    }

    #[test]
    fn test_config_invalid_bool() {
        let msg = validation_message(load(&[("BATCH_CHECKPOINT", "maybe")]));
        assert!(msg.contains("BATCH_CHECKPOINT"));
    }

    #[test]
    fn test_config_zero_batch_size() {
        assert!(load(&[("BATCH_SIZE", "0")]).is_err());
    }
}
