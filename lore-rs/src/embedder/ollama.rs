//! HTTP embedding client for a local model server.
//!
//! Speaks the Ollama-style API:
//! - `POST {base}/embeddings` `{"model", "prompt"}` → `{"embedding": [...]}`
//! - `GET {base}/tags` → `{"models": [{"name": ...}]}` (model registry)
//! - `POST {base}/pull` `{"name", "stream": false}` (model install)
//!
//! Every vector is validated before it is returned or cached. Transient
//! failures are retried with exponential back-off.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use moka::future::Cache;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::embedder::{embedding_from_wire, Embedding, EmbedderClient};
use crate::errors::{EmbeddingError, Result};
use crate::types::{CacheConfig, EngineConfig};

/// Default API base URL of a local Ollama server.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434/api";

/// Default embedding model name (1024 dimensions).
pub const DEFAULT_MODEL: &str = "mxbai-embed-large";

/// Model downloads are slow; the pull request gets its own generous timeout.
const PULL_TIMEOUT: Duration = Duration::from_secs(600);

/// Retry policy for transient embedding failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each subsequent retry.
    pub initial_interval: Duration,
}

impl RetryPolicy {
    /// Exponential schedule: `initial_interval`, doubling, no jitter.
    ///
    /// The attempt cap is enforced by the caller, not by elapsed time.
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_interval)
            .with_multiplier(2.0)
            .with_randomization_factor(0.0)
            .with_max_interval(Duration::from_secs(60))
            .with_max_elapsed_time(None)
            .build()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_interval: Duration::from_millis(100),
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f64>,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    name: String,
}

#[derive(Serialize)]
struct PullRequest<'a> {
    name: &'a str,
    stream: bool,
}

/// Registry entries carry a tag (`name:latest`); a bare model name matches any tag.
fn model_matches(entry: &str, model: &str) -> bool {
    entry == model || entry.split_once(':').is_some_and(|(name, _)| name == model)
}

/// Embedding client for an Ollama-compatible server.
pub struct OllamaEmbedder {
    http: reqwest::Client,
    base_url: String,
    model: String,
    dim: usize,
    retry: RetryPolicy,
    health_timeout: Duration,
    auto_install: bool,
    /// Keyed by `md5(model + text)`; only validated vectors are inserted.
    cache: Option<Cache<String, Embedding>>,
}

impl OllamaEmbedder {
    /// Create a new embedder.
    ///
    /// # Arguments
    /// * `base_url` – API root, e.g. [`DEFAULT_BASE_URL`].
    /// * `model`    – Embedding model name, e.g. [`DEFAULT_MODEL`].
    /// * `dim`      – Dimension every returned vector must have.
    /// * `request_timeout` – Per-request timeout for embedding calls.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        dim: usize,
        request_timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| EmbeddingError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            dim,
            retry: RetryPolicy::default(),
            health_timeout: Duration::from_secs(3),
            auto_install: false,
            cache: None,
        })
    }

    /// Build an embedder from the engine configuration.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Ok(Self::new(
            config.embedding_url.clone(),
            config.embedding_model.clone(),
            config.embedding_dim,
            Duration::from_secs(config.request_timeout_secs),
        )?
        .with_health_timeout(Duration::from_secs(config.health_timeout_secs))
        .with_auto_install(config.embedding_auto_install))
    }

    /// Override the retry policy (default: 3 retries from 100 ms).
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Override the registry query timeout (default 3 s).
    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    /// Pull the model during [`health_check`](Self::health_check) when it is missing.
    pub fn with_auto_install(mut self, auto_install: bool) -> Self {
        self.auto_install = auto_install;
        self
    }

    /// Cache embeddings in memory so repeated texts cost no remote call.
    pub fn with_cache(mut self, config: CacheConfig) -> Self {
        self.cache = Some(
            Cache::builder()
                .max_capacity(config.max_capacity)
                .time_to_live(config.ttl)
                .build(),
        );
        self
    }

    /// The configured model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn cache_key(&self, text: &str) -> String {
        use md5::{Digest, Md5};
        let mut h = Md5::new();
        h.update(self.model.as_bytes());
        h.update([0u8]);
        h.update(text.as_bytes());
        format!("{:x}", h.finalize())
    }

    /// Verify the configured model is installed, pulling it if auto-install is on.
    pub async fn health_check(&self) -> Result<()> {
        let response = self
            .http
            .get(self.endpoint("tags"))
            .timeout(self.health_timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(EmbeddingError::from)?;
        let tags: TagsResponse = response.json().await.map_err(EmbeddingError::from)?;

        if tags.models.iter().any(|m| model_matches(&m.name, &self.model)) {
            debug!(model = %self.model, "embedding model available");
            return Ok(());
        }

        if !self.auto_install {
            return Err(EmbeddingError::ModelNotInstalled(self.model.clone()).into());
        }

        info!(model = %self.model, "embedding model missing, pulling");
        self.http
            .post(self.endpoint("pull"))
            .timeout(PULL_TIMEOUT)
            .json(&PullRequest {
                name: &self.model,
                stream: false,
            })
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(EmbeddingError::from)?;
        info!(model = %self.model, "embedding model installed");
        Ok(())
    }

    /// One embeddings API call, validated.
    async fn request_once(&self, text: &str) -> std::result::Result<Embedding, EmbeddingError> {
        let response = self
            .http
            .post(self.endpoint("embeddings"))
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            if status == StatusCode::NOT_FOUND && message.contains(&self.model) {
                return Err(EmbeddingError::ModelNotInstalled(self.model.clone()));
            }
            return Err(EmbeddingError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: EmbeddingResponse = response.json().await?;
        embedding_from_wire(body.embedding, self.dim)
    }

    /// [`request_once`](Self::request_once) under the retry policy.
    ///
    /// Only transient errors are retried, and at most `max_retries` times.
    async fn request_with_retry(&self, text: &str) -> std::result::Result<Embedding, EmbeddingError> {
        let policy = self.retry.backoff();

        let attempts = AtomicU32::new(0);
        let attempts = &attempts;
        let max_retries = self.retry.max_retries;

        backoff::future::retry_notify(
            policy,
            move || async move {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                self.request_once(text).await.map_err(|err| {
                    if err.is_transient() && attempt < max_retries {
                        backoff::Error::transient(err)
                    } else {
                        backoff::Error::permanent(err)
                    }
                })
            },
            |err: EmbeddingError, wait: Duration| {
                warn!(
                    model = %self.model,
                    attempt = attempts.load(Ordering::SeqCst),
                    delay_ms = wait.as_millis() as u64,
                    error = %err,
                    "embedding request failed, retrying"
                );
            },
        )
        .await
    }
}

impl EmbedderClient for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        let Some(cache) = &self.cache else {
            return Ok(self.request_with_retry(text).await?);
        };

        let key = self.cache_key(text);
        if let Some(hit) = cache.get(&key).await {
            debug!("embedding cache hit");
            return Ok(hit);
        }

        let embedding = self.request_with_retry(text).await?;
        cache.insert(key, embedding.clone()).await;
        Ok(embedding)
    }

    fn dim(&self) -> usize {
        self.dim
    }
}
