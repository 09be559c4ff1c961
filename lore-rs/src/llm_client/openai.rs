//! OpenAI-compatible LLM client implementation.
//!
//! Uses `async-openai` for API calls, `moka` for response caching, and
//! `backoff` for bounded exponential-backoff retry on rate limits. Transport
//! failures are not retried: the judge degrades to "unavailable" instead.
//! Works against api.openai.com or any compatible server (Ollama's `/v1`,
//! vLLM, LM Studio) through a custom base URL.

use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use moka::future::Cache;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use crate::errors::{LlmError, LoreError, Result};
use crate::types::{CacheConfig, EngineConfig};

use super::{LlmClient, Message, Role};

/// OpenAI-compatible LLM client implementing [`LlmClient`].
pub struct OpenAiClient {
    client: async_openai::Client<OpenAIConfig>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    /// Keyed by `md5(prefix + model + messages)` → response text.
    cache: Cache<String, String>,
}

impl OpenAiClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `api_key`  – Secret key; local servers usually accept any value.
    /// * `base_url` – API root (e.g. `http://localhost:11434/v1`); `None` for api.openai.com.
    /// * `model`    – Model name (e.g. `"gpt-4o-mini"`).
    /// * `request_timeout` – Per-request HTTP timeout.
    /// * `cache_config` – Cache capacity and TTL.
    pub fn new(
        api_key: Option<String>,
        base_url: Option<String>,
        model: impl Into<String>,
        request_timeout: Duration,
        cache_config: CacheConfig,
    ) -> Result<Self> {
        let mut config = OpenAIConfig::new().with_api_key(api_key.unwrap_or_default());
        if let Some(base) = base_url {
            config = config.with_api_base(base);
        }

        let http = reqwest::Client::builder()
            .connect_timeout(request_timeout.min(CONNECT_TIMEOUT))
            .timeout(request_timeout)
            .build()
            .map_err(|e| LlmError::Api {
                status: 0,
                message: e.to_string(),
            })?;

        let client = async_openai::Client::with_config(config)
            .with_http_client(http)
            .with_backoff(backoff_policy(DEFAULT_RETRY_BUDGET));

        let cache = Cache::builder()
            .max_capacity(cache_config.max_capacity)
            .time_to_live(cache_config.ttl)
            .build();

        Ok(Self {
            client,
            model: model.into(),
            temperature: 0.0,
            max_tokens: 16,
            cache,
        })
    }

    /// Build the judge client from the engine configuration.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Self::new(
            config.openai_api_key.clone(),
            config.llm_base_url.clone(),
            config.judge_model.clone(),
            Duration::from_secs(config.request_timeout_secs),
            CacheConfig::default(),
        )
    }

    /// Override the sampling temperature (default `0.0`).
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Override the max output token limit (default `16`, enough for a one-word verdict).
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Override the rate-limit retry budget per request (default 10 s).
    pub fn with_retry_budget(mut self, budget: Duration) -> Self {
        self.client = self.client.with_backoff(backoff_policy(budget));
        self
    }

    // ── Helpers ───────────────────────────────────────────────────────────────

    /// Compute an MD5 cache key from prefix + model + message sequence.
    fn cache_key(&self, prefix: &str, messages: &[Message]) -> String {
        use md5::{Digest, Md5};
        let mut h = Md5::new();
        h.update(prefix.as_bytes());
        h.update(self.model.as_bytes());
        for m in messages {
            h.update(role_str(&m.role).as_bytes());
            h.update(m.content.as_bytes());
        }
        format!("{:x}", h.finalize())
    }

    /// Serialise our [`Message`] slice into the JSON array expected by the API.
    fn messages_to_json(messages: &[Message]) -> Vec<serde_json::Value> {
        messages
            .iter()
            .map(|m| json!({ "role": role_str(&m.role), "content": m.content }))
            .collect()
    }

    /// Call the chat completions endpoint once.
    ///
    /// Only HTTP 429 is retried, by the client's own backoff within the retry
    /// budget. Connect failures and timeouts surface immediately.
    async fn call(&self, request: serde_json::Value) -> Result<serde_json::Value> {
        let outcome: std::result::Result<serde_json::Value, OpenAIError> =
            self.client.chat().create_byot(request).await;
        outcome.map_err(|e| LoreError::Llm(map_openai_error(e)))
    }

    /// Extract the assistant message text from a chat-completions response.
    fn extract_content(response: &serde_json::Value) -> Result<String> {
        let choice = &response["choices"][0];
        if choice["message"]["refusal"].as_str().is_some_and(|r| !r.is_empty()) {
            return Err(LlmError::Refusal.into());
        }
        choice["message"]["content"]
            .as_str()
            .map(ToOwned::to_owned)
            .ok_or(LoreError::Llm(LlmError::EmptyResponse))
    }

    fn base_request(&self, messages: &[Message]) -> serde_json::Value {
        json!({
            "model": self.model,
            "messages": Self::messages_to_json(messages),
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        })
    }
}

// ── LlmClient implementation ──────────────────────────────────────────────────

impl LlmClient for OpenAiClient {
    async fn generate(&self, messages: &[Message]) -> Result<String> {
        let key = self.cache_key("text", messages);

        if let Some(cached) = self.cache.get(&key).await {
            debug!("LLM cache hit (text)");
            return Ok(cached);
        }

        let response = self.call(self.base_request(messages)).await?;
        let content = Self::extract_content(&response)?;

        self.cache.insert(key, content.clone()).await;
        Ok(content)
    }

    async fn generate_structured<T>(&self, messages: &[Message]) -> Result<T>
    where
        T: DeserializeOwned + schemars::JsonSchema,
    {
        // Different `T` for the same messages must not share a cache entry.
        let prefix = std::any::type_name::<T>();
        let key = self.cache_key(prefix, messages);

        if let Some(cached) = self.cache.get(&key).await {
            debug!("LLM cache hit (structured/{})", prefix);
            return serde_json::from_str(&cached).map_err(LoreError::Serialization);
        }

        let schema = serde_json::to_value(schemars::schema_for!(T))?;
        let mut request = self.base_request(messages);
        request["max_tokens"] = json!(self.max_tokens.max(64));
        request["response_format"] = json!({
            "type": "json_schema",
            "json_schema": {
                "name": "response",
                "schema": schema,
                "strict": true,
            }
        });

        let response = self.call(request).await?;
        let content = Self::extract_content(&response)?;
        let parsed = serde_json::from_str(&content).map_err(LoreError::Serialization)?;

        self.cache.insert(key, content).await;
        Ok(parsed)
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Time allowed to establish a connection to the judge endpoint.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Total time spent retrying rate-limited requests.
const DEFAULT_RETRY_BUDGET: Duration = Duration::from_secs(10);

fn backoff_policy(budget: Duration) -> ExponentialBackoff {
    ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(100))
        .with_max_interval(Duration::from_secs(5))
        .with_max_elapsed_time(Some(budget))
        .build()
}

fn role_str(role: &Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

/// Map an [`OpenAIError`] to our [`LlmError`] domain type.
fn map_openai_error(err: OpenAIError) -> LlmError {
    match err {
        OpenAIError::ApiError(api_err) => {
            match (api_err.code.as_deref(), api_err.r#type.as_deref()) {
                (Some("invalid_api_key"), _) | (_, Some("authentication_error")) => {
                    LlmError::Authentication
                }
                (Some("rate_limit_exceeded"), _) => LlmError::RateLimit,
                _ => LlmError::Api {
                    status: 0,
                    message: api_err.message,
                },
            }
        }
        OpenAIError::Reqwest(e) => LlmError::Api {
            status: e.status().map(|s| s.as_u16()).unwrap_or(0),
            message: e.to_string(),
        },
        other => LlmError::Api {
            status: 0,
            message: other.to_string(),
        },
    }
}
