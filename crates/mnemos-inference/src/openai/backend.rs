//! OpenAI-compatible embedding and generation backend.

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use mnemos_core::{defaults, EmbeddingBackend, Error, GenerationBackend, Result, Vector};

use super::error::{to_mnemos_error, OpenAIErrorCode, ProviderOp};
use super::types::*;

/// Default OpenAI API endpoint.
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Default generation model.
pub const DEFAULT_GEN_MODEL: &str = "gpt-4o-mini";

/// Default timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Base delay of the exponential retry backoff.
pub const DEFAULT_RETRY_BASE_MS: u64 = 500;

/// Configuration for OpenAI-compatible backend.
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// Base URL for the API endpoint.
    pub base_url: String,
    /// API key for authentication (optional for local endpoints).
    pub api_key: Option<String>,
    /// Model to use for embeddings.
    pub embed_model: String,
    /// Model to use for generation.
    pub gen_model: String,
    /// Expected embedding dimension.
    pub embed_dimension: usize,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
    /// Extra attempts on rate limits and server errors (0 disables retries).
    pub max_retries: u32,
    /// First backoff delay; doubled on every further attempt.
    pub retry_base_delay_ms: u64,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OPENAI_URL.to_string(),
            api_key: None,
            embed_model: defaults::EMBED_MODEL.to_string(),
            gen_model: DEFAULT_GEN_MODEL.to_string(),
            embed_dimension: defaults::EMBED_DIMENSION,
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            max_retries: 0,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_MS,
        }
    }
}

impl OpenAIConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let fallback = Self::default();
        Self {
            base_url: std::env::var("OPENAI_BASE_URL").unwrap_or(fallback.base_url),
            api_key: std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            embed_model: std::env::var("OPENAI_EMBED_MODEL").unwrap_or(fallback.embed_model),
            gen_model: std::env::var("OPENAI_GEN_MODEL").unwrap_or(fallback.gen_model),
            embed_dimension: std::env::var("OPENAI_EMBED_DIM")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(fallback.embed_dimension),
            timeout_seconds: std::env::var("OPENAI_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(fallback.timeout_seconds),
            max_retries: std::env::var("OPENAI_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(fallback.max_retries),
            retry_base_delay_ms: fallback.retry_base_delay_ms,
        }
    }

    /// Point at another OpenAI-compatible server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the bearer token.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the embedding dimension expected from the server.
    pub fn with_embed_dimension(mut self, dimension: usize) -> Self {
        self.embed_dimension = dimension;
        self
    }

    /// Set the retry count and the base of the exponential backoff.
    pub fn with_retries(mut self, max_retries: u32, base_delay_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.retry_base_delay_ms = base_delay_ms;
        self
    }

    /// The hosted OpenAI API refuses anonymous requests; local servers do not.
    pub fn requires_api_key(&self) -> bool {
        self.base_url.contains("api.openai.com")
    }

    /// Backoff before retry number `attempt` (1-based).
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(10);
        Duration::from_millis(self.retry_base_delay_ms.saturating_mul(factor))
    }
}

/// OpenAI-compatible inference backend.
pub struct OpenAIBackend {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIBackend {
    /// Create a new OpenAI backend with the given configuration.
    ///
    /// A missing API key for the hosted endpoint is not an error here; it
    /// surfaces as [`Error::Config`] on the first request.
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "inference",
            component = "openai",
            url = %config.base_url,
            embed_model = %config.embed_model,
            gen_model = %config.gen_model,
            max_retries = config.max_retries,
            "Initializing OpenAI backend"
        );

        Ok(Self { client, config })
    }

    /// Create with default configuration.
    pub fn with_defaults() -> Result<Self> {
        Self::new(OpenAIConfig::default())
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(OpenAIConfig::from_env())
    }

    /// Get the current configuration.
    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }

    fn ensure_credentials(&self) -> Result<()> {
        if self.config.api_key.is_none() && self.config.requires_api_key() {
            return Err(Error::Config(
                "OPENAI_API_KEY is required for the hosted OpenAI endpoint".to_string(),
            ));
        }
        Ok(())
    }

    /// Build a request with authentication if configured.
    fn build_request(&self, endpoint: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint);
        let mut req = self.client.post(&url);

        if let Some(ref api_key) = self.config.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }

        req.header("Content-Type", "application/json")
    }

    /// POST `body` to `endpoint`, retrying retryable failures up to
    /// `max_retries` times with exponential backoff.
    async fn post_json<B, R>(&self, endpoint: &str, body: &B, op: ProviderOp) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        self.ensure_credentials()?;

        let mut attempt: u32 = 0;
        loop {
            let failure = match self.build_request(endpoint).json(body).send().await {
                Ok(response) if response.status().is_success() => {
                    return response
                        .json::<R>()
                        .await
                        .map_err(|e| op.error(format!("Failed to parse response: {}", e)));
                }
                Ok(response) => {
                    let status = response.status();
                    let parsed: OpenAIErrorResponse = response
                        .json()
                        .await
                        .unwrap_or_else(|_| OpenAIErrorResponse::unknown());
                    let code =
                        OpenAIErrorCode::from_response(status.as_u16(), &parsed.error.error_type);
                    let message = format!("OpenAI returned {}: {}", status, parsed.error.message);
                    (code.is_retryable(), to_mnemos_error(code, op, &message))
                }
                Err(e) => (
                    e.is_timeout() || e.is_connect(),
                    op.error(format!("Request failed: {}", e)),
                ),
            };

            let (retryable, err) = failure;
            if !retryable || attempt >= self.config.max_retries {
                return Err(err);
            }

            attempt += 1;
            let delay = self.config.retry_delay(attempt);
            warn!(
                subsystem = "inference",
                component = "openai",
                endpoint,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Retrying provider request"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl EmbeddingBackend for OpenAIBackend {
    #[instrument(skip(self, texts), fields(subsystem = "inference", component = "openai", op = "embed_texts", input_count = texts.len()))]
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        debug!(model = %self.config.embed_model, "Embedding {} texts", texts.len());

        let request = EmbeddingRequest {
            model: self.config.embed_model.clone(),
            input: texts.to_vec(),
            encoding_format: Some("float".to_string()),
        };

        let result: EmbeddingResponse = self
            .post_json("/embeddings", &request, ProviderOp::Embedding)
            .await?;

        if result.data.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "Expected {} embeddings, provider returned {}",
                texts.len(),
                result.data.len()
            )));
        }

        // Sort by index to ensure correct ordering
        let mut data = result.data;
        data.sort_by_key(|d| d.index);

        let vectors: Vec<Vector> = data
            .into_iter()
            .map(|d| Vector::from(d.embedding))
            .collect();

        debug!(result_count = vectors.len(), "Generated embeddings");
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.config.embed_dimension
    }

    fn model_name(&self) -> &str {
        &self.config.embed_model
    }
}

impl OpenAIBackend {
    async fn chat(&self, system: &str, prompt: &str, json_mode: bool) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if !system.is_empty() {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(prompt));

        let request = ChatCompletionRequest {
            model: self.config.gen_model.clone(),
            messages,
            temperature: None,
            response_format: json_mode.then(ResponseFormat::json_object),
        };

        let result: ChatCompletionResponse = self
            .post_json("/chat/completions", &request, ProviderOp::Generation)
            .await?;

        let choice = result
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::Inference("Provider returned no choices".to_string()))?;

        debug!(
            finish_reason = ?choice.finish_reason,
            response_len = choice.message.content.len(),
            "Generation complete"
        );
        Ok(choice.message.content)
    }

    /// Generate with the endpoint's JSON-only response mode enabled.
    pub async fn generate_json(&self, system: &str, prompt: &str) -> Result<String> {
        self.chat(system, prompt, true).await
    }
}

#[async_trait]
impl GenerationBackend for OpenAIBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with_system("", prompt).await
    }

    #[instrument(skip(self, system, prompt), fields(subsystem = "inference", component = "openai", op = "generate", prompt_len = prompt.len()))]
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.chat(system, prompt, false).await
    }

    fn model_name(&self) -> &str {
        &self.config.gen_model
    }
}
