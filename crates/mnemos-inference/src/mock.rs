//! Mock inference backend for deterministic testing.
//!
//! Embeddings are bag-of-words vectors: every lowercase word is hashed into a
//! bucket, so texts sharing vocabulary are similar and unrelated texts are
//! close to orthogonal. Generation returns canned responses.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mnemos_inference::mock::MockInferenceBackend;
//! use mnemos_core::EmbeddingBackend;
//!
//! # async fn run() {
//! let backend = MockInferenceBackend::new()
//!     .with_dimension(64)
//!     .with_fixed_response(r#"{"intent":"SEARCH","confidence":0.9,"suggestedResponse":"ok"}"#);
//!
//! let vectors = backend.embed_texts(&["renew the contract".to_string()]).await.unwrap();
//! assert_eq!(vectors[0].as_slice().len(), 64);
//! # }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use mnemos_core::{EmbeddingBackend, Error, GenerationBackend, Result, Vector};

/// Mock inference backend for testing.
#[derive(Clone)]
pub struct MockInferenceBackend {
    config: Arc<MockConfig>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

#[derive(Debug, Clone)]
struct MockConfig {
    dimension: usize,
    model: String,
    response_mappings: Vec<(String, String)>,
    default_response: String,
    vector_overrides: HashMap<String, Vec<f32>>,
    failing_markers: Vec<String>,
    latency_ms: u64,
    failure_rate: f64,
}

#[derive(Debug, Clone)]
pub struct MockCall {
    pub operation: String,
    pub input: String,
    pub timestamp: std::time::Instant,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            dimension: 384,
            model: "mock".to_string(),
            response_mappings: Vec::new(),
            default_response: "Mock response".to_string(),
            vector_overrides: HashMap::new(),
            failing_markers: Vec::new(),
            latency_ms: 0,
            failure_rate: 0.0,
        }
    }
}

impl MockInferenceBackend {
    /// Create a new mock backend with default configuration.
    pub fn new() -> Self {
        Self {
            config: Arc::new(MockConfig::default()),
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Set the embedding dimension.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        Arc::make_mut(&mut self.config).dimension = dimension;
        self
    }

    /// Set the reported model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).model = model.into();
        self
    }

    /// Set the response returned when no mapping matches.
    pub fn with_fixed_response(mut self, response: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).default_response = response.into();
        self
    }

    /// Return `output` for prompts containing `input`. First match wins.
    pub fn with_response_mapping(
        mut self,
        input: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Arc::make_mut(&mut self.config)
            .response_mappings
            .push((input.into(), output.into()));
        self
    }

    /// Embed `text` (after trimming) as exactly `vector`.
    pub fn with_vector(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        Arc::make_mut(&mut self.config)
            .vector_overrides
            .insert(text.into().trim().to_string(), vector);
        self
    }

    /// Fail every embed call whose input contains `marker`.
    pub fn with_failing_input(mut self, marker: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config)
            .failing_markers
            .push(marker.into());
        self
    }

    /// Set simulated latency for all operations.
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        Arc::make_mut(&mut self.config).latency_ms = latency_ms;
        self
    }

    /// Set failure rate (0.0 - 1.0) for testing error handling.
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        Arc::make_mut(&mut self.config).failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Get all logged calls for assertion.
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.calls().clone()
    }

    /// Clear the call log.
    pub fn clear_calls(&self) {
        self.calls().clear()
    }

    /// Get number of embedded texts.
    pub fn embed_call_count(&self) -> usize {
        self.calls().iter().filter(|c| c.operation == "embed").count()
    }

    /// Get number of generation calls.
    pub fn generate_call_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.operation == "generate")
            .count()
    }

    fn calls(&self) -> MutexGuard<'_, Vec<MockCall>> {
        self.call_log.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn log_call(&self, operation: &str, input: &str) {
        self.calls().push(MockCall {
            operation: operation.to_string(),
            input: input.to_string(),
            timestamp: std::time::Instant::now(),
        });
    }

    fn should_fail(&self) -> bool {
        use rand::Rng;
        if self.config.failure_rate > 0.0 {
            rand::thread_rng().gen::<f64>() < self.config.failure_rate
        } else {
            false
        }
    }

    async fn simulate_latency(&self) {
        if self.config.latency_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(self.config.latency_ms)).await;
        }
    }

    /// Embed a single text.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.log_call("embed", text);
        self.simulate_latency().await;

        if self.should_fail() {
            return Err(Error::Embedding("Simulated failure".to_string()));
        }
        if let Some(marker) = self
            .config
            .failing_markers
            .iter()
            .find(|m| text.contains(m.as_str()))
        {
            return Err(Error::Embedding(format!("Simulated failure for '{}'", marker)));
        }
        if let Some(vector) = self.config.vector_overrides.get(text.trim()) {
            return Ok(vector.clone());
        }

        Ok(MockEmbeddingGenerator::generate(text, self.config.dimension))
    }

    fn respond(&self, prompt: &str) -> String {
        self.config
            .response_mappings
            .iter()
            .find(|(input, _)| prompt.contains(input.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_else(|| self.config.default_response.clone())
    }
}

impl Default for MockInferenceBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingBackend for MockInferenceBackend {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(Vector::from(self.embed(text).await?));
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl GenerationBackend for MockInferenceBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with_system("", prompt).await
    }

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.log_call("generate", prompt);
        self.simulate_latency().await;

        if self.should_fail() {
            return Err(Error::Inference("Simulated failure".to_string()));
        }

        let full = format!("{}\n{}", system, prompt);
        Ok(self.respond(&full))
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Deterministic embedding generator.
pub struct MockEmbeddingGenerator;

impl MockEmbeddingGenerator {
    /// Bag-of-words embedding of `text`, normalized to unit length.
    ///
    /// Text without any word characters falls back to per-character buckets.
    pub fn generate(text: &str, dimension: usize) -> Vec<f32> {
        let dims = dimension.max(1);
        let mut vec = vec![0.0; dims];
        let lowered = text.to_lowercase();
        let mut words = 0;

        for word in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            vec[(fnv1a(word) % dims as u64) as usize] += 1.0;
            words += 1;
        }

        if words == 0 {
            for (i, c) in text.chars().enumerate() {
                let idx = (c as usize + i) % dims;
                vec[idx] += 0.1;
            }
        }

        Self::normalize(&mut vec);
        vec
    }

    /// Pseudo-random but deterministic vector for `seed`.
    pub fn generate_with_seed(seed: u64, dimension: usize) -> Vec<f32> {
        let mut vec = vec![0.0; dimension];
        let mut state = seed;

        for item in vec.iter_mut() {
            state = state.wrapping_mul(1664525).wrapping_add(1013904223);
            *item = ((state % 1000) as f32) / 1000.0 - 0.5;
        }

        Self::normalize(&mut vec);
        vec
    }

    fn normalize(vec: &mut [f32]) {
        let magnitude: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            vec.iter_mut().for_each(|x| *x /= magnitude);
        }
    }
}

fn fnv1a(word: &str) -> u64 {
    word.bytes().fold(0xcbf29ce484222325, |hash, b| {
        (hash ^ b as u64).wrapping_mul(0x100000001b3)
    })
}
