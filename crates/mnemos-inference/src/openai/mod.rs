//! OpenAI-compatible embedding and generation backend.
//!
//! Works with any endpoint exposing `/embeddings` and `/chat/completions` in
//! the OpenAI format (OpenAI, Azure OpenAI, Ollama, vLLM, LocalAI).
//!
//! # Example
//!
//! ```rust,no_run
//! use mnemos_inference::openai::OpenAIBackend;
//! use mnemos_core::EmbeddingBackend;
//!
//! # async fn run() -> mnemos_core::Result<()> {
//! let backend = OpenAIBackend::from_env()?;
//! let vectors = backend.embed_texts(&["Hello, world!".to_string()]).await?;
//! # Ok(())
//! # }
//! ```

mod backend;
mod error;
mod types;

pub use backend::{
    OpenAIBackend, OpenAIConfig, DEFAULT_GEN_MODEL, DEFAULT_OPENAI_URL, DEFAULT_RETRY_BASE_MS,
    DEFAULT_TIMEOUT_SECS,
};
pub use error::{to_mnemos_error, OpenAIErrorCode, ProviderOp};
pub use types::*;
