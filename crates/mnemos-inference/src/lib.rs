//! # mnemos-inference
//!
//! Embedding and generation providers for mnemos.
//!
//! This crate provides:
//! - OpenAI-compatible backend for embeddings and chat completions (feature `openai`)
//! - [`JsonStructuredGenerator`], turning any text generation backend into a
//!   structured command interpreter
//! - Deterministic mock backend for tests (feature `mock`)
//!
//! # Example
//!
//! ```rust,no_run
//! use mnemos_inference::{JsonStructuredGenerator, OpenAIBackend};
//!
//! # fn build() -> mnemos_core::Result<()> {
//! let backend = OpenAIBackend::from_env()?;
//! let generator = JsonStructuredGenerator::new(backend);
//! # Ok(())
//! # }
//! ```

pub mod structured;

#[cfg(feature = "openai")]
pub mod openai;

// Mock inference backend for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export core types
pub use mnemos_core::*;

#[cfg(feature = "openai")]
pub use openai::{OpenAIBackend, OpenAIConfig};

pub use structured::{
    extract_json_object, parse_intent, parse_structured_response, JsonStructuredGenerator,
};
