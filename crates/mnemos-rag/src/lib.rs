//! # mnemos-rag
//!
//! Retrieval-augmented command interpretation.
//!
//! [`RagOrchestrator`] searches the vector store, resolves the hits back into
//! business records, renders a bounded context, asks a
//! [`StructuredGenerator`] for an intent and hands it to a
//! [`CommandExecutor`]. Retrieval failures degrade to a context-free request
//! instead of failing the query.
//!
//! ## Example
//!
//! ```ignore
//! use mnemos_rag::{QueryContext, RagConfig, RagOrchestrator};
//!
//! let rag = RagOrchestrator::new(store, db.domain_arc(), generator, executor)
//!     .with_config(RagConfig::from_env())
//!     .with_cache(cache);
//!
//! let outcome = rag
//!     .process("remind me to call Jane tomorrow", &QueryContext::new("u1", "org-1"))
//!     .await?;
//! println!("{}: {}", outcome.response.intent, outcome.response.suggested_response);
//! ```

pub mod config;
pub mod context;
pub mod orchestrator;
pub mod prompt;

// Re-export core types
pub use mnemos_core::*;

pub use config::RagConfig;
pub use context::{build_context, RelatedEntities};
pub use orchestrator::{Interpretation, PreparedQuery, RagOrchestrator, RagOutcome};
pub use prompt::{output_schema, system_instructions};
