//! # mnemos-search
//!
//! Vector store and similarity search for mnemos.
//!
//! This crate provides:
//! - [`VectorStore`]: embedding, upsert, relevance-ranked search, similar
//!   documents, deletion and statistics
//! - [`RelevanceWeights`]: configurable recency, importance and type boosts
//! - [`BruteForceSimilarity`]: in-process cosine scan behind the
//!   [`SimilaritySearch`] seam
//! - [`cosine_similarity`]
//!
//! # Example
//!
//! ```rust,ignore
//! use mnemos_search::VectorStore;
//! use mnemos_core::SearchOptions;
//!
//! let store = VectorStore::brute_force(documents, embedder);
//! let results = store
//!     .search("renew contract", &SearchOptions::new("org-1").with_limit(5))
//!     .await?;
//! ```

pub mod cosine;
pub mod relevance;
pub mod similarity;
pub mod store;

// Re-export core types
pub use mnemos_core::*;

pub use cosine::cosine_similarity;
pub use relevance::RelevanceWeights;
pub use similarity::BruteForceSimilarity;
pub use store::{
    sort_results, truncate_chars, BatchFailure, BatchReport, VectorStore, VectorStoreConfig,
};
