//! Centralized default constants for the mnemos knowledge layer.
//!
//! **This module is the single source of truth** for shared default values.
//! Config structs in every crate start from these constants and allow
//! environment overrides on top.
//!
//! Organized by domain area. When adding new constants, place them in the
//! appropriate section.

// =============================================================================
// DATABASE
// =============================================================================

/// Connections held by the PostgreSQL pool at most.
pub const DB_MAX_CONNECTIONS: u32 = 10;

/// Connections the pool keeps open while idle.
pub const DB_MIN_CONNECTIONS: u32 = 1;

/// Wait for a free pooled connection before failing.
pub const DB_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Idle connections above the minimum are closed after this long.
pub const DB_IDLE_TIMEOUT_SECS: u64 = 600;

/// Connections are recycled after this long. `0` keeps them indefinitely.
pub const DB_MAX_LIFETIME_SECS: u64 = 1800;

// =============================================================================
// EMBEDDING
// =============================================================================

/// Default embedding model name (OpenAI-compatible endpoint).
pub const EMBED_MODEL: &str = "text-embedding-3-small";

/// Default embedding vector dimension for text-embedding-3-small.
pub const EMBED_DIMENSION: usize = 1536;

/// Maximum characters sent to the embedding provider per text.
pub const EMBED_MAX_CHARS: usize = 8000;

/// Documents embedded per batch in `store_documents`.
pub const EMBED_BATCH_SIZE: usize = 10;

/// Delay between embedding batches (coarse provider rate limiting).
pub const EMBED_BATCH_DELAY_MS: u64 = 1000;

// =============================================================================
// VECTOR SEARCH
// =============================================================================

/// Default maximum number of search results.
pub const SEARCH_LIMIT: usize = 10;

/// Default minimum cosine similarity for a search candidate.
pub const SEARCH_THRESHOLD: f32 = 0.5;

/// Hard deadline for a single search (embedding round-trip included).
pub const SEARCH_TIMEOUT_SECS: u64 = 30;

/// Hard deadline for embedding and storing a single document.
pub const STORE_TIMEOUT_SECS: u64 = 60;

// =============================================================================
// RELEVANCE BOOSTS
// =============================================================================

/// Boost for documents created less than seven days ago.
pub const BOOST_RECENT_WEEK: f32 = 0.1;

/// Additional boost for documents created less than one day ago.
pub const BOOST_RECENT_DAY: f32 = 0.1;

/// Weight applied to `importance / 10`.
pub const BOOST_IMPORTANCE_WEIGHT: f32 = 0.2;

/// Type boost for tasks.
pub const BOOST_TASK: f32 = 0.2;

/// Type boost for projects.
pub const BOOST_PROJECT: f32 = 0.15;

/// Type boost for deals.
pub const BOOST_DEAL: f32 = 0.15;

/// Type boost for communications.
pub const BOOST_COMMUNICATION: f32 = 0.1;

/// Type boost for knowledge entries.
pub const BOOST_KNOWLEDGE: f32 = 0.1;

/// Type boost for contacts.
pub const BOOST_CONTACT: f32 = 0.05;

/// Type boost for companies.
pub const BOOST_COMPANY: f32 = 0.05;

/// Type boost for external documents (penalty).
pub const BOOST_EXTERNAL: f32 = -0.05;

// =============================================================================
// IMPORTANCE
// =============================================================================

/// Neutral importance for records without a heuristic.
pub const IMPORTANCE_DEFAULT: u8 = 5;

/// Lowest importance value.
pub const IMPORTANCE_MIN: u8 = 1;

/// Highest importance value.
pub const IMPORTANCE_MAX: u8 = 10;

// =============================================================================
// INGESTION
// =============================================================================

/// Hard deadline for a whole ingestion job.
pub const INGEST_JOB_TIMEOUT_SECS: u64 = 3600;

/// Most recent communications read per sync.
pub const INGEST_COMMUNICATION_LIMIT: usize = 1000;

/// Characters of message content kept in a communication summary.
pub const INGEST_COMMUNICATION_CONTENT_CHARS: usize = 500;

/// Finished jobs kept in process memory.
pub const INGEST_JOB_HISTORY: usize = 50;

/// Capacity of the ingestion event broadcast channel.
pub const EVENT_BUS_CAPACITY: usize = 256;

// =============================================================================
// CACHE
// =============================================================================

/// Maximum entries held by the memory tier.
pub const CACHE_MAX_ENTRIES: usize = 1000;

/// Default entry time-to-live.
pub const CACHE_TTL_SECS: u64 = 3600;

/// Serialized values larger than this many bytes are compressed.
pub const CACHE_COMPRESSION_THRESHOLD: usize = 1024;

/// Namespace used when none is given.
pub const CACHE_NAMESPACE: &str = "default";

/// Interval between expired-entry sweeps.
pub const CACHE_CLEANUP_INTERVAL_SECS: u64 = 900;

/// Interval between memory usage checks.
pub const CACHE_MONITOR_INTERVAL_SECS: u64 = 300;

/// Memory tier size above which the monitor warns (100 MB).
pub const CACHE_MEMORY_WARN_BYTES: usize = 100 * 1024 * 1024;

// =============================================================================
// RAG
// =============================================================================

/// Search results requested by the orchestrator.
pub const RAG_SEARCH_LIMIT: usize = 10;

/// Similarity threshold used by the orchestrator.
pub const RAG_SEARCH_THRESHOLD: f32 = 0.6;

/// Documents rendered into the context block.
pub const RAG_CONTEXT_DOCUMENTS: usize = 5;

/// Characters kept per document snippet.
pub const RAG_SNIPPET_CHARS: usize = 200;

/// Upper bound on the rendered context block.
pub const RAG_MAX_CONTEXT_CHARS: usize = 6000;

/// Deadline for the retrieval and enrichment phase.
pub const RAG_RETRIEVAL_TIMEOUT_SECS: u64 = 15;

/// Namespace for cached generation responses.
pub const RAG_CACHE_NAMESPACE: &str = "rag";

/// Time-to-live for cached generation responses.
pub const RAG_CACHE_TTL_SECS: u64 = 300;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_importance_bounds_are_ordered() {
        assert!(IMPORTANCE_MIN < IMPORTANCE_DEFAULT);
        assert!(IMPORTANCE_DEFAULT < IMPORTANCE_MAX);
    }

    #[test]
    fn test_max_boost_sum_exceeds_one() {
        // Clamping in the relevance score is reachable with default weights.
        let max = 1.0 + BOOST_RECENT_WEEK + BOOST_RECENT_DAY + BOOST_IMPORTANCE_WEIGHT + BOOST_TASK;
        assert!(max > 1.0);
    }

    #[test]
    fn test_rag_threshold_not_below_search_threshold() {
        assert!(RAG_SEARCH_THRESHOLD >= SEARCH_THRESHOLD);
    }
}
