//! Orchestrator configuration.

use std::time::Duration;

use mnemos_core::defaults;

/// Retrieval and context bounds for [`crate::RagOrchestrator`].
#[derive(Debug, Clone)]
pub struct RagConfig {
    /// Documents requested from the vector store.
    pub search_limit: usize,
    /// Minimum cosine similarity of retrieved documents.
    pub search_threshold: f32,
    /// Include documents from external sources.
    pub include_external: bool,
    /// Retrieved documents rendered into the context.
    pub context_documents: usize,
    /// Characters kept from each document snippet.
    pub snippet_chars: usize,
    /// Upper bound on the rendered context.
    pub max_context_chars: usize,
    /// Deadline for search plus related-record lookups.
    pub retrieval_timeout: Duration,
    /// Cache interpretations for this long; `None` disables the cache.
    pub response_ttl: Option<Duration>,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            search_limit: defaults::RAG_SEARCH_LIMIT,
            search_threshold: defaults::RAG_SEARCH_THRESHOLD,
            include_external: true,
            context_documents: defaults::RAG_CONTEXT_DOCUMENTS,
            snippet_chars: defaults::RAG_SNIPPET_CHARS,
            max_context_chars: defaults::RAG_MAX_CONTEXT_CHARS,
            retrieval_timeout: Duration::from_secs(defaults::RAG_RETRIEVAL_TIMEOUT_SECS),
            response_ttl: Some(Duration::from_secs(defaults::RAG_CACHE_TTL_SECS)),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse::<T>().ok())
}

impl RagConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `RAG_SEARCH_LIMIT` | `10` | Documents retrieved per query |
    /// | `RAG_SEARCH_THRESHOLD` | `0.6` | Minimum similarity |
    /// | `RAG_CONTEXT_DOCUMENTS` | `5` | Documents rendered into the context |
    /// | `RAG_SNIPPET_CHARS` | `200` | Snippet length per document |
    /// | `RAG_MAX_CONTEXT_CHARS` | `6000` | Context size bound |
    /// | `RAG_SEARCH_TIMEOUT_SECS` | `15` | Retrieval deadline |
    /// | `RAG_CACHE_TTL_SECS` | `300` | Interpretation cache TTL, `0` disables |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let response_ttl = match env_parse::<u64>("RAG_CACHE_TTL_SECS") {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.response_ttl,
        };

        Self {
            search_limit: env_parse("RAG_SEARCH_LIMIT")
                .unwrap_or(defaults.search_limit)
                .max(1),
            search_threshold: env_parse::<f32>("RAG_SEARCH_THRESHOLD")
                .map(|t| t.clamp(0.0, 1.0))
                .unwrap_or(defaults.search_threshold),
            include_external: defaults.include_external,
            context_documents: env_parse("RAG_CONTEXT_DOCUMENTS")
                .unwrap_or(defaults.context_documents),
            snippet_chars: env_parse("RAG_SNIPPET_CHARS").unwrap_or(defaults.snippet_chars),
            max_context_chars: env_parse("RAG_MAX_CONTEXT_CHARS")
                .unwrap_or(defaults.max_context_chars),
            retrieval_timeout: env_parse("RAG_SEARCH_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.retrieval_timeout),
            response_ttl,
        }
    }

    /// Set the search limit (at least one) and similarity threshold (clamped to [0, 1]).
    pub fn with_search(mut self, limit: usize, threshold: f32) -> Self {
        self.search_limit = limit.max(1);
        self.search_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Include documents from external sources in retrieval.
    pub fn with_external(mut self, include: bool) -> Self {
        self.include_external = include;
        self
    }

    /// Set the documents rendered into the prompt, their snippet length and the total context size.
    pub fn with_context_bounds(mut self, documents: usize, snippet_chars: usize, max_chars: usize) -> Self {
        self.context_documents = documents;
        self.snippet_chars = snippet_chars;
        self.max_context_chars = max_chars;
        self
    }

    /// Set the deadline for retrieval and entity lookup.
    pub fn with_retrieval_timeout(mut self, timeout: Duration) -> Self {
        self.retrieval_timeout = timeout;
        self
    }

    /// Set the cache lifetime of interpretations; `None` or zero disables caching.
    pub fn with_response_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.response_ttl = ttl.filter(|t| !t.is_zero());
        self
    }
}
