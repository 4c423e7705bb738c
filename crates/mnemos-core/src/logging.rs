//! Structured logging schema and field name constants for mnemos.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by the same field names in every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data (search hits, records) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "vector", "cache", "ingest", "rag", "inference", "database"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "vector_store", "brute_force", "memory_tier", "pipeline", "pool"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "search", "store_document", "get", "sweep", "full_sync"
pub const OPERATION: &str = "op";

/// Organization scope of the operation.
pub const ORGANIZATION_ID: &str = "organization_id";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Vector document identifier (`{type}_{entityId}`).
pub const DOCUMENT_ID: &str = "document_id";

/// Entity type being synchronized or searched.
pub const ENTITY_TYPE: &str = "entity_type";

/// Ingestion job identifier.
pub const JOB_ID: &str = "job_id";

/// Ingestion job type.
pub const JOB_TYPE: &str = "job_type";

/// Search query text.
pub const QUERY: &str = "query";

/// Cache namespace.
pub const NAMESPACE: &str = "namespace";

/// Fully qualified cache key (`{namespace}:{key}`).
pub const CACHE_KEY: &str = "cache_key";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of results returned by a search or query.
pub const RESULT_COUNT: &str = "result_count";

/// Number of candidates scanned by a similarity search.
pub const CANDIDATE_COUNT: &str = "candidate_count";

/// Number of input texts sent to an embedding model.
pub const INPUT_COUNT: &str = "input_count";

/// Byte size of a cache value or memory tier.
pub const SIZE_BYTES: &str = "size_bytes";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Model name used for inference.
pub const MODEL: &str = "model";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// The request fell back to a degraded path.
pub const DEGRADED: &str = "degraded";
