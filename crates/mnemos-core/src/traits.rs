//! Core traits for mnemos abstractions.
//!
//! These traits define the interfaces that concrete implementations
//! must satisfy, enabling pluggable backends and testability.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::*;
use crate::error::Result;
use crate::models::*;

// =============================================================================
// DOCUMENT STORE TRAITS
// =============================================================================

/// Keyed storage of embedded documents.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Insert or replace a document by id.
    async fn upsert(&self, doc: &EmbeddedDocument) -> Result<()>;

    /// Fetch a document by id.
    async fn get(&self, id: &str) -> Result<Option<EmbeddedDocument>>;

    /// Delete a document. Returns false if it did not exist.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Every document matching the filter, embeddings included.
    async fn fetch_candidates(&self, filter: &DocumentFilter) -> Result<Vec<EmbeddedDocument>>;

    /// Per-type counts, optionally restricted to one organization.
    async fn counts(&self, organization_id: Option<&str>) -> Result<DocumentCounts>;

    /// Dimension of stored embeddings, `None` while the store is empty.
    async fn embedding_dimension(&self) -> Result<Option<usize>>;
}

/// Nearest-neighbour lookup over stored documents.
///
/// Implementations return every candidate matching `filter` whose cosine
/// similarity to `query` is at least `threshold`, in any order.
#[async_trait]
pub trait SimilaritySearch: Send + Sync {
    async fn nearest(
        &self,
        query: &Vector,
        filter: &DocumentFilter,
        threshold: f32,
    ) -> Result<Vec<ScoredDocument>>;

    /// Short name for logs ("brute_force", "pgvector").
    fn name(&self) -> &'static str;
}

// =============================================================================
// CACHE TRAITS
// =============================================================================

/// Persistent cache tier. Keys are fully qualified (`{namespace}:{key}`).
#[async_trait]
pub trait CacheRepository: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Insert or replace an entry and its tag index rows.
    async fn put(&self, entry: &CacheEntry) -> Result<()>;

    /// Returns false if the key did not exist.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Increment the hit counter of an entry.
    async fn record_hit(&self, key: &str, at: DateTime<Utc>) -> Result<()>;

    /// Delete a namespace. Returns the removed keys.
    async fn delete_namespace(&self, namespace: &str) -> Result<Vec<String>>;

    /// Delete entries carrying any of `tags`. Returns the removed keys.
    async fn delete_by_tags(&self, tags: &[String]) -> Result<Vec<String>>;

    /// Keys stored, optionally restricted to one namespace.
    async fn list_keys(&self, namespace: Option<&str>) -> Result<Vec<String>>;

    /// Delete the given keys. Returns how many existed.
    async fn delete_many(&self, keys: &[String]) -> Result<u64>;

    /// Delete entries expired at `now`. Returns how many were removed.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

// =============================================================================
// DOMAIN STORE TRAITS
// =============================================================================

/// Read access to the relational business records, always scoped by organization.
#[async_trait]
pub trait DomainRepository: Send + Sync {
    async fn list_tasks(&self, organization_id: &str) -> Result<Vec<TaskRecord>>;

    async fn list_projects(&self, organization_id: &str) -> Result<Vec<ProjectRecord>>;

    async fn list_contacts(&self, organization_id: &str) -> Result<Vec<ContactRecord>>;

    async fn list_companies(&self, organization_id: &str) -> Result<Vec<CompanyRecord>>;

    async fn list_deals(&self, organization_id: &str) -> Result<Vec<DealRecord>>;

    /// Most recent communications first, at most `limit`.
    async fn list_communications(
        &self,
        organization_id: &str,
        limit: usize,
    ) -> Result<Vec<CommunicationRecord>>;

    async fn list_knowledge(&self, organization_id: &str) -> Result<Vec<KnowledgeRecord>>;

    async fn tasks_by_ids(&self, organization_id: &str, ids: &[String]) -> Result<Vec<TaskRecord>>;

    async fn projects_by_ids(
        &self,
        organization_id: &str,
        ids: &[String],
    ) -> Result<Vec<ProjectRecord>>;

    async fn contacts_by_ids(
        &self,
        organization_id: &str,
        ids: &[String],
    ) -> Result<Vec<ContactRecord>>;

    async fn companies_by_ids(
        &self,
        organization_id: &str,
        ids: &[String],
    ) -> Result<Vec<CompanyRecord>>;

    /// Most recent communications linked to any of the contacts or companies.
    async fn recent_communications_for(
        &self,
        organization_id: &str,
        contact_ids: &[String],
        company_ids: &[String],
        limit: usize,
    ) -> Result<Vec<CommunicationRecord>>;
}

// =============================================================================
// JOB TRAITS
// =============================================================================

/// Durable record of ingestion jobs.
#[async_trait]
pub trait IngestionJobRepository: Send + Sync {
    /// Insert or update a job record.
    async fn save(&self, job: &IngestionJob) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<IngestionJob>>;

    /// Most recently created first.
    async fn list_recent(&self, limit: usize) -> Result<Vec<IngestionJob>>;
}

// =============================================================================
// INFERENCE TRAITS
// =============================================================================

/// Backend for generating text embeddings.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Generate embeddings for the given texts.
    ///
    /// Returns a vector of embedding vectors, one per input text.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>>;

    /// Embed in chunks of at most `max_batch` texts per provider call.
    async fn embed_batch(&self, texts: &[String], max_batch: usize) -> Result<Vec<Vector>> {
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(max_batch.max(1)) {
            out.extend(self.embed_texts(chunk).await?);
        }
        Ok(out)
    }

    /// Get the expected dimension of embedding vectors.
    fn dimension(&self) -> usize;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

/// Backend for text generation (LLM).
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate text given a prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate text with system context.
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

/// Generation provider returning a parsed command interpretation.
#[async_trait]
pub trait StructuredGenerator: Send + Sync {
    async fn generate_structured(&self, request: &GenerationRequest) -> Result<StructuredResponse>;
}

// =============================================================================
// COMMAND TRAITS
// =============================================================================

/// Executes a recognized intent against the business domain.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(
        &self,
        response: &StructuredResponse,
        context: &QueryContext,
    ) -> Result<CommandOutcome>;
}
