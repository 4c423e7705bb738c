//! Core data models for mnemos.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::defaults;

// Re-export pgvector::Vector for use by other crates
pub use pgvector::Vector;

// =============================================================================
// DOCUMENT TYPES
// =============================================================================

/// Kind of entity a vector document was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Task,
    Project,
    Contact,
    Company,
    Deal,
    Communication,
    Knowledge,
    External,
}

impl DocumentType {
    /// Entity types synchronized by a full ingestion, in sync order.
    pub const SYNC_ORDER: [DocumentType; 7] = [
        DocumentType::Task,
        DocumentType::Project,
        DocumentType::Contact,
        DocumentType::Company,
        DocumentType::Deal,
        DocumentType::Communication,
        DocumentType::Knowledge,
    ];

    /// Stable lowercase name, as stored in the document store.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Project => "project",
            Self::Contact => "contact",
            Self::Company => "company",
            Self::Deal => "deal",
            Self::Communication => "communication",
            Self::Knowledge => "knowledge",
            Self::External => "external",
        }
    }

    /// Prefix of document ids built from this type.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Self::Communication => "comm",
            other => other.as_str(),
        }
    }

    /// Stable document id for an entity: `{prefix}_{entityId}`.
    pub fn document_id(&self, entity_id: &str) -> String {
        format!("{}_{}", self.id_prefix(), entity_id)
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DocumentType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "task" | "tasks" => Ok(Self::Task),
            "project" | "projects" => Ok(Self::Project),
            "contact" | "contacts" => Ok(Self::Contact),
            "company" | "companies" => Ok(Self::Company),
            "deal" | "deals" => Ok(Self::Deal),
            "communication" | "communications" => Ok(Self::Communication),
            "knowledge" => Ok(Self::Knowledge),
            "external" => Ok(Self::External),
            _ => Err(format!("Invalid document type: {}", s)),
        }
    }
}

// =============================================================================
// DOCUMENTS
// =============================================================================

/// Metadata carried by every vector document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub entity_id: String,
    pub owner_user_id: Option<String>,
    pub organization_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Origin of the content: "internal", a channel type, "web", ...
    pub source: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// 1 (lowest) to 10 (highest).
    pub importance: u8,
}

/// A retrievable content unit: one entity snapshot rendered as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Stable id, `{type}_{entityId}`. Storing the same id again replaces the document.
    pub id: String,
    pub content: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    /// Build a document with neutral defaults (source "internal", importance 5).
    pub fn new(
        doc_type: DocumentType,
        entity_id: impl Into<String>,
        organization_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let entity_id = entity_id.into();
        let now = Utc::now();
        Self {
            id: doc_type.document_id(&entity_id),
            content: content.into(),
            metadata: DocumentMetadata {
                doc_type,
                entity_id,
                owner_user_id: None,
                organization_id: organization_id.into(),
                created_at: now,
                updated_at: now,
                source: "internal".to_string(),
                tags: Vec::new(),
                importance: defaults::IMPORTANCE_DEFAULT,
            },
        }
    }

    /// Set the owning user.
    pub fn with_owner(mut self, user_id: Option<String>) -> Self {
        self.metadata.owner_user_id = user_id.filter(|u| !u.is_empty());
        self
    }

    /// Set the content source.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.metadata.source = source.into();
        self
    }

    /// Set tags, dropping empty ones.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metadata.tags = tags
            .into_iter()
            .map(Into::into)
            .filter(|t: &String| !t.is_empty())
            .collect();
        self
    }

    /// Set importance, clamped to [1, 10].
    pub fn with_importance(mut self, importance: i32) -> Self {
        self.metadata.importance = clamp_importance(importance);
        self
    }

    /// Set creation and update timestamps.
    pub fn with_timestamps(mut self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        self.metadata.created_at = created_at;
        self.metadata.updated_at = updated_at;
        self
    }
}

/// Clamp a raw importance score to the [1, 10] scale.
pub fn clamp_importance(raw: i32) -> u8 {
    raw.clamp(
        defaults::IMPORTANCE_MIN as i32,
        defaults::IMPORTANCE_MAX as i32,
    ) as u8
}

/// A document together with its embedding, as held by the document store.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedDocument {
    pub document: Document,
    pub embedding: Vector,
}

/// A candidate scored by a similarity search (embedding omitted).
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub document: Document,
    pub similarity: f32,
}

/// A ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub document: Document,
    /// Cosine similarity between the query and the document.
    pub similarity: f32,
    /// Similarity plus recency, importance and type boosts, clamped to [0, 1].
    pub relevance_score: f32,
}

// =============================================================================
// SEARCH OPTIONS AND FILTERS
// =============================================================================

/// Inclusive time window applied to a document's creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl DateRange {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.from && at <= self.to
    }
}

/// Options for a similarity search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    /// Maximum results returned.
    pub limit: usize,
    /// Minimum cosine similarity kept.
    pub threshold: f32,
    /// Restrict to these document types (empty = all).
    pub types: Vec<DocumentType>,
    /// Restrict to documents owned by this user (knowledge documents always pass).
    pub user_id: Option<String>,
    /// Required tenant scope.
    pub organization_id: String,
    pub date_range: Option<DateRange>,
    /// Restrict to these sources (empty = all).
    pub sources: Vec<String>,
    /// Include documents of type `external`.
    pub include_external: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: defaults::SEARCH_LIMIT,
            threshold: defaults::SEARCH_THRESHOLD,
            types: Vec::new(),
            user_id: None,
            organization_id: String::new(),
            date_range: None,
            sources: Vec::new(),
            include_external: false,
        }
    }
}

impl SearchOptions {
    /// Default options scoped to an organization.
    pub fn new(organization_id: impl Into<String>) -> Self {
        Self {
            organization_id: organization_id.into(),
            ..Self::default()
        }
    }

    /// Set the maximum number of results.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Set the minimum similarity.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Restrict to these document types; empty means all.
    pub fn with_types(mut self, types: Vec<DocumentType>) -> Self {
        self.types = types;
        self
    }

    /// Restrict to documents owned by `user_id`.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Restrict to documents created within `range`.
    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    /// Restrict to these sources; empty means all.
    pub fn with_sources(mut self, sources: Vec<String>) -> Self {
        self.sources = sources;
        self
    }

    /// Include documents from external sources.
    pub fn with_external(mut self, include: bool) -> Self {
        self.include_external = include;
        self
    }

    /// Candidate predicate implied by these options.
    pub fn filter(&self) -> DocumentFilter {
        DocumentFilter {
            organization_id: Some(self.organization_id.clone()),
            types: self.types.clone(),
            sources: self.sources.clone(),
            user_id: self.user_id.clone(),
            date_range: self.date_range,
            include_external: self.include_external,
            exclude_ids: Vec::new(),
        }
    }
}

/// Predicate for bulk reads from the document store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentFilter {
    pub organization_id: Option<String>,
    pub types: Vec<DocumentType>,
    pub sources: Vec<String>,
    pub user_id: Option<String>,
    pub date_range: Option<DateRange>,
    pub include_external: bool,
    pub exclude_ids: Vec<String>,
}

impl DocumentFilter {
    /// Every document of one organization, external ones included.
    pub fn for_organization(organization_id: impl Into<String>) -> Self {
        Self {
            organization_id: Some(organization_id.into()),
            include_external: true,
            ..Self::default()
        }
    }

    /// Exclude a document id from the candidates.
    pub fn excluding(mut self, id: impl Into<String>) -> Self {
        self.exclude_ids.push(id.into());
        self
    }

    /// Evaluate the predicate in process.
    pub fn matches(&self, doc: &Document) -> bool {
        let meta = &doc.metadata;

        if let Some(ref org) = self.organization_id {
            if &meta.organization_id != org {
                return false;
            }
        }
        if !self.types.is_empty() && !self.types.contains(&meta.doc_type) {
            return false;
        }
        if !self.sources.is_empty() && !self.sources.iter().any(|s| s == &meta.source) {
            return false;
        }
        if !self.include_external && meta.doc_type == DocumentType::External {
            return false;
        }
        if let Some(ref user) = self.user_id {
            let owned = meta.owner_user_id.as_deref() == Some(user.as_str());
            if !owned && meta.doc_type != DocumentType::Knowledge {
                return false;
            }
        }
        if let Some(range) = self.date_range {
            if !range.contains(meta.created_at) {
                return false;
            }
        }
        !self.exclude_ids.iter().any(|id| id == &doc.id)
    }
}

// =============================================================================
// VECTOR STORE STATS
// =============================================================================

/// Per-type document counts reported by the document store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentCounts {
    pub by_type: BTreeMap<DocumentType, i64>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl DocumentCounts {
    pub fn total(&self) -> i64 {
        self.by_type.values().sum()
    }
}

/// Statistics reported by the vector store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorStoreStats {
    pub total_documents: i64,
    pub documents_by_type: BTreeMap<DocumentType, i64>,
    /// Mean similarity of results served so far (`None` before the first result).
    pub avg_similarity: Option<f32>,
    pub last_updated: Option<DateTime<Utc>>,
}

// =============================================================================
// INGESTION JOBS
// =============================================================================

/// Kind of ingestion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionJobType {
    FullSync,
    Incremental,
    EntitySync,
}

impl IngestionJobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FullSync => "full_sync",
            Self::Incremental => "incremental",
            Self::EntitySync => "entity_sync",
        }
    }
}

impl std::fmt::Display for IngestionJobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for IngestionJobType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "full_sync" => Ok(Self::FullSync),
            "incremental" => Ok(Self::Incremental),
            "entity_sync" => Ok(Self::EntitySync),
            _ => Err(format!("Invalid ingestion job type: {}", s)),
        }
    }
}

/// Ingestion job status: `pending → running → (completed | failed)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Completed and failed jobs never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether the state machine allows moving to `next`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Failed)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid job status: {}", s)),
        }
    }
}

/// Per-record counters of an ingestion job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStats {
    pub total_processed: u64,
    pub successful: u64,
    pub failed: u64,
    pub skipped: u64,
}

impl JobStats {
    /// Add another set of counters to this one.
    pub fn merge(&mut self, other: &JobStats) {
        self.total_processed += other.total_processed;
        self.successful += other.successful;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }

    /// `total_processed == successful + failed + skipped`.
    pub fn is_consistent(&self) -> bool {
        self.total_processed == self.successful + self.failed + self.skipped
    }
}

/// Scope of an ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncScope {
    pub organization_id: String,
    pub user_id: Option<String>,
    /// Only records updated at or after this instant (incremental sync).
    pub since: Option<DateTime<Utc>>,
}

impl SyncScope {
    pub fn new(organization_id: impl Into<String>) -> Self {
        Self {
            organization_id: organization_id.into(),
            user_id: None,
            since: None,
        }
    }

    /// Narrow the sync to one user's records.
    pub fn with_user(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    /// Only sync records updated after `since`.
    pub fn with_since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Whether a record last updated at `updated_at` falls inside the scope.
    pub fn includes(&self, updated_at: DateTime<Utc>) -> bool {
        self.since.map_or(true, |since| updated_at >= since)
    }
}

/// A unit of ingestion work and its outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionJob {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub job_type: IngestionJobType,
    pub status: JobStatus,
    pub scope: SyncScope,
    pub entity_types: Vec<DocumentType>,
    pub stats: JobStats,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl IngestionJob {
    /// Create a pending job.
    pub fn new(job_type: IngestionJobType, scope: SyncScope, entity_types: Vec<DocumentType>) -> Self {
        Self {
            id: Uuid::now_v7(),
            job_type,
            status: JobStatus::Pending,
            scope,
            entity_types,
            stats: JobStats::default(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    /// Move to `running`. Returns false if the transition is not allowed.
    pub fn start(&mut self) -> bool {
        if !self.status.can_transition_to(JobStatus::Running) {
            return false;
        }
        self.status = JobStatus::Running;
        self.started_at = Some(Utc::now());
        true
    }

    /// Move to `completed`. Returns false if the transition is not allowed.
    pub fn complete(&mut self) -> bool {
        if !self.status.can_transition_to(JobStatus::Completed) {
            return false;
        }
        self.status = JobStatus::Completed;
        self.completed_at = Some(Utc::now());
        true
    }

    /// Move to `failed` with an error. Returns false if the transition is not allowed.
    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        if !self.status.can_transition_to(JobStatus::Failed) {
            return false;
        }
        self.status = JobStatus::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
        true
    }
}

// =============================================================================
// CACHE
// =============================================================================

/// One cached value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Fully qualified key, `{namespace}:{key}`.
    pub key: String,
    pub namespace: String,
    /// Serialized value, gzip-compressed when `compressed` is set.
    pub value: Vec<u8>,
    pub compressed: bool,
    /// Serialized size before compression.
    pub original_size: usize,
    /// Stored size (after compression when compressed).
    pub size: usize,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// Always later than `created_at`.
    pub expires_at: DateTime<Utc>,
    pub hit_count: u64,
    pub last_hit: DateTime<Utc>,
}

impl CacheEntry {
    /// Separates namespace and key. Namespaces never contain it.
    pub const KEY_SEPARATOR: char = ':';

    /// Build the fully qualified key for `key` in `namespace`.
    pub fn full_key(namespace: &str, key: &str) -> String {
        format!("{}{}{}", namespace, Self::KEY_SEPARATOR, key)
    }

    /// The key without its namespace prefix.
    pub fn local_key(&self) -> &str {
        self.key
            .strip_prefix(&self.namespace)
            .and_then(|rest| rest.strip_prefix(Self::KEY_SEPARATOR))
            .unwrap_or(&self.key)
    }

    /// An entry is no longer served once `now` passes `expires_at`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// Record a hit.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.hit_count += 1;
        self.last_hit = now;
    }
}

/// Per-namespace breakdown of the memory tier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceStats {
    pub namespace: String,
    pub entries: usize,
    pub size: usize,
    /// Hits over lookups in this namespace, as a percentage.
    pub hit_rate: f64,
}

/// Aggregate statistics of the memory tier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub total_entries: usize,
    pub total_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
    pub hit_rate: f64,
    pub miss_rate: f64,
    pub avg_hit_count: f64,
    pub expired_entries: usize,
    /// Mean stored/original size over compressed entries (0 when none).
    pub compression_ratio: f64,
    pub namespace_stats: Vec<NamespaceStats>,
}

// =============================================================================
// GENERATION
// =============================================================================

/// Structured prompt handed to a generation provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub system_instructions: String,
    /// Rendered retrieval context (empty when degraded).
    pub context: String,
    pub user_query: String,
    /// JSON schema the reply must satisfy.
    pub output_schema: JsonValue,
}

/// Intent recognized from a user query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandIntent {
    CreateProject,
    CreateTask,
    GetTasks,
    GetProjects,
    UpdateTaskStatus,
    Search,
    CreateNote,
    SetReminder,
    GetSummary,
    #[serde(other)]
    Unknown,
}

impl CommandIntent {
    pub const ALL: [CommandIntent; 10] = [
        CommandIntent::CreateProject,
        CommandIntent::CreateTask,
        CommandIntent::GetTasks,
        CommandIntent::GetProjects,
        CommandIntent::UpdateTaskStatus,
        CommandIntent::Search,
        CommandIntent::CreateNote,
        CommandIntent::SetReminder,
        CommandIntent::GetSummary,
        CommandIntent::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateProject => "CREATE_PROJECT",
            Self::CreateTask => "CREATE_TASK",
            Self::GetTasks => "GET_TASKS",
            Self::GetProjects => "GET_PROJECTS",
            Self::UpdateTaskStatus => "UPDATE_TASK_STATUS",
            Self::Search => "SEARCH",
            Self::CreateNote => "CREATE_NOTE",
            Self::SetReminder => "SET_REMINDER",
            Self::GetSummary => "GET_SUMMARY",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for CommandIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reply of a generation provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredResponse {
    pub intent: CommandIntent,
    /// 0 to 1.
    pub confidence: f32,
    #[serde(default)]
    pub entities: serde_json::Map<String, JsonValue>,
    pub suggested_response: String,
    #[serde(default)]
    pub requires_confirmation: bool,
}

/// Caller identity for an orchestrated query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryContext {
    pub user_id: String,
    pub organization_id: String,
    /// Preferred response language ("en", "pl", ...).
    pub language: Option<String>,
}

impl QueryContext {
    pub fn new(user_id: impl Into<String>, organization_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            organization_id: organization_id.into(),
            language: None,
        }
    }
}

/// Outcome reported by the domain command executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub success: bool,
    pub message: Option<String>,
    #[serde(default)]
    pub data: JsonValue,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample(doc_type: DocumentType, owner: Option<&str>) -> Document {
        Document::new(doc_type, "42", "org-1", "content").with_owner(owner.map(String::from))
    }

    #[test]
    fn test_document_id_format() {
        assert_eq!(DocumentType::Task.document_id("7"), "task_7");
        assert_eq!(DocumentType::Project.document_id("7"), "project_7");
        assert_eq!(DocumentType::Communication.document_id("7"), "comm_7");
    }

    #[test]
    fn test_document_type_roundtrip() {
        for t in DocumentType::SYNC_ORDER {
            assert_eq!(t.as_str().parse::<DocumentType>().unwrap(), t);
        }
        assert_eq!("tasks".parse::<DocumentType>().unwrap(), DocumentType::Task);
        assert!("spaceship".parse::<DocumentType>().is_err());
    }

    #[test]
    fn test_sync_order() {
        let names: Vec<&str> = DocumentType::SYNC_ORDER.iter().map(|t| t.as_str()).collect();
        assert_eq!(
            names,
            vec!["task", "project", "contact", "company", "deal", "communication", "knowledge"]
        );
    }

    #[test]
    fn test_importance_is_clamped() {
        assert_eq!(sample(DocumentType::Task, None).with_importance(42).metadata.importance, 10);
        assert_eq!(sample(DocumentType::Task, None).with_importance(-3).metadata.importance, 1);
        assert_eq!(sample(DocumentType::Task, None).with_importance(6).metadata.importance, 6);
    }

    #[test]
    fn test_with_tags_drops_empty() {
        let doc = sample(DocumentType::Task, None).with_tags(vec!["DONE", "", "HIGH"]);
        assert_eq!(doc.metadata.tags, vec!["DONE".to_string(), "HIGH".to_string()]);
    }

    #[test]
    fn test_metadata_serializes_type_field() {
        let doc = sample(DocumentType::Deal, Some("u1"));
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["metadata"]["type"], "deal");
        assert_eq!(json["metadata"]["entityId"], "42");
        assert_eq!(json["metadata"]["ownerUserId"], "u1");
    }

    #[test]
    fn test_filter_requires_organization() {
        let doc = sample(DocumentType::Task, None);
        assert!(DocumentFilter::for_organization("org-1").matches(&doc));
        assert!(!DocumentFilter::for_organization("org-2").matches(&doc));
    }

    #[test]
    fn test_filter_excludes_external_by_default() {
        let doc = sample(DocumentType::External, None);
        let opts = SearchOptions::new("org-1");
        assert!(!opts.filter().matches(&doc));
        assert!(opts.with_external(true).filter().matches(&doc));
    }

    #[test]
    fn test_filter_user_scope_keeps_knowledge() {
        let opts = SearchOptions::new("org-1").with_user("alice");
        let filter = opts.filter();
        assert!(filter.matches(&sample(DocumentType::Task, Some("alice"))));
        assert!(!filter.matches(&sample(DocumentType::Task, Some("bob"))));
        assert!(!filter.matches(&sample(DocumentType::Task, None)));
        assert!(filter.matches(&sample(DocumentType::Knowledge, None)));
    }

    #[test]
    fn test_filter_types_sources_and_dates() {
        let doc = sample(DocumentType::Task, None).with_source("email");
        let base = SearchOptions::new("org-1");

        assert!(base.clone().with_types(vec![DocumentType::Task]).filter().matches(&doc));
        assert!(!base.clone().with_types(vec![DocumentType::Deal]).filter().matches(&doc));
        assert!(base.clone().with_sources(vec!["email".into()]).filter().matches(&doc));
        assert!(!base.clone().with_sources(vec!["slack".into()]).filter().matches(&doc));

        let now = Utc::now();
        let inside = DateRange::new(now - Duration::days(1), now + Duration::days(1));
        let outside = DateRange::new(now - Duration::days(10), now - Duration::days(5));
        assert!(base.clone().with_date_range(inside).filter().matches(&doc));
        assert!(!base.with_date_range(outside).filter().matches(&doc));
    }

    #[test]
    fn test_filter_exclude_ids() {
        let doc = sample(DocumentType::Task, None);
        let filter = DocumentFilter::for_organization("org-1").excluding("task_42");
        assert!(!filter.matches(&doc));
    }

    #[test]
    fn test_job_state_machine() {
        let mut job = IngestionJob::new(
            IngestionJobType::FullSync,
            SyncScope::new("org-1"),
            DocumentType::SYNC_ORDER.to_vec(),
        );
        assert_eq!(job.status, JobStatus::Pending);
        assert!(!job.complete(), "pending cannot complete directly");
        assert!(job.start());
        assert!(job.started_at.is_some());
        assert!(job.complete());
        assert!(job.status.is_terminal());
        assert!(!job.fail("late"), "terminal jobs never change");
        assert!(job.error.is_none());
    }

    #[test]
    fn test_job_stats_merge_and_consistency() {
        let mut stats = JobStats::default();
        stats.merge(&JobStats {
            total_processed: 3,
            successful: 2,
            failed: 1,
            skipped: 0,
        });
        stats.merge(&JobStats {
            total_processed: 2,
            successful: 1,
            failed: 0,
            skipped: 1,
        });
        assert_eq!(stats.total_processed, 5);
        assert!(stats.is_consistent());
    }

    #[test]
    fn test_sync_scope_since() {
        let now = Utc::now();
        let scope = SyncScope::new("org").with_since(now);
        assert!(scope.includes(now));
        assert!(!scope.includes(now - Duration::seconds(1)));
        assert!(SyncScope::new("org").includes(now - Duration::days(365)));
    }

    #[test]
    fn test_cache_entry_keys_and_expiry() {
        let now = Utc::now();
        let mut entry = CacheEntry {
            key: CacheEntry::full_key("ns", "user:1"),
            namespace: "ns".into(),
            value: b"1".to_vec(),
            compressed: false,
            original_size: 1,
            size: 1,
            tags: vec![],
            created_at: now,
            expires_at: now + Duration::seconds(10),
            hit_count: 0,
            last_hit: now,
        };
        assert_eq!(entry.key, "ns:user:1");
        assert_eq!(entry.local_key(), "user:1");
        assert!(!entry.is_expired(now));
        assert!(!entry.is_expired(now + Duration::seconds(10)));
        assert!(entry.is_expired(now + Duration::seconds(10) + Duration::milliseconds(1)));

        entry.touch(now + Duration::seconds(1));
        assert_eq!(entry.hit_count, 1);
        assert_eq!(entry.last_hit, now + Duration::seconds(1));
    }

    #[test]
    fn test_intent_wire_names() {
        let json = serde_json::to_string(&CommandIntent::UpdateTaskStatus).unwrap();
        assert_eq!(json, "\"UPDATE_TASK_STATUS\"");
        let parsed: CommandIntent = serde_json::from_str("\"DANCE\"").unwrap();
        assert_eq!(parsed, CommandIntent::Unknown);
    }

    #[test]
    fn test_structured_response_camel_case() {
        let json = serde_json::json!({
            "intent": "CREATE_TASK",
            "confidence": 0.9,
            "entities": {"title": "Call Anna"},
            "suggestedResponse": "Created",
            "requiresConfirmation": true
        });
        let parsed: StructuredResponse = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.intent, CommandIntent::CreateTask);
        assert!(parsed.requires_confirmation);
        assert_eq!(parsed.entities["title"], "Call Anna");
    }
}
