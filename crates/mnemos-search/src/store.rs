//! Vector store: embeds documents, persists them and serves relevance-ranked
//! similarity search.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use mnemos_core::{
    defaults, Document, DocumentFilter, DocumentRepository, EmbeddedDocument, EmbeddingBackend,
    Error, OperationContext, Result, SearchOptions, SearchResult, SimilaritySearch, Vector,
    VectorStoreStats,
};

use crate::relevance::RelevanceWeights;
use crate::similarity::BruteForceSimilarity;

/// Tunables of the vector store.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorStoreConfig {
    /// Limit applied by [`VectorStoreConfig::search_options`].
    pub default_limit: usize,
    /// Threshold applied by [`VectorStoreConfig::search_options`].
    pub default_threshold: f32,
    /// Documents embedded per provider call in `store_documents`.
    pub batch_size: usize,
    /// Pause between batches.
    pub batch_delay: Duration,
    /// Deadline of one search.
    pub search_timeout: Duration,
    /// Deadline of one `store_document`.
    pub store_timeout: Duration,
    /// Characters sent to the embedding provider per text.
    pub max_embed_chars: usize,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            default_limit: defaults::SEARCH_LIMIT,
            default_threshold: defaults::SEARCH_THRESHOLD,
            batch_size: defaults::EMBED_BATCH_SIZE,
            batch_delay: Duration::from_millis(defaults::EMBED_BATCH_DELAY_MS),
            search_timeout: Duration::from_secs(defaults::SEARCH_TIMEOUT_SECS),
            store_timeout: Duration::from_secs(defaults::STORE_TIMEOUT_SECS),
            max_embed_chars: defaults::EMBED_MAX_CHARS,
        }
    }
}

impl VectorStoreConfig {
    /// Load configuration from `VECTOR_*` environment variables.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            default_limit: env_parse("VECTOR_SEARCH_LIMIT").unwrap_or(d.default_limit),
            default_threshold: env_parse("VECTOR_SEARCH_THRESHOLD").unwrap_or(d.default_threshold),
            batch_size: env_parse::<usize>("VECTOR_EMBED_BATCH_SIZE")
                .filter(|n| *n > 0)
                .unwrap_or(d.batch_size),
            batch_delay: env_parse("VECTOR_EMBED_BATCH_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(d.batch_delay),
            search_timeout: env_parse("VECTOR_SEARCH_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(d.search_timeout),
            store_timeout: env_parse("VECTOR_STORE_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(d.store_timeout),
            max_embed_chars: d.max_embed_chars,
        }
    }

    /// Set the documents per embedding call (at least one) and the pause between calls.
    pub fn with_batch(mut self, size: usize, delay: Duration) -> Self {
        self.batch_size = size.max(1);
        self.batch_delay = delay;
        self
    }

    /// Set the deadline of one search.
    pub fn with_search_timeout(mut self, timeout: Duration) -> Self {
        self.search_timeout = timeout;
        self
    }

    /// Set the deadline of one `store_document`.
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Search options for an organization with the configured defaults.
    pub fn search_options(&self, organization_id: impl Into<String>) -> SearchOptions {
        SearchOptions::new(organization_id)
            .with_limit(self.default_limit)
            .with_threshold(self.default_threshold)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

/// Per-document outcome of [`VectorStore::store_documents`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    /// Ids stored successfully, in input order.
    pub stored: Vec<String>,
    pub failed: Vec<BatchFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub id: String,
    pub error: String,
}

impl BatchReport {
    /// Documents attempted.
    pub fn total(&self) -> usize {
        self.stored.len() + self.failed.len()
    }

    /// True when no document failed.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    fn fail(&mut self, id: &str, error: &Error) {
        self.failed.push(BatchFailure {
            id: id.to_string(),
            error: error.to_string(),
        });
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct SimilarityTally {
    sum: f64,
    count: u64,
}

/// Document store with relevance-ranked similarity search.
///
/// Storage and nearest-neighbour lookup are injected, so the same store runs
/// in process (brute force over an in-memory repository) or
/// against PostgreSQL with pgvector.
pub struct VectorStore {
    documents: Arc<dyn DocumentRepository>,
    similarity: Arc<dyn SimilaritySearch>,
    embedder: Arc<dyn EmbeddingBackend>,
    weights: RelevanceWeights,
    config: VectorStoreConfig,
    served: Mutex<HashMap<String, SimilarityTally>>,
}

impl VectorStore {
    pub fn new(
        documents: Arc<dyn DocumentRepository>,
        similarity: Arc<dyn SimilaritySearch>,
        embedder: Arc<dyn EmbeddingBackend>,
    ) -> Self {
        Self {
            documents,
            similarity,
            embedder,
            weights: RelevanceWeights::default(),
            config: VectorStoreConfig::default(),
            served: Mutex::new(HashMap::new()),
        }
    }

    /// Store whose similarity search scans `documents` in process.
    pub fn brute_force(
        documents: Arc<dyn DocumentRepository>,
        embedder: Arc<dyn EmbeddingBackend>,
    ) -> Self {
        let similarity = Arc::new(BruteForceSimilarity::new(documents.clone()));
        Self::new(documents, similarity, embedder)
    }

    /// Replace the store tunables.
    pub fn with_config(mut self, config: VectorStoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the relevance weights used to rank results.
    pub fn with_weights(mut self, weights: RelevanceWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn config(&self) -> &VectorStoreConfig {
        &self.config
    }

    pub fn weights(&self) -> &RelevanceWeights {
        &self.weights
    }

    // =========================================================================
    // EMBEDDING
    // =========================================================================

    /// Embed `text` after trimming and truncation.
    ///
    /// Empty text is rejected before calling the provider. When the store
    /// already holds documents, the returned dimension must match theirs.
    pub async fn create_embedding(&self, text: &str) -> Result<Vector> {
        let input = self.prepare_text(text)?;
        let mut vectors = self.embedder.embed_texts(&[input]).await?;
        let vector = vectors
            .pop()
            .ok_or_else(|| Error::Embedding("Provider returned no embedding".to_string()))?;
        self.check_dimension(&vector).await?;
        Ok(vector)
    }

    fn prepare_text(&self, text: &str) -> Result<String> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("text to embed is empty".to_string()));
        }
        Ok(truncate_chars(trimmed, self.config.max_embed_chars).to_string())
    }

    async fn check_dimension(&self, vector: &Vector) -> Result<()> {
        let actual = vector.as_slice().len();
        if let Some(expected) = self.documents.embedding_dimension().await? {
            if expected != actual {
                return Err(Error::Embedding(format!(
                    "Embedding dimension {} does not match store dimension {}",
                    actual, expected
                )));
            }
        }
        Ok(())
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    /// Embed and upsert one document. Idempotent per document id.
    pub async fn store_document(&self, doc: Document) -> Result<()> {
        let ctx = OperationContext::with_timeout(self.config.store_timeout);
        self.store_document_with_context(doc, &ctx).await
    }

    #[instrument(skip(self, doc, ctx), fields(subsystem = "vector", component = "vector_store", op = "store_document", document_id = %doc.id))]
    pub async fn store_document_with_context(
        &self,
        doc: Document,
        ctx: &OperationContext,
    ) -> Result<()> {
        let ctx = ctx.child(self.config.store_timeout);
        ctx.run("store_document", async {
            let embedding = self.create_embedding(&doc.content).await?;
            self.documents
                .upsert(&EmbeddedDocument {
                    document: doc,
                    embedding,
                })
                .await
        })
        .await?;
        debug!("Document stored");
        Ok(())
    }

    /// Embed and upsert many documents in fixed-size batches.
    ///
    /// A failing document is recorded in the report and never fails the
    /// others. When a whole batch embedding call fails, its documents are
    /// retried one by one so only the offending ones are reported.
    pub async fn store_documents(&self, docs: Vec<Document>) -> Result<BatchReport> {
        self.store_documents_with_context(docs, &OperationContext::new())
            .await
    }

    #[instrument(skip(self, docs, ctx), fields(subsystem = "vector", component = "vector_store", op = "store_documents", input_count = docs.len()))]
    pub async fn store_documents_with_context(
        &self,
        docs: Vec<Document>,
        ctx: &OperationContext,
    ) -> Result<BatchReport> {
        let start = Instant::now();
        let mut report = BatchReport::default();
        let batch_count = docs.len().div_ceil(self.config.batch_size.max(1));

        for (index, batch) in docs.chunks(self.config.batch_size.max(1)).enumerate() {
            ctx.check("store_documents")?;
            if index > 0 && !self.config.batch_delay.is_zero() {
                ctx.run("store_documents", async {
                    tokio::time::sleep(self.config.batch_delay).await;
                    Ok(())
                })
                .await?;
            }
            self.store_batch(batch, ctx, &mut report).await?;
        }

        info!(
            batch_count,
            stored = report.stored.len(),
            failed = report.failed.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Batch store complete"
        );
        Ok(report)
    }

    async fn store_batch(
        &self,
        batch: &[Document],
        ctx: &OperationContext,
        report: &mut BatchReport,
    ) -> Result<()> {
        let mut pending: Vec<(&Document, String)> = Vec::with_capacity(batch.len());
        for doc in batch {
            match self.prepare_text(&doc.content) {
                Ok(text) => pending.push((doc, text)),
                Err(e) => report.fail(&doc.id, &e),
            }
        }
        if pending.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = pending.iter().map(|(_, t)| t.clone()).collect();
        let embedded = ctx
            .run("store_documents", self.embedder.embed_texts(&texts))
            .await;

        let vectors: Vec<Option<Vector>> = match embedded {
            Ok(vectors) if vectors.len() == pending.len() => {
                vectors.into_iter().map(Some).collect()
            }
            Err(e) if e.is_interrupted() => return Err(e),
            outcome => {
                if let Err(ref e) = outcome {
                    warn!(error = %e, "Batch embedding failed, embedding documents individually");
                }
                let mut singles = Vec::with_capacity(pending.len());
                for (doc, text) in &pending {
                    let single = ctx
                        .run(
                            "store_documents",
                            self.embedder.embed_texts(std::slice::from_ref(text)),
                        )
                        .await;
                    match single.map(|mut v| v.pop()) {
                        Ok(Some(vector)) => singles.push(Some(vector)),
                        Ok(None) => {
                            let missing =
                                Error::Embedding("Provider returned no embedding".to_string());
                            report.fail(&doc.id, &missing);
                            singles.push(None);
                        }
                        Err(e) if e.is_interrupted() => return Err(e),
                        Err(e) => {
                            report.fail(&doc.id, &e);
                            singles.push(None);
                        }
                    }
                }
                singles
            }
        };

        for ((doc, _), vector) in pending.into_iter().zip(vectors) {
            let Some(embedding) = vector else { continue };
            let outcome = async {
                self.check_dimension(&embedding).await?;
                self.documents
                    .upsert(&EmbeddedDocument {
                        document: doc.clone(),
                        embedding,
                    })
                    .await
            }
            .await;
            match outcome {
                Ok(()) => report.stored.push(doc.id.clone()),
                Err(e) => {
                    warn!(document_id = %doc.id, error = %e, "Failed to store document");
                    report.fail(&doc.id, &e);
                }
            }
        }
        Ok(())
    }

    /// Delete a document. Returns false if it did not exist.
    pub async fn delete_document(&self, id: &str) -> Result<bool> {
        let deleted = self.documents.delete(id).await?;
        debug!(
            subsystem = "vector",
            component = "vector_store",
            document_id = %id,
            deleted,
            "Delete document"
        );
        Ok(deleted)
    }

    // =========================================================================
    // SEARCH
    // =========================================================================

    /// Relevance-ranked similarity search under the configured deadline.
    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        let ctx = OperationContext::with_timeout(self.config.search_timeout);
        self.search_with_context(query, options, &ctx).await
    }

    /// Search under a caller-supplied deadline and cancellation token.
    #[instrument(skip(self, options, ctx), fields(subsystem = "vector", component = "vector_store", op = "search", organization_id = %options.organization_id, result_count = tracing::field::Empty))]
    pub async fn search_with_context(
        &self,
        query: &str,
        options: &SearchOptions,
        ctx: &OperationContext,
    ) -> Result<Vec<SearchResult>> {
        validate_options(options)?;
        if query.trim().is_empty() {
            return Err(Error::InvalidInput("search query is empty".to_string()));
        }
        if options.limit == 0 {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let results = ctx
            .run("search", async {
                let embedding = self.create_embedding(query).await?;
                self.rank(&embedding, options, options.filter()).await
            })
            .await?;

        tracing::Span::current().record("result_count", results.len() as u64);
        debug!(
            duration_ms = start.elapsed().as_millis() as u64,
            similarity_backend = self.similarity.name(),
            "Search complete"
        );
        Ok(results)
    }

    /// Documents similar to the stored document `id`, excluding itself.
    ///
    /// Returns an empty list when `id` is unknown. An empty
    /// `options.organization_id` defaults to the document's organization.
    #[instrument(skip(self, options), fields(subsystem = "vector", component = "vector_store", op = "find_similar"))]
    pub async fn find_similar(&self, id: &str, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        let ctx = OperationContext::with_timeout(self.config.search_timeout);
        ctx.run("find_similar", async {
            let Some(source) = self.documents.get(id).await? else {
                debug!(document_id = %id, "Unknown document, nothing similar");
                return Ok(Vec::new());
            };

            let mut options = options.clone();
            if options.organization_id.is_empty() {
                options.organization_id = source.document.metadata.organization_id.clone();
            }
            if options.limit == 0 {
                return Ok(Vec::new());
            }

            let filter = options.filter().excluding(id);
            self.rank(&source.embedding, &options, filter).await
        })
        .await
    }

    async fn rank(
        &self,
        embedding: &Vector,
        options: &SearchOptions,
        filter: DocumentFilter,
    ) -> Result<Vec<SearchResult>> {
        let hits = self
            .similarity
            .nearest(embedding, &filter, options.threshold)
            .await?;

        let now = Utc::now();
        let mut results: Vec<SearchResult> = hits
            .into_iter()
            .filter(|hit| hit.similarity >= options.threshold)
            .map(|hit| SearchResult {
                relevance_score: self.weights.score(&hit.document, hit.similarity, now),
                similarity: hit.similarity,
                document: hit.document,
            })
            .collect();

        sort_results(&mut results);
        results.truncate(options.limit);
        self.record_served(&options.organization_id, &results);
        Ok(results)
    }

    fn record_served(&self, organization_id: &str, results: &[SearchResult]) {
        if results.is_empty() {
            return;
        }
        let mut served = self.served.lock().unwrap_or_else(|e| e.into_inner());
        let tally = served.entry(organization_id.to_string()).or_default();
        for r in results {
            tally.sum += r.similarity as f64;
            tally.count += 1;
        }
    }

    fn average_similarity(&self, organization_id: Option<&str>) -> Option<f32> {
        let served = self.served.lock().unwrap_or_else(|e| e.into_inner());
        let tally = match organization_id {
            Some(org) => served.get(org).copied().unwrap_or_default(),
            None => served.values().fold(SimilarityTally::default(), |acc, t| {
                SimilarityTally {
                    sum: acc.sum + t.sum,
                    count: acc.count + t.count,
                }
            }),
        };
        (tally.count > 0).then(|| (tally.sum / tally.count as f64) as f32)
    }

    // =========================================================================
    // STATS
    // =========================================================================

    /// Document counts and served-similarity average, per organization or overall.
    pub async fn get_stats(&self, organization_id: Option<&str>) -> Result<VectorStoreStats> {
        let counts = self.documents.counts(organization_id).await?;
        Ok(VectorStoreStats {
            total_documents: counts.total(),
            documents_by_type: counts.by_type,
            avg_similarity: self.average_similarity(organization_id),
            last_updated: counts.last_updated,
        })
    }
}

fn validate_options(options: &SearchOptions) -> Result<()> {
    if options.organization_id.trim().is_empty() {
        return Err(Error::InvalidInput("organization_id is required".to_string()));
    }
    if options.threshold.is_nan() {
        return Err(Error::InvalidInput("threshold must be a number".to_string()));
    }
    Ok(())
}

/// Relevance descending, then similarity descending, then importance
/// descending, then id ascending.
///
/// Strong matches all clamp to a relevance of 1.0, so importance still
/// separates them before the id does.
pub fn sort_results(results: &mut [SearchResult]) {
    results.sort_by(|a, b| {
        b.relevance_score
            .total_cmp(&a.relevance_score)
            .then_with(|| b.similarity.total_cmp(&a.similarity))
            .then_with(|| {
                b.document
                    .metadata
                    .importance
                    .cmp(&a.document.metadata.importance)
            })
            .then_with(|| a.document.id.cmp(&b.document.id))
    });
}

/// Longest prefix of `text` with at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemos_core::DocumentType;

    fn result(id: &str, similarity: f32, relevance: f32) -> SearchResult {
        SearchResult {
            document: Document::new(DocumentType::Task, id, "org", "x"),
            similarity,
            relevance_score: relevance,
        }
    }

    #[test]
    fn test_sort_tie_break() {
        let mut results = vec![
            result("b", 0.5, 0.9),
            result("a", 0.5, 0.9),
            result("c", 0.7, 0.9),
            result("d", 0.9, 0.95),
        ];
        sort_results(&mut results);
        let ids: Vec<&str> = results.iter().map(|r| r.document.id.as_str()).collect();
        assert_eq!(ids, vec!["task_d", "task_c", "task_a", "task_b"]);
    }

    #[test]
    fn test_sort_prefers_importance_at_equal_scores() {
        let mut results = vec![result("1", 1.0, 1.0), result("2", 1.0, 1.0)];
        results[1].document.metadata.importance = 9;
        sort_results(&mut results);
        assert_eq!(results[0].document.id, "task_2");
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("zażółć", 3), "zaż");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn test_batch_report_counts() {
        let mut report = BatchReport::default();
        report.stored.push("task_1".to_string());
        report.fail("task_2", &Error::Embedding("boom".to_string()));
        assert_eq!(report.total(), 2);
        assert!(!report.is_complete());
        assert!(report.failed[0].error.contains("boom"));
    }

    #[test]
    fn test_config_search_options() {
        let config = VectorStoreConfig::default();
        let options = config.search_options("org-1");
        assert_eq!(options.limit, defaults::SEARCH_LIMIT);
        assert_eq!(options.threshold, defaults::SEARCH_THRESHOLD);
        assert_eq!(options.organization_id, "org-1");
    }

    #[test]
    fn test_validate_requires_organization() {
        let err = validate_options(&SearchOptions::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
