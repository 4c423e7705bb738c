//! Retrieval-augmented command interpretation.
//!
//! A query runs through five steps: similarity search, related-record
//! lookups, context assembly, structured generation and command dispatch.
//! Retrieval is best-effort: when search or the lookups fail or exceed
//! their deadline the query is forwarded without context and the outcome
//! is flagged as degraded. Generation and execution errors are returned.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use mnemos_cache::{fingerprint, CacheService, SetOptions};
use mnemos_core::{
    defaults, CommandExecutor, CommandOutcome, DocumentType, DomainRepository, Error,
    GenerationRequest, OperationContext, QueryContext, Result, SearchOptions, SearchResult,
    StructuredGenerator, StructuredResponse,
};
use mnemos_search::VectorStore;

use crate::config::RagConfig;
use crate::context::{build_context, entity_ids, RelatedEntities};
use crate::prompt::{output_schema, system_instructions};

/// Recent communications loaded for the retrieved contacts and companies.
const RELATED_COMMUNICATION_LIMIT: usize = 5;

/// A query ready for generation.
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    pub request: GenerationRequest,
    pub results: Vec<SearchResult>,
    pub related: RelatedEntities,
    /// Retrieval failed and the request carries no context.
    pub degraded: bool,
}

/// The provider's reading of a query, with related-record references added
/// to its entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interpretation {
    pub response: StructuredResponse,
    pub context_documents: usize,
    pub related_entities_found: usize,
    pub degraded: bool,
}

/// Result of [`RagOrchestrator::process`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RagOutcome {
    pub response: StructuredResponse,
    pub outcome: CommandOutcome,
    pub context_documents: usize,
    pub related_entities_found: usize,
    pub degraded: bool,
    /// The interpretation came from the response cache.
    pub cached: bool,
}

/// Composes vector search, relational lookups, generation and execution.
pub struct RagOrchestrator {
    store: Arc<VectorStore>,
    domain: Arc<dyn DomainRepository>,
    generator: Arc<dyn StructuredGenerator>,
    executor: Arc<dyn CommandExecutor>,
    cache: Option<CacheService>,
    config: RagConfig,
}

impl RagOrchestrator {
    pub fn new(
        store: Arc<VectorStore>,
        domain: Arc<dyn DomainRepository>,
        generator: Arc<dyn StructuredGenerator>,
        executor: Arc<dyn CommandExecutor>,
    ) -> Self {
        Self {
            store,
            domain,
            generator,
            executor,
            cache: None,
            config: RagConfig::default(),
        }
    }

    /// Replace the orchestrator config.
    pub fn with_config(mut self, config: RagConfig) -> Self {
        self.config = config;
        self
    }

    /// Cache interpretations of repeated queries (see [`RagConfig::response_ttl`]).
    pub fn with_cache(mut self, cache: CacheService) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    // =========================================================================
    // RETRIEVAL
    // =========================================================================

    /// Retrieve context and build the generation request.
    ///
    /// Fails only on invalid input; retrieval failures yield a degraded,
    /// context-free request.
    #[instrument(skip(self, query, caller), fields(subsystem = "rag", component = "orchestrator", op = "prepare", organization_id = %caller.organization_id))]
    pub async fn prepare(&self, query: &str, caller: &QueryContext) -> Result<PreparedQuery> {
        validate(query, caller)?;

        let ctx = OperationContext::with_timeout(self.config.retrieval_timeout);
        let (results, related, degraded) = match self.retrieve(query, caller, &ctx).await {
            Ok((results, related)) => (results, related, false),
            Err(e) => {
                warn!(error = %e, degraded = true, "Retrieval failed, continuing without context");
                (Vec::new(), RelatedEntities::default(), true)
            }
        };

        let context = build_context(&results, &related, &self.config);
        debug!(
            result_count = results.len(),
            related_count = related.count(),
            size_bytes = context.len(),
            "Context assembled"
        );

        let request = GenerationRequest {
            system_instructions: system_instructions(caller, &results),
            context,
            user_query: query.trim().to_string(),
            output_schema: output_schema(),
        };
        Ok(PreparedQuery {
            request,
            results,
            related,
            degraded,
        })
    }

    async fn retrieve(
        &self,
        query: &str,
        caller: &QueryContext,
        ctx: &OperationContext,
    ) -> Result<(Vec<SearchResult>, RelatedEntities)> {
        let options = SearchOptions::new(caller.organization_id.clone())
            .with_limit(self.config.search_limit)
            .with_threshold(self.config.search_threshold)
            .with_user(caller.user_id.clone())
            .with_external(self.config.include_external);

        let results = self.store.search_with_context(query, &options, ctx).await?;
        let related = ctx
            .run(
                "load related entities",
                self.load_related(&caller.organization_id, &results),
            )
            .await?;
        Ok((results, related))
    }

    /// Fetch the relational records behind `results`, one batch per type,
    /// concurrently.
    pub async fn load_related(
        &self,
        organization_id: &str,
        results: &[SearchResult],
    ) -> Result<RelatedEntities> {
        let project_ids = entity_ids(results, DocumentType::Project);
        let task_ids = entity_ids(results, DocumentType::Task);
        let contact_ids = entity_ids(results, DocumentType::Contact);
        let company_ids = entity_ids(results, DocumentType::Company);
        let domain = &self.domain;

        let (projects, tasks, contacts, companies, communications) = tokio::try_join!(
            async {
                if project_ids.is_empty() {
                    return Ok(Vec::new());
                }
                domain.projects_by_ids(organization_id, &project_ids).await
            },
            async {
                if task_ids.is_empty() {
                    return Ok(Vec::new());
                }
                domain.tasks_by_ids(organization_id, &task_ids).await
            },
            async {
                if contact_ids.is_empty() {
                    return Ok(Vec::new());
                }
                domain.contacts_by_ids(organization_id, &contact_ids).await
            },
            async {
                if company_ids.is_empty() {
                    return Ok(Vec::new());
                }
                domain.companies_by_ids(organization_id, &company_ids).await
            },
            async {
                if contact_ids.is_empty() && company_ids.is_empty() {
                    return Ok(Vec::new());
                }
                domain
                    .recent_communications_for(
                        organization_id,
                        &contact_ids,
                        &company_ids,
                        RELATED_COMMUNICATION_LIMIT,
                    )
                    .await
            },
        )?;

        Ok(RelatedEntities {
            projects,
            tasks,
            contacts,
            companies,
            communications,
        })
    }

    // =========================================================================
    // INTERPRETATION AND DISPATCH
    // =========================================================================

    /// Interpret a query without executing it.
    pub async fn interpret(&self, query: &str, caller: &QueryContext) -> Result<Interpretation> {
        self.interpret_cached(query, caller).await.map(|(i, _)| i)
    }

    async fn interpret_cached(
        &self,
        query: &str,
        caller: &QueryContext,
    ) -> Result<(Interpretation, bool)> {
        validate(query, caller)?;

        let cache_key = self.cache_key(query, caller);
        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            if let Some(hit) = cache
                .get::<Interpretation>(key, defaults::RAG_CACHE_NAMESPACE)
                .await
            {
                debug!(cache_key = %key, "Interpretation served from cache");
                return Ok((hit, true));
            }
        }

        let prepared = self.prepare(query, caller).await?;
        let mut response = self.generator.generate_structured(&prepared.request).await?;

        if !prepared.degraded {
            for (key, value) in prepared.related.references() {
                response.entities.insert(key.to_string(), value);
            }
        }

        let interpretation = Interpretation {
            response,
            context_documents: prepared.results.len(),
            related_entities_found: prepared.related.count(),
            degraded: prepared.degraded,
        };

        if let (Some(cache), Some(key), Some(ttl), false) = (
            &self.cache,
            &cache_key,
            self.config.response_ttl,
            interpretation.degraded,
        ) {
            let options = SetOptions::new()
                .with_ttl(ttl)
                .in_namespace(defaults::RAG_CACHE_NAMESPACE)
                .with_tags([caller.organization_id.as_str()]);
            if let Err(e) = cache.set(key, &interpretation, &options).await {
                warn!(cache_key = %key, error = %e, "Failed to cache interpretation");
            }
        }
        Ok((interpretation, false))
    }

    /// Interpret a query and dispatch its intent to the command executor.
    #[instrument(skip(self, query, caller), fields(subsystem = "rag", component = "orchestrator", op = "process", organization_id = %caller.organization_id))]
    pub async fn process(&self, query: &str, caller: &QueryContext) -> Result<RagOutcome> {
        let start = Instant::now();
        let (interpretation, cached) = self.interpret_cached(query, caller).await?;
        let outcome = self
            .executor
            .execute(&interpretation.response, caller)
            .await?;

        info!(
            intent = %interpretation.response.intent,
            confidence = interpretation.response.confidence,
            result_count = interpretation.context_documents,
            degraded = interpretation.degraded,
            cached,
            success = outcome.success,
            duration_ms = start.elapsed().as_millis() as u64,
            "Query processed"
        );

        Ok(RagOutcome {
            response: interpretation.response,
            outcome,
            context_documents: interpretation.context_documents,
            related_entities_found: interpretation.related_entities_found,
            degraded: interpretation.degraded,
            cached,
        })
    }

    /// Drop cached interpretations of one organization.
    pub async fn invalidate_cache(&self, organization_id: &str) -> Result<usize> {
        match &self.cache {
            Some(cache) => cache.clear_by_tags(&[organization_id.to_string()]).await,
            None => Ok(0),
        }
    }

    fn cache_key(&self, query: &str, caller: &QueryContext) -> Option<String> {
        self.config.response_ttl?;
        let normalized = query.trim().to_lowercase();
        Some(fingerprint(&[
            caller.organization_id.as_str(),
            caller.user_id.as_str(),
            caller.language.as_deref().unwrap_or(""),
            normalized.as_str(),
        ]))
    }
}

fn validate(query: &str, caller: &QueryContext) -> Result<()> {
    if caller.organization_id.trim().is_empty() {
        return Err(Error::InvalidInput("organization id is required".to_string()));
    }
    if query.trim().is_empty() {
        return Err(Error::InvalidInput("query is empty".to_string()));
    }
    Ok(())
}
