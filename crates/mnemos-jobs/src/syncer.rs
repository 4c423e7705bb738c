//! Entity syncers: one loader per document type.
//!
//! A syncer reads the records of its type for an organization and renders
//! them as documents. The pipeline looks syncers up in a
//! [`SyncerRegistry`], so new sources plug in without touching the job
//! loop.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use mnemos_core::{defaults, Document, DocumentType, DomainRepository, Error, Result, SyncScope};

use crate::builders;

/// Loads the documents of one entity type.
#[async_trait]
pub trait EntitySyncer: Send + Sync {
    /// The document type this syncer produces.
    fn entity_type(&self) -> DocumentType;

    /// Load every document of this type within the scope's organization.
    ///
    /// Records outside the scope's time window or user are still returned;
    /// the pipeline counts them as skipped.
    async fn load(&self, scope: &SyncScope) -> Result<Vec<Document>>;
}

/// Syncer backed by the relational business records.
pub struct DomainSyncer {
    entity_type: DocumentType,
    domain: Arc<dyn DomainRepository>,
    communication_limit: usize,
}

impl DomainSyncer {
    pub fn new(entity_type: DocumentType, domain: Arc<dyn DomainRepository>) -> Self {
        Self {
            entity_type,
            domain,
            communication_limit: defaults::INGEST_COMMUNICATION_LIMIT,
        }
    }

    /// Cap on communications read per run (most recent first).
    pub fn with_communication_limit(mut self, limit: usize) -> Self {
        self.communication_limit = limit;
        self
    }
}

#[async_trait]
impl EntitySyncer for DomainSyncer {
    fn entity_type(&self) -> DocumentType {
        self.entity_type
    }

    async fn load(&self, scope: &SyncScope) -> Result<Vec<Document>> {
        let org = scope.organization_id.as_str();
        let docs = match self.entity_type {
            DocumentType::Task => {
                let now = Utc::now();
                self.domain
                    .list_tasks(org)
                    .await?
                    .iter()
                    .map(|t| builders::task_document(t, now))
                    .collect()
            }
            DocumentType::Project => self
                .domain
                .list_projects(org)
                .await?
                .iter()
                .map(builders::project_document)
                .collect(),
            DocumentType::Contact => self
                .domain
                .list_contacts(org)
                .await?
                .iter()
                .map(builders::contact_document)
                .collect(),
            DocumentType::Company => self
                .domain
                .list_companies(org)
                .await?
                .iter()
                .map(builders::company_document)
                .collect(),
            DocumentType::Deal => self
                .domain
                .list_deals(org)
                .await?
                .iter()
                .map(builders::deal_document)
                .collect(),
            DocumentType::Communication => self
                .domain
                .list_communications(org, self.communication_limit)
                .await?
                .iter()
                .map(builders::communication_document)
                .collect(),
            DocumentType::Knowledge => self
                .domain
                .list_knowledge(org)
                .await?
                .iter()
                .map(builders::knowledge_document)
                .collect(),
            DocumentType::External => {
                return Err(Error::Job(
                    "External documents are not synced from business records".to_string(),
                ))
            }
        };
        Ok(docs)
    }
}

/// Syncers keyed by the document type they produce.
#[derive(Clone, Default)]
pub struct SyncerRegistry {
    syncers: HashMap<DocumentType, Arc<dyn EntitySyncer>>,
}

impl SyncerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with a [`DomainSyncer`] for every synced type.
    pub fn for_domain(domain: Arc<dyn DomainRepository>, communication_limit: usize) -> Self {
        let mut registry = Self::new();
        for entity_type in DocumentType::SYNC_ORDER {
            registry.register(Arc::new(
                DomainSyncer::new(entity_type, domain.clone())
                    .with_communication_limit(communication_limit),
            ));
        }
        registry
    }

    /// Register a syncer, replacing any previous one for the same type.
    pub fn register(&mut self, syncer: Arc<dyn EntitySyncer>) {
        self.syncers.insert(syncer.entity_type(), syncer);
    }

    /// Chaining form of [`SyncerRegistry::register`].
    pub fn with_syncer(mut self, syncer: Arc<dyn EntitySyncer>) -> Self {
        self.register(syncer);
        self
    }

    pub fn get(&self, entity_type: DocumentType) -> Option<Arc<dyn EntitySyncer>> {
        self.syncers.get(&entity_type).cloned()
    }

    pub fn supports(&self, entity_type: DocumentType) -> bool {
        self.syncers.contains_key(&entity_type)
    }

    pub fn is_empty(&self) -> bool {
        self.syncers.is_empty()
    }
}
