//! In-process repository implementations.
//!
//! Used by tests and by embedders that do not run PostgreSQL. Every store is
//! a map behind a `tokio::sync::RwLock`; vector search over
//! [`MemoryDocumentRepository`] is left to `BruteForceSimilarity`.
//!
//! The cache and domain stores can be switched into a failing mode to
//! exercise degraded paths of their callers.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use mnemos_core::{
    CacheEntry, CacheRepository, CommunicationRecord, CompanyRecord, ContactRecord, DealRecord,
    DocumentCounts, DocumentFilter, DocumentRepository, DocumentType, DomainRepository,
    EmbeddedDocument, Error, IngestionJob, IngestionJobRepository, KnowledgeRecord, ProjectRecord,
    Result, TaskRecord,
};

// =============================================================================
// DOCUMENTS
// =============================================================================

/// In-process document store.
#[derive(Default)]
pub struct MemoryDocumentRepository {
    docs: RwLock<HashMap<String, EmbeddedDocument>>,
}

impl MemoryDocumentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.docs.read().await.is_empty()
    }
}

#[async_trait]
impl DocumentRepository for MemoryDocumentRepository {
    async fn upsert(&self, doc: &EmbeddedDocument) -> Result<()> {
        self.docs
            .write()
            .await
            .insert(doc.document.id.clone(), doc.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<EmbeddedDocument>> {
        Ok(self.docs.read().await.get(id).cloned())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.docs.write().await.remove(id).is_some())
    }

    async fn fetch_candidates(&self, filter: &DocumentFilter) -> Result<Vec<EmbeddedDocument>> {
        Ok(self
            .docs
            .read()
            .await
            .values()
            .filter(|d| filter.matches(&d.document))
            .cloned()
            .collect())
    }

    async fn counts(&self, organization_id: Option<&str>) -> Result<DocumentCounts> {
        let docs = self.docs.read().await;
        let mut by_type: BTreeMap<DocumentType, i64> = BTreeMap::new();
        let mut last_updated = None;
        for d in docs.values() {
            let meta = &d.document.metadata;
            if organization_id.map_or(false, |org| meta.organization_id != org) {
                continue;
            }
            *by_type.entry(meta.doc_type).or_default() += 1;
            last_updated = last_updated.max(Some(meta.updated_at));
        }
        Ok(DocumentCounts {
            by_type,
            last_updated,
        })
    }

    async fn embedding_dimension(&self) -> Result<Option<usize>> {
        Ok(self
            .docs
            .read()
            .await
            .values()
            .next()
            .map(|d| d.embedding.as_slice().len()))
    }
}

// =============================================================================
// CACHE
// =============================================================================

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    tag_index: HashMap<String, HashSet<String>>,
}

impl CacheState {
    fn remove(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                for tag in &entry.tags {
                    if let Some(keys) = self.tag_index.get_mut(tag) {
                        keys.remove(key);
                        if keys.is_empty() {
                            self.tag_index.remove(tag);
                        }
                    }
                }
                true
            }
            None => false,
        }
    }
}

/// In-process persistent cache tier with a tag index.
#[derive(Default)]
pub struct MemoryCacheRepository {
    state: RwLock<CacheState>,
    unavailable: AtomicBool,
}

impl MemoryCacheRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail with a cache error until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }

    /// Keys indexed under a tag.
    pub async fn keys_for_tag(&self, tag: &str) -> Vec<String> {
        let state = self.state.read().await;
        let mut keys: Vec<String> = state
            .tag_index
            .get(tag)
            .map(|k| k.iter().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    fn check(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::Cache("persistent tier unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheRepository for MemoryCacheRepository {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        self.check()?;
        Ok(self.state.read().await.entries.get(key).cloned())
    }

    async fn put(&self, entry: &CacheEntry) -> Result<()> {
        self.check()?;
        let mut state = self.state.write().await;
        state.remove(&entry.key);
        for tag in &entry.tags {
            state
                .tag_index
                .entry(tag.clone())
                .or_default()
                .insert(entry.key.clone());
        }
        state.entries.insert(entry.key.clone(), entry.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.check()?;
        Ok(self.state.write().await.remove(key))
    }

    async fn record_hit(&self, key: &str, at: DateTime<Utc>) -> Result<()> {
        self.check()?;
        if let Some(entry) = self.state.write().await.entries.get_mut(key) {
            entry.touch(at);
        }
        Ok(())
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<Vec<String>> {
        self.check()?;
        let mut state = self.state.write().await;
        let keys: Vec<String> = state
            .entries
            .values()
            .filter(|e| e.namespace == namespace)
            .map(|e| e.key.clone())
            .collect();
        for key in &keys {
            state.remove(key);
        }
        Ok(keys)
    }

    async fn delete_by_tags(&self, tags: &[String]) -> Result<Vec<String>> {
        self.check()?;
        let mut state = self.state.write().await;
        let mut keys: Vec<String> = tags
            .iter()
            .filter_map(|t| state.tag_index.get(t))
            .flat_map(|keys| keys.iter().cloned())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        keys.sort();
        for key in &keys {
            state.remove(key);
        }
        Ok(keys)
    }

    async fn list_keys(&self, namespace: Option<&str>) -> Result<Vec<String>> {
        self.check()?;
        let state = self.state.read().await;
        let mut keys: Vec<String> = state
            .entries
            .values()
            .filter(|e| namespace.map_or(true, |ns| e.namespace == ns))
            .map(|e| e.key.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn delete_many(&self, keys: &[String]) -> Result<u64> {
        self.check()?;
        let mut state = self.state.write().await;
        Ok(keys.iter().filter(|k| state.remove(k)).count() as u64)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        self.check()?;
        let mut state = self.state.write().await;
        let expired: Vec<String> = state
            .entries
            .values()
            .filter(|e| e.is_expired(now))
            .map(|e| e.key.clone())
            .collect();
        for key in &expired {
            state.remove(key);
        }
        Ok(expired.len() as u64)
    }
}

// =============================================================================
// JOBS
// =============================================================================

/// In-process job record store.
#[derive(Default)]
pub struct MemoryJobRepository {
    jobs: RwLock<HashMap<Uuid, IngestionJob>>,
}

impl MemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IngestionJobRepository for MemoryJobRepository {
    async fn save(&self, job: &IngestionJob) -> Result<()> {
        self.jobs.write().await.insert(job.id, job.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<IngestionJob>> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<IngestionJob>> {
        let jobs = self.jobs.read().await;
        let mut all: Vec<IngestionJob> = jobs.values().cloned().collect();
        // v7 ids sort by creation time
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        all.truncate(limit);
        Ok(all)
    }
}

// =============================================================================
// DOMAIN RECORDS
// =============================================================================

#[derive(Default)]
struct DomainData {
    tasks: Vec<TaskRecord>,
    projects: Vec<ProjectRecord>,
    contacts: Vec<ContactRecord>,
    companies: Vec<CompanyRecord>,
    deals: Vec<DealRecord>,
    communications: Vec<CommunicationRecord>,
    knowledge: Vec<KnowledgeRecord>,
}

/// In-process business record store.
#[derive(Default)]
pub struct MemoryDomainRepository {
    data: RwLock<DomainData>,
    failing: RwLock<HashSet<DocumentType>>,
}

impl MemoryDomainRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make reads of one record type fail.
    pub async fn fail_type(&self, doc_type: DocumentType) {
        self.failing.write().await.insert(doc_type);
    }

    pub async fn insert_task(&self, record: TaskRecord) {
        self.data.write().await.tasks.push(record);
    }

    pub async fn insert_project(&self, record: ProjectRecord) {
        self.data.write().await.projects.push(record);
    }

    pub async fn insert_contact(&self, record: ContactRecord) {
        self.data.write().await.contacts.push(record);
    }

    pub async fn insert_company(&self, record: CompanyRecord) {
        self.data.write().await.companies.push(record);
    }

    pub async fn insert_deal(&self, record: DealRecord) {
        self.data.write().await.deals.push(record);
    }

    pub async fn insert_communication(&self, record: CommunicationRecord) {
        self.data.write().await.communications.push(record);
    }

    pub async fn insert_knowledge(&self, record: KnowledgeRecord) {
        self.data.write().await.knowledge.push(record);
    }

    async fn check(&self, doc_type: DocumentType) -> Result<()> {
        if self.failing.read().await.contains(&doc_type) {
            return Err(Error::Internal(format!("{} store unavailable", doc_type)));
        }
        Ok(())
    }
}

fn scoped<T: Clone>(records: &[T], org_of: impl Fn(&T) -> &str, org: &str) -> Vec<T> {
    records.iter().filter(|r| org_of(r) == org).cloned().collect()
}

fn scoped_ids<T: Clone>(
    records: &[T],
    key_of: impl Fn(&T) -> (&str, &str),
    org: &str,
    ids: &[String],
) -> Vec<T> {
    records
        .iter()
        .filter(|r| {
            let (record_org, id) = key_of(r);
            record_org == org && ids.iter().any(|i| i == id)
        })
        .cloned()
        .collect()
}

fn newest_first(mut comms: Vec<CommunicationRecord>, limit: usize) -> Vec<CommunicationRecord> {
    comms.sort_by(|a, b| b.occurred_at().cmp(&a.occurred_at()));
    comms.truncate(limit);
    comms
}

#[async_trait]
impl DomainRepository for MemoryDomainRepository {
    async fn list_tasks(&self, organization_id: &str) -> Result<Vec<TaskRecord>> {
        self.check(DocumentType::Task).await?;
        let data = self.data.read().await;
        Ok(scoped(&data.tasks, |r| r.organization_id.as_str(), organization_id))
    }

    async fn list_projects(&self, organization_id: &str) -> Result<Vec<ProjectRecord>> {
        self.check(DocumentType::Project).await?;
        let data = self.data.read().await;
        Ok(scoped(&data.projects, |r| r.organization_id.as_str(), organization_id))
    }

    async fn list_contacts(&self, organization_id: &str) -> Result<Vec<ContactRecord>> {
        self.check(DocumentType::Contact).await?;
        let data = self.data.read().await;
        Ok(scoped(&data.contacts, |r| r.organization_id.as_str(), organization_id))
    }

    async fn list_companies(&self, organization_id: &str) -> Result<Vec<CompanyRecord>> {
        self.check(DocumentType::Company).await?;
        let data = self.data.read().await;
        Ok(scoped(&data.companies, |r| r.organization_id.as_str(), organization_id))
    }

    async fn list_deals(&self, organization_id: &str) -> Result<Vec<DealRecord>> {
        self.check(DocumentType::Deal).await?;
        let data = self.data.read().await;
        Ok(scoped(&data.deals, |r| r.organization_id.as_str(), organization_id))
    }

    async fn list_communications(
        &self,
        organization_id: &str,
        limit: usize,
    ) -> Result<Vec<CommunicationRecord>> {
        self.check(DocumentType::Communication).await?;
        let data = self.data.read().await;
        let comms = scoped(&data.communications, |r| r.organization_id.as_str(), organization_id);
        Ok(newest_first(comms, limit))
    }

    async fn list_knowledge(&self, organization_id: &str) -> Result<Vec<KnowledgeRecord>> {
        self.check(DocumentType::Knowledge).await?;
        let data = self.data.read().await;
        Ok(scoped(&data.knowledge, |r| r.organization_id.as_str(), organization_id))
    }

    async fn tasks_by_ids(&self, organization_id: &str, ids: &[String]) -> Result<Vec<TaskRecord>> {
        self.check(DocumentType::Task).await?;
        let data = self.data.read().await;
        Ok(scoped_ids(
            &data.tasks,
            |r| (r.organization_id.as_str(), r.id.as_str()),
            organization_id,
            ids,
        ))
    }

    async fn projects_by_ids(
        &self,
        organization_id: &str,
        ids: &[String],
    ) -> Result<Vec<ProjectRecord>> {
        self.check(DocumentType::Project).await?;
        let data = self.data.read().await;
        Ok(scoped_ids(
            &data.projects,
            |r| (r.organization_id.as_str(), r.id.as_str()),
            organization_id,
            ids,
        ))
    }

    async fn contacts_by_ids(
        &self,
        organization_id: &str,
        ids: &[String],
    ) -> Result<Vec<ContactRecord>> {
        self.check(DocumentType::Contact).await?;
        let data = self.data.read().await;
        Ok(scoped_ids(
            &data.contacts,
            |r| (r.organization_id.as_str(), r.id.as_str()),
            organization_id,
            ids,
        ))
    }

    async fn companies_by_ids(
        &self,
        organization_id: &str,
        ids: &[String],
    ) -> Result<Vec<CompanyRecord>> {
        self.check(DocumentType::Company).await?;
        let data = self.data.read().await;
        Ok(scoped_ids(
            &data.companies,
            |r| (r.organization_id.as_str(), r.id.as_str()),
            organization_id,
            ids,
        ))
    }

    async fn recent_communications_for(
        &self,
        organization_id: &str,
        contact_ids: &[String],
        company_ids: &[String],
        limit: usize,
    ) -> Result<Vec<CommunicationRecord>> {
        self.check(DocumentType::Communication).await?;
        let data = self.data.read().await;
        let linked: Vec<CommunicationRecord> = data
            .communications
            .iter()
            .filter(|c| c.organization_id == organization_id)
            .filter(|c| {
                c.contact_id
                    .as_ref()
                    .map_or(false, |id| contact_ids.contains(id))
                    || c.company_id
                        .as_ref()
                        .map_or(false, |id| company_ids.contains(id))
            })
            .cloned()
            .collect();
        Ok(newest_first(linked, limit))
    }
}
