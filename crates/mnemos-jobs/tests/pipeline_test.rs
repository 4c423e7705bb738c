//! IngestionPipeline behaviour over in-process repositories and the mock
//! embedding backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};

use mnemos_core::{
    CommunicationRecord, ContactRecord, DealRecord, Document, DocumentRepository, DocumentType,
    Error, IngestionJobRepository, IngestionJobType, JobStatus, KnowledgeRecord, ProjectRecord,
    Result, SyncScope, TaskRecord,
};
use mnemos_db::memory::{MemoryDocumentRepository, MemoryDomainRepository, MemoryJobRepository};
use mnemos_inference::mock::MockInferenceBackend;
use mnemos_jobs::{
    EntitySyncer, IngestionEvent, IngestionPipeline, PipelineConfig, CANCELLED_ERROR,
};
use mnemos_search::{VectorStore, VectorStoreConfig};

const ORG: &str = "org-acme";

struct Harness {
    pipeline: IngestionPipeline,
    documents: Arc<MemoryDocumentRepository>,
    domain: Arc<MemoryDomainRepository>,
    jobs: Arc<MemoryJobRepository>,
}

fn harness_with(backend: MockInferenceBackend, config: PipelineConfig) -> Harness {
    let documents = Arc::new(MemoryDocumentRepository::new());
    let domain = Arc::new(MemoryDomainRepository::new());
    let jobs = Arc::new(MemoryJobRepository::new());
    let store = Arc::new(
        VectorStore::brute_force(documents.clone(), Arc::new(backend))
            .with_config(VectorStoreConfig::default().with_batch(10, Duration::ZERO)),
    );
    let pipeline = IngestionPipeline::builder(store)
        .with_config(config)
        .with_domain(domain.clone())
        .with_job_repository(jobs.clone())
        .build();
    Harness {
        pipeline,
        documents,
        domain,
        jobs,
    }
}

fn harness() -> Harness {
    harness_with(MockInferenceBackend::new(), PipelineConfig::default())
}

async fn seed(domain: &MemoryDomainRepository) {
    domain.insert_task(TaskRecord::new("t1", ORG, "Renew Acme contract")).await;
    domain.insert_task(TaskRecord::new("t2", ORG, "Book venue")).await;
    domain.insert_project(ProjectRecord::new("p1", ORG, "Key accounts")).await;
    domain.insert_contact(ContactRecord::new("c1", ORG, "Jane")).await;
    domain.insert_deal(DealRecord::new("d1", ORG, "Acme renewal")).await;
    domain
        .insert_communication(CommunicationRecord::new("m1", ORG, "Sales inbox", "email"))
        .await;
    domain
        .insert_knowledge(KnowledgeRecord::new("k1", ORG, "Refund policy", "30 days"))
        .await;
    domain.insert_task(TaskRecord::new("t9", "org-other", "Not ours")).await;
}

#[tokio::test]
async fn test_full_sync_ingests_every_type() {
    let h = harness();
    seed(&h.domain).await;

    let pending = h.pipeline.start_full_sync(ORG, None).await.unwrap();
    assert_eq!(pending.status, JobStatus::Pending);
    assert_eq!(pending.job_type, IngestionJobType::FullSync);

    let job = h.pipeline.wait_for_current_job().await.unwrap();
    assert_eq!(job.id, pending.id);
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.stats.total_processed, 7);
    assert_eq!(job.stats.successful, 7);
    assert!(job.stats.is_consistent());
    assert!(job.started_at.is_some() && job.completed_at.is_some());

    assert_eq!(h.documents.len().await, 7);
    assert!(h.documents.get("comm_m1").await.unwrap().is_some());
    assert!(h.documents.get("task_t9").await.unwrap().is_none());
    assert!(!h.pipeline.is_running());
}

#[tokio::test]
async fn test_only_one_job_runs_at_a_time() {
    let h = harness_with(
        MockInferenceBackend::new().with_latency_ms(20),
        PipelineConfig::default(),
    );
    seed(&h.domain).await;

    h.pipeline.start_full_sync(ORG, None).await.unwrap();
    assert!(h.pipeline.is_running());

    let err = h.pipeline.start_full_sync("org-other", None).await.unwrap_err();
    assert!(matches!(err, Error::Job(_)));

    h.pipeline.wait_for_current_job().await.unwrap();
    let second = h.pipeline.start_full_sync("org-other", None).await.unwrap();
    let job = h.pipeline.wait_for_current_job().await.unwrap();
    assert_eq!(job.id, second.id);
    assert_eq!(job.status, JobStatus::Completed);
}

#[tokio::test]
async fn test_failed_entity_type_does_not_stop_job() {
    let h = harness();
    seed(&h.domain).await;
    h.domain.fail_type(DocumentType::Contact).await;

    h.pipeline.start_full_sync(ORG, None).await.unwrap();
    let job = h.pipeline.wait_for_current_job().await.unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    // Six records plus one failure for the contact type.
    assert_eq!(job.stats.total_processed, 7);
    assert_eq!(job.stats.successful, 6);
    assert_eq!(job.stats.failed, 1);
    assert!(h.documents.get("contact_c1").await.unwrap().is_none());
    assert!(h.documents.get("knowledge_k1").await.unwrap().is_some());
}

#[tokio::test]
async fn test_failed_record_is_isolated() {
    let h = harness_with(
        MockInferenceBackend::new().with_failing_input("POISON"),
        PipelineConfig::default(),
    );
    h.domain.insert_task(TaskRecord::new("t1", ORG, "Call Jane")).await;
    h.domain.insert_task(TaskRecord::new("t2", ORG, "POISON pill")).await;
    h.domain.insert_task(TaskRecord::new("t3", ORG, "Call John")).await;

    h.pipeline
        .start_entity_sync(ORG, None, &[DocumentType::Task])
        .await
        .unwrap();
    let job = h.pipeline.wait_for_current_job().await.unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.stats.successful, 2);
    assert_eq!(job.stats.failed, 1);
    assert!(job.stats.is_consistent());
    assert!(h.documents.get("task_t3").await.unwrap().is_some());
}

#[tokio::test]
async fn test_entity_sync_limits_types() {
    let h = harness();
    seed(&h.domain).await;

    let pending = h
        .pipeline
        .start_entity_sync(ORG, None, &[DocumentType::Deal, DocumentType::Deal])
        .await
        .unwrap();
    assert_eq!(pending.entity_types, vec![DocumentType::Deal]);
    assert_eq!(pending.job_type, IngestionJobType::EntitySync);

    let job = h.pipeline.wait_for_current_job().await.unwrap();
    assert_eq!(job.stats.successful, 1);
    assert_eq!(h.documents.len().await, 1);
}

#[tokio::test]
async fn test_start_validation() {
    let h = harness();

    let err = h.pipeline.start_full_sync("  ", None).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    let err = h.pipeline.start_entity_sync(ORG, None, &[]).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    let err = h
        .pipeline
        .start_entity_sync(ORG, None, &[DocumentType::External])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    assert!(!h.pipeline.is_running());
    assert!(h.pipeline.get_current_job().await.is_none());
}

#[tokio::test]
async fn test_incremental_sync_skips_unchanged_records() {
    let h = harness();
    let cutoff = Utc::now() - ChronoDuration::days(1);

    let mut stale = TaskRecord::new("old", ORG, "Archived task");
    stale.updated_at = cutoff - ChronoDuration::days(10);
    h.domain.insert_task(stale).await;
    h.domain.insert_task(TaskRecord::new("new", ORG, "Fresh task")).await;

    h.pipeline
        .start_incremental_sync(ORG, None, cutoff)
        .await
        .unwrap();
    let job = h.pipeline.wait_for_current_job().await.unwrap();

    assert_eq!(job.job_type, IngestionJobType::Incremental);
    assert_eq!(job.stats.successful, 1);
    assert_eq!(job.stats.skipped, 1);
    assert!(job.stats.is_consistent());
    assert!(h.documents.get("task_old").await.unwrap().is_none());
}

#[tokio::test]
async fn test_user_scope_skips_records_of_other_users() {
    let h = harness();
    let mut mine = TaskRecord::new("1", ORG, "Mine");
    mine.assigned_to_id = Some("u1".into());
    let mut theirs = TaskRecord::new("2", ORG, "Theirs");
    theirs.assigned_to_id = Some("u2".into());
    h.domain.insert_task(mine).await;
    h.domain.insert_task(theirs).await;
    h.domain.insert_task(TaskRecord::new("3", ORG, "Unassigned")).await;

    h.pipeline
        .start_entity_sync(ORG, Some("u1"), &[DocumentType::Task])
        .await
        .unwrap();
    let job = h.pipeline.wait_for_current_job().await.unwrap();

    assert_eq!(job.stats.successful, 2);
    assert_eq!(job.stats.skipped, 1);
    assert!(h.documents.get("task_2").await.unwrap().is_none());
}

#[tokio::test]
async fn test_cancel_current_job() {
    let h = harness_with(
        MockInferenceBackend::new().with_latency_ms(50),
        PipelineConfig::default(),
    );
    for i in 0..20 {
        h.domain
            .insert_task(TaskRecord::new(i.to_string(), ORG, format!("task {}", i)))
            .await;
    }

    h.pipeline.start_full_sync(ORG, None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(h.pipeline.cancel_current_job().await);

    let job = h.pipeline.wait_for_current_job().await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_deref(), Some(CANCELLED_ERROR));
    assert!(job.stats.total_processed < 20);
    assert!(job.stats.is_consistent());
    assert!(!h.pipeline.cancel_current_job().await);
}

#[tokio::test]
async fn test_job_timeout_fails_job() {
    let h = harness_with(
        MockInferenceBackend::new().with_latency_ms(50),
        PipelineConfig::default().with_job_timeout(Duration::from_millis(80)),
    );
    for i in 0..10 {
        h.domain
            .insert_task(TaskRecord::new(i.to_string(), ORG, format!("task {}", i)))
            .await;
    }

    h.pipeline.start_full_sync(ORG, None).await.unwrap();
    let job = h.pipeline.wait_for_current_job().await.unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.as_deref().unwrap().contains("deadline"));
    assert!(job.stats.successful < 10);
}

#[tokio::test]
async fn test_events_follow_job_lifecycle() {
    let h = harness();
    seed(&h.domain).await;
    let mut events = h.pipeline.subscribe();

    let pending = h
        .pipeline
        .start_entity_sync(ORG, None, &[DocumentType::Task, DocumentType::Contact])
        .await
        .unwrap();
    h.pipeline.wait_for_current_job().await.unwrap();

    match events.recv().await.unwrap() {
        IngestionEvent::JobStarted { job_id, job_type } => {
            assert_eq!(job_id, pending.id);
            assert_eq!(job_type, IngestionJobType::EntitySync);
        }
        other => panic!("unexpected event: {:?}", other),
    }
    let mut completed_types = Vec::new();
    for _ in 0..2 {
        match events.recv().await.unwrap() {
            IngestionEvent::EntityCompleted {
                entity_type, stats, ..
            } => {
                assert!(stats.is_consistent());
                completed_types.push(entity_type);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
    assert_eq!(completed_types, vec![DocumentType::Task, DocumentType::Contact]);
    match events.recv().await.unwrap() {
        IngestionEvent::JobCompleted { job_id, stats } => {
            assert_eq!(job_id, pending.id);
            assert_eq!(stats.successful, 3);
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_job_records_are_persisted() {
    let h = harness();
    seed(&h.domain).await;

    let first = h
        .pipeline
        .start_entity_sync(ORG, None, &[DocumentType::Task])
        .await
        .unwrap();
    h.pipeline.wait_for_current_job().await.unwrap();
    let second = h
        .pipeline
        .start_entity_sync(ORG, None, &[DocumentType::Deal])
        .await
        .unwrap();
    h.pipeline.wait_for_current_job().await.unwrap();

    let stored = h.jobs.get(first.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Completed);

    let fetched = h.pipeline.get_job(first.id).await.unwrap().unwrap();
    assert_eq!(fetched.stats.successful, 2);

    let recent = h.pipeline.recent_jobs(10).await.unwrap();
    let ids: Vec<_> = recent.iter().map(|j| j.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);
}

#[tokio::test]
async fn test_current_job_keeps_terminal_state() {
    let h = harness();
    seed(&h.domain).await;

    h.pipeline.start_full_sync(ORG, None).await.unwrap();
    h.pipeline.wait_for_current_job().await.unwrap();

    let current = h.pipeline.get_current_job().await.unwrap();
    assert_eq!(current.status, JobStatus::Completed);
}

#[tokio::test]
async fn test_in_memory_history_without_job_repository() {
    let documents = Arc::new(MemoryDocumentRepository::new());
    let domain = Arc::new(MemoryDomainRepository::new());
    seed(&domain).await;
    let store = Arc::new(VectorStore::brute_force(
        documents,
        Arc::new(MockInferenceBackend::new()),
    ));
    let pipeline = IngestionPipeline::builder(store)
        .with_config(PipelineConfig::default().with_history_limit(2))
        .with_domain(domain)
        .build();

    let mut ids = Vec::new();
    for _ in 0..3 {
        let job = pipeline
            .start_entity_sync(ORG, None, &[DocumentType::Deal])
            .await
            .unwrap();
        pipeline.wait_for_current_job().await.unwrap();
        ids.push(job.id);
    }

    let recent = pipeline.recent_jobs(10).await.unwrap();
    let recent_ids: Vec<_> = recent.iter().map(|j| j.id).collect();
    assert_eq!(recent_ids, vec![ids[2], ids[1]]);
    assert!(pipeline.get_job(ids[0]).await.unwrap().is_none());
}

struct StaticSyncer {
    docs: Vec<Document>,
}

#[async_trait]
impl EntitySyncer for StaticSyncer {
    fn entity_type(&self) -> DocumentType {
        DocumentType::Knowledge
    }

    async fn load(&self, scope: &SyncScope) -> Result<Vec<Document>> {
        Ok(self
            .docs
            .iter()
            .filter(|d| d.metadata.organization_id == scope.organization_id)
            .cloned()
            .collect())
    }
}

#[tokio::test]
async fn test_custom_syncer_replaces_domain_syncer() {
    let documents = Arc::new(MemoryDocumentRepository::new());
    let store = Arc::new(VectorStore::brute_force(
        documents.clone(),
        Arc::new(MockInferenceBackend::new()),
    ));
    let syncer = StaticSyncer {
        docs: vec![
            Document::new(DocumentType::Knowledge, "wiki-1", ORG, "Onboarding checklist"),
            Document::new(DocumentType::Knowledge, "wiki-2", ORG, "Expense policy"),
        ],
    };
    let pipeline = IngestionPipeline::builder(store)
        .with_domain(Arc::new(MemoryDomainRepository::new()))
        .with_syncer(Arc::new(syncer))
        .build();

    pipeline
        .start_entity_sync(ORG, None, &[DocumentType::Knowledge])
        .await
        .unwrap();
    let job = pipeline.wait_for_current_job().await.unwrap();

    assert_eq!(job.stats.successful, 2);
    assert!(documents.get("knowledge_wiki-1").await.unwrap().is_some());
}
