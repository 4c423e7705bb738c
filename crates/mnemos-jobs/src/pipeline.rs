//! Ingestion pipeline: runs sync jobs that turn business records into
//! vector documents.
//!
//! At most one job runs per pipeline. Starting a job returns the pending
//! job immediately; the work happens on a spawned task and callers poll
//! [`IngestionPipeline::get_current_job`] or subscribe to
//! [`IngestionEvent`]s.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use mnemos_core::{
    defaults, CancelToken, Document, DocumentType, DomainRepository, Error, IngestionJob,
    IngestionJobRepository, IngestionJobType, JobStats, OperationContext, Result, SyncScope,
};
use mnemos_search::VectorStore;

use crate::syncer::{EntitySyncer, SyncerRegistry};
use crate::tally::RecordTally;

/// Error recorded on a job stopped by [`IngestionPipeline::cancel_current_job`].
pub const CANCELLED_ERROR: &str = "cancelled";

/// Configuration for the ingestion pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Upper bound on one job's run time.
    pub job_timeout: Duration,
    /// Most recent communications read per job.
    pub communication_limit: usize,
    /// Finished jobs kept in memory.
    pub history_limit: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            job_timeout: Duration::from_secs(defaults::INGEST_JOB_TIMEOUT_SECS),
            communication_limit: defaults::INGEST_COMMUNICATION_LIMIT,
            history_limit: defaults::INGEST_JOB_HISTORY,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `INGEST_JOB_TIMEOUT_SECS` | `3600` | Maximum run time of one job |
    /// | `INGEST_COMMUNICATION_LIMIT` | `1000` | Communications read per job |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let job_timeout = std::env::var("INGEST_JOB_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.job_timeout);

        let communication_limit = std::env::var("INGEST_COMMUNICATION_LIMIT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults.communication_limit);

        Self {
            job_timeout,
            communication_limit,
            ..defaults
        }
    }

    /// Set the deadline of one ingestion job.
    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = timeout;
        self
    }

    /// Set how many recent communications a sync pulls per run.
    pub fn with_communication_limit(mut self, limit: usize) -> Self {
        self.communication_limit = limit;
        self
    }

    /// Set how many finished jobs stay in history (at least one).
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }
}

/// Event emitted while a job runs.
#[derive(Debug, Clone)]
pub enum IngestionEvent {
    /// A job moved to running.
    JobStarted {
        job_id: Uuid,
        job_type: IngestionJobType,
    },
    /// One entity type finished.
    EntityCompleted {
        job_id: Uuid,
        entity_type: DocumentType,
        stats: JobStats,
    },
    /// A job completed.
    JobCompleted { job_id: Uuid, stats: JobStats },
    /// A job failed, was cancelled or timed out.
    JobFailed { job_id: Uuid, error: String },
}

#[derive(Default)]
struct PipelineState {
    /// Running job, or the last finished one.
    current: Option<IngestionJob>,
    /// Finished jobs, newest first.
    history: VecDeque<IngestionJob>,
    cancel: Option<CancelToken>,
    task: Option<JoinHandle<()>>,
}

struct PipelineInner {
    store: Arc<VectorStore>,
    syncers: SyncerRegistry,
    jobs: Option<Arc<dyn IngestionJobRepository>>,
    config: PipelineConfig,
    running: AtomicBool,
    state: RwLock<PipelineState>,
    event_tx: broadcast::Sender<IngestionEvent>,
}

/// Clears the running flag when the job task ends, even on panic.
struct RunningGuard(Arc<PipelineInner>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.running.store(false, Ordering::SeqCst);
    }
}

/// Builder for [`IngestionPipeline`].
pub struct PipelineBuilder {
    store: Arc<VectorStore>,
    config: PipelineConfig,
    domain: Option<Arc<dyn DomainRepository>>,
    extra_syncers: Vec<Arc<dyn EntitySyncer>>,
    jobs: Option<Arc<dyn IngestionJobRepository>>,
}

impl PipelineBuilder {
    /// Builder over `store` with default config and no syncers.
    pub fn new(store: Arc<VectorStore>) -> Self {
        Self {
            store,
            config: PipelineConfig::default(),
            domain: None,
            extra_syncers: Vec::new(),
            jobs: None,
        }
    }

    /// Replace the pipeline config.
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sync every standard entity type from the business records.
    pub fn with_domain(mut self, domain: Arc<dyn DomainRepository>) -> Self {
        self.domain = Some(domain);
        self
    }

    /// Add a syncer, replacing the domain syncer of the same type.
    pub fn with_syncer(mut self, syncer: Arc<dyn EntitySyncer>) -> Self {
        self.extra_syncers.push(syncer);
        self
    }

    /// Persist job records.
    pub fn with_job_repository(mut self, jobs: Arc<dyn IngestionJobRepository>) -> Self {
        self.jobs = Some(jobs);
        self
    }

    /// Register the domain syncers followed by any extra syncers.
    pub fn build(self) -> IngestionPipeline {
        let mut syncers = match self.domain {
            Some(domain) => SyncerRegistry::for_domain(domain, self.config.communication_limit),
            None => SyncerRegistry::new(),
        };
        for syncer in self.extra_syncers {
            syncers.register(syncer);
        }

        let (event_tx, _) = broadcast::channel(defaults::EVENT_BUS_CAPACITY);
        IngestionPipeline {
            inner: Arc::new(PipelineInner {
                store: self.store,
                syncers,
                jobs: self.jobs,
                config: self.config,
                running: AtomicBool::new(false),
                state: RwLock::new(PipelineState::default()),
                event_tx,
            }),
        }
    }
}

/// Runs ingestion jobs one at a time.
#[derive(Clone)]
pub struct IngestionPipeline {
    inner: Arc<PipelineInner>,
}

impl IngestionPipeline {
    /// Start building a pipeline that writes into `store`.
    pub fn builder(store: Arc<VectorStore>) -> PipelineBuilder {
        PipelineBuilder::new(store)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    // =========================================================================
    // STARTING JOBS
    // =========================================================================

    /// Start syncing every entity type of an organization.
    pub async fn start_full_sync(
        &self,
        organization_id: &str,
        user_id: Option<&str>,
    ) -> Result<IngestionJob> {
        let scope = SyncScope::new(organization_id).with_user(user_id.map(String::from));
        self.start_job(
            IngestionJobType::FullSync,
            scope,
            DocumentType::SYNC_ORDER.to_vec(),
        )
        .await
    }

    /// Start syncing only the given entity types.
    pub async fn start_entity_sync(
        &self,
        organization_id: &str,
        user_id: Option<&str>,
        entity_types: &[DocumentType],
    ) -> Result<IngestionJob> {
        let scope = SyncScope::new(organization_id).with_user(user_id.map(String::from));
        self.start_job(IngestionJobType::EntitySync, scope, entity_types.to_vec())
            .await
    }

    /// Start syncing records updated at or after `since`.
    pub async fn start_incremental_sync(
        &self,
        organization_id: &str,
        user_id: Option<&str>,
        since: DateTime<Utc>,
    ) -> Result<IngestionJob> {
        let scope = SyncScope::new(organization_id)
            .with_user(user_id.map(String::from))
            .with_since(since);
        self.start_job(
            IngestionJobType::Incremental,
            scope,
            DocumentType::SYNC_ORDER.to_vec(),
        )
        .await
    }

    async fn start_job(
        &self,
        job_type: IngestionJobType,
        scope: SyncScope,
        mut entity_types: Vec<DocumentType>,
    ) -> Result<IngestionJob> {
        if scope.organization_id.trim().is_empty() {
            return Err(Error::InvalidInput("organization id is required".to_string()));
        }
        let mut seen = Vec::with_capacity(entity_types.len());
        entity_types.retain(|t| {
            let first = !seen.contains(t);
            seen.push(*t);
            first
        });
        if entity_types.is_empty() {
            return Err(Error::InvalidInput("no entity types to sync".to_string()));
        }
        if let Some(unsupported) = entity_types
            .iter()
            .find(|t| !self.inner.syncers.supports(**t))
        {
            return Err(Error::InvalidInput(format!(
                "no syncer registered for {}",
                unsupported
            )));
        }

        if self
            .inner
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::Job("Ingestion job already running".to_string()));
        }
        let guard = RunningGuard(self.inner.clone());

        let job = IngestionJob::new(job_type, scope, entity_types);
        let token = CancelToken::new();
        self.persist(&job).await;

        info!(
            subsystem = "ingestion",
            component = "pipeline",
            op = "start_job",
            job_id = %job.id,
            job_type = %job.job_type,
            organization_id = %job.scope.organization_id,
            input_count = job.entity_types.len(),
            "Ingestion job queued"
        );

        // The task waits on this lock before touching state, so the handle
        // is always stored before the job can finish.
        let mut state = self.inner.state.write().await;
        state.current = Some(job.clone());
        state.cancel = Some(token.clone());
        let pipeline = self.clone();
        let pending = job.clone();
        state.task = Some(tokio::spawn(async move {
            pipeline.run_job(job, token, guard).await;
        }));

        Ok(pending)
    }

    // =========================================================================
    // EXECUTION
    // =========================================================================

    #[instrument(skip_all, fields(subsystem = "ingestion", component = "pipeline", op = "run_job", job_id = %job.id))]
    async fn run_job(&self, mut job: IngestionJob, token: CancelToken, _guard: RunningGuard) {
        let start = Instant::now();
        let ctx = OperationContext::with_timeout(self.inner.config.job_timeout).with_token(token);

        job.start();
        self.publish(&job).await;
        self.persist(&job).await;
        self.emit(IngestionEvent::JobStarted {
            job_id: job.id,
            job_type: job.job_type,
        });
        info!(job_type = %job.job_type, "Ingestion job started");

        match self.execute(&mut job, &ctx).await {
            Ok(()) => {
                job.complete();
                info!(
                    total_processed = job.stats.total_processed,
                    successful = job.stats.successful,
                    failed = job.stats.failed,
                    skipped = job.stats.skipped,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Ingestion job completed"
                );
            }
            Err(e) => {
                let message = match &e {
                    Error::Cancelled(_) => CANCELLED_ERROR.to_string(),
                    other => other.to_string(),
                };
                job.fail(message);
                error!(
                    error = %e,
                    total_processed = job.stats.total_processed,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Ingestion job failed"
                );
            }
        }

        self.finish(&job).await;
        self.persist(&job).await;
        let event = match &job.error {
            None => IngestionEvent::JobCompleted {
                job_id: job.id,
                stats: job.stats,
            },
            Some(error) => IngestionEvent::JobFailed {
                job_id: job.id,
                error: error.clone(),
            },
        };
        self.emit(event);
    }

    /// Sync each entity type in order. Only interruption aborts the job.
    async fn execute(&self, job: &mut IngestionJob, ctx: &OperationContext) -> Result<()> {
        let mut tally = RecordTally::new();

        for entity_type in job.entity_types.clone() {
            ctx.check("ingestion job")?;

            let mut entity = RecordTally::new();
            let outcome = self
                .sync_entity(entity_type, &job.scope, ctx, &mut entity)
                .await;
            let entity_stats = entity.stats();
            tally.absorb(entity);
            job.stats = tally.stats();
            outcome?;

            debug!(
                entity_type = %entity_type,
                successful = entity_stats.successful,
                failed = entity_stats.failed,
                skipped = entity_stats.skipped,
                "Entity type synced"
            );
            self.publish(job).await;
            self.emit(IngestionEvent::EntityCompleted {
                job_id: job.id,
                entity_type,
                stats: entity_stats,
            });
        }

        for failure in tally.failures() {
            debug!(document_id = %failure.id, error = %failure.error, "Record not ingested");
        }
        Ok(())
    }

    async fn sync_entity(
        &self,
        entity_type: DocumentType,
        scope: &SyncScope,
        ctx: &OperationContext,
        tally: &mut RecordTally,
    ) -> Result<()> {
        let Some(syncer) = self.inner.syncers.get(entity_type) else {
            tally.failure(
                entity_type.as_str(),
                &Error::Job(format!("no syncer registered for {}", entity_type)),
            );
            return Ok(());
        };

        let docs = match ctx.run("load entities", syncer.load(scope)).await {
            Ok(docs) => docs,
            Err(e) => {
                ctx.check("ingestion job")?;
                error!(entity_type = %entity_type, error = %e, "Failed to load entity type");
                tally.failure(entity_type.as_str(), &e);
                return Ok(());
            }
        };

        for doc in docs {
            if !in_scope(&doc, scope) {
                tally.skip();
                continue;
            }
            let id = doc.id.clone();
            match self.inner.store.store_document_with_context(doc, ctx).await {
                Ok(()) => tally.success(),
                Err(e) => {
                    ctx.check("ingestion job")?;
                    warn!(document_id = %id, error = %e, "Failed to ingest record");
                    tally.failure(id, &e);
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // STATE
    // =========================================================================

    async fn publish(&self, job: &IngestionJob) {
        self.inner.state.write().await.current = Some(job.clone());
    }

    async fn finish(&self, job: &IngestionJob) {
        let mut state = self.inner.state.write().await;
        state.current = Some(job.clone());
        state.cancel = None;
        state.history.push_front(job.clone());
        state.history.truncate(self.inner.config.history_limit);
    }

    /// Best-effort write to the job record store.
    async fn persist(&self, job: &IngestionJob) {
        if let Some(jobs) = &self.inner.jobs {
            if let Err(e) = jobs.save(job).await {
                warn!(
                    subsystem = "ingestion",
                    component = "pipeline",
                    job_id = %job.id,
                    error = %e,
                    "Failed to persist ingestion job"
                );
            }
        }
    }

    fn emit(&self, event: IngestionEvent) {
        // No subscribers is fine.
        let _ = self.inner.event_tx.send(event);
    }

    // =========================================================================
    // QUERIES AND CONTROL
    // =========================================================================

    /// The running job, or the most recently finished one.
    pub async fn get_current_job(&self) -> Option<IngestionJob> {
        self.inner.state.read().await.current.clone()
    }

    /// True while a job is executing.
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Look a job up in memory, then in the job record store.
    pub async fn get_job(&self, id: Uuid) -> Result<Option<IngestionJob>> {
        {
            let state = self.inner.state.read().await;
            if let Some(job) = state.current.iter().chain(state.history.iter()).find(|j| j.id == id) {
                return Ok(Some(job.clone()));
            }
        }
        match &self.inner.jobs {
            Some(jobs) => jobs.get(id).await,
            None => Ok(None),
        }
    }

    /// Most recent jobs first, from the job record store when configured.
    pub async fn recent_jobs(&self, limit: usize) -> Result<Vec<IngestionJob>> {
        if let Some(jobs) = &self.inner.jobs {
            return jobs.list_recent(limit).await;
        }
        let state = self.inner.state.read().await;
        let mut recent: Vec<IngestionJob> = Vec::with_capacity(limit);
        if let Some(current) = state.current.as_ref().filter(|j| !j.status.is_terminal()) {
            recent.push(current.clone());
        }
        recent.extend(state.history.iter().cloned());
        recent.truncate(limit);
        Ok(recent)
    }

    /// Signal the running job to stop. Returns false when nothing runs.
    pub async fn cancel_current_job(&self) -> bool {
        let state = self.inner.state.read().await;
        match &state.cancel {
            Some(token) => {
                info!(
                    subsystem = "ingestion",
                    component = "pipeline",
                    op = "cancel_job",
                    "Cancelling ingestion job"
                );
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Wait until the current job task ends and return the job.
    pub async fn wait_for_current_job(&self) -> Option<IngestionJob> {
        let task = self.inner.state.write().await.task.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!(
                    subsystem = "ingestion",
                    component = "pipeline",
                    error = %e,
                    "Ingestion task aborted"
                );
            }
        }
        self.get_current_job().await
    }

    /// Receive job lifecycle events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<IngestionEvent> {
        self.inner.event_tx.subscribe()
    }
}

/// Whether a loaded document belongs to the job's scope.
///
/// Incremental jobs skip records not updated since the cutoff. A user scope
/// skips records owned by someone else; unowned records stay in scope.
fn in_scope(doc: &Document, scope: &SyncScope) -> bool {
    if !scope.includes(doc.metadata.updated_at) {
        return false;
    }
    match (&scope.user_id, &doc.metadata.owner_user_id) {
        (Some(user), Some(owner)) => user == owner,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn test_in_scope() {
        let now = Utc::now();
        let doc = Document::new(DocumentType::Task, "1", "org", "x")
            .with_owner(Some("u1".into()))
            .with_timestamps(now, now);

        assert!(in_scope(&doc, &SyncScope::new("org")));
        assert!(in_scope(
            &doc,
            &SyncScope::new("org").with_since(now - ChronoDuration::hours(1))
        ));
        assert!(!in_scope(
            &doc,
            &SyncScope::new("org").with_since(now + ChronoDuration::hours(1))
        ));
        assert!(in_scope(&doc, &SyncScope::new("org").with_user(Some("u1".into()))));
        assert!(!in_scope(&doc, &SyncScope::new("org").with_user(Some("u2".into()))));

        let unowned = Document::new(DocumentType::Knowledge, "2", "org", "y");
        assert!(in_scope(&unowned, &SyncScope::new("org").with_user(Some("u2".into()))));
    }

    #[test]
    fn test_config_builders() {
        let config = PipelineConfig::default()
            .with_job_timeout(Duration::from_secs(5))
            .with_communication_limit(20)
            .with_history_limit(0);
        assert_eq!(config.job_timeout, Duration::from_secs(5));
        assert_eq!(config.communication_limit, 20);
        assert_eq!(config.history_limit, 1);
    }
}
