//! Ingestion job record repository.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use mnemos_core::{
    DocumentType, Error, IngestionJob, IngestionJobRepository, JobStats, Result, SyncScope,
};

/// PostgreSQL implementation of IngestionJobRepository.
pub struct PgIngestionJobRepository {
    pool: Pool<Postgres>,
}

impl PgIngestionJobRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_job_row(row: sqlx::postgres::PgRow) -> Result<IngestionJob> {
        let job_type: String = row.get("job_type");
        let status: String = row.get("status");
        let entity_types: Vec<String> = row.get("entity_types");

        Ok(IngestionJob {
            id: row.get("id"),
            job_type: job_type.parse().map_err(Error::Internal)?,
            status: status.parse().map_err(Error::Internal)?,
            scope: SyncScope {
                organization_id: row.get("organization_id"),
                user_id: row.get("user_id"),
                since: row.get("since"),
            },
            entity_types: entity_types
                .iter()
                .map(|t| t.parse::<DocumentType>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(Error::Internal)?,
            stats: JobStats {
                total_processed: row.get::<i64, _>("total_processed") as u64,
                successful: row.get::<i64, _>("successful") as u64,
                failed: row.get::<i64, _>("failed") as u64,
                skipped: row.get::<i64, _>("skipped") as u64,
            },
            created_at: row.get("created_at"),
            started_at: row.get("started_at"),
            completed_at: row.get("completed_at"),
            error: row.get("error_message"),
        })
    }
}

const JOB_COLUMNS: &str = "id, job_type, status, organization_id, user_id, since, entity_types, \
     total_processed, successful, failed, skipped, error_message, created_at, started_at, completed_at";

#[async_trait]
impl IngestionJobRepository for PgIngestionJobRepository {
    async fn save(&self, job: &IngestionJob) -> Result<()> {
        let entity_types: Vec<String> = job.entity_types.iter().map(|t| t.to_string()).collect();
        sqlx::query(
            "INSERT INTO ingestion_job
                 (id, job_type, status, organization_id, user_id, since, entity_types,
                  total_processed, successful, failed, skipped, error_message,
                  created_at, started_at, completed_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
             ON CONFLICT (id) DO UPDATE SET
                 status = EXCLUDED.status,
                 total_processed = EXCLUDED.total_processed,
                 successful = EXCLUDED.successful,
                 failed = EXCLUDED.failed,
                 skipped = EXCLUDED.skipped,
                 error_message = EXCLUDED.error_message,
                 started_at = EXCLUDED.started_at,
                 completed_at = EXCLUDED.completed_at",
        )
        .bind(job.id)
        .bind(job.job_type.as_str())
        .bind(job.status.as_str())
        .bind(&job.scope.organization_id)
        .bind(&job.scope.user_id)
        .bind(job.scope.since)
        .bind(&entity_types)
        .bind(job.stats.total_processed as i64)
        .bind(job.stats.successful as i64)
        .bind(job.stats.failed as i64)
        .bind(job.stats.skipped as i64)
        .bind(&job.error)
        .bind(job.created_at)
        .bind(job.started_at)
        .bind(job.completed_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<IngestionJob>> {
        let sql = format!("SELECT {} FROM ingestion_job WHERE id = $1", JOB_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.map(Self::parse_job_row).transpose()
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<IngestionJob>> {
        let sql = format!(
            "SELECT {} FROM ingestion_job ORDER BY created_at DESC LIMIT $1",
            JOB_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        rows.into_iter().map(Self::parse_job_row).collect()
    }
}
