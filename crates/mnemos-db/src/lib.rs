//! # mnemos-db
//!
//! PostgreSQL persistence layer for mnemos.
//!
//! This crate provides:
//! - Connection pool management
//! - The vector document store (`vector_document`) with pgvector similarity
//! - The persistent cache tier (`cache_entry` + `cache_entry_tag`)
//! - Ingestion job records (`ingestion_job`)
//! - Read access to the business record tables
//! - In-process implementations of every repository ([`memory`])
//!
//! ## Example
//!
//! ```rust,ignore
//! use mnemos_db::Database;
//!
//! let db = Database::connect("postgres://localhost/mnemos").await?;
//! db.migrate().await?;
//! let documents = db.documents_arc();
//! ```

pub mod cache;
pub mod documents;
pub mod domain;
pub mod filter_sql;
pub mod jobs;
pub mod memory;
pub mod pool;
pub mod similarity;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

use std::sync::Arc;

// Re-export core types
pub use mnemos_core::*;

pub use cache::PgCacheRepository;
pub use documents::PgDocumentRepository;
pub use domain::PgDomainRepository;
pub use filter_sql::{DocumentFilterQueryBuilder, QueryParam};
pub use jobs::PgIngestionJobRepository;
pub use memory::{
    MemoryCacheRepository, MemoryDocumentRepository, MemoryDomainRepository, MemoryJobRepository,
};
pub use pool::{create_pool_with_config, PoolConfig};
pub use similarity::PgVectorSimilarity;

/// Combined database context with all repositories.
///
/// Repositories are held behind `Arc` so services can share them as trait
/// objects without reconnecting.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Vector document store.
    pub documents: Arc<PgDocumentRepository>,
    /// pgvector similarity search over the document store.
    pub similarity: Arc<PgVectorSimilarity>,
    /// Persistent cache tier.
    pub cache: Arc<PgCacheRepository>,
    /// Ingestion job records.
    pub jobs: Arc<PgIngestionJobRepository>,
    /// Business record tables.
    pub domain: Arc<PgDomainRepository>,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            documents: Arc::new(PgDocumentRepository::new(pool.clone())),
            similarity: Arc::new(PgVectorSimilarity::new(pool.clone())),
            cache: Arc::new(PgCacheRepository::new(pool.clone())),
            jobs: Arc::new(PgIngestionJobRepository::new(pool.clone())),
            domain: Arc::new(PgDomainRepository::new(pool.clone())),
            pool,
        }
    }

    /// Connect with pool settings read from the environment
    /// (see [`PoolConfig::from_env`]).
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool_with_config(url, PoolConfig::from_env()).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }

    pub fn documents_arc(&self) -> Arc<dyn DocumentRepository> {
        self.documents.clone()
    }

    pub fn similarity_arc(&self) -> Arc<dyn SimilaritySearch> {
        self.similarity.clone()
    }

    pub fn cache_arc(&self) -> Arc<dyn CacheRepository> {
        self.cache.clone()
    }

    pub fn jobs_arc(&self) -> Arc<dyn IngestionJobRepository> {
        self.jobs.clone()
    }

    pub fn domain_arc(&self) -> Arc<dyn DomainRepository> {
        self.domain.clone()
    }
}
