//! Persistent cache tier backed by PostgreSQL.
//!
//! Entries live in `cache_entry`; `cache_entry_tag` indexes them by tag so tag
//! invalidation never scans values. Tag rows cascade on entry deletion.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};

use mnemos_core::{CacheEntry, CacheRepository, Error, Result};

/// PostgreSQL implementation of CacheRepository.
pub struct PgCacheRepository {
    pool: Pool<Postgres>,
}

impl PgCacheRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_entry_row(row: sqlx::postgres::PgRow) -> CacheEntry {
        CacheEntry {
            key: row.get("key"),
            namespace: row.get("namespace"),
            value: row.get("value"),
            compressed: row.get("compressed"),
            original_size: row.get::<i64, _>("original_size") as usize,
            size: row.get::<i64, _>("size") as usize,
            tags: row.get("tags"),
            created_at: row.get("created_at"),
            expires_at: row.get("expires_at"),
            hit_count: row.get::<i64, _>("hit_count") as u64,
            last_hit: row.get("last_hit"),
        }
    }
}

#[async_trait]
impl CacheRepository for PgCacheRepository {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let row = sqlx::query(
            "SELECT key, namespace, value, compressed, original_size, size, tags,
                    created_at, expires_at, hit_count, last_hit
             FROM cache_entry WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_entry_row))
    }

    async fn put(&self, entry: &CacheEntry) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        sqlx::query(
            "INSERT INTO cache_entry
                 (key, namespace, value, compressed, original_size, size, tags,
                  created_at, expires_at, hit_count, last_hit)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             ON CONFLICT (key) DO UPDATE SET
                 namespace = EXCLUDED.namespace,
                 value = EXCLUDED.value,
                 compressed = EXCLUDED.compressed,
                 original_size = EXCLUDED.original_size,
                 size = EXCLUDED.size,
                 tags = EXCLUDED.tags,
                 created_at = EXCLUDED.created_at,
                 expires_at = EXCLUDED.expires_at,
                 hit_count = EXCLUDED.hit_count,
                 last_hit = EXCLUDED.last_hit",
        )
        .bind(&entry.key)
        .bind(&entry.namespace)
        .bind(&entry.value)
        .bind(entry.compressed)
        .bind(entry.original_size as i64)
        .bind(entry.size as i64)
        .bind(&entry.tags)
        .bind(entry.created_at)
        .bind(entry.expires_at)
        .bind(entry.hit_count as i64)
        .bind(entry.last_hit)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        sqlx::query("DELETE FROM cache_entry_tag WHERE key = $1")
            .bind(&entry.key)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        if !entry.tags.is_empty() {
            sqlx::query(
                "INSERT INTO cache_entry_tag (tag, key)
                 SELECT DISTINCT t, $2 FROM UNNEST($1::text[]) AS t
                 ON CONFLICT DO NOTHING",
            )
            .bind(&entry.tags)
            .bind(&entry.key)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cache_entry WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_hit(&self, key: &str, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE cache_entry SET hit_count = hit_count + 1, last_hit = $2 WHERE key = $1",
        )
        .bind(key)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<Vec<String>> {
        let keys: Vec<String> =
            sqlx::query_scalar("DELETE FROM cache_entry WHERE namespace = $1 RETURNING key")
                .bind(namespace)
                .fetch_all(&self.pool)
                .await
                .map_err(Error::Database)?;
        Ok(keys)
    }

    async fn delete_by_tags(&self, tags: &[String]) -> Result<Vec<String>> {
        if tags.is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<String> = sqlx::query_scalar(
            "DELETE FROM cache_entry
             WHERE key IN (SELECT key FROM cache_entry_tag WHERE tag = ANY($1))
             RETURNING key",
        )
        .bind(tags)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(keys)
    }

    async fn list_keys(&self, namespace: Option<&str>) -> Result<Vec<String>> {
        let keys: Vec<String> = sqlx::query_scalar(
            "SELECT key FROM cache_entry WHERE ($1::text IS NULL OR namespace = $1) ORDER BY key",
        )
        .bind(namespace)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(keys)
    }

    async fn delete_many(&self, keys: &[String]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM cache_entry WHERE key = ANY($1)")
            .bind(keys)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cache_entry WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }
}
