//! Vector document repository implementation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use tracing::trace;

use mnemos_core::{
    clamp_importance, Document, DocumentCounts, DocumentFilter, DocumentMetadata, DocumentRepository,
    DocumentType, EmbeddedDocument, Error, Result,
};

use crate::filter_sql::DocumentFilterQueryBuilder;

/// Columns selected for a full document row.
pub(crate) const DOCUMENT_COLUMNS: &str = "d.id, d.doc_type, d.entity_id, d.owner_user_id, \
     d.organization_id, d.source, d.tags, d.importance, d.content, d.created_at, d.updated_at";

/// PostgreSQL implementation of DocumentRepository.
pub struct PgDocumentRepository {
    pool: Pool<Postgres>,
}

impl PgDocumentRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Map a row selected with [`DOCUMENT_COLUMNS`] to a document.
    pub(crate) fn parse_document_row(row: &sqlx::postgres::PgRow) -> Result<Document> {
        let type_str: String = row.get("doc_type");
        let doc_type: DocumentType = type_str.parse().map_err(Error::Internal)?;
        let importance: i16 = row.get("importance");

        Ok(Document {
            id: row.get("id"),
            content: row.get("content"),
            metadata: DocumentMetadata {
                doc_type,
                entity_id: row.get("entity_id"),
                owner_user_id: row.get("owner_user_id"),
                organization_id: row.get("organization_id"),
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
                source: row.get("source"),
                tags: row.get("tags"),
                importance: clamp_importance(importance as i32),
            },
        })
    }
}

#[async_trait]
impl DocumentRepository for PgDocumentRepository {
    async fn upsert(&self, doc: &EmbeddedDocument) -> Result<()> {
        let d = &doc.document;
        let m = &d.metadata;
        sqlx::query(
            "INSERT INTO vector_document
                 (id, doc_type, entity_id, owner_user_id, organization_id, source, tags,
                  importance, content, embedding, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             ON CONFLICT (id) DO UPDATE SET
                 doc_type = EXCLUDED.doc_type,
                 entity_id = EXCLUDED.entity_id,
                 owner_user_id = EXCLUDED.owner_user_id,
                 organization_id = EXCLUDED.organization_id,
                 source = EXCLUDED.source,
                 tags = EXCLUDED.tags,
                 importance = EXCLUDED.importance,
                 content = EXCLUDED.content,
                 embedding = EXCLUDED.embedding,
                 created_at = EXCLUDED.created_at,
                 updated_at = EXCLUDED.updated_at",
        )
        .bind(&d.id)
        .bind(m.doc_type.as_str())
        .bind(&m.entity_id)
        .bind(&m.owner_user_id)
        .bind(&m.organization_id)
        .bind(&m.source)
        .bind(&m.tags)
        .bind(m.importance as i16)
        .bind(&d.content)
        .bind(&doc.embedding)
        .bind(m.created_at)
        .bind(m.updated_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        trace!(document_id = %d.id, "Upserted vector document");
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<EmbeddedDocument>> {
        let sql = format!(
            "SELECT {}, d.embedding FROM vector_document d WHERE d.id = $1",
            DOCUMENT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        row.map(|row| {
            Ok(EmbeddedDocument {
                document: Self::parse_document_row(&row)?,
                embedding: row.get("embedding"),
            })
        })
        .transpose()
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM vector_document WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn fetch_candidates(&self, filter: &DocumentFilter) -> Result<Vec<EmbeddedDocument>> {
        let (clause, params) = DocumentFilterQueryBuilder::new(filter, 0).build();
        let sql = format!(
            "SELECT {}, d.embedding FROM vector_document d WHERE {}",
            DOCUMENT_COLUMNS, clause
        );

        let mut q = sqlx::query(&sql);
        for param in &params {
            q = param.bind(q);
        }
        let rows = q.fetch_all(&self.pool).await.map_err(Error::Database)?;

        rows.iter()
            .map(|row| {
                Ok(EmbeddedDocument {
                    document: Self::parse_document_row(row)?,
                    embedding: row.get("embedding"),
                })
            })
            .collect()
    }

    async fn counts(&self, organization_id: Option<&str>) -> Result<DocumentCounts> {
        let rows = sqlx::query(
            "SELECT doc_type, COUNT(*) AS count, MAX(updated_at) AS last_updated
             FROM vector_document
             WHERE ($1::text IS NULL OR organization_id = $1)
             GROUP BY doc_type",
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let mut by_type = BTreeMap::new();
        let mut last_updated = None;
        for row in rows {
            let type_str: String = row.get("doc_type");
            let doc_type: DocumentType = type_str.parse().map_err(Error::Internal)?;
            by_type.insert(doc_type, row.get::<i64, _>("count"));
            let updated: Option<chrono::DateTime<chrono::Utc>> = row.get("last_updated");
            last_updated = last_updated.max(updated);
        }

        Ok(DocumentCounts {
            by_type,
            last_updated,
        })
    }

    async fn embedding_dimension(&self) -> Result<Option<usize>> {
        let dim: Option<i32> =
            sqlx::query_scalar("SELECT vector_dims(embedding) FROM vector_document LIMIT 1")
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::Database)?;
        Ok(dim.map(|d| d as usize))
    }
}
