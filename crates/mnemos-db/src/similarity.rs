//! Index-backed similarity search with pgvector.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;

use mnemos_core::{DocumentFilter, Error, Result, ScoredDocument, SimilaritySearch, Vector};

use crate::documents::{PgDocumentRepository, DOCUMENT_COLUMNS};
use crate::filter_sql::DocumentFilterQueryBuilder;

/// Similarity computed inside PostgreSQL as `1 - (embedding <=> query)`.
pub struct PgVectorSimilarity {
    pool: Pool<Postgres>,
}

impl PgVectorSimilarity {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SimilaritySearch for PgVectorSimilarity {
    async fn nearest(
        &self,
        query: &Vector,
        filter: &DocumentFilter,
        threshold: f32,
    ) -> Result<Vec<ScoredDocument>> {
        // $1 is the query vector, $2 the threshold; the filter starts at $3.
        let (clause, params) = DocumentFilterQueryBuilder::new(filter, 2).build();
        let sql = format!(
            "SELECT {}, (1.0 - (d.embedding <=> $1::vector))::real AS similarity
             FROM vector_document d
             WHERE {} AND 1.0 - (d.embedding <=> $1::vector) >= $2
             ORDER BY d.embedding <=> $1::vector",
            DOCUMENT_COLUMNS, clause
        );

        let mut q = sqlx::query(&sql).bind(query).bind(threshold as f64);
        for param in &params {
            q = param.bind(q);
        }
        let rows = q.fetch_all(&self.pool).await.map_err(Error::Database)?;

        debug!(
            subsystem = "vector",
            component = "pgvector",
            op = "nearest",
            result_count = rows.len(),
            "Similarity query complete"
        );

        rows.iter()
            .map(|row| {
                Ok(ScoredDocument {
                    document: PgDocumentRepository::parse_document_row(row)?,
                    similarity: row.get::<f32, _>("similarity"),
                })
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "pgvector"
    }
}
