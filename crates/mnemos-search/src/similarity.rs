//! Brute-force similarity search over a document repository.
//!
//! Every candidate matching the filter is loaded and scored in process, so
//! cost grows linearly with the number of documents in scope. Swap in an
//! index-backed [`SimilaritySearch`] (such as `mnemos_db::PgVectorSimilarity`)
//! when that becomes the bottleneck.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, trace};

use mnemos_core::{
    DocumentFilter, DocumentRepository, Result, ScoredDocument, SimilaritySearch, Vector,
};

use crate::cosine::cosine_similarity;

/// Linear scan similarity over any [`DocumentRepository`].
pub struct BruteForceSimilarity {
    documents: Arc<dyn DocumentRepository>,
}

impl BruteForceSimilarity {
    pub fn new(documents: Arc<dyn DocumentRepository>) -> Self {
        Self { documents }
    }
}

#[async_trait]
impl SimilaritySearch for BruteForceSimilarity {
    async fn nearest(
        &self,
        query: &Vector,
        filter: &DocumentFilter,
        threshold: f32,
    ) -> Result<Vec<ScoredDocument>> {
        let candidates = self.documents.fetch_candidates(filter).await?;
        let candidate_count = candidates.len();
        let query = query.as_slice();

        let hits: Vec<ScoredDocument> = candidates
            .into_iter()
            .filter_map(|candidate| {
                let similarity = cosine_similarity(query, candidate.embedding.as_slice());
                trace!(
                    document_id = %candidate.document.id,
                    similarity,
                    "Scored candidate"
                );
                (similarity >= threshold).then(|| ScoredDocument {
                    document: candidate.document,
                    similarity,
                })
            })
            .collect();

        debug!(
            subsystem = "vector",
            component = "brute_force",
            candidate_count,
            result_count = hits.len(),
            threshold,
            "Similarity scan complete"
        );
        Ok(hits)
    }

    fn name(&self) -> &'static str {
        "brute_force"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemos_core::DocumentType;
    use mnemos_db::memory::MemoryDocumentRepository;
    use mnemos_db::test_fixtures::embedded_document;

    #[tokio::test]
    async fn test_threshold_and_scope() {
        let repo = Arc::new(MemoryDocumentRepository::new());
        for doc in [
            embedded_document(DocumentType::Task, "same", "org-a", [1.0, 0.0, 0.0]),
            embedded_document(DocumentType::Task, "near", "org-a", [0.9, 0.1, 0.0]),
            embedded_document(DocumentType::Task, "far", "org-a", [0.0, 1.0, 0.0]),
            embedded_document(DocumentType::Task, "other", "org-b", [1.0, 0.0, 0.0]),
        ] {
            repo.upsert(&doc).await.unwrap();
        }

        let search = BruteForceSimilarity::new(repo);
        let query = Vector::from(vec![1.0, 0.0, 0.0]);
        let mut hits = search
            .nearest(&query, &DocumentFilter::for_organization("org-a"), 0.5)
            .await
            .unwrap();
        hits.sort_by(|a, b| a.document.id.cmp(&b.document.id));

        let ids: Vec<&str> = hits.iter().map(|h| h.document.id.as_str()).collect();
        assert_eq!(ids, vec!["task_near", "task_same"]);
        assert!(hits.iter().all(|h| h.similarity >= 0.5));
    }

    #[tokio::test]
    async fn test_excluded_ids_never_returned() {
        let repo = Arc::new(MemoryDocumentRepository::new());
        repo.upsert(&embedded_document(DocumentType::Deal, "1", "org", [1.0, 0.0, 0.0]))
            .await
            .unwrap();

        let search = BruteForceSimilarity::new(repo);
        let filter = DocumentFilter::for_organization("org").excluding("deal_1");
        let hits = search
            .nearest(&Vector::from(vec![1.0, 0.0, 0.0]), &filter, 0.0)
            .await
            .unwrap();
        assert!(hits.is_empty());
        assert_eq!(search.name(), "brute_force");
    }
}
