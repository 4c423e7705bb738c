//! VectorStore behaviour over the in-process repositories and the mock
//! embedding backend.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};

use mnemos_core::{
    CancelToken, Document, DocumentRepository, DocumentType, EmbeddedDocument, Error,
    OperationContext, SearchOptions, Vector,
};
use mnemos_db::memory::MemoryDocumentRepository;
use mnemos_inference::mock::MockInferenceBackend;
use mnemos_search::{RelevanceWeights, VectorStore, VectorStoreConfig};

const ORG: &str = "org-acme";

fn fast_config() -> VectorStoreConfig {
    VectorStoreConfig::default().with_batch(2, Duration::ZERO)
}

fn store_with(backend: MockInferenceBackend) -> (VectorStore, Arc<MemoryDocumentRepository>) {
    let repo = Arc::new(MemoryDocumentRepository::new());
    let store = VectorStore::brute_force(repo.clone(), Arc::new(backend)).with_config(fast_config());
    (store, repo)
}

fn task(entity_id: &str, content: &str) -> Document {
    Document::new(DocumentType::Task, entity_id, ORG, content)
}

#[tokio::test]
async fn test_store_document_is_idempotent() {
    let (store, repo) = store_with(MockInferenceBackend::new());

    store.store_document(task("1", "draft proposal")).await.unwrap();
    store
        .store_document(task("1", "final proposal sent"))
        .await
        .unwrap();

    assert_eq!(repo.len().await, 1);
    let stored = repo.get("task_1").await.unwrap().unwrap();
    assert_eq!(stored.document.content, "final proposal sent");
}

#[tokio::test]
async fn test_importance_breaks_equal_similarity() {
    let (store, _repo) = store_with(MockInferenceBackend::new());

    // Id order is the reverse of importance order.
    for (id, importance) in [("1", 2), ("2", 5), ("3", 9)] {
        store
            .store_document(task(id, "renew contract").with_importance(importance))
            .await
            .unwrap();
    }

    let options = SearchOptions::new(ORG).with_threshold(0.0).with_limit(3);
    let results = store.search("renew contract", &options).await.unwrap();

    let ids: Vec<&str> = results.iter().map(|r| r.document.id.as_str()).collect();
    assert_eq!(ids, vec!["task_3", "task_2", "task_1"]);
    assert!(results.iter().all(|r| (r.similarity - 1.0).abs() < 1e-5));
    assert!(results.iter().all(|r| r.relevance_score <= 1.0));
}

#[tokio::test]
async fn test_importance_raises_relevance_below_the_cap() {
    let backend = MockInferenceBackend::new().with_vector("renew contract", vec![1.0, 0.0, 0.0]);
    let (store, repo) = store_with(backend);

    let month_ago = Utc::now() - ChronoDuration::days(30);
    for (id, importance) in [("a", 2), ("c", 9)] {
        let document = task(id, "renew contract")
            .with_importance(importance)
            .with_timestamps(month_ago, month_ago);
        repo.upsert(&EmbeddedDocument {
            document,
            embedding: Vector::from(vec![0.6, 0.8, 0.0]),
        })
        .await
        .unwrap();
    }

    let options = SearchOptions::new(ORG).with_threshold(0.0).with_limit(2);
    let results = store.search("renew contract", &options).await.unwrap();

    assert_eq!(results[0].document.id, "task_c");
    assert!(results[0].relevance_score > results[1].relevance_score);
    assert!(results[0].relevance_score < 1.0);
}

#[tokio::test]
async fn test_search_results_respect_threshold_and_order() {
    let (store, _repo) = store_with(MockInferenceBackend::new());
    let docs = vec![
        task("1", "renew the Acme contract before March"),
        task("2", "Acme contract signed"),
        Document::new(DocumentType::Contact, "3", ORG, "Jane Doe, buyer at Acme"),
        Document::new(DocumentType::Knowledge, "4", ORG, "office plant watering schedule"),
        Document::new(DocumentType::Deal, "5", ORG, "Acme renewal deal, contract value 10k"),
    ];
    let report = store.store_documents(docs).await.unwrap();
    assert!(report.is_complete());

    for threshold in [0.0, 0.2, 0.4, 0.8] {
        let options = SearchOptions::new(ORG).with_threshold(threshold);
        let results = store.search("acme contract", &options).await.unwrap();
        assert!(results.iter().all(|r| r.similarity >= threshold));
        assert!(results.iter().all(|r| r.relevance_score <= 1.0));
        assert!(results
            .windows(2)
            .all(|w| w[0].relevance_score >= w[1].relevance_score));
    }
}

#[tokio::test]
async fn test_search_is_scoped_and_filtered() {
    let (store, _repo) = store_with(MockInferenceBackend::new());
    store.store_document(task("1", "acme contract")).await.unwrap();
    store
        .store_document(Document::new(DocumentType::Task, "2", "org-other", "acme contract"))
        .await
        .unwrap();
    store
        .store_document(
            Document::new(DocumentType::External, "3", ORG, "acme contract").with_source("gmail"),
        )
        .await
        .unwrap();

    let options = SearchOptions::new(ORG).with_threshold(0.0);
    let results = store.search("acme contract", &options).await.unwrap();
    let ids: Vec<&str> = results.iter().map(|r| r.document.id.as_str()).collect();
    assert_eq!(ids, vec!["task_1"]);

    let with_external = options.clone().with_external(true);
    let results = store.search("acme contract", &with_external).await.unwrap();
    assert_eq!(results.len(), 2);

    let only_gmail = with_external.with_sources(vec!["gmail".to_string()]);
    let results = store.search("acme contract", &only_gmail).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].document.metadata.doc_type, DocumentType::External);
}

#[tokio::test]
async fn test_search_validation() {
    let (store, _repo) = store_with(MockInferenceBackend::new());

    let err = store
        .search("anything", &SearchOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    let err = store
        .search("   ", &SearchOptions::new(ORG))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[tokio::test]
async fn test_store_documents_isolates_failures() {
    let backend = MockInferenceBackend::new().with_failing_input("POISON");
    let (store, repo) = store_with(backend);

    let docs = vec![
        task("1", "prepare invoice"),
        task("2", "POISON record"),
        task("3", "  "),
        task("4", "call supplier"),
        task("5", "book venue"),
    ];
    let report = store.store_documents(docs).await.unwrap();

    assert_eq!(report.stored, vec!["task_1", "task_4", "task_5"]);
    let failed: Vec<&str> = report.failed.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(failed, vec!["task_2", "task_3"]);
    assert_eq!(report.total(), 5);
    assert_eq!(repo.len().await, 3);
}

#[tokio::test(start_paused = true)]
async fn test_store_documents_waits_between_batches() {
    let repo = Arc::new(MemoryDocumentRepository::new());
    let store = VectorStore::brute_force(repo.clone(), Arc::new(MockInferenceBackend::new()))
        .with_config(VectorStoreConfig::default().with_batch(2, Duration::from_secs(1)));

    let started = tokio::time::Instant::now();
    let docs = (1..=5).map(|i| task(&i.to_string(), "follow up")).collect();
    let report = store.store_documents(docs).await.unwrap();

    assert_eq!(report.stored.len(), 5);
    // Three batches, two pauses.
    assert!(started.elapsed() >= Duration::from_secs(2));
}

#[tokio::test]
async fn test_dimension_mismatch_rejected() {
    let (store, repo) = store_with(MockInferenceBackend::new().with_dimension(8));
    repo.upsert(&EmbeddedDocument {
        document: task("1", "existing"),
        embedding: Vector::from(vec![1.0, 0.0, 0.0]),
    })
    .await
    .unwrap();

    let err = store.create_embedding("new text").await.unwrap_err();
    assert!(matches!(err, Error::Embedding(_)));
}

#[tokio::test]
async fn test_create_embedding_truncates_input() {
    let backend = MockInferenceBackend::new();
    let (store, _repo) = store_with(backend.clone());

    let long = "word ".repeat(5000);
    store.create_embedding(&long).await.unwrap();

    let calls = backend.get_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].input.chars().count(), 8000);
}

#[tokio::test]
async fn test_find_similar_excludes_source() {
    let (store, _repo) = store_with(MockInferenceBackend::new());
    store.store_document(task("1", "quarterly tax filing")).await.unwrap();
    store.store_document(task("2", "quarterly tax filing")).await.unwrap();
    store.store_document(task("3", "team lunch")).await.unwrap();

    let options = SearchOptions::new(ORG).with_threshold(0.9);
    let similar = store.find_similar("task_1", &options).await.unwrap();
    let ids: Vec<&str> = similar.iter().map(|r| r.document.id.as_str()).collect();
    assert_eq!(ids, vec!["task_2"]);

    let unknown = store.find_similar("task_404", &options).await.unwrap();
    assert!(unknown.is_empty());
}

#[tokio::test]
async fn test_delete_document() {
    let (store, _repo) = store_with(MockInferenceBackend::new());
    store.store_document(task("1", "archive files")).await.unwrap();

    assert!(store.delete_document("task_1").await.unwrap());
    assert!(!store.delete_document("task_1").await.unwrap());
}

#[tokio::test]
async fn test_stats_report_counts_and_served_similarity() {
    let (store, _repo) = store_with(MockInferenceBackend::new());
    store.store_document(task("1", "acme contract")).await.unwrap();
    store
        .store_document(Document::new(DocumentType::Deal, "2", ORG, "acme deal"))
        .await
        .unwrap();

    let stats = store.get_stats(Some(ORG)).await.unwrap();
    assert_eq!(stats.total_documents, 2);
    assert_eq!(stats.documents_by_type.get(&DocumentType::Task), Some(&1));
    assert!(stats.avg_similarity.is_none());
    assert!(stats.last_updated.is_some());

    let results = store
        .search("acme contract", &SearchOptions::new(ORG).with_threshold(0.0))
        .await
        .unwrap();
    let expected =
        results.iter().map(|r| r.similarity).sum::<f32>() / results.len() as f32;

    let stats = store.get_stats(Some(ORG)).await.unwrap();
    let avg = stats.avg_similarity.expect("average after a search");
    assert!((avg - expected).abs() < 1e-5);

    let other = store.get_stats(Some("org-other")).await.unwrap();
    assert_eq!(other.total_documents, 0);
    assert!(other.avg_similarity.is_none());
}

#[tokio::test]
async fn test_search_deadline() {
    let backend = MockInferenceBackend::new().with_latency_ms(500);
    let repo = Arc::new(MemoryDocumentRepository::new());
    let store = VectorStore::brute_force(repo, Arc::new(backend))
        .with_config(fast_config().with_search_timeout(Duration::from_millis(20)));

    let err = store
        .search("slow provider", &SearchOptions::new(ORG))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Timeout(_)));
}

#[tokio::test]
async fn test_search_cancelled() {
    let (store, _repo) = store_with(MockInferenceBackend::new());
    let token = CancelToken::new();
    token.cancel();
    let ctx = OperationContext::new().with_token(token);

    let err = store
        .search_with_context("anything", &SearchOptions::new(ORG), &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled(_)));
}

#[tokio::test]
async fn test_custom_weights_change_ranking() {
    let backend = MockInferenceBackend::new().with_vector("status update", vec![1.0, 0.0, 0.0]);
    let repo = Arc::new(MemoryDocumentRepository::new());
    let store = VectorStore::brute_force(repo.clone(), Arc::new(backend))
        .with_config(fast_config())
        .with_weights(
            RelevanceWeights::none().with_type_boost(DocumentType::Contact, 0.3),
        );

    let old = Utc::now() - ChronoDuration::days(30);
    for (doc_type, embedding) in [
        (DocumentType::Task, vec![0.7, 0.714, 0.0]),
        (DocumentType::Contact, vec![0.5, 0.866, 0.0]),
    ] {
        repo.upsert(&EmbeddedDocument {
            document: Document::new(doc_type, "1", ORG, "status update").with_timestamps(old, old),
            embedding: Vector::from(embedding),
        })
        .await
        .unwrap();
    }

    let results = store
        .search("status update", &SearchOptions::new(ORG).with_threshold(0.0))
        .await
        .unwrap();
    assert_eq!(results[0].document.id, "contact_1");
}
