//! OpenAI-compatible backend against a wiremock server.

#![cfg(feature = "openai")]

use mnemos_core::{EmbeddingBackend, Error, GenerationBackend};
use mnemos_inference::openai::{OpenAIBackend, OpenAIConfig};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> OpenAIConfig {
    OpenAIConfig::default()
        .with_base_url(server.uri())
        .with_api_key("test-key")
        .with_embed_dimension(3)
}

fn chat_reply(content: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-1",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

#[tokio::test]
async fn test_embeddings_sorted_by_index() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(header("Authorization", "Bearer test-key"))
        .and(header("Content-Type", "application/json"))
        .and(body_partial_json(serde_json::json!({
            "model": "text-embedding-3-small",
            "input": ["first", "second"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [
                {"embedding": [0.0, 1.0, 0.0], "index": 1},
                {"embedding": [1.0, 0.0, 0.0], "index": 0}
            ],
            "model": "text-embedding-3-small"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = OpenAIBackend::new(config_for(&server)).unwrap();
    let vectors = backend
        .embed_texts(&["first".to_string(), "second".to_string()])
        .await
        .expect("embedding should succeed");

    assert_eq!(vectors[0].as_slice(), &[1.0, 0.0, 0.0]);
    assert_eq!(vectors[1].as_slice(), &[0.0, 1.0, 0.0]);
}

#[tokio::test]
async fn test_embedding_count_mismatch_is_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{"embedding": [1.0, 0.0, 0.0], "index": 0}]
        })))
        .mount(&server)
        .await;

    let backend = OpenAIBackend::new(config_for(&server)).unwrap();
    let err = backend
        .embed_texts(&["a".to_string(), "b".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Embedding(_)));
}

#[tokio::test]
async fn test_auth_failure_maps_to_config_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": {"message": "Incorrect API key", "type": "invalid_request_error"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = OpenAIBackend::new(config_for(&server).with_retries(3, 1)).unwrap();
    let err = backend.embed_texts(&["x".to_string()]).await.unwrap_err();

    assert!(matches!(err, Error::Config(_)), "got {:?}", err);
    assert!(err.to_string().contains("Incorrect API key"));
}

#[tokio::test]
async fn test_server_error_not_retried_by_default() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .expect(1)
        .mount(&server)
        .await;

    let backend = OpenAIBackend::new(config_for(&server)).unwrap();
    let err = backend.generate("hello").await.unwrap_err();

    assert!(matches!(err, Error::Inference(_)));
    assert!(err.to_string().contains("Unknown error"));
}

#[tokio::test]
async fn test_rate_limit_retried_when_enabled() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
            "error": {"message": "Slow down", "type": "rate_limit_exceeded"}
        })))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply("done")))
        .expect(1)
        .mount(&server)
        .await;

    let backend = OpenAIBackend::new(config_for(&server).with_retries(2, 1)).unwrap();
    let reply = backend.generate("hello").await.expect("third attempt succeeds");
    assert_eq!(reply, "done");
}

#[tokio::test]
async fn test_system_prompt_sent_first() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(serde_json::json!({
            "model": "gpt-4o-mini",
            "messages": [
                {"role": "system", "content": "Answer in JSON."},
                {"role": "user", "content": "list tasks"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply("{}")))
        .expect(1)
        .mount(&server)
        .await;

    let backend = OpenAIBackend::new(config_for(&server)).unwrap();
    let reply = backend
        .generate_with_system("Answer in JSON.", "list tasks")
        .await
        .unwrap();
    assert_eq!(reply, "{}");
}

#[tokio::test]
async fn test_json_mode_sets_response_format() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(serde_json::json!({
            "response_format": {"type": "json_object"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply("{\"intent\":\"SEARCH\"}")))
        .expect(1)
        .mount(&server)
        .await;

    let backend = OpenAIBackend::new(config_for(&server)).unwrap();
    let reply = backend.generate_json("", "find acme").await.unwrap();
    assert!(reply.contains("SEARCH"));
}

#[tokio::test]
async fn test_local_endpoint_without_key() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply("hi")))
        .expect(1)
        .mount(&server)
        .await;

    let backend = OpenAIBackend::new(OpenAIConfig::default().with_base_url(server.uri())).unwrap();
    assert_eq!(backend.generate("hello").await.unwrap(), "hi");
}
