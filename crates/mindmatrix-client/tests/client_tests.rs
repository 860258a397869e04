use mindmatrix_client::{
    ChatKind, ChatRequest, ClientError, HttpClient, Message, MindMatrixClient, RerankerClient,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_chat_completion_returns_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mm/v1/agent/chat/completions"))
        .and(header("api-key", "k1"))
        .and(body_partial_json(json!({ "model": "chatter", "stream": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "chat.completion",
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": "hello" } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = MindMatrixClient::new(server.uri()).with_api_key("k1");
    let reply = client
        .chat_completion(ChatRequest::new("chatter", vec![Message::user("hi")]))
        .await
        .unwrap();
    assert_eq!(reply["choices"][0]["message"]["content"], "hello");
}

#[tokio::test]
async fn test_streaming_chat_uses_sse_route() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mm/v1/sse/workflow/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("event: stream\ndata: {\"delta\":\"hi\"}\n\n", "text/event-stream"),
        )
        .mount(&server)
        .await;

    let client = MindMatrixClient::new(server.uri());
    let body = client
        .chat_completion(
            ChatRequest::new("flow", vec![Message::user("hi")])
                .kind(ChatKind::Workflow)
                .stream(true),
        )
        .await
        .unwrap();
    assert!(body.as_str().unwrap().contains("event: stream"));
}

#[tokio::test]
async fn test_non_200_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/mm/v1/memory/u1/memories/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "error": "Not found" })))
        .mount(&server)
        .await;

    let client = MindMatrixClient::new(server.uri());
    let err = client.delete_memory("u1", "missing").await.unwrap_err();
    assert!(matches!(err, ClientError::Api { status: Some(404), .. }));
}

#[tokio::test]
async fn test_memory_roundtrip_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mm/v1/memory/u1/memories"))
        .and(body_partial_json(json!({ "memory": "likes tea", "topics": ["drinks"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "memory_id": "m1", "memory": "likes tea", "topics": ["drinks"]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/mm/v1/memory/u1/memories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "memory_id": "m1", "memory": "likes tea", "topics": ["drinks"] }
        ])))
        .mount(&server)
        .await;

    let client = MindMatrixClient::new(server.uri());
    let created = client
        .add_memory("u1", "likes tea", &["drinks".to_string()])
        .await
        .unwrap();
    assert_eq!(created["memory_id"], "m1");

    let memories = client.get_memories("u1").await.unwrap();
    assert_eq!(memories.len(), 1);
}

#[tokio::test]
async fn test_http_client_reports_status_without_raising() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/text"))
        .respond_with(ResponseTemplate::new(200).set_body_string("plain"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/boom"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let http = HttpClient::new(Some(server.uri()));

    let ok = http.get("/text", &[]).await;
    assert_eq!(ok.status, Some(200));
    assert_eq!(ok.data, Some(json!("plain")));

    let failed = http.get("/boom", &[]).await;
    assert_eq!(failed.status, Some(503));
    assert!(failed.data.is_none());
    assert!(failed.error.is_some());
}

#[tokio::test]
async fn test_rerank_returns_results() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rerank"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({ "model": "bge", "query": "Apple" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{ "index": 0, "relevance_score": 0.9 }]
        })))
        .mount(&server)
        .await;

    let client = RerankerClient::with_base_url(server.uri(), "sk-test").with_model("bge");
    let results = client
        .rerank("Apple", &["apple".to_string(), "banana".to_string()])
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["index"], 0);
}

#[tokio::test]
async fn test_score_error_is_reranker_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/score"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = RerankerClient::with_base_url(server.uri(), "sk-test");
    let err = client
        .score("Find fruit", &["q".to_string()], &["d".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Reranker { status: Some(500), .. }));
}
