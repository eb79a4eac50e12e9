use std::time::Duration;

use diffscribe_core::{DiffscribeError, LlmConfig};
use diffscribe_review::backend::CompletionBackend;
use diffscribe_review::llm::{ChatMessage, LlmClient};
use diffscribe_review::retry::RetryPolicy;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": text },
            "finish_reason": "stop"
        }]
    }))
}

fn client(server: &MockServer, max_retries: u32) -> LlmClient {
    let config = LlmConfig {
        base_url: Some(server.uri()),
        ..LlmConfig::default()
    };
    LlmClient::new(&config, "sk-test", RetryPolicy::new(max_retries, Duration::ZERO)).unwrap()
}

#[tokio::test]
async fn sends_expected_request_and_trims_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "max_tokens": 400,
            "messages": [{ "role": "user", "content": "explain" }]
        })))
        .respond_with(completion("  Adds a helper.\n"))
        .expect(1)
        .mount(&server)
        .await;

    let reply = client(&server, 3)
        .chat(&[ChatMessage::user("explain")])
        .await
        .unwrap();

    assert_eq!(reply, "Adds a helper.");
}

#[tokio::test]
async fn rate_limit_then_success_returns_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(completion("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let llm = client(&server, 3);
    let reply = llm.complete(&[ChatMessage::user("x")]).await.unwrap();

    assert_eq!(reply, "ok");
    assert_eq!(llm.rate_limit_retries(), 2);
}

#[tokio::test]
async fn persistent_rate_limit_is_fatal_after_max_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429))
        .expect(4)
        .mount(&server)
        .await;

    let err = client(&server, 3)
        .chat(&[ChatMessage::user("x")])
        .await
        .unwrap_err();

    assert!(matches!(err, DiffscribeError::RateLimited { attempts: 4 }));
}

#[tokio::test]
async fn server_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server, 3)
        .chat(&[ChatMessage::user("x")])
        .await
        .unwrap_err();

    match err {
        DiffscribeError::Llm(msg) => assert!(msg.contains("upstream down")),
        other => panic!("expected Llm error, got {other:?}"),
    }
}
