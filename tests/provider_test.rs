//! Model backends against mock HTTP servers.

use fibagent::provider::*;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gemini(server: &MockServer) -> GeminiBackend {
    GeminiBackend::new("gemini-2.5-flash", "test-key").with_base_url(server.uri())
}

#[tokio::test]
async fn gemini_generate_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "contents": [{ "role": "user", "parts": [{ "text": "Quants crèdits té IA?" }] }],
            "systemInstruction": { "parts": [{ "text": "Be brief" }] }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "6 crèdits." }] },
                "finishReason": "STOP"
            }],
            "usageMetadata": { "promptTokenCount": 12, "candidatesTokenCount": 4 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = GenerateRequest::prompt("Quants crèdits té IA?").with_system_prompt("Be brief");
    let reply = gemini(&server)
        .generate(request, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(reply.content, "6 crèdits.");
}

#[tokio::test]
async fn gemini_status_codes_are_classified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "3"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
        .mount(&server)
        .await;

    let backend = gemini(&server);
    let first = backend
        .generate(GenerateRequest::prompt("hi"), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(
        matches!(first, ProviderError::RateLimited { retry_after_ms: Some(3000) }),
        "{:?}",
        first
    );

    let second = backend
        .generate(GenerateRequest::prompt("hi"), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(second, ProviderError::Auth(_)), "{:?}", second);
}

#[tokio::test]
async fn local_backend_chat_completions() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({ "model": "qwen2.5-7b", "stream": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": "Hola!" },
                "finish_reason": "stop"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let spec = ModelSpec::local("qwen2.5-7b", format!("{}/v1", server.uri()));
    let backend = ModelRegistry::default()
        .build(&spec, &BackendSettings::default())
        .unwrap();
    let reply = backend
        .generate(GenerateRequest::prompt("Hola"), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(reply.content, "Hola!");
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "ok" } }]
        })))
        .mount(&server)
        .await;

    let backend = LocalBackend::new("llama3", server.uri());
    let retry = fibagent::RetryConfig {
        max_retries: 1,
        initial_delay_ms: 1,
        backoff_multiplier: 1.0,
        max_delay_ms: 5,
    };
    let reply = generate_with_retry(
        &backend,
        GenerateRequest::prompt("hi"),
        &retry,
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(reply.content, "ok");
}
