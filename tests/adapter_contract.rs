//! Every adapter must map its backend's errors onto exactly one failure
//! kind; these tests pin the mapping against live HTTP exchanges.

use serde_json::json;
use switchboard::provider::{AnthropicAdapter, GeminiAdapter, OllamaAdapter};
use switchboard::{ChatMessage, ChatRequest, ProviderAdapter, ProviderFailureKind};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request(model: &str) -> ChatRequest {
    ChatRequest::new(model, vec![ChatMessage::user("hello")])
}

// ─── Anthropic ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn anthropic_happy_path_parses_text_and_usage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "hi there"}],
            "model": "claude-3-5-sonnet",
            "usage": {"input_tokens": 12, "output_tokens": 4}
        })))
        .mount(&server)
        .await;

    let adapter = AnthropicAdapter::with_base_url("key", server.uri(), 5);
    let response = adapter.dispatch(&request("claude-3-5-sonnet")).await.unwrap();
    assert_eq!(response.text, "hi there");
    assert_eq!(response.model.as_deref(), Some("claude-3-5-sonnet"));
    assert_eq!(response.total_tokens(), Some(16));
}

#[tokio::test]
async fn anthropic_401_maps_to_auth_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid x-api-key"))
        .mount(&server)
        .await;

    let adapter = AnthropicAdapter::with_base_url("bad-key", server.uri(), 5);
    let failure = adapter
        .dispatch(&request("claude-3-5-sonnet"))
        .await
        .unwrap_err();
    assert_eq!(failure.kind, ProviderFailureKind::AuthRejected);
}

#[tokio::test]
async fn anthropic_429_maps_to_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let adapter = AnthropicAdapter::with_base_url("key", server.uri(), 5);
    let failure = adapter
        .dispatch(&request("claude-3-5-sonnet"))
        .await
        .unwrap_err();
    assert_eq!(failure.kind, ProviderFailureKind::RateLimited);
}

#[tokio::test]
async fn anthropic_500_maps_to_unreachable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let adapter = AnthropicAdapter::with_base_url("key", server.uri(), 5);
    let failure = adapter
        .dispatch(&request("claude-3-5-sonnet"))
        .await
        .unwrap_err();
    assert_eq!(failure.kind, ProviderFailureKind::Unreachable);
}

#[tokio::test]
async fn anthropic_garbage_body_maps_to_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let adapter = AnthropicAdapter::with_base_url("key", server.uri(), 5);
    let failure = adapter
        .dispatch(&request("claude-3-5-sonnet"))
        .await
        .unwrap_err();
    assert_eq!(failure.kind, ProviderFailureKind::InvalidResponse);
}

// ─── Gemini ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn gemini_happy_path_parses_candidates() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-pro:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [
                {"content": {"role": "model", "parts": [{"text": "bonjour"}]}}
            ],
            "usageMetadata": {"promptTokenCount": 7, "candidatesTokenCount": 2}
        })))
        .mount(&server)
        .await;

    let adapter = GeminiAdapter::with_base_url("key", server.uri(), 5);
    let response = adapter.dispatch(&request("gemini-1.5-pro")).await.unwrap();
    assert_eq!(response.text, "bonjour");
    assert_eq!(response.input_tokens, Some(7));
    assert_eq!(response.output_tokens, Some(2));
}

#[tokio::test]
async fn gemini_403_maps_to_auth_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-pro:generateContent"))
        .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
        .mount(&server)
        .await;

    let adapter = GeminiAdapter::with_base_url("bad", server.uri(), 5);
    let failure = adapter
        .dispatch(&request("gemini-1.5-pro"))
        .await
        .unwrap_err();
    assert_eq!(failure.kind, ProviderFailureKind::AuthRejected);
}

#[tokio::test]
async fn gemini_empty_candidates_maps_to_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-pro:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let adapter = GeminiAdapter::with_base_url("key", server.uri(), 5);
    let failure = adapter
        .dispatch(&request("gemini-1.5-pro"))
        .await
        .unwrap_err();
    assert_eq!(failure.kind, ProviderFailureKind::InvalidResponse);
}

// ─── Ollama ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn ollama_happy_path_parses_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "llama3.1:8b",
            "message": {"role": "assistant", "content": "hei"},
            "prompt_eval_count": 5,
            "eval_count": 1
        })))
        .mount(&server)
        .await;

    let adapter = OllamaAdapter::new(Some(&server.uri()), 5);
    let response = adapter.dispatch(&request("llama3.1:8b")).await.unwrap();
    assert_eq!(response.text, "hei");
    assert_eq!(response.model.as_deref(), Some("llama3.1:8b"));
}

#[tokio::test]
async fn ollama_probe_uses_the_version_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "0.5.0"})))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = OllamaAdapter::new(Some(&server.uri()), 5);
    adapter.probe("llama3.1:8b").await.unwrap();
}

#[tokio::test]
async fn unreachable_server_maps_to_unreachable() {
    // Nothing listens on port 1.
    let adapter = OllamaAdapter::new(Some("http://127.0.0.1:1"), 2);
    let failure = adapter.dispatch(&request("llama3.1:8b")).await.unwrap_err();
    assert_eq!(failure.kind, ProviderFailureKind::Unreachable);
}
