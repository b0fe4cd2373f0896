use super::http::build_provider_client;
use super::traits::{DispatchFuture, ProviderAdapter};
use super::types::{
    ChatRequest, ChatResponse, ChatRole, ProviderFailure, ProviderFailureKind, ProviderKind,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Adapter for the locally-hosted inference server (Ollama `/api/chat`).
/// No credential is required; the server is just another network-addressable
/// provider.
pub struct OllamaAdapter {
    base_url: String,
    client: Client,
}

// ─── Wire types ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f64,
    num_predict: u32,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    message: Option<OllamaResponseMessage>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
}

#[derive(Deserialize)]
struct OllamaResponseMessage {
    content: String,
}

impl OllamaAdapter {
    pub fn new(base_url: Option<&str>, timeout_secs: u64) -> Self {
        Self {
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            client: build_provider_client(timeout_secs),
        }
    }

    fn build_request<'a>(request: &'a ChatRequest) -> OllamaChatRequest<'a> {
        let mut messages: Vec<OllamaMessage<'a>> = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = request.system_prompt.as_deref() {
            messages.push(OllamaMessage {
                role: "system",
                content: system,
            });
        }
        for m in &request.messages {
            messages.push(OllamaMessage {
                role: match m.role {
                    ChatRole::User => "user",
                    ChatRole::Assistant => "assistant",
                    ChatRole::System => "system",
                },
                content: &m.content,
            });
        }

        OllamaChatRequest {
            model: &request.model,
            messages,
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        }
    }
}

impl ProviderAdapter for OllamaAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    fn dispatch<'a>(&'a self, request: &'a ChatRequest) -> DispatchFuture<'a> {
        Box::pin(async move {
            let url = format!("{}/api/chat", self.base_url);
            let body = Self::build_request(request);

            let response = self
                .client
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(|e| ProviderFailure::from_transport(ProviderKind::Ollama, &e))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ProviderFailure::from_status(
                    ProviderKind::Ollama,
                    status,
                    &body,
                ));
            }

            let parsed: OllamaChatResponse = response
                .json()
                .await
                .map_err(|e| ProviderFailure::from_transport(ProviderKind::Ollama, &e))?;

            let text = parsed
                .message
                .map(|m| m.content)
                .filter(|content| !content.is_empty())
                .ok_or_else(|| {
                    ProviderFailure::new(
                        ProviderKind::Ollama,
                        ProviderFailureKind::InvalidResponse,
                        "response contained no message content",
                    )
                })?;

            Ok(ChatResponse {
                text,
                model: parsed.model,
                input_tokens: parsed.prompt_eval_count,
                output_tokens: parsed.eval_count,
            })
        })
    }

    /// Ollama exposes a cheap version endpoint; probing it avoids spinning up
    /// model inference just to learn the server is reachable. Model load
    /// problems still surface through passive traffic.
    fn probe<'a>(&'a self, model: &'a str) -> DispatchFuture<'a> {
        Box::pin(async move {
            let url = format!("{}/api/version", self.base_url);
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| ProviderFailure::from_transport(ProviderKind::Ollama, &e))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ProviderFailure::from_status(
                    ProviderKind::Ollama,
                    status,
                    &body,
                ));
            }

            Ok(ChatResponse::text_only("ok".into()).with_model(model))
        })
    }
}
