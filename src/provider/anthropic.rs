use super::http::build_provider_client;
use super::traits::{DispatchFuture, ProviderAdapter};
use super::types::{ChatRequest, ChatResponse, ChatRole, ProviderFailure, ProviderKind};
use reqwest::Client;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

/// Adapter for the cloud primary assistant service (Anthropic Messages API).
pub struct AnthropicAdapter {
    api_key: String,
    base_url: String,
    client: Client,
}

// ─── Wire types ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<WireMessage<'a>>,
    temperature: f64,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
}

impl AnthropicAdapter {
    pub fn new(api_key: impl Into<String>, timeout_secs: u64) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL, timeout_secs)
    }

    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: build_provider_client(timeout_secs),
        }
    }

    fn build_request<'a>(request: &'a ChatRequest) -> MessagesRequest<'a> {
        let messages = request
            .messages
            .iter()
            .filter(|m| m.role != ChatRole::System)
            .map(|m| WireMessage {
                role: match m.role {
                    ChatRole::Assistant => "assistant",
                    ChatRole::User | ChatRole::System => "user",
                },
                content: &m.content,
            })
            .collect();

        MessagesRequest {
            model: &request.model,
            max_tokens: request.max_tokens,
            system: request.system_prompt.as_deref(),
            messages,
            temperature: request.temperature,
        }
    }

    fn extract_text(response: &MessagesResponse) -> Result<String, ProviderFailure> {
        let text: String = response
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n");

        if text.is_empty() {
            return Err(ProviderFailure::new(
                ProviderKind::Anthropic,
                super::types::ProviderFailureKind::InvalidResponse,
                "response contained no text content",
            ));
        }
        Ok(text)
    }
}

impl ProviderAdapter for AnthropicAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn dispatch<'a>(&'a self, request: &'a ChatRequest) -> DispatchFuture<'a> {
        Box::pin(async move {
            let url = format!("{}/v1/messages", self.base_url);
            let body = Self::build_request(request);

            let response = self
                .client
                .post(&url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", API_VERSION)
                .json(&body)
                .send()
                .await
                .map_err(|e| ProviderFailure::from_transport(ProviderKind::Anthropic, &e))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ProviderFailure::from_status(
                    ProviderKind::Anthropic,
                    status,
                    &body,
                ));
            }

            let parsed: MessagesResponse = response.json().await.map_err(|e| {
                ProviderFailure::from_transport(ProviderKind::Anthropic, &e)
            })?;

            let text = Self::extract_text(&parsed)?;
            let (input_tokens, output_tokens) = parsed
                .usage
                .map_or((None, None), |u| (u.input_tokens, u.output_tokens));

            Ok(ChatResponse {
                text,
                model: parsed.model,
                input_tokens,
                output_tokens,
            })
        })
    }
}
