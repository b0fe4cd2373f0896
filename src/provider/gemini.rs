use super::http::build_provider_client;
use super::traits::{DispatchFuture, ProviderAdapter};
use super::types::{
    ChatRequest, ChatResponse, ChatRole, ProviderFailure, ProviderFailureKind, ProviderKind,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Adapter for the secondary cloud vision/text service (Gemini
/// `generateContent` API).
pub struct GeminiAdapter {
    api_key: String,
    base_url: String,
    client: Client,
}

// ─── Wire types ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Option<Vec<Candidate>>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u64>,
    candidates_token_count: Option<u64>,
}

impl GeminiAdapter {
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

    fn model_path(model: &str) -> String {
        if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{model}")
        }
    }

    fn build_request(request: &ChatRequest) -> GenerateContentRequest {
        let system_instruction = request.system_prompt.as_deref().map(|sys| Content {
            role: None,
            parts: vec![Part {
                text: Some(sys.to_string()),
            }],
        });

        let contents = request
            .messages
            .iter()
            .map(|m| Content {
                role: Some(
                    match m.role {
                        ChatRole::Assistant => "model",
                        ChatRole::User | ChatRole::System => "user",
                    }
                    .to_string(),
                ),
                parts: vec![Part {
                    text: Some(m.content.clone()),
                }],
            })
            .collect();

        GenerateContentRequest {
            contents,
            system_instruction,
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        }
    }

    fn extract_text(response: &GenerateContentResponse) -> Result<String, ProviderFailure> {
        let text = response
            .candidates
            .as_ref()
            .and_then(|c| c.first())
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(ProviderFailure::new(
                ProviderKind::Gemini,
                ProviderFailureKind::InvalidResponse,
                "no candidates in response",
            ));
        }
        Ok(text)
    }
}

impl ProviderAdapter for GeminiAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn dispatch<'a>(&'a self, request: &'a ChatRequest) -> DispatchFuture<'a> {
        Box::pin(async move {
            let url = format!(
                "{}/v1beta/{}:generateContent",
                self.base_url,
                Self::model_path(&request.model)
            );
            let body = Self::build_request(request);

            let response = self
                .client
                .post(&url)
                .query(&[("key", self.api_key.as_str())])
                .json(&body)
                .send()
                .await
                .map_err(|e| ProviderFailure::from_transport(ProviderKind::Gemini, &e))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ProviderFailure::from_status(
                    ProviderKind::Gemini,
                    status,
                    &body,
                ));
            }

            let parsed: GenerateContentResponse = response
                .json()
                .await
                .map_err(|e| ProviderFailure::from_transport(ProviderKind::Gemini, &e))?;

            let text = Self::extract_text(&parsed)?;
            let (input_tokens, output_tokens) = parsed.usage_metadata.map_or((None, None), |u| {
                (u.prompt_token_count, u.candidates_token_count)
            });

            Ok(ChatResponse {
                text,
                model: parsed.model_version,
                input_tokens,
                output_tokens,
            })
        })
    }
}
