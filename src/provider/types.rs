use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

// ─── Provider identity ──────────────────────────────────────────────────────

/// The backend kinds the orchestration core can route to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProviderKind {
    /// Cloud primary assistant service.
    Anthropic,
    /// Secondary cloud vision/text service.
    Gemini,
    /// Locally-hosted inference server.
    Ollama,
}

// ─── Chat request / response ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Normalized request handed to a [`ProviderAdapter`](super::ProviderAdapter).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub system_prompt: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            system_prompt: None,
            messages,
            temperature: 0.7,
            max_tokens: 4096,
        }
    }

    /// Minimal synthetic request used for health probing.
    pub fn probe(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_prompt: None,
            messages: vec![ChatMessage::user("ping")],
            temperature: 0.0,
            max_tokens: 1,
        }
    }
}

/// Normalized response returned by a [`ProviderAdapter`](super::ProviderAdapter).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub text: String,
    /// Model identifier as reported by the backend, when it reports one.
    pub model: Option<String>,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

impl ChatResponse {
    pub fn text_only(text: String) -> Self {
        Self {
            text,
            model: None,
            input_tokens: None,
            output_tokens: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn total_tokens(&self) -> Option<u64> {
        match (self.input_tokens, self.output_tokens) {
            (Some(input), Some(output)) => Some(input + output),
            _ => None,
        }
    }
}

// ─── Typed failure taxonomy ─────────────────────────────────────────────────

/// The failure classes every adapter must map its backend errors onto.
/// The health monitor's state machine keys off exactly these kinds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProviderFailureKind {
    AuthRejected,
    RateLimited,
    Unreachable,
    Timeout,
    InvalidResponse,
}

impl ProviderFailureKind {
    /// Hard failures drop a model to `unavailable` regardless of history.
    pub fn is_hard(self) -> bool {
        matches!(self, ProviderFailureKind::AuthRejected)
    }

    /// Whether an automatic fallback retry is worth attempting.
    pub fn is_retryable(self) -> bool {
        !self.is_hard()
    }
}

#[derive(Debug, Clone, Error)]
#[error("{provider} dispatch failed ({kind}): {message}")]
pub struct ProviderFailure {
    pub provider: ProviderKind,
    pub kind: ProviderFailureKind,
    pub message: String,
}

impl ProviderFailure {
    pub fn new(
        provider: ProviderKind,
        kind: ProviderFailureKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(provider: ProviderKind, elapsed_secs: u64) -> Self {
        Self::new(
            provider,
            ProviderFailureKind::Timeout,
            format!("no response within {elapsed_secs}s"),
        )
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Map a transport-level error onto the taxonomy.
    pub fn from_transport(provider: ProviderKind, err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ProviderFailureKind::Timeout
        } else if err.is_connect() {
            ProviderFailureKind::Unreachable
        } else if err.is_decode() || err.is_body() {
            ProviderFailureKind::InvalidResponse
        } else {
            ProviderFailureKind::Unreachable
        };
        Self::new(provider, kind, err.to_string())
    }

    /// Map a non-success HTTP status onto the taxonomy.
    pub fn from_status(provider: ProviderKind, status: reqwest::StatusCode, body: &str) -> Self {
        let kind = match status.as_u16() {
            401 | 403 => ProviderFailureKind::AuthRejected,
            429 => ProviderFailureKind::RateLimited,
            408 => ProviderFailureKind::Timeout,
            500..=599 => ProviderFailureKind::Unreachable,
            _ => ProviderFailureKind::InvalidResponse,
        };
        let mut message = format!("HTTP {status}");
        if !body.is_empty() {
            let snippet: String = body.chars().take(200).collect();
            message.push_str(": ");
            message.push_str(&snippet);
        }
        Self::new(provider, kind, message)
    }
}
