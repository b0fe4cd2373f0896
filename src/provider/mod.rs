// ── Infrastructure ───────────────────────────────────────────────────────────
pub mod http;
pub mod traits;
pub mod types;

// ── Adapter implementations ─────────────────────────────────────────────────
pub mod anthropic;
pub mod factory;
pub mod gemini;
pub mod ollama;

// ── Re-exports ──────────────────────────────────────────────────────────────
pub use anthropic::AnthropicAdapter;
pub use factory::{build_adapter_set, create_adapter};
pub use gemini::GeminiAdapter;
pub use http::build_provider_client;
pub use ollama::OllamaAdapter;
pub use traits::{AdapterSet, DispatchFuture, ProviderAdapter};
pub use types::{
    ChatMessage, ChatRequest, ChatResponse, ChatRole, ProviderFailure, ProviderFailureKind,
    ProviderKind,
};
