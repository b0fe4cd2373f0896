use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use switchboard::provider::DispatchFuture;
use switchboard::{
    ChatRequest, ChatResponse, Config, ProviderAdapter, ProviderFailure, ProviderFailureKind,
    ProviderKind,
};
use switchboard::config::ModelConfig;

/// Adapter whose behavior is scripted per model: each dispatch pops the next
/// outcome for that model; with no script left it echoes the last user
/// message. Optionally sleeps to simulate a slow backend.
pub struct ScriptedAdapter {
    kind: ProviderKind,
    scripts: Mutex<HashMap<String, VecDeque<Result<String, ProviderFailureKind>>>>,
    calls: Mutex<HashMap<String, usize>>,
    delay: Option<Duration>,
}

impl ScriptedAdapter {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn script(&self, model: &str, outcomes: Vec<Result<&str, ProviderFailureKind>>) {
        let mut scripts = self.scripts.lock().unwrap();
        scripts.insert(
            model.to_string(),
            outcomes
                .into_iter()
                .map(|o| o.map(String::from))
                .collect(),
        );
    }

    pub fn calls(&self, model: &str) -> usize {
        *self.calls.lock().unwrap().get(model).unwrap_or(&0)
    }
}

impl ProviderAdapter for ScriptedAdapter {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn dispatch<'a>(&'a self, request: &'a ChatRequest) -> DispatchFuture<'a> {
        Box::pin(async move {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            *self
                .calls
                .lock()
                .unwrap()
                .entry(request.model.clone())
                .or_insert(0) += 1;

            let scripted = self
                .scripts
                .lock()
                .unwrap()
                .get_mut(&request.model)
                .and_then(VecDeque::pop_front);

            match scripted {
                Some(Ok(text)) => {
                    Ok(ChatResponse::text_only(text).with_model(request.model.clone()))
                }
                Some(Err(kind)) => {
                    Err(ProviderFailure::new(self.kind, kind, "scripted failure"))
                }
                None => {
                    let echo = request
                        .messages
                        .last()
                        .map_or_else(|| "empty".to_string(), |m| format!("re: {}", m.content));
                    Ok(ChatResponse::text_only(echo).with_model(request.model.clone()))
                }
            }
        })
    }
}

/// Catalog of three models mirroring the production shape: a cloud primary
/// with a two-deep fallback chain, a cloud secondary, and a local model.
pub fn three_model_config() -> Config {
    Config {
        default_model: "primary".into(),
        models: vec![
            ModelConfig {
                id: "primary".into(),
                provider: ProviderKind::Anthropic,
                fallback: vec!["secondary".into(), "local".into()],
                supports_tools: true,
                supports_vision: true,
                max_context_tokens: 200_000,
            },
            ModelConfig {
                id: "secondary".into(),
                provider: ProviderKind::Gemini,
                fallback: vec!["local".into()],
                supports_tools: true,
                supports_vision: true,
                max_context_tokens: 1_000_000,
            },
            ModelConfig {
                id: "local".into(),
                provider: ProviderKind::Ollama,
                fallback: vec![],
                supports_tools: false,
                supports_vision: false,
                max_context_tokens: 128_000,
            },
        ],
        ..Config::default()
    }
}
