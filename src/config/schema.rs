use crate::error::ConfigError;
use crate::provider::ProviderKind;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

// ─── Top-level config ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Model used for sessions that never picked one explicitly.
    #[serde(default = "default_model_id")]
    pub default_model: String,

    #[serde(default = "default_temperature")]
    pub default_temperature: f64,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub health: HealthConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default = "default_models")]
    pub models: Vec<ModelConfig>,

    #[serde(default)]
    pub persistence: PersistenceConfig,
}

fn default_model_id() -> String {
    "claude-3-5-sonnet".into()
}

fn default_temperature() -> f64 {
    0.7
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_model: default_model_id(),
            default_temperature: default_temperature(),
            session: SessionConfig::default(),
            health: HealthConfig::default(),
            dispatch: DispatchConfig::default(),
            providers: ProvidersConfig::default(),
            models: default_models(),
            persistence: PersistenceConfig::default(),
        }
    }
}

impl Config {
    /// Load from an explicit TOML path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| ConfigError::Load(format!("{}: {e}", path.display())))?;
        let config: Config =
            toml::from_str(&raw).map_err(|e| ConfigError::Load(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `~/.config/switchboard/config.toml` when present, defaults
    /// otherwise.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        if let Some(base) = BaseDirs::new() {
            let path = base.home_dir().join(".config/switchboard/config.toml");
            if path.exists() {
                return Self::load(&path);
            }
        }
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.models.is_empty() {
            return Err(ConfigError::Validation("no models configured".into()));
        }

        let ids: HashSet<&str> = self.models.iter().map(|m| m.id.as_str()).collect();
        if ids.len() != self.models.len() {
            return Err(ConfigError::Validation("duplicate model id".into()));
        }
        if !ids.contains(self.default_model.as_str()) {
            return Err(ConfigError::Validation(format!(
                "default_model {} is not in [[models]]",
                self.default_model
            )));
        }
        for model in &self.models {
            for alt in &model.fallback {
                if !ids.contains(alt.as_str()) {
                    return Err(ConfigError::Validation(format!(
                        "model {} falls back to unknown model {alt}",
                        model.id
                    )));
                }
            }
        }

        if !(0.0..=1.0).contains(&self.health.success_rate_threshold) {
            return Err(ConfigError::Validation(
                "health.success_rate_threshold must be within 0..=1".into(),
            ));
        }
        if self.health.window == 0 {
            return Err(ConfigError::Validation("health.window must be > 0".into()));
        }
        if self.session.max_sessions == 0 {
            return Err(ConfigError::Validation(
                "session.max_sessions must be > 0".into(),
            ));
        }
        Ok(())
    }

    pub fn model(&self, id: &str) -> Option<&ModelConfig> {
        self.models.iter().find(|m| m.id == id)
    }
}

// ─── Sessions ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Ceiling on concurrently open sessions.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    /// Sessions idle longer than this are closed by the sweep.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Cadence of the idle sweep.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Per-session ceiling on remembered message fingerprints.
    #[serde(default = "default_dedup_ceiling")]
    pub dedup_ceiling: usize,
}

fn default_max_sessions() -> usize {
    256
}

fn default_idle_timeout_secs() -> u64 {
    1800
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_dedup_ceiling() -> usize {
    10_000
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            idle_timeout_secs: default_idle_timeout_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            dedup_ceiling: default_dedup_ceiling(),
        }
    }
}

// ─── Health tracking ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Trailing outcome window per model.
    #[serde(default = "default_health_window")]
    pub window: usize,
    /// Success rate below this marks an available model degraded.
    #[serde(default = "default_success_rate_threshold")]
    pub success_rate_threshold: f64,
    /// Mean latency above this marks an available model degraded.
    #[serde(default = "default_latency_ceiling_ms")]
    pub latency_ceiling_ms: u64,
    /// Consecutive failures beyond this mark a model unavailable.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Cadence of the active probe sweep.
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,
    /// Timeout applied to a single probe.
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

fn default_health_window() -> usize {
    20
}

fn default_success_rate_threshold() -> f64 {
    0.9
}

fn default_latency_ceiling_ms() -> u64 {
    30_000
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_probe_interval_secs() -> u64 {
    60
}

fn default_probe_timeout_secs() -> u64 {
    10
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            window: default_health_window(),
            success_rate_threshold: default_success_rate_threshold(),
            latency_ceiling_ms: default_latency_ceiling_ms(),
            failure_threshold: default_failure_threshold(),
            probe_interval_secs: default_probe_interval_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
        }
    }
}

// ─── Dispatch ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Per-request timeout for provider dispatch.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Automatic fallback retries after a retryable provider failure.
    #[serde(default = "default_fallback_retries")]
    pub fallback_retries: u32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_fallback_retries() -> u32 {
    1
}

fn default_max_tokens() -> u32 {
    4096
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            fallback_retries: default_fallback_retries(),
            max_tokens: default_max_tokens(),
        }
    }
}

// ─── Provider endpoints ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub anthropic_base_url: Option<String>,
    #[serde(default)]
    pub gemini_base_url: Option<String>,
    #[serde(default = "default_ollama_base_url")]
    pub ollama_base_url: String,
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".into()
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            anthropic_base_url: None,
            gemini_base_url: None,
            ollama_base_url: default_ollama_base_url(),
        }
    }
}

// ─── Model catalog entries ───────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub id: String,
    pub provider: ProviderKind,
    /// Ordered fallback preference, excluding the model itself.
    #[serde(default)]
    pub fallback: Vec<String>,
    #[serde(default)]
    pub supports_tools: bool,
    #[serde(default)]
    pub supports_vision: bool,
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: u32,
}

fn default_max_context_tokens() -> u32 {
    128_000
}

fn default_models() -> Vec<ModelConfig> {
    vec![
        ModelConfig {
            id: "claude-3-5-sonnet".into(),
            provider: ProviderKind::Anthropic,
            fallback: vec!["gemini-1.5-pro".into(), "llama3.1:8b".into()],
            supports_tools: true,
            supports_vision: true,
            max_context_tokens: 200_000,
        },
        ModelConfig {
            id: "gemini-1.5-pro".into(),
            provider: ProviderKind::Gemini,
            fallback: vec!["llama3.1:8b".into()],
            supports_tools: true,
            supports_vision: true,
            max_context_tokens: 1_000_000,
        },
        ModelConfig {
            id: "llama3.1:8b".into(),
            provider: ProviderKind::Ollama,
            fallback: vec![],
            supports_tools: false,
            supports_vision: false,
            max_context_tokens: 128_000,
        },
    ]
}

// ─── Persistence ─────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Directory for append-only turn logs. Disabled when unset; health
    /// records are always memory-only and rebuilt on restart.
    #[serde(default)]
    pub turn_log_dir: Option<PathBuf>,
}
