use crate::provider::ProviderFailure;
use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `Switchboard`.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; internal code continues to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum SwitchboardError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Session ─────────────────────────────────────────────────────────
    #[error("session: {0}")]
    Session(#[from] SessionError),

    // ── Routing / model catalog ─────────────────────────────────────────
    #[error("routing: {0}")]
    Routing(#[from] RoutingError),

    // ── Provider dispatch ───────────────────────────────────────────────
    #[error("provider: {0}")]
    Provider(#[from] ProviderFailure),

    // ── Credentials ─────────────────────────────────────────────────────
    #[error("credentials: {0}")]
    Credentials(#[from] CredentialError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Session errors ─────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(String),

    #[error("session closed: {0}")]
    Closed(String),

    #[error("session limit reached ({limit} concurrent sessions)")]
    ResourceExhausted { limit: usize },

    /// Non-fatal: the message was already delivered in this session.
    /// Carries the sequence number of the turn that recorded it.
    #[error("duplicate turn (already recorded at seq {prior_seq})")]
    DuplicateTurn { prior_seq: u64 },

    #[error("turn out of order (expected seq {expected}, got {got})")]
    OutOfOrder { expected: u64, got: u64 },

    #[error("store: {0}")]
    Store(String),
}

// ─── Routing errors ─────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("unknown model: {0}")]
    UnknownModel(String),

    #[error("model {model} is unavailable")]
    ModelUnavailable { model: String },

    #[error("no model available for {requested} (entire fallback chain down)")]
    NoModelAvailable { requested: String },

    #[error("invalid fallback chain for {model}: {reason}")]
    InvalidFallbackChain { model: String, reason: String },
}

// ─── Credential errors ──────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("no credential configured for provider {0}")]
    NotConfigured(String),
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, SwitchboardError>;

impl SwitchboardError {
    /// `true` for the non-fatal duplicate-delivery signal: the caller should
    /// treat the message as already delivered, not as a failure.
    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            SwitchboardError::Session(SessionError::DuplicateTurn { .. })
        )
    }
}
