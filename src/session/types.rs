use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

// ─── Identifiers ────────────────────────────────────────────────────────────

/// Mint a session identifier: a random 128-bit value combined with the
/// creation timestamp. Never derived from user input, and never the clock
/// alone.
pub fn mint_session_id(created_at: DateTime<Utc>) -> String {
    let entropy: u128 = rand::random();
    format!("sess-{:012x}-{entropy:032x}", created_at.timestamp_millis())
}

/// Mint the per-session boundary token handed back at creation. Opaque;
/// callers that hold it can audit that a session id still maps to the
/// boundary they were given.
pub fn mint_boundary_token() -> String {
    format!("bnd-{}", Uuid::new_v4().simple())
}

// ─── Turns ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TurnRole {
    /// A user message delivered to a backend.
    User,
    /// A backend response.
    Assistant,
    /// A user message whose delivery exhausted all options. Keeps the
    /// conversation record complete and auditable.
    Failed,
    /// Audit marker for an active-model change.
    ModelSwitch,
}

/// One immutable entry in a session's log. Append-only; never mutated once
/// written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Strictly increasing within the session, no two turns share one.
    pub seq: u64,
    pub role: TurnRole,
    pub content: String,
    /// For assistant turns, the model that actually produced the response,
    /// which may differ from the requested model after fallback.
    pub model: Option<String>,
    /// Content fingerprint for user-originated turns.
    pub fingerprint: Option<String>,
    /// Failure description for `Failed` turns.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn is_failed(&self) -> bool {
        self.role == TurnRole::Failed
    }
}

// ─── Session state ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    Active,
    Closed,
}

/// Read-only view of a session's metadata for listings and diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: String,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub active_model: String,
    pub turns: usize,
}
