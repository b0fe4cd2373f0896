use super::types::{Turn, TurnRole};
use crate::error::SessionError;
use chrono::Utc;
use std::collections::HashMap;

/// The isolation boundary: one per session, created with the session, never
/// shared or merged. It is the only holder of the session's turn log, so
/// isolation is by construction: there is no path from one session's
/// operations to another session's data.
#[derive(Debug)]
pub struct IsolationBoundary {
    session_id: String,
    turns: Vec<Turn>,
    next_seq: u64,
    fingerprints: HashMap<String, u64>,
    active_model: String,
}

impl IsolationBoundary {
    pub fn new(session_id: impl Into<String>, active_model: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            turns: Vec::new(),
            next_seq: 0,
            fingerprints: HashMap::new(),
            active_model: active_model.into(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The sequence number the next appended turn must carry.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Append a turn. Enforces strictly increasing sequence numbers and
    /// rejects a fingerprint already present in this session with
    /// `DuplicateTurn` (non-fatal; the caller treats the message as
    /// already delivered).
    pub fn append_turn(&mut self, turn: Turn) -> Result<&Turn, SessionError> {
        if turn.seq != self.next_seq {
            return Err(SessionError::OutOfOrder {
                expected: self.next_seq,
                got: turn.seq,
            });
        }
        if let Some(fp) = turn.fingerprint.as_deref()
            && let Some(&prior_seq) = self.fingerprints.get(fp)
        {
            return Err(SessionError::DuplicateTurn { prior_seq });
        }

        if let Some(fp) = turn.fingerprint.as_deref() {
            self.fingerprints.insert(fp.to_string(), turn.seq);
        }
        self.next_seq += 1;
        self.turns.push(turn);
        Ok(self.turns.last().expect("just pushed"))
    }

    pub fn read_log(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn active_model(&self) -> &str {
        &self.active_model
    }

    /// Updates only this session's field. Identical model ids in other
    /// sessions are untouched because no other session can reach this
    /// boundary.
    pub fn set_active_model(&mut self, model: impl Into<String>) {
        self.active_model = model.into();
    }

    // ── Turn constructors ────────────────────────────────────────────────

    pub fn draft_user(&self, content: impl Into<String>, fingerprint: impl Into<String>) -> Turn {
        Turn {
            seq: self.next_seq,
            role: TurnRole::User,
            content: content.into(),
            model: None,
            fingerprint: Some(fingerprint.into()),
            error: None,
            created_at: Utc::now(),
        }
    }

    pub fn draft_assistant(&self, content: impl Into<String>, model: impl Into<String>) -> Turn {
        Turn {
            seq: self.next_seq,
            role: TurnRole::Assistant,
            content: content.into(),
            model: Some(model.into()),
            fingerprint: None,
            error: None,
            created_at: Utc::now(),
        }
    }

    pub fn draft_failed(
        &self,
        content: impl Into<String>,
        fingerprint: impl Into<String>,
        error: impl Into<String>,
    ) -> Turn {
        Turn {
            seq: self.next_seq,
            role: TurnRole::Failed,
            content: content.into(),
            model: None,
            fingerprint: Some(fingerprint.into()),
            error: Some(error.into()),
            created_at: Utc::now(),
        }
    }

    pub fn draft_model_switch(&self, from: &str, to: &str) -> Turn {
        Turn {
            seq: self.next_seq,
            role: TurnRole::ModelSwitch,
            content: format!("active model changed: {from} -> {to}"),
            model: Some(to.to_string()),
            fingerprint: None,
            error: None,
            created_at: Utc::now(),
        }
    }
}
