use super::boundary::IsolationBoundary;
use super::dedup::Deduplicator;
use super::types::{SessionSnapshot, SessionState, mint_boundary_token, mint_session_id};
use crate::config::SessionConfig;
use crate::error::SessionError;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

// ─── Session slots ──────────────────────────────────────────────────────────

/// Everything that must be serialized per session: the boundary (turn log,
/// active model) and the dedup set. Guarded by the slot's async mutex so a
/// session processes one `send_message` at a time; a second concurrent call
/// queues behind the first.
#[derive(Debug)]
pub struct SessionCore {
    pub boundary: IsolationBoundary,
    pub dedup: Deduplicator,
}

#[derive(Debug)]
pub struct SessionSlot {
    pub id: String,
    boundary_token: String,
    created_at: DateTime<Utc>,
    closed: AtomicBool,
    last_activity_ms: AtomicI64,
    pub core: tokio::sync::Mutex<SessionCore>,
}

impl SessionSlot {
    fn new(id: String, boundary_token: String, active_model: &str, dedup_ceiling: usize) -> Self {
        let now = Utc::now();
        Self {
            boundary_token,
            created_at: now,
            closed: AtomicBool::new(false),
            last_activity_ms: AtomicI64::new(now.timestamp_millis()),
            core: tokio::sync::Mutex::new(SessionCore {
                boundary: IsolationBoundary::new(id.clone(), active_model),
                dedup: Deduplicator::new(dedup_ceiling),
            }),
            id,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Closing is a one-way flip; in-flight operations holding the slot are
    /// allowed to complete and still append their results.
    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn touch(&self) {
        self.last_activity_ms
            .store(Utc::now().timestamp_millis(), Ordering::Release);
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        let ms = self.last_activity_ms.load(Ordering::Acquire);
        Utc.timestamp_millis_opt(ms)
            .single()
            .unwrap_or_else(Utc::now)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let core = self.core.lock().await;
        SessionSnapshot {
            id: self.id.clone(),
            state: if self.is_closed() {
                SessionState::Closed
            } else {
                SessionState::Active
            },
            created_at: self.created_at,
            last_activity: self.last_activity(),
            active_model: core.boundary.active_model().to_string(),
            turns: core.boundary.len(),
        }
    }
}

// ─── Registry ───────────────────────────────────────────────────────────────

/// The only place session identifiers are minted and validated. Owns every
/// session exclusively; lookups are O(1) map reads, and a non-existent or
/// forged identifier yields `SessionNotFound`, never partial data.
pub struct SessionRegistry {
    config: SessionConfig,
    sessions: RwLock<HashMap<String, Arc<SessionSlot>>>,
}

#[derive(Debug)]
pub struct CreatedSession {
    pub id: String,
    pub boundary_token: String,
}

impl SessionRegistry {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Mint a fresh session. Fails only when the configured ceiling on
    /// concurrently active sessions is reached.
    pub fn create(&self, active_model: &str) -> Result<CreatedSession, SessionError> {
        let mut sessions = self.sessions.write().expect("session map lock poisoned");
        let active = sessions.values().filter(|s| !s.is_closed()).count();
        if active >= self.config.max_sessions {
            return Err(SessionError::ResourceExhausted {
                limit: self.config.max_sessions,
            });
        }

        let id = mint_session_id(Utc::now());
        let boundary_token = mint_boundary_token();
        let slot = Arc::new(SessionSlot::new(
            id.clone(),
            boundary_token.clone(),
            active_model,
            self.config.dedup_ceiling,
        ));
        sessions.insert(id.clone(), slot);
        tracing::info!(session = id.as_str(), "Session created");
        Ok(CreatedSession { id, boundary_token })
    }

    /// O(1) lookup. Closed sessions answer `SessionClosed`; everything else
    /// that does not resolve answers `SessionNotFound`.
    pub fn resolve(&self, id: &str) -> Result<Arc<SessionSlot>, SessionError> {
        let sessions = self.sessions.read().expect("session map lock poisoned");
        let slot = sessions
            .get(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        if slot.is_closed() {
            return Err(SessionError::Closed(id.to_string()));
        }
        Ok(Arc::clone(slot))
    }

    /// Audit check: does the claimed boundary token still match the one
    /// minted with this session? A mismatch reports `SessionNotFound`, the
    /// same answer a forged id gets.
    pub fn verify_boundary(&self, id: &str, boundary_token: &str) -> Result<(), SessionError> {
        let slot = self.resolve(id)?;
        if slot.boundary_token != boundary_token {
            return Err(SessionError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Mark a session terminal. Idempotent: closing a closed session is a
    /// no-op.
    pub fn close(&self, id: &str) -> Result<(), SessionError> {
        let sessions = self.sessions.read().expect("session map lock poisoned");
        let slot = sessions
            .get(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        if !slot.is_closed() {
            slot.close();
            tracing::info!(session = id, "Session closed");
        }
        Ok(())
    }

    /// Close sessions idle past the configured window. The only implicit
    /// state change in the registry.
    pub fn sweep_idle(&self) -> usize {
        let idle_window = chrono::Duration::seconds(
            i64::try_from(self.config.idle_timeout_secs).unwrap_or(i64::MAX / 1_000),
        );
        let now = Utc::now();
        let sessions = self.sessions.read().expect("session map lock poisoned");
        let mut swept = 0;
        for slot in sessions.values() {
            if !slot.is_closed() && now - slot.last_activity() > idle_window {
                slot.close();
                swept += 1;
                tracing::info!(session = slot.id.as_str(), "Session closed by idle sweep");
            }
        }
        swept
    }

    /// Spawn the background idle sweep.
    pub fn spawn_idle_sweeper(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let interval = Duration::from_secs(self.config.sweep_interval_secs.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let swept = self.sweep_idle();
                if swept > 0 {
                    tracing::debug!(swept, "Idle sweep finished");
                }
            }
        })
    }

    pub fn active_count(&self) -> usize {
        let sessions = self.sessions.read().expect("session map lock poisoned");
        sessions.values().filter(|s| !s.is_closed()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(max_sessions: usize) -> SessionRegistry {
        SessionRegistry::new(SessionConfig {
            max_sessions,
            idle_timeout_secs: 0,
            sweep_interval_secs: 60,
            dedup_ceiling: 100,
        })
    }

    #[test]
    fn create_then_resolve_round_trips() {
        let reg = registry(4);
        let created = reg.create("model-a").unwrap();
        let slot = reg.resolve(&created.id).unwrap();
        assert_eq!(slot.id, created.id);
        assert!(!slot.is_closed());
    }

    #[test]
    fn forged_id_yields_not_found() {
        let reg = registry(4);
        reg.create("model-a").unwrap();
        let err = reg.resolve("sess-000000000000-deadbeef").unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
    }

    #[test]
    fn session_ceiling_is_enforced() {
        let reg = registry(2);
        reg.create("model-a").unwrap();
        reg.create("model-a").unwrap();
        let err = reg.create("model-a").unwrap_err();
        assert!(matches!(
            err,
            SessionError::ResourceExhausted { limit: 2 }
        ));
    }

    #[test]
    fn closed_sessions_free_capacity() {
        let reg = registry(1);
        let created = reg.create("model-a").unwrap();
        reg.close(&created.id).unwrap();
        reg.create("model-a").unwrap();
    }

    #[test]
    fn close_is_idempotent_and_resolve_reports_closed() {
        let reg = registry(4);
        let created = reg.create("model-a").unwrap();
        reg.close(&created.id).unwrap();
        reg.close(&created.id).unwrap();
        let err = reg.resolve(&created.id).unwrap_err();
        assert!(matches!(err, SessionError::Closed(_)));
    }

    #[test]
    fn boundary_token_mismatch_looks_like_not_found() {
        let reg = registry(4);
        let created = reg.create("model-a").unwrap();
        reg.verify_boundary(&created.id, &created.boundary_token)
            .unwrap();
        let err = reg.verify_boundary(&created.id, "bnd-forged").unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
    }

    #[test]
    fn idle_sweep_closes_stale_sessions() {
        // idle_timeout_secs of 0: everything is immediately stale.
        let reg = registry(4);
        let created = reg.create("model-a").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let swept = reg.sweep_idle();
        assert_eq!(swept, 1);
        assert!(matches!(
            reg.resolve(&created.id).unwrap_err(),
            SessionError::Closed(_)
        ));
    }

    #[tokio::test]
    async fn snapshot_reflects_state() {
        let reg = registry(4);
        let created = reg.create("model-a").unwrap();
        let slot = reg.resolve(&created.id).unwrap();
        let snap = slot.snapshot().await;
        assert_eq!(snap.state, SessionState::Active);
        assert_eq!(snap.active_model, "model-a");
        assert_eq!(snap.turns, 0);
    }
}
